use application::command::shared::CodeGenerator;
use domain::value::PartyCode;
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random uppercase alphanumeric party codes, e.g. "AB12".
///
/// Codes are not guaranteed unique; the orchestration layer regenerates on
/// collision against the repository.
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> PartyCode {
        let mut rng = rand::thread_rng();
        let code: String = (0..self.length)
            .map(|_| {
                let index = rng.gen_range(0..CODE_ALPHABET.len());
                CODE_ALPHABET[index] as char
            })
            .collect();
        PartyCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_configured_length_and_alphabet() {
        let generator = RandomCodeGenerator::new(4);
        for _ in 0..100 {
            let code = generator.next_code();
            assert_eq!(code.as_str().len(), 4);
            assert!(code
                .as_str()
                .bytes()
                .all(|byte| CODE_ALPHABET.contains(&byte)));
        }
    }
}
