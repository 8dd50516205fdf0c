use domain::value::PartyCode;

/// Party-code generator contract; infrastructure decides alphabet and length.
/// Uniqueness is the caller's problem: collisions are handled by asking for
/// another code, not by failing.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> PartyCode;
}
