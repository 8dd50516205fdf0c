mod party;
pub use party::InMemoryPartyRepository;
