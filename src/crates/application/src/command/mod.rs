pub mod party;
pub mod shared;
