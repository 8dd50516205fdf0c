pub mod event;
pub mod likes_dislikes;
pub mod party;
pub mod party_goer;
pub mod provider;
pub mod queue;
pub mod track;
pub mod value;
