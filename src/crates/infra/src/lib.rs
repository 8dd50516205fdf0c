pub mod repository;
pub use repository::in_memory::InMemoryPartyRepository;

pub mod event_bus;
pub use event_bus::InMemoryPartyNotifier;

pub mod code_generator;
pub use code_generator::RandomCodeGenerator;

pub mod config;
pub use config::AppConfig;
