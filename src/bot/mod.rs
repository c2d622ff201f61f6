//! Bot lifecycle: decision engines, running instances and the registry

pub mod engine;
pub mod instance;
pub mod prediction;
pub mod registry;

pub use engine::EngineSettings;
pub use registry::{BotRegistry, RegistryError, RegistrySettings};
