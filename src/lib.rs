pub mod assertion;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod model;
pub mod runner;
pub mod sandbox;
pub mod store;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use runner::{PipelineStage, RequestExecutor};
