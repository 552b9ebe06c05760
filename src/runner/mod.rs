pub mod executor;
pub mod reporter;
pub mod stage;

pub use executor::RequestExecutor;
pub use reporter::ResponseReporter;
pub use stage::PipelineStage;
