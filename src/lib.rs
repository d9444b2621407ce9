pub mod cli;
pub mod client;
pub mod error;
pub mod models;
pub mod server;
pub mod services;

pub use cli::{Cli, Commands};
pub use error::{AppError, PipelineError, ProviderError};
pub use models::{Config, OutputFormat};
pub use services::QaPipeline;
