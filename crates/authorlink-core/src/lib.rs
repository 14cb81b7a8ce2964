pub mod config;
pub mod error;
pub mod models;

pub use config::{AppConfig, EmailConfig, MatchingConfig, PipelineConfig, PrecedenceConfig, ServiceConfig};
pub use error::{CoreError, Result};
pub use models::*;
