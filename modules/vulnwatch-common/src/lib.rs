pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::VulnWatchError;
pub use types::{Provider, Severity, StoredVuln, VulnRecord};
