pub mod constants;
pub mod error;
pub mod queue;

pub use error::{Error, Result};
pub use queue::TsQueue;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
