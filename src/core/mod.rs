// Public modules
pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod mode;
pub mod runner;
pub mod slurm;
pub mod strategy;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
