/// Macro for prefixed status logging to stderr.
///
/// Usage:
/// ```ignore
/// log_status!("slurm", "Submitting {} job", stage);
/// log_status!("config", "Using most recent config: {}", name);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        eprintln!("[{}] {}", $prefix, format_args!($($arg)*));
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `start_pipeline::slurm` instead of `start_pipeline::core::slurm`
pub use core::*;
pub use utils::*;
