//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Command result checking
//! - `io` - File I/O with consistent error handling
//! - `parser` - Text extraction from command output
//! - `shell` - Shell escaping and quoting
//! - `template` - String template rendering

pub mod command;
pub mod io;
pub mod parser;
pub mod shell;
pub(crate) mod template;
