//! Command-line interface module.

mod args;
pub mod compile;
pub mod detect;
pub mod serve;
pub mod watch;

pub use args::{Cli, Commands, WatchArgs};
