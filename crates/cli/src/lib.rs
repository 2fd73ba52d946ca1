//! Command line front end for wpbuild

pub mod cli;
pub mod logging;

pub use cli::{Cli, Commands};
pub use logging::Logging;
