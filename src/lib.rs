//! Workspace package for the end-to-end tests in `tests/`.
//!
//! The library lives in `crates/core` and the `wpbuild` binary in `crates/cli`.

pub use wpbuild_core::*;
