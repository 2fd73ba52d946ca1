//! wpbuild - asset build orchestration for WordPress plugins
//!
//! This crate provides functionality to:
//! - Resolve a layered project configuration (base file plus environment or variant overlays)
//! - Derive every output and destination path from that configuration
//! - Compile scripts, styles and translation catalogs through external tools
//! - Mirror build artifacts into plugin destinations and package a distributable ZIP
//! - Run a development session that rebuilds on change and notifies live-reload clients
pub mod clean;
pub mod compile;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod livereload;
pub mod metadata;
pub mod orchestrator;
pub mod package;
pub mod paths;
pub mod sync;
pub mod watch;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{Error, Result};

// Re-export main API components
pub use clean::Cleaner;
pub use compile::{AssetKind, CompilationTarget, OutputFormat};
pub use config::{ConfigResolver, Environment, ResolvedConfig};
pub use livereload::{LiveReload, LiveReloadServer, NoopLiveReload};
pub use metadata::MetadataRewriter;
pub use orchestrator::{BuildSummary, Orchestrator, Toolchain};
pub use package::Packager;
pub use paths::{Paths, should_create_dist};
pub use sync::{SyncReport, Synchronizer};
pub use watch::WatchSession;
