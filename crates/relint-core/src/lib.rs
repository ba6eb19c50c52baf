//! relint core
//!
//! Configuration resolution and file enumeration for the relint linter.
//! This crate answers two questions for the surrounding tool: which files
//! does a set of input patterns denote, and which merged, validated
//! configuration applies to each of them.
//!
//! The enumerator is single-threaded and lazy: files are produced as the
//! consumer pulls them, and configuration arrays are shared handles, so
//! every file in a directory sees the same instance.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ignore;
mod paths;

// Re-export commonly used types
pub use config::{
    CascadingConfigResolver, CascadingResolverOptions, ConfigArray, ConfigArrayFactory,
    ConfigData, ConfigElement, ExtractedConfig, GlobalAccess, OverrideData, OverrideEntry,
    OverrideTester, ParserDescriptor, PluginDescriptor, RuleEntry, Severity, CONFIG_FILENAMES,
};
pub use discovery::{
    EnumeratorOptions, FileAndConfig, FileEnumerator, FileIterator, PatternList,
};
pub use error::{ErrorKind, RelintError, Result};
pub use ignore::{IgnoreMatcher, IgnoreOptions, IGNORE_FILENAME};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relint=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
