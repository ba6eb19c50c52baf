//! Configuration system for relint
//!
//! Configuration cascades: every directory from a target file up to the
//! chain root may contribute one layer, deeper directories overriding
//! shallower ones. The resolved chain is a [`ConfigArray`]; the flattened
//! view a lint engine consumes is an [`ExtractedConfig`].
//!
//! ## Configuration files
//!
//! A directory is configured by the first of `.relintrc.json`,
//! `.relintrc.yaml`, `.relintrc.yml`, or `.relintrc` found in it.
//! Files may extend other files by path:
//!
//! ```json
//! {
//!   "root": true,
//!   "extends": "./relint-base.json",
//!   "env": { "node": true },
//!   "rules": {
//!     "no-undef": "error",
//!     "max-lines": ["warn", 300]
//!   },
//!   "overrides": [
//!     {
//!       "files": ["*.test.js"],
//!       "rules": { "no-console": "off" }
//!     }
//!   ]
//! }
//! ```
//!
//! ## Cascading
//!
//! The upward walk stops at a layer with `root: true`, at the user's home
//! directory (whose configuration only applies as the personal fallback
//! when no project configuration exists), at the filesystem root, or
//! where reading configuration files is denied. Each visited directory's
//! resolved array is cached, and every file in a directory shares the
//! same array instance.

mod array;
mod cascade;
mod element;
mod factory;

pub use array::{ConfigArray, ExtractedConfig};
pub use cascade::{CascadingConfigResolver, CascadingResolverOptions};
pub use element::{
    ConfigData, ConfigElement, GlobalAccess, OverrideData, OverrideEntry, OverrideTester,
    ParserDescriptor, PluginDescriptor, RuleEntry, Severity,
};
pub use factory::{ConfigArrayFactory, CONFIG_FILENAMES};
