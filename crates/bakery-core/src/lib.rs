//! Core types and the declaration format for Bakery plugins.
//!
//! A *plugin* is a declarative script file with an ini-like layout: a `[Main]`
//! section carrying metadata (title, author, selection seed, disable list) and
//! any number of named body sections whose lines are kept opaque. This crate
//! provides:
//!
//! - The plugin data model ([`Plugin`], [`PluginKind`], [`SelectedState`])
//! - Declaration parsing ([`declare::parse_plugin`]) and the targeted
//!   single-key rewrite ([`declare::set_key`]) used to persist selection
//!   changes back to disk
//! - `%Name%` variable expansion ([`Variables`]) for paths referenced by
//!   declarations
//!
//! # Examples
//!
//! ```
//! use bakery_core::{PluginKind, SelectedState, declare};
//! use std::path::Path;
//!
//! let text = "[Main]\nTitle=Net Driver\nSelected=True\n\n[Process]\nEcho,hi\n";
//! let plugin = declare::parse_plugin(
//!     Path::new("/base/proj/net.script"),
//!     "proj/net.script",
//!     PluginKind::Plugin,
//!     2,
//!     text,
//! )
//! .unwrap();
//!
//! assert_eq!(plugin.title, "Net Driver");
//! assert_eq!(plugin.selected, SelectedState::Selected);
//! assert!(plugin.has_section("Process"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod declare;
mod error;
mod types;
mod vars;

pub use error::{CoreError, Result};
pub use types::{
    DISABLE_KEY, LINK_EXT, LINK_KEY, MAIN_SECTION, PROJECT_SCRIPT, Plugin, PluginKind, SCRIPT_EXT,
    SELECTED_KEY, SelectedState,
};
pub use vars::{Variables, clean_declared_path, normalize_separators};
