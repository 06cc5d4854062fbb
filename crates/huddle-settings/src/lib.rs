//! # huddle-settings
//!
//! Configuration for the Huddle relay, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`HuddleSettings::default()`]
//! 2. **Settings file**: `~/.huddle/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `HUDDLE_*` overrides (highest priority)
//!
//! The loaded value is passed explicitly to the server and client; there is
//! no global settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
