//! pc-core: shared types, errors, configuration and delay planning.
//!
//! This crate is the foundational dependency for all other pc-* crates. It
//! owns the feed's data model ([`SyncRecord`], [`FragmentKey`]), the unified
//! error taxonomy, application configuration, and the pure [`DelayPlanner`]
//! that decides where a delayed viewer resumes playback.

pub mod config;
pub mod delay;
pub mod error;
pub mod fragment;
pub mod sync;

// Re-export the most commonly used items at the crate root.
pub use delay::{DelayPlan, DelayPlanner, TOKEN_REDIRECT};
pub use error::{Error, Result};
pub use fragment::{FragmentKey, FragmentType};
pub use sync::SyncRecord;
