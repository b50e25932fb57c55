//! Core types, errors, and configuration for `custodian`.
//!
//! This crate holds the building blocks shared by the tracker crate:
//!
//! - **`errors`**: the `Error` enum and `Result` alias covering every failure
//!   a tracker can report.
//! - **`types`**: `Category`, the disposal strategy discriminant, and
//!   `ResourceKey`, the handle returned on registration.
//! - **`config`**: `TrackerConfig` and its builder.

pub mod config;
pub mod errors;
pub mod types;

pub use self::{
    config::{DeferredDispatch, TrackerConfig, TrackerConfigBuilder},
    errors::{Error, Result},
    types::{Category, ResourceKey},
};
