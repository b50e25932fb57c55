//! Deterministic, manually triggered disposal of tracked resources.
//!
//! A [`ResourceTracker`] holds resources of five categories and disposes of
//! all of them in one call:
//!
//! | Category | Disposal |
//! |---|---|
//! | deferred callable | launched fire-and-forget |
//! | task | aborted through its [`tokio::task::AbortHandle`] |
//! | object | [`Destroy::destroy`] |
//! | subscription | [`Disconnect::disconnect`] |
//! | group | its own destroy hook, or every child in turn |
//!
//! ```no_run
//! use custodian_tracker::{Destroy, Resource, ResourceTracker};
//! use std::sync::Arc;
//!
//! struct Window;
//!
//! impl Destroy for Window {
//!     fn destroy(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut tracker = ResourceTracker::new();
//! tracker.add(Resource::object(Arc::new(Window)))?;
//! tracker.add(Resource::deferred(|| println!("closing")))?;
//!
//! let report = tracker.collect();
//! assert!(report.is_clean());
//! # Ok::<(), custodian_tracker::Error>(())
//! ```

pub mod collector;
pub mod group;
pub mod resource;
pub mod tracker;

pub use collector::{CollectReport, DisposalFailure};
pub use group::ResourceGroup;
pub use resource::{DeferredFn, Destroy, Disconnect, Identity, IntoResource, Resource, Selector};
pub use tracker::ResourceTracker;

pub use custodian_core::{
    Category, DeferredDispatch, Error, ResourceKey, Result, TrackerConfig, TrackerConfigBuilder,
};
