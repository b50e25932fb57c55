//! The resource tracker

use crate::collector::{CollectReport, Collector, DisposalFailure, Pending};
use crate::resource::{Identity, IntoResource, Resource, Selector};
use custodian_core::{Category, Error, ResourceKey, Result, TrackerConfig};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// A tracked entry
struct Entry {
    resource: Resource,
    label: Option<String>,
}

/// Owning registry of disposable resources.
///
/// Resources are registered with [`add`](Self::add) and disposed together by
/// [`collect`](Self::collect), each according to its [`Category`]. After
/// [`destroy`](Self::destroy) the tracker rejects new registrations.
///
/// The tracker has a single owner: every mutating method takes `&mut self`,
/// so nothing can be registered while a collection pass is running.
pub struct ResourceTracker {
    config: TrackerConfig,
    entries: IndexMap<ResourceKey, Entry>,
    identities: HashMap<Identity, ResourceKey>,
    next_key: u64,
    destroyed: bool,
    failures_tx: Option<UnboundedSender<DisposalFailure>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            entries: IndexMap::with_capacity(16),
            identities: HashMap::with_capacity(16),
            next_key: 0,
            destroyed: false,
            failures_tx: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start tracking a resource.
    ///
    /// Returns the key to pass to [`remove`](Self::remove). A resource whose
    /// identity is already tracked is not added twice; its existing key is
    /// returned instead.
    pub fn add(&mut self, item: impl IntoResource) -> Result<ResourceKey> {
        self.insert(None, item.into_resource())
    }

    /// Start tracking a resource under a label shown in logs and failures
    pub fn add_labeled(
        &mut self,
        label: impl Into<String>,
        item: impl IntoResource,
    ) -> Result<ResourceKey> {
        self.insert(Some(label.into()), item.into_resource())
    }

    /// Start tracking a value whose category is inferred from its runtime type.
    ///
    /// See [`Resource::classify`] for the recognized types.
    pub fn add_any<T: Any + Send>(&mut self, value: T) -> Result<ResourceKey> {
        self.ensure_live()?;
        let resource = Resource::classify(value)?;
        self.insert(None, resource)
    }

    fn insert(&mut self, label: Option<String>, resource: Resource) -> Result<ResourceKey> {
        self.ensure_live()?;

        let identity = resource.identity();
        if let Some(existing) = identity.and_then(|identity| self.identities.get(&identity)) {
            debug!(tracker = %self.config.name, key = %existing, "resource already tracked");
            return Ok(*existing);
        }

        let key = ResourceKey::new(self.next_key);
        self.next_key += 1;

        debug!(
            tracker = %self.config.name,
            key = %key,
            category = %resource.category(),
            label = label.as_deref().unwrap_or(""),
            "tracking resource"
        );

        if let Some(identity) = identity {
            self.identities.insert(identity, key);
        }
        self.entries.insert(key, Entry { resource, label });
        Ok(key)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::tracker_destroyed(&self.config.name));
        }
        Ok(())
    }

    /// Stop tracking a resource without disposing of it.
    ///
    /// Accepts the key returned on registration or the item itself. Returns
    /// whether anything was removed; unknown items are ignored.
    pub fn remove(&mut self, target: impl Into<Selector>) -> bool {
        self.take(target).is_some()
    }

    /// Stop tracking a resource and hand it back to the caller
    pub fn take(&mut self, target: impl Into<Selector>) -> Option<Resource> {
        let key = self.resolve(target.into())?;
        let entry = self.entries.shift_remove(&key)?;
        if let Some(identity) = entry.resource.identity() {
            self.identities.remove(&identity);
        }

        debug!(tracker = %self.config.name, key = %key, "stopped tracking resource");
        Some(entry.resource)
    }

    fn resolve(&self, selector: Selector) -> Option<ResourceKey> {
        match selector {
            Selector::Key(key) => Some(key),
            Selector::Identity(identity) => self.identities.get(&identity).copied(),
        }
    }

    pub fn contains(&self, target: impl Into<Selector>) -> bool {
        self.resolve(target.into())
            .is_some_and(|key| self.entries.contains_key(&key))
    }

    /// Category of a tracked entry
    pub fn category(&self, key: ResourceKey) -> Option<Category> {
        self.entries.get(&key).map(|entry| entry.resource.category())
    }

    pub fn label(&self, key: ResourceKey) -> Option<&str> {
        self.entries.get(&key).and_then(|entry| entry.label.as_deref())
    }

    /// Keys of tracked entries in registration order
    pub fn keys(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Receive failures of deferred callables, which surface only after
    /// [`collect`](Self::collect) has returned.
    ///
    /// Calling this again replaces the previous channel.
    pub fn failure_receiver(&mut self) -> UnboundedReceiver<DisposalFailure> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failures_tx = Some(tx);
        rx
    }

    /// Dispose of every tracked resource and empty the tracker.
    ///
    /// The tracked entries are snapshotted up front and disposed in
    /// registration order. A failing entry never stops the others; failures
    /// are returned in the report. Deferred callables and task cancellations
    /// are only issued, never awaited.
    #[tracing::instrument(skip_all, fields(tracker = %self.config.name))]
    pub fn collect(&mut self) -> CollectReport {
        if self.entries.is_empty() {
            return CollectReport::default();
        }

        let snapshot: Vec<Pending> = self
            .entries
            .drain(..)
            .map(|(key, entry)| Pending::new(Some(key), entry.label, entry.resource))
            .collect();
        self.identities.clear();

        let report = Collector::new(&self.config, self.failures_tx.as_ref()).run(snapshot);

        if report.is_clean() {
            debug!(disposed = report.disposed, skipped = report.skipped, "collected resources");
        } else {
            warn!(
                disposed = report.disposed,
                failed = report.failures.len(),
                "collected resources with failures"
            );
        }
        report
    }

    /// Collect, then reject every later registration. Idempotent.
    pub fn destroy(&mut self) -> CollectReport {
        if self.destroyed {
            return CollectReport::default();
        }

        let report = self.collect();
        self.destroyed = true;
        self.failures_tx = None;
        info!(tracker = %self.config.name, "resource tracker destroyed");
        report
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if !self.config.collect_on_drop || self.destroyed {
            return;
        }

        let report = self.destroy();
        for failure in &report.failures {
            warn!(tracker = %self.config.name, "Failed to dispose on drop: {failure}");
        }
    }
}

impl fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("name", &self.config.name)
            .field("tracked", &self.entries.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
