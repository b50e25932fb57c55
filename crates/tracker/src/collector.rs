//! The collection pass: category dispatch and recursive group disposal

use crate::resource::{DeferredFn, Identity, Resource};
use custodian_core::{Category, DeferredDispatch, Error, ResourceKey, Result, TrackerConfig};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// A resource that could not be disposed
#[derive(Debug)]
pub struct DisposalFailure {
    /// Key of the tracked entry, `None` for resources reached through a group
    pub key: Option<ResourceKey>,
    pub label: Option<String>,
    pub category: Category,
    pub error: Error,
}

impl fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.key, &self.label) {
            (Some(key), Some(label)) => write!(f, "{key} ({label}): {}", self.error),
            (Some(key), None) => write!(f, "{key}: {}", self.error),
            (None, Some(label)) => write!(f, "child of {label}: {}", self.error),
            (None, None) => write!(f, "nested resource: {}", self.error),
        }
    }
}

/// Outcome of a collection pass
#[derive(Debug, Default)]
pub struct CollectReport {
    /// Resources whose disposal was issued successfully, groups included
    pub disposed: usize,
    /// Resources reached a second time in the same pass and left alone
    pub skipped: usize,
    /// Resources whose disposal returned an error or panicked
    pub failures: Vec<DisposalFailure>,
}

impl CollectReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of disposal operations that were attempted
    pub fn attempted(&self) -> usize {
        self.disposed + self.failures.len()
    }
}

/// One unit of work in a collection pass
pub(crate) struct Pending {
    key: Option<ResourceKey>,
    label: Option<String>,
    resource: Resource,
}

impl Pending {
    pub(crate) fn new(key: Option<ResourceKey>, label: Option<String>, resource: Resource) -> Self {
        Self {
            key,
            label,
            resource,
        }
    }
}

/// Runs one collection pass over a snapshot of resources.
///
/// Groups are expanded onto an explicit work stack instead of recursing, and
/// every identity is disposed at most once per pass, so nesting depth and
/// cycles between groups are both bounded.
pub(crate) struct Collector<'a> {
    dispatch: DeferredDispatch,
    failures_tx: Option<&'a UnboundedSender<DisposalFailure>>,
    visited: HashSet<Identity>,
    // Visited handles stay alive until the pass ends so their addresses
    // cannot be reused by resources created during the pass.
    retained: Vec<Resource>,
    report: CollectReport,
}

impl<'a> Collector<'a> {
    pub(crate) fn new(
        config: &TrackerConfig,
        failures_tx: Option<&'a UnboundedSender<DisposalFailure>>,
    ) -> Self {
        Self {
            dispatch: config.deferred_dispatch,
            failures_tx,
            visited: HashSet::new(),
            retained: Vec::new(),
            report: CollectReport::default(),
        }
    }

    pub(crate) fn run(mut self, snapshot: Vec<Pending>) -> CollectReport {
        let mut stack = snapshot;
        stack.reverse();

        while let Some(Pending {
            key,
            label,
            resource,
        }) = stack.pop()
        {
            if let Some(identity) = resource.identity() {
                if !self.visited.insert(identity) {
                    debug!(?identity, "resource already disposed in this pass");
                    self.report.skipped += 1;
                    continue;
                }
                self.retained.extend(resource.share());
            }

            let category = resource.category();
            let outcome = match resource {
                Resource::Deferred(callable) => self.launch_deferred(key, label.clone(), callable),
                Resource::Task(handle) => {
                    handle.abort();
                    Ok(())
                }
                Resource::Object(object) => guarded(category, || object.destroy()),
                Resource::Subscription(subscription) => {
                    guarded(category, || subscription.disconnect())
                }
                Resource::Group(group) if group.has_destroy_hook() => guarded(category, || {
                    group.run_destroy_hook().unwrap_or(Ok(()))
                }),
                Resource::Group(group) => {
                    let child_label = group
                        .label()
                        .map(str::to_owned)
                        .or_else(|| label.clone());
                    let children = group.drain();
                    debug!(children = children.len(), "expanding resource group");
                    stack.extend(
                        children
                            .into_iter()
                            .rev()
                            .map(|child| Pending::new(None, child_label.clone(), child)),
                    );
                    Ok(())
                }
            };

            match outcome {
                Ok(()) => self.report.disposed += 1,
                Err(error) => {
                    warn!(
                        key = ?key,
                        label = label.as_deref().unwrap_or(""),
                        %category,
                        "Failed to dispose resource: {error}"
                    );
                    self.report.failures.push(DisposalFailure {
                        key,
                        label,
                        category,
                        error,
                    });
                }
            }
        }

        self.report
    }

    /// Start a deferred callable without waiting for it
    fn launch_deferred(
        &self,
        key: Option<ResourceKey>,
        label: Option<String>,
        callable: DeferredFn,
    ) -> Result<()> {
        let reporter = self.failures_tx.cloned();
        let job = move || run_deferred(key, label, callable, reporter);

        let runtime = match self.dispatch {
            DeferredDispatch::Auto => tokio::runtime::Handle::try_current().ok(),
            DeferredDispatch::Thread => None,
        };
        if let Some(runtime) = runtime {
            drop(runtime.spawn_blocking(job));
            return Ok(());
        }

        thread::Builder::new()
            .name("custodian-deferred".to_string())
            .spawn(job)
            .map(drop)
            .map_err(|e| {
                Error::disposal_with_source(
                    Category::Deferred,
                    "failed to spawn deferred callable thread",
                    e,
                )
            })
    }
}

fn run_deferred(
    key: Option<ResourceKey>,
    label: Option<String>,
    callable: DeferredFn,
    reporter: Option<UnboundedSender<DisposalFailure>>,
) {
    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callable)) else {
        return;
    };

    let error = Error::disposal(
        Category::Deferred,
        format!("deferred callable panicked: {}", panic_message(payload.as_ref())),
    );
    warn!(key = ?key, label = label.as_deref().unwrap_or(""), "{error}");

    if let Some(reporter) = reporter {
        // The receiver may be gone; the failure is already logged.
        let _ = reporter.send(DisposalFailure {
            key,
            label,
            category: Category::Deferred,
            error,
        });
    }
}

/// Run a synchronous disposal operation, turning errors and panics into `Error::Disposal`
fn guarded<F>(category: Category, operation: F) -> Result<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::disposal_with_source(category, e.to_string(), e)),
        Err(payload) => Err(Error::disposal(
            category,
            format!("disposal panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ResourceGroup;
    use crate::resource::Destroy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Destroy for Counter {
        fn destroy(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn collect(resources: Vec<Resource>) -> CollectReport {
        let config = TrackerConfig::default();
        let snapshot = resources
            .into_iter()
            .map(|resource| Pending::new(None, None, resource))
            .collect();
        Collector::new(&config, None).run(snapshot)
    }

    #[test]
    fn test_guarded_maps_errors_and_panics() {
        assert!(guarded(Category::Object, || Ok(())).is_ok());

        let err = guarded(Category::Object, || anyhow::bail!("busy")).unwrap_err();
        assert_eq!(err.to_string(), "failed to dispose object resource: busy");

        let err = guarded(Category::Subscription, || panic!("boom")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to dispose subscription resource: disposal panicked: boom"
        );
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&7_u8), "non-string panic payload");
    }

    #[test]
    fn test_same_identity_disposed_once_per_pass() {
        let counter = Arc::new(Counter::default());
        let group = ResourceGroup::new();
        group.insert(Resource::object(counter.clone()));

        let report = collect(vec![Resource::object(counter.clone()), Resource::group(group)]);

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.disposed, 2);
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let counter = Arc::new(Counter::default());
        let mut current = ResourceGroup::new();
        current.insert(Resource::object(counter.clone()));
        for _ in 0..100_000 {
            let parent = ResourceGroup::new();
            parent.insert(current);
            current = parent;
        }

        let report = collect(vec![Resource::group(current)]);

        assert!(report.is_clean());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(report.disposed, 100_002);
    }

    #[test]
    fn test_failure_display() {
        let failure = DisposalFailure {
            key: Some(ResourceKey::new(3)),
            label: Some("window".to_string()),
            category: Category::Object,
            error: Error::disposal(Category::Object, "gone"),
        };
        assert_eq!(
            failure.to_string(),
            "#3 (window): failed to dispose object resource: gone"
        );
    }
}
