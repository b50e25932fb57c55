#![allow(dead_code)]
//! Shared fixtures for tracker integration tests

use custodian_tracker::{Category, Destroy, Disconnect, Resource, ResourceGroup};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// An owned object that records whether it was destroyed
#[derive(Default)]
pub struct Part {
    pub destroyed: AtomicBool,
    pub destroy_calls: AtomicUsize,
}

impl Part {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Destroy for Part {
    fn destroy(&self) -> anyhow::Result<()> {
        self.destroyed.store(true, Ordering::SeqCst);
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A subscription that records whether it is still connected
pub struct Connection {
    pub connected: AtomicBool,
    pub disconnect_calls: AtomicUsize,
}

impl Connection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            disconnect_calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Disconnect for Connection {
    fn disconnect(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// How a faulty object misbehaves when destroyed
pub enum Fault {
    Error,
    Panic,
}

pub struct Faulty(pub Fault);

impl Destroy for Faulty {
    fn destroy(&self) -> anyhow::Result<()> {
        match self.0 {
            Fault::Error => anyhow::bail!("device already detached"),
            Fault::Panic => panic!("destroy blew up"),
        }
    }
}

/// Counts disposals of any category
#[derive(Clone, Default)]
pub struct Probe(Arc<AtomicUsize>);

impl Probe {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait until the count reaches `expected` or two seconds pass
    pub async fn settle(&self, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.count() < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.count()
    }

    /// Build a resource of the given category whose disposal bumps this probe.
    ///
    /// Task resources need a running tokio runtime.
    pub fn resource(&self, category: Category) -> Resource {
        match category {
            Category::Deferred => {
                let probe = self.clone();
                Resource::deferred(move || probe.hit())
            }
            Category::Task => {
                let guard = DropProbe(self.clone());
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    std::future::pending::<()>().await;
                });
                Resource::task(handle.abort_handle())
            }
            Category::Object => Resource::object(Arc::new(ProbeObject(self.clone()))),
            Category::Subscription => {
                Resource::subscription(Arc::new(ProbeSubscription(self.clone())))
            }
            Category::Group => {
                let probe = self.clone();
                Resource::group(ResourceGroup::new().with_destroy(move || {
                    probe.hit();
                    Ok(())
                }))
            }
        }
    }
}

struct DropProbe(Probe);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.hit();
    }
}

struct ProbeObject(Probe);

impl Destroy for ProbeObject {
    fn destroy(&self) -> anyhow::Result<()> {
        self.0.hit();
        Ok(())
    }
}

struct ProbeSubscription(Probe);

impl Disconnect for ProbeSubscription {
    fn disconnect(&self) -> anyhow::Result<()> {
        self.0.hit();
        Ok(())
    }
}
