//! Domain types shared between the core and tracker crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Disposal category of a tracked resource.
///
/// The category is never chosen by the caller; it is inferred from the
/// resource's type when it is registered and selects the disposal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A callable launched fire-and-forget at collection time
    Deferred,
    /// A running background task, cancelled at collection time
    Task,
    /// An external object with an explicit destroy operation
    Object,
    /// An active event subscription with a disconnect operation
    Subscription,
    /// A nested container of further resources
    Group,
}

impl Category {
    /// All categories in classification precedence order
    pub const ALL: [Category; 5] = [
        Category::Deferred,
        Category::Task,
        Category::Object,
        Category::Subscription,
        Category::Group,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Deferred => "deferred",
            Category::Task => "task",
            Category::Object => "object",
            Category::Subscription => "subscription",
            Category::Group => "group",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key handed out by a tracker when a resource is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(u64);

impl ResourceKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
