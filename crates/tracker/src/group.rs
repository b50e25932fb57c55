//! Nested resource groups

use crate::resource::{IntoResource, Resource};
use custodian_core::Result;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type DestroyHook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A shareable container of resources.
///
/// When a tracker collects a group it calls the group's destroy hook if one
/// was set. Otherwise it drains the group and disposes every child, whether
/// or not the child was ever registered with a tracker. Groups may contain
/// each other, including cyclically.
pub struct ResourceGroup {
    label: Option<String>,
    children: Mutex<Vec<Resource>>,
    destroy_hook: Option<DestroyHook>,
}

impl ResourceGroup {
    pub fn new() -> Self {
        Self {
            label: None,
            children: Mutex::new(Vec::new()),
            destroy_hook: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Give the group its own destroy operation, which replaces recursive
    /// disposal of its children
    pub fn with_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.destroy_hook = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn insert(&self, item: impl IntoResource) {
        self.children.lock().push(item.into_resource());
    }

    /// Insert a value whose category is inferred at runtime
    pub fn insert_any<T: Any + Send>(&self, value: T) -> Result<()> {
        let resource = Resource::classify(value)?;
        self.children.lock().push(resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }

    pub fn has_destroy_hook(&self) -> bool {
        self.destroy_hook.is_some()
    }

    pub(crate) fn run_destroy_hook(&self) -> Option<anyhow::Result<()>> {
        self.destroy_hook.as_ref().map(|hook| hook())
    }

    /// Take every child out, releasing the lock before the caller disposes them
    pub(crate) fn drain(&self) -> Vec<Resource> {
        std::mem::take(&mut *self.children.lock())
    }
}

impl Default for ResourceGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Nested groups are released from a local stack so that dropping a deep
/// chain cannot overflow the call stack.
impl Drop for ResourceGroup {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.children.get_mut());
        while let Some(resource) = pending.pop() {
            if let Resource::Group(group) = resource {
                if let Some(mut group) = Arc::into_inner(group) {
                    pending.append(group.children.get_mut());
                }
            }
        }
    }
}

impl fmt::Debug for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGroup")
            .field("label", &self.label)
            .field("children", &self.len())
            .field("has_destroy_hook", &self.has_destroy_hook())
            .finish()
    }
}
