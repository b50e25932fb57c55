//! Trackable resources and their categories
//!
//! A [`Resource`] is a value together with the category that decides how it is
//! disposed. The category is fixed when the value is turned into a resource,
//! either statically through [`IntoResource`] or at runtime through
//! [`Resource::classify`].

use crate::group::ResourceGroup;
use custodian_core::{Category, Error, ResourceKey, Result};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

/// An external object with an explicit destroy operation
pub trait Destroy: Send + Sync {
    fn destroy(&self) -> anyhow::Result<()>;
}

/// An active subscription that can be disconnected
pub trait Disconnect: Send + Sync {
    fn disconnect(&self) -> anyhow::Result<()>;
}

/// A callable that runs fire-and-forget when its tracker collects
pub type DeferredFn = Box<dyn FnOnce() + Send + 'static>;

/// A categorized, trackable resource
pub enum Resource {
    Deferred(DeferredFn),
    Task(AbortHandle),
    Object(Arc<dyn Destroy>),
    Subscription(Arc<dyn Disconnect>),
    Group(Arc<ResourceGroup>),
}

impl Resource {
    pub fn deferred<F>(callable: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Resource::Deferred(Box::new(callable))
    }

    pub fn task(handle: AbortHandle) -> Self {
        Resource::Task(handle)
    }

    pub fn object<T: Destroy + 'static>(object: Arc<T>) -> Self {
        Resource::Object(object)
    }

    pub fn subscription<T: Disconnect + 'static>(subscription: Arc<T>) -> Self {
        Resource::Subscription(subscription)
    }

    pub fn group(group: impl Into<Arc<ResourceGroup>>) -> Self {
        Resource::Group(group.into())
    }

    pub fn category(&self) -> Category {
        match self {
            Resource::Deferred(_) => Category::Deferred,
            Resource::Task(_) => Category::Task,
            Resource::Object(_) => Category::Object,
            Resource::Subscription(_) => Category::Subscription,
            Resource::Group(_) => Category::Group,
        }
    }

    /// Another handle to the same shared resource. Deferred callables and
    /// tasks are not shared this way.
    pub(crate) fn share(&self) -> Option<Resource> {
        match self {
            Resource::Deferred(_) | Resource::Task(_) => None,
            Resource::Object(object) => Some(Resource::Object(Arc::clone(object))),
            Resource::Subscription(subscription) => {
                Some(Resource::Subscription(Arc::clone(subscription)))
            }
            Resource::Group(group) => Some(Resource::Group(Arc::clone(group))),
        }
    }

    /// Identity used for removal by item and for the per-pass visited set.
    /// Deferred callables have none.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Resource::Deferred(_) => None,
            Resource::Task(handle) => Some(Identity::Task(handle.id())),
            Resource::Object(object) => Some(Identity::of(object)),
            Resource::Subscription(subscription) => Some(Identity::of(subscription)),
            Resource::Group(group) => Some(Identity::of(group)),
        }
    }

    /// Infer the category of an arbitrary value from its runtime type.
    ///
    /// Recognized types, in precedence order:
    ///
    /// 1. `Resource`, `DeferredFn`, `fn()`
    /// 2. `AbortHandle`, `JoinHandle<()>`
    /// 3. `Arc<dyn Destroy>`
    /// 4. `Arc<dyn Disconnect>`
    /// 5. `Arc<ResourceGroup>`, `ResourceGroup`, `Vec<Resource>`
    ///
    /// Anything else fails with [`Error::UnsupportedResourceKind`].
    pub fn classify<T: Any + Send>(value: T) -> Result<Self> {
        Self::classify_boxed(Box::new(value), type_name::<T>())
    }

    /// Same as [`Resource::classify`] for a value that is already boxed
    pub fn classify_boxed(value: Box<dyn Any + Send>, type_name: &str) -> Result<Self> {
        // A boxed `Box<dyn Any>` is unwrapped once so callers can pass either form.
        let value = match value.downcast::<Box<dyn Any + Send>>() {
            Ok(inner) => *inner,
            Err(value) => value,
        };

        let value = match value.downcast::<Resource>() {
            Ok(resource) => return Ok(*resource),
            Err(value) => value,
        };
        let value = match value.downcast::<DeferredFn>() {
            Ok(callable) => return Ok(Resource::Deferred(*callable)),
            Err(value) => value,
        };
        let value = match value.downcast::<fn()>() {
            Ok(callable) => return Ok(Resource::deferred(*callable)),
            Err(value) => value,
        };
        let value = match value.downcast::<AbortHandle>() {
            Ok(handle) => return Ok(Resource::Task(*handle)),
            Err(value) => value,
        };
        let value = match value.downcast::<JoinHandle<()>>() {
            Ok(handle) => return Ok(Resource::Task(handle.abort_handle())),
            Err(value) => value,
        };
        let value = match value.downcast::<Arc<dyn Destroy>>() {
            Ok(object) => return Ok(Resource::Object(*object)),
            Err(value) => value,
        };
        let value = match value.downcast::<Arc<dyn Disconnect>>() {
            Ok(subscription) => return Ok(Resource::Subscription(*subscription)),
            Err(value) => value,
        };
        let value = match value.downcast::<Arc<ResourceGroup>>() {
            Ok(group) => return Ok(Resource::Group(*group)),
            Err(value) => value,
        };
        let value = match value.downcast::<ResourceGroup>() {
            Ok(group) => return Ok(Resource::group(*group)),
            Err(value) => value,
        };
        match value.downcast::<Vec<Resource>>() {
            Ok(children) => {
                let group = ResourceGroup::new();
                for child in *children {
                    group.insert(child);
                }
                Ok(Resource::group(group))
            }
            Err(_) => Err(Error::unsupported_resource_kind(
                type_name,
                "value is not a deferred callable, task handle, destroyable object, subscription or group",
            )),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("category", &self.category())
            .field("identity", &self.identity())
            .finish()
    }
}

/// Conversion of a handle type into a categorized [`Resource`]
pub trait IntoResource {
    fn into_resource(self) -> Resource;
}

impl IntoResource for Resource {
    fn into_resource(self) -> Resource {
        self
    }
}

impl IntoResource for DeferredFn {
    fn into_resource(self) -> Resource {
        Resource::Deferred(self)
    }
}

impl IntoResource for AbortHandle {
    fn into_resource(self) -> Resource {
        Resource::Task(self)
    }
}

/// The join handle is detached; only its abort handle is tracked.
impl<T> IntoResource for JoinHandle<T> {
    fn into_resource(self) -> Resource {
        Resource::Task(self.abort_handle())
    }
}

impl IntoResource for Arc<dyn Destroy> {
    fn into_resource(self) -> Resource {
        Resource::Object(self)
    }
}

impl IntoResource for Arc<dyn Disconnect> {
    fn into_resource(self) -> Resource {
        Resource::Subscription(self)
    }
}

impl IntoResource for Arc<ResourceGroup> {
    fn into_resource(self) -> Resource {
        Resource::Group(self)
    }
}

impl IntoResource for ResourceGroup {
    fn into_resource(self) -> Resource {
        Resource::group(self)
    }
}

/// Identity of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Data address of a shared handle
    Address(usize),
    /// Tokio task id
    Task(tokio::task::Id),
}

impl Identity {
    pub fn of<T: ?Sized>(handle: &Arc<T>) -> Self {
        Identity::Address(Arc::as_ptr(handle).cast::<()>() as usize)
    }
}

/// What [`ResourceTracker::remove`](crate::ResourceTracker::remove) looks up:
/// either the key returned on registration or the item itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Key(ResourceKey),
    Identity(Identity),
}

impl From<ResourceKey> for Selector {
    fn from(key: ResourceKey) -> Self {
        Selector::Key(key)
    }
}

impl From<Identity> for Selector {
    fn from(identity: Identity) -> Self {
        Selector::Identity(identity)
    }
}

impl<T: ?Sized> From<&Arc<T>> for Selector {
    fn from(handle: &Arc<T>) -> Self {
        Selector::Identity(Identity::of(handle))
    }
}

impl From<&AbortHandle> for Selector {
    fn from(handle: &AbortHandle) -> Self {
        Selector::Identity(Identity::Task(handle.id()))
    }
}

impl<T> From<&JoinHandle<T>> for Selector {
    fn from(handle: &JoinHandle<T>) -> Self {
        Selector::Identity(Identity::Task(handle.id()))
    }
}
