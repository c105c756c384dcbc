//! Resource construction and destruction capability.

use async_trait::async_trait;

/// Creates and destroys pooled resources.
///
/// Injected into a [`KeyedPool`](crate::KeyedPool) at construction. The
/// pool calls [`destroy`](ResourceFactory::destroy) exactly once for every
/// resource it evicts or drains; resources handed to callers come back
/// automatically when their guard drops and are destroyed only then, if
/// the pool is draining.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource type.
    type Resource: Send + 'static;

    /// Error produced when construction fails.
    type Error: std::fmt::Display + Send;

    /// Construct a ready-to-use resource for the given identity.
    async fn create(&self, identity: &str) -> Result<Self::Resource, Self::Error>;

    /// Tear down a resource. The default drops it.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}
