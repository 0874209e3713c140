//! Provider trait: a module of related bindings.
//!
//! Providers group related registrations so an application can assemble
//! its container from small, independently testable pieces.
//!
//! # Examples
//! ```rust
//! use rabt_container::prelude::*;
//!
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
//!         registry.add_binding(bind(["database_url"])?.to_value(Value::new("postgres://localhost")));
//!         registry.add_binding(bind(["pool_size"])?.to_value(Value::new(8usize)));
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::builder()
//!     .add_provider(&DatabaseProvider)
//!     .build()
//!     .unwrap();
//! assert_eq!(*container.get::<usize>("pool_size").unwrap(), 8);
//! ```

use crate::binding::Binding;
use crate::error::Result;

/// A module that registers related bindings into a container.
///
/// Split registrations by concern, one provider each:
///
/// ```rust,ignore
/// Container::builder()
///     .add_provider(&DatabaseProvider)
///     .add_provider(&AuthProvider)
///     .add_provider(&EmailProvider)
///     .build()?;
/// ```
pub trait Provider: Send + Sync {
    /// Registers bindings. Called once, while the container is being built.
    ///
    /// # Errors
    /// A failure aborts the build; typically an invalid key passed to
    /// [`bind`](crate::binding::bind).
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// What providers register into.
///
/// Implemented by [`ContainerBuilder`](crate::container::ContainerBuilder);
/// a small mock is enough to test a provider in isolation.
pub trait ProviderRegistry {
    /// Registers a binding under each of its keys.
    fn add_binding(&mut self, binding: Binding);
}
