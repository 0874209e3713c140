//! Binding lifetimes.
//!
//! A lifetime decides *where* a built value is cached and *under which
//! key*:
//! - [`Lifetime::Once`]: one instance per registering container, shared
//!   by all of its descendants
//! - [`Lifetime::PerContainer`]: one instance per requesting container
//! - [`Lifetime::PerDependency`]: a fresh instance every time
//! - [`Lifetime::Constant`]: a fixed value, never cached or tracked

use std::fmt;

use crate::binding::BindingId;
use crate::container::{Container, WeakContainer};
use crate::error::{RabtError, Result};
use crate::value::Value;

/// Defines how long a built value is reused.
///
/// # Examples
/// ```
/// use rabt_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Once.is_cached());
/// assert!(!Lifetime::PerDependency.is_cached());
/// assert_eq!(Lifetime::PerContainer.to_string(), "PerContainer");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Cached in the scope of the container the binding was registered in.
    ///
    /// # When to use
    /// - Connection pools
    /// - Configuration shared by a whole container tree
    Once,

    /// Cached in the scope of the container that asked for it.
    ///
    /// This is the default for bindings with keys.
    PerContainer,

    /// Never cached. Disposable values are still tracked for disposal.
    ///
    /// This is the default for anonymous bindings.
    PerDependency,

    /// A fixed value handed out as is.
    Constant,
}

impl Lifetime {
    /// Returns `true` if built values are reused.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Once | Lifetime::PerContainer)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Once => write!(f, "Once"),
            Lifetime::PerContainer => write!(f, "PerContainer"),
            Lifetime::PerDependency => write!(f, "PerDependency"),
            Lifetime::Constant => write!(f, "Constant"),
        }
    }
}

/// A lifetime plus what it was frozen against.
///
/// `cache` is the identity of the binding the lifetime was chosen on, so
/// later transforms of that binding keep sharing its cache entry.
#[derive(Clone)]
pub(crate) struct LifetimePolicy {
    pub lifetime: Lifetime,
    pub cache: BindingId,
    pub registered: Option<WeakContainer>,
}

impl LifetimePolicy {
    pub fn new(lifetime: Lifetime, cache: BindingId) -> Self {
        Self {
            lifetime,
            cache,
            registered: None,
        }
    }

    /// Freezes the registering container, unless one is already frozen.
    pub fn bound_to(&self, container: WeakContainer) -> Self {
        let mut policy = self.clone();
        if policy.registered.is_none() {
            policy.registered = Some(container);
        }
        policy
    }

    /// Produces a value for `requesting`, going through the right scope.
    ///
    /// `compute` receives the container the value should be built against.
    pub fn apply(
        &self,
        requesting: &Container,
        label: impl FnOnce() -> String,
        compute: impl FnOnce(&Container) -> Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        match self.lifetime {
            Lifetime::Constant => compute(requesting),
            Lifetime::PerDependency => requesting.scope().get(None, || compute(requesting)),
            Lifetime::PerContainer => requesting
                .scope()
                .get(Some(self.cache), || compute(requesting)),
            Lifetime::Once => {
                let owner = match &self.registered {
                    Some(weak) => weak
                        .upgrade()
                        .ok_or_else(|| RabtError::ContainerDropped { what: label() })?,
                    None => requesting.clone(),
                };
                owner.scope().get(Some(self.cache), || compute(&owner))
            }
        }
    }
}
