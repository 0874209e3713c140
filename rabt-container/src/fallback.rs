//! Parent containers backed by a lookup function.
//!
//! [`fallback`] wraps an optional parent so that a lookup function gets the
//! first say on every key the child does not register itself.
//!
//! ```
//! use std::sync::Arc;
//! use rabt_container::prelude::*;
//!
//! let env = fallback(
//!     |key| match key {
//!         Key::Name(name) if name.starts_with("env.") => Some(Value::new(name.to_uppercase())),
//!         _ => None,
//!     },
//!     None,
//! );
//! let container = Container::with_parent([], Arc::new(env)).unwrap();
//!
//! let home = container.get::<String>("env.home").unwrap();
//! assert_eq!(*home, "ENV.HOME");
//! assert!(container.resolve("other").is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::binding::Binding;
use crate::container::ParentContainer;
use crate::error::Result;
use crate::key::Key;
use crate::lookup::{Lookup, ParentLookup};
use crate::value::Value;

type FallbackFn = dyn Fn(&Key) -> Option<Value> + Send + Sync;

/// Wraps `parent` so that `lookup` is consulted for every key before it.
///
/// A value returned by `lookup` is served as a constant binding. When it
/// returns `None`, the parent's bindings are used.
pub fn fallback(
    lookup: impl Fn(&Key) -> Option<Value> + Send + Sync + 'static,
    parent: Option<Arc<dyn ParentContainer>>,
) -> FallbackContainer {
    let parent_bindings: Arc<dyn ParentLookup<Key, Binding>> = match &parent {
        Some(parent) => parent.registered_bindings(),
        None => Arc::new(Lookup::<Key, Binding>::new()),
    };

    FallbackContainer {
        bindings: Arc::new(FallbackLookup {
            lookup: Arc::new(lookup),
            parent: parent_bindings,
        }),
        parent,
    }
}

/// A [`ParentContainer`] produced by [`fallback`].
pub struct FallbackContainer {
    bindings: Arc<FallbackLookup>,
    parent: Option<Arc<dyn ParentContainer>>,
}

impl ParentContainer for FallbackContainer {
    fn registered_bindings(&self) -> Arc<dyn ParentLookup<Key, Binding>> {
        self.bindings.clone()
    }

    /// Delegates to the wrapped parent; without one, resolves to `Null`.
    fn resolve_key(&self, key: Key) -> Result<Value> {
        match &self.parent {
            Some(parent) => parent.resolve_key(key),
            None => Ok(Value::Null),
        }
    }
}

impl fmt::Debug for FallbackContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackContainer")
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

struct FallbackLookup {
    lookup: Arc<FallbackFn>,
    parent: Arc<dyn ParentLookup<Key, Binding>>,
}

impl FallbackLookup {
    fn fallback_binding(&self, key: &Key) -> Option<Binding> {
        let value = (self.lookup)(key)?;
        trace!(key = %key, "Serving fallback value");
        Some(Binding::anonymous().to_value(value))
    }
}

impl ParentLookup<Key, Binding> for FallbackLookup {
    fn get(&self, key: &Key) -> Option<Binding> {
        self.fallback_binding(key).or_else(|| self.parent.get(key))
    }

    fn get_all(&self, key: &Key) -> Vec<Binding> {
        let mut all = self.parent.get_all(key);
        all.extend(self.fallback_binding(key));
        all
    }

    fn keys(&self) -> Vec<Key> {
        self.parent.keys()
    }
}
