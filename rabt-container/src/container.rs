//! # The Container: heart of Rabt
//!
//! A [`Container`] owns a registry of [`Binding`]s, a [`Scope`] for the
//! values it builds, and an optional parent it falls back to. Resolving a
//! key finds (or synthesises) a binding for it and builds that binding
//! against the container, recursively resolving declared dependencies.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container ──child()──> Container
//!                                  │                      │
//!                           registry + scope       registry ─┐ parent lookup
//!                                  ▲                         │
//!                                  └─────────────────────────┘
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use rabt_container::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Injectable for UserService {
//!     fn dependencies() -> Vec<Key> {
//!         vec![Key::marker::<dyn Logger>()]
//!     }
//!     fn construct(call: &Call<'_>) -> Result<Self> {
//!         Ok(UserService { logger: call.get::<dyn Logger>(0)? })
//!     }
//! }
//!
//! let container = Container::builder()
//!     .bind(
//!         bind([Key::marker::<dyn Logger>()])
//!             .unwrap()
//!             .to(|_| {
//!                 let logger = Instance::new(ConsoleLogger).implements::<dyn Logger>(|l| l);
//!                 Ok(Some(logger.into()))
//!             })
//!             .once(),
//!     )
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service = container.get::<UserService>(Key::of::<UserService>()).unwrap();
//! assert_eq!(service.logger.log("hi"), "[console] hi");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rabt_support::rendering::{shorten_type_name, suggest_similar};
use tracing::{debug, instrument, trace};

use crate::binding::Binding;
use crate::chain;
use crate::dependencies::{Dependant, DependencyList};
use crate::error::{RabtError, Result, TypeMismatchError, UnresolvableKeyError};
use crate::key::{Key, TypeKey};
use crate::locals::Locals;
use crate::lookup::{Lookup, ParentLookup};
use crate::provider::{Provider, ProviderRegistry};
use crate::scope::Scope;
use crate::value::{Dispose, Function, Value};

const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// ParentContainer
// ═══════════════════════════════════════════

/// What a child container needs from its parent.
///
/// Implemented by [`Container`] and by
/// [`FallbackContainer`](crate::fallback::FallbackContainer).
pub trait ParentContainer: Send + Sync {
    /// The bindings a child falls back to.
    fn registered_bindings(&self) -> Arc<dyn ParentLookup<Key, Binding>>;

    /// Resolves `key` in the parent.
    fn resolve_key(&self, key: Key) -> Result<Value>;
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Collects bindings, providers and a parent, then builds a [`Container`].
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .bind(bind(["database_url"])?.to_value(Value::new(url)))
///     .add_provider(&RepositoryProvider)
///     .parent(Arc::new(app_container))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    bindings: Vec<Binding>,
    parent: Option<Arc<dyn ParentContainer>>,
    failed: Option<RabtError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Registers one binding.
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Registers several bindings, in order.
    pub fn bindings(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    // ── Provider modules ──

    /// Adds a [`Provider`] module.
    ///
    /// A provider failure is reported by [`build`](ContainerBuilder::build).
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        if let Err(err) = provider.register(&mut self) {
            self.failed.get_or_insert(err);
        }
        self
    }

    /// Sets the parent the container falls back to.
    pub fn parent(mut self, parent: Arc<dyn ParentContainer>) -> Self {
        self.parent = Some(parent);
        self
    }

    // ── Build ──

    /// Builds the container, registering it with its parent if there is one.
    #[instrument(skip(self), name = "container_build", fields(bindings = self.bindings.len()))]
    pub fn build(self) -> Result<Container> {
        if let Some(err) = self.failed {
            return Err(err);
        }

        match self.parent {
            Some(parent) => Container::with_parent(self.bindings, parent),
            None => Ok(Container::new(self.bindings)),
        }
    }
}

impl ProviderRegistry for ContainerBuilder {
    fn add_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Resolves keys to values, managing lifetimes and disposal.
///
/// Cloning a container is cheap and yields a handle to the same container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: Arc<Lookup<Key, Binding>>,
    scope: Scope,
    parent: Option<Arc<dyn ParentContainer>>,
    parent_link: Mutex<Option<Value>>,
}

impl Drop for ContainerInner {
    /// Detaches a dropped child from its parent's scope. Values the child
    /// tracks are not disposed.
    fn drop(&mut self) {
        if let Some(link) = self.parent_link.get_mut().take() {
            trace!("Detaching dropped child container");
            if let Err(error) = link.dispose() {
                debug!(%error, "Failed to detach child container");
            }
        }
    }
}

/// A container handle that does not keep the container alive.
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<ContainerInner>);

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

/// Tracked in the parent's scope so that disposing the parent disposes the child.
struct ChildLink(Weak<ContainerInner>);

impl Dispose for ChildLink {
    fn dispose(&self) -> Result<()> {
        match self.0.upgrade() {
            Some(child) => {
                debug!("Disposing child container");
                child.scope.dispose()
            }
            None => Ok(()),
        }
    }
}

impl Container {
    /// Creates a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Creates a root container.
    pub fn new(bindings: impl IntoIterator<Item = Binding>) -> Self {
        Self::create(bindings, None)
    }

    /// Creates a container that falls back to `parent`.
    ///
    /// The new container registers itself with the parent, so disposing the
    /// parent disposes it too.
    ///
    /// # Errors
    /// Fails if the parent cannot track the new container.
    pub fn with_parent(
        bindings: impl IntoIterator<Item = Binding>,
        parent: Arc<dyn ParentContainer>,
    ) -> Result<Self> {
        let container = Self::create(bindings, Some(parent.clone()));

        let link = Value::disposable(ChildLink(Arc::downgrade(&container.inner)));
        let registration = Binding::anonymous().to_value(link.clone()).once();
        parent.resolve_key(Key::Binding(registration))?;
        *container.inner.parent_link.lock() = Some(link);

        debug!("Registered child container with parent");
        Ok(container)
    }

    /// Creates a child of this container.
    pub fn child(&self, bindings: impl IntoIterator<Item = Binding>) -> Result<Self> {
        Self::with_parent(bindings, Arc::new(self.clone()))
    }

    fn create(
        bindings: impl IntoIterator<Item = Binding>,
        parent: Option<Arc<dyn ParentContainer>>,
    ) -> Self {
        let bindings: Vec<Binding> = bindings.into_iter().collect();
        let parent_lookup = parent.as_ref().map(|p| p.registered_bindings());

        let inner = Arc::new_cyclic(|weak: &Weak<ContainerInner>| {
            let registering = WeakContainer(weak.clone());
            let entries = bindings
                .iter()
                .chain(std::iter::once(&self_binding(weak.clone())))
                .map(|binding| binding.bound_to(registering.clone()))
                .flat_map(|binding| {
                    debug!(
                        binding = %binding,
                        lifetime = %binding.lifetime(),
                        "Registered binding"
                    );
                    binding
                        .keys()
                        .iter()
                        .map(|key| (key.clone(), binding.clone()))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();

            ContainerInner {
                registry: Arc::new(Lookup::from_entries(entries, parent_lookup)),
                scope: Scope::new(),
                parent,
                parent_link: Mutex::new(None),
            }
        });

        Container { inner }
    }

    // ── Resolution ──

    /// Resolves `key` to a value.
    ///
    /// # Errors
    /// - [`RabtError::DepthExceeded`] when resolution nests too deeply
    /// - [`RabtError::UnresolvableKey`] when nothing can produce the key
    /// - [`RabtError::UndefinedResult`] when the factory produced nothing
    /// - [`RabtError::TypeMismatch`] when a type key resolves to a value of
    ///   another type
    pub fn resolve(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        if crate::lookup::LookupKey::is_blank(&key) {
            return Err(RabtError::InvalidKey {
                key: key.to_string(),
                reason: "cannot be resolved",
            });
        }

        let _guard = chain::enter(&key)?;
        trace!(key = %key, depth = chain::depth(), "Resolving");

        let binding = self.default_binding(&key)?;
        let value = binding
            .build(self)?
            .ok_or_else(|| RabtError::UndefinedResult {
                key: key.to_string(),
                chain: chain::context(),
            })?;

        if let Key::Type(type_key) = &key {
            if !value.is_null() && !value.satisfies(type_key.type_id()) {
                return Err(RabtError::TypeMismatch(TypeMismatchError {
                    expected: type_key.short_name(),
                    found: value.type_name(),
                    chain: chain::context(),
                }));
            }
        }

        Ok(value)
    }

    /// Resolves `key` and retrieves it as `Arc<U>`.
    ///
    /// ```
    /// use rabt_container::prelude::*;
    ///
    /// let container = Container::new([
    ///     bind(["port"]).unwrap().to_value(Value::new(8080u16)),
    /// ]);
    /// assert_eq!(*container.get::<u16>("port").unwrap(), 8080);
    /// assert!(container.get::<String>("port").is_err());
    /// ```
    pub fn get<U: ?Sized + 'static>(&self, key: impl Into<Key>) -> Result<Arc<U>> {
        let value = self.resolve(key)?;
        value.get::<U>().ok_or_else(|| {
            RabtError::TypeMismatch(TypeMismatchError {
                expected: shorten_type_name(type_name::<U>()),
                found: value.type_name(),
                chain: chain::snapshot(),
            })
        })
    }

    /// Finds the binding `key` would resolve through, without building it.
    ///
    /// A binding key is used as is. Otherwise the registry chain is
    /// searched, and an unregistered constructible type gets a
    /// per-container binding registered on the spot.
    pub fn default_binding(&self, key: &Key) -> Result<Binding> {
        if let Key::Binding(binding) = key {
            return Ok(binding.clone());
        }

        if let Some(binding) = self.inner.registry.get(key) {
            return Ok(binding);
        }

        if let Some(constructor) = key.as_type().and_then(TypeKey::constructor) {
            let binding = self.inner.registry.get_or_add(key.clone(), || {
                debug!(key = %key, "Auto-registering constructible type");
                Binding::unbound(vec![key.clone()])
                    .to_type(constructor.clone())
                    .per_container()
            });
            return Ok(binding);
        }

        Err(RabtError::UnresolvableKey(UnresolvableKeyError {
            key: key.to_string(),
            chain: chain::context(),
            suggestions: self.suggestions(key),
        }))
    }

    fn suggestions(&self, key: &Key) -> Vec<String> {
        let available: Vec<String> = self
            .inner
            .registry
            .keys()
            .iter()
            .map(ToString::to_string)
            .collect();
        let available: Vec<&str> = available.iter().map(String::as_str).collect();
        suggest_similar(&key.to_string(), &available, MAX_SUGGESTIONS)
    }

    /// Invokes `function` with its dependencies resolved and `args` appended.
    pub fn call(&self, function: &Dependant, args: Vec<Value>) -> Result<Option<Value>> {
        self.call_with(function, Locals::default(), args)
    }

    /// Like [`call`](Container::call), satisfying dependencies from `locals` first.
    ///
    /// Each local satisfies at most one dependency; the rest are handed to
    /// the body through [`Call::locals`](crate::dependencies::Call::locals).
    pub fn call_with(
        &self,
        function: &Dependant,
        mut locals: Locals,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let mut resolved = Vec::with_capacity(function.dependencies().len() + args.len());
        for dependency in function.dependencies() {
            resolved.push(locals.take_or_else(dependency, |key| self.resolve(key))?);
        }
        resolved.extend(args);
        function.invoke(self, &locals, resolved)
    }

    /// Turns `function` into a callable bound to this container.
    ///
    /// Every call resolves the dependencies afresh, starting from a new copy
    /// of `locals`, and appends the call's own arguments. The callable holds
    /// the container weakly.
    pub fn resolve_function(&self, function: &Dependant, locals: Locals) -> Function {
        let container = self.downgrade();
        let function = function.clone();
        Function::new(function.name().to_string(), move |args| {
            let container = container.upgrade().ok_or_else(|| RabtError::ContainerDropped {
                what: format!("function {}", function.name()),
            })?;
            container.call_with(&function, locals.clone(), args)
        })
    }

    // ── Introspection ──

    /// The registry, chained to the parent's.
    pub fn registered_bindings(&self) -> &Arc<Lookup<Key, Binding>> {
        &self.inner.registry
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn has_parent(&self) -> bool {
        self.inner.parent.is_some()
    }

    /// Returns `true` if both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    // ── Disposal ──

    /// Disposes every disposable value this container tracks, including
    /// child containers.
    ///
    /// Detaches from the parent first, so the parent will not dispose this
    /// container a second time.
    pub fn dispose(&self) -> Result<()> {
        let link = self.inner.parent_link.lock().take();
        let detached = match link {
            Some(link) => link.dispose(),
            None => Ok(()),
        };
        let swept = self.inner.scope.dispose();
        debug!("Container disposed");
        detached.and(swept)
    }
}

fn self_binding(weak: Weak<ContainerInner>) -> Binding {
    let factory = Dependant::new("container", DependencyList::empty(), move |_| {
        let container = WeakContainer(weak.clone())
            .upgrade()
            .ok_or_else(|| RabtError::ContainerDropped {
                what: Key::container().to_string(),
            })?;
        Ok(Some(Value::new(container)))
    });
    Binding::constant(vec![Key::container()], factory)
}

impl ParentContainer for Container {
    fn registered_bindings(&self) -> Arc<dyn ParentLookup<Key, Binding>> {
        self.inner.registry.clone()
    }

    fn resolve_key(&self, key: Key) -> Result<Value> {
        self.resolve(key)
    }
}

impl Dispose for Container {
    fn dispose(&self) -> Result<()> {
        Container::dispose(self)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.inner.registry.len())
            .field("tracked", &self.inner.scope.tracked_len())
            .field("has_parent", &self.has_parent())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ParentContainer};
    pub use crate::binding::{Binding, bind};
    pub use crate::dependencies::{Call, Dependant, DependencyList, ctor, dependant};
    pub use crate::error::{RabtError, Result};
    pub use crate::fallback::fallback;
    pub use crate::helpers::{all, make_factory, optional};
    pub use crate::key::{Constructor, Injectable, Key, Symbol};
    pub use crate::lifetime::Lifetime;
    pub use crate::locals::Locals;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::value::{Dispose, Function, Instance, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
