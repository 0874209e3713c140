//! Bindings: immutable recipes for producing values.
//!
//! A [`Binding`] serves zero or more keys and pairs a factory (a
//! [`Dependant`]) with a [`Lifetime`]. Every transform returns a new
//! binding and leaves the receiver untouched, so partially configured
//! bindings can be shared and specialised freely.
//!
//! # Examples
//! ```
//! use rabt_container::prelude::*;
//!
//! let base = bind(["greeting"]).unwrap().to_value(Value::new("hello"));
//! let loud = base.then(|v| println!("built {v:?}"));
//!
//! assert_eq!(base.lifetime(), Lifetime::Constant);
//! assert_ne!(base.id(), loud.id());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::container::{Container, WeakContainer};
use crate::dependencies::{Dependant, DependencyList};
use crate::error::{RabtError, Result};
use crate::key::{Constructor, Key};
use crate::lifetime::{Lifetime, LifetimePolicy};
use crate::locals::Locals;
use crate::lookup::Identity;
use crate::value::Value;

/// Identity of a [`Binding`], also used as its scope cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn next() -> Self {
        static NEXT_BINDING: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_BINDING.fetch_add(1, Ordering::Relaxed))
    }
}

/// An immutable recipe describing how to produce a value for its keys.
#[derive(Clone)]
pub struct Binding {
    inner: Arc<BindingInner>,
}

struct BindingInner {
    id: BindingId,
    keys: Arc<[Key]>,
    factory: Dependant,
    policy: LifetimePolicy,
}

/// Creates an unbound binding for `keys`.
///
/// With keys, the binding is [`Lifetime::PerContainer`]; without any it is
/// an anonymous [`Lifetime::PerDependency`] binding. A single constructible
/// type key gets that type's constructor as its factory; otherwise a
/// factory must be configured with one of the `to*` transforms.
///
/// # Errors
/// Returns [`RabtError::InvalidKey`] if a key is itself a binding.
pub fn bind<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Result<Binding> {
    let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();

    if let Some(invalid) = keys.iter().find(|key| !key.is_bindable()) {
        return Err(RabtError::InvalidKey {
            key: invalid.to_string(),
            reason: "is not a valid key to bind to",
        });
    }

    Ok(Binding::unbound(keys))
}

fn no_factory(keys: &[Key]) -> Dependant {
    let label = render_keys(keys);
    Dependant::new("unconfigured", DependencyList::empty(), move |_| {
        Err(RabtError::NoFactory {
            keys: label.clone(),
        })
    })
}

fn render_keys(keys: &[Key]) -> String {
    if keys.is_empty() {
        return "(anonymous)".to_string();
    }
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Binding {
    /// An anonymous binding, for ad hoc constant or computed values.
    pub fn anonymous() -> Self {
        Self::unbound(Vec::new())
    }

    /// A fresh binding for keys already known to be bindable.
    pub(crate) fn unbound(keys: Vec<Key>) -> Self {
        let factory = match keys.as_slice() {
            [Key::Type(type_key)] => type_key
                .constructor()
                .map(|constructor| constructor.factory().clone()),
            _ => None,
        }
        .unwrap_or_else(|| no_factory(&keys));

        let lifetime = if keys.is_empty() {
            Lifetime::PerDependency
        } else {
            Lifetime::PerContainer
        };

        let id = BindingId::next();
        Binding {
            inner: Arc::new(BindingInner {
                id,
                keys: keys.into(),
                factory,
                policy: LifetimePolicy::new(lifetime, id),
            }),
        }
    }

    /// A constant binding whose value is produced by `factory` on every build.
    pub(crate) fn constant(keys: Vec<Key>, factory: Dependant) -> Self {
        let id = BindingId::next();
        Binding {
            inner: Arc::new(BindingInner {
                id,
                keys: keys.into(),
                factory,
                policy: LifetimePolicy::new(Lifetime::Constant, id),
            }),
        }
    }

    fn derive(&self, factory: Dependant, policy: LifetimePolicy) -> Self {
        Binding {
            inner: Arc::new(BindingInner {
                id: BindingId::next(),
                keys: self.inner.keys.clone(),
                factory,
                policy,
            }),
        }
    }

    fn with_lifetime(&self, lifetime: Lifetime) -> Self {
        let id = BindingId::next();
        Binding {
            inner: Arc::new(BindingInner {
                id,
                keys: self.inner.keys.clone(),
                factory: self.inner.factory.clone(),
                policy: LifetimePolicy::new(lifetime, id),
            }),
        }
    }

    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    /// The keys this binding serves.
    pub fn keys(&self) -> &[Key] {
        &self.inner.keys
    }

    pub fn lifetime(&self) -> Lifetime {
        self.inner.policy.lifetime
    }

    /// The current factory.
    pub fn factory(&self) -> &Dependant {
        &self.inner.factory
    }

    // ── Factory transforms ──

    /// Derives a new factory from the current one, keeping keys and lifetime.
    pub fn with_factory(&self, wrap: impl FnOnce(&Dependant) -> Dependant) -> Self {
        self.derive(wrap(&self.inner.factory), self.inner.policy.clone())
    }

    /// Builds values with `factory`, which receives the container.
    pub fn to(
        &self,
        factory: impl Fn(&Container) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.with_factory(|_| {
            Dependant::new("factory", DependencyList::empty(), move |call| {
                factory(call.container())
            })
        })
    }

    /// Builds values with a type's constructor and its declared dependencies.
    pub fn to_type(&self, constructor: Constructor) -> Self {
        self.with_factory(|_| constructor.factory().clone())
    }

    /// Always produces `value`. The value is never cached or disposed by a scope.
    pub fn to_value(&self, value: Value) -> Self {
        let factory = Dependant::new("value", DependencyList::empty(), move |_| {
            Ok(Some(value.clone()))
        });
        Self::constant(self.inner.keys.to_vec(), factory)
    }

    /// Produces a callable that resolves `function`'s dependencies fresh on
    /// every call, then appends the call's own arguments.
    ///
    /// # Errors
    /// Returns [`RabtError::InvalidKey`] if the binding serves a type key.
    pub fn to_function(&self, function: Dependant) -> Result<Self> {
        if let Some(type_key) = self.keys().iter().find(|key| key.as_type().is_some()) {
            return Err(RabtError::InvalidKey {
                key: type_key.to_string(),
                reason: "is a type key; only names and symbols can be bound to functions",
            });
        }

        Ok(self.with_factory(|_| {
            let name = function.name().to_string();
            Dependant::new(name, DependencyList::empty(), move |call| {
                let bound = call
                    .container()
                    .resolve_function(&function, call.locals().clone());
                Ok(Some(Value::Function(bound)))
            })
        }))
    }

    /// Passes every built value through `callback` before returning it.
    pub fn then(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.with_factory(|inner| {
            let inner = inner.clone();
            Dependant::new(
                inner.name().to_string(),
                inner.dependencies().clone(),
                move |call| {
                    let value = inner.invoke(call.container(), call.locals(), call.args().to_vec())?;
                    if let Some(value) = &value {
                        callback(value);
                    }
                    Ok(value)
                },
            )
        })
    }

    /// Offers each declared dependency to `hook` before it is resolved.
    ///
    /// When the hook returns a value it is used as a constant in place of
    /// that dependency; otherwise the dependency resolves normally.
    pub fn use_parameter_hook(
        &self,
        hook: impl Fn(&Container, &Key) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.with_factory(|inner| {
            let inner = inner.clone();
            Dependant::new(
                inner.name().to_string(),
                DependencyList::empty(),
                move |call| {
                    let container = call.container();
                    let hooked = inner.dependencies().iter().map(|dependency| {
                        match hook(container, dependency) {
                            Some(value) => Key::Binding(Binding::anonymous().to_value(value)),
                            None => dependency.clone(),
                        }
                    });
                    let target = inner.with_dependencies(DependencyList::new(hooked));
                    container.call_with(&target, call.locals().clone(), call.args().to_vec())
                },
            )
        })
    }

    /// Overrides the dependency slot matching `key` with `value`.
    pub fn with_dependency(&self, key: impl Into<Key>, value: Value) -> Self {
        let key = key.into();
        self.use_parameter_hook(move |_, dependency| (*dependency == key).then(|| value.clone()))
    }

    /// Supplies `args` in place of the first declared dependencies.
    ///
    /// The remaining dependencies still resolve normally and follow `args`.
    pub fn with_arguments(&self, args: Vec<Value>) -> Self {
        self.with_factory(|inner| {
            let inner = inner.clone();
            let remaining = inner.dependencies().skip(args.len());
            Dependant::new(inner.name().to_string(), remaining, move |call| {
                let mut all = args.clone();
                all.extend(call.args().iter().cloned());
                inner.invoke(call.container(), call.locals(), all)
            })
        })
    }

    // ── Lifetimes ──

    /// One value, cached in the registering container's scope.
    pub fn once(&self) -> Self {
        self.with_lifetime(Lifetime::Once)
    }

    /// One value per requesting container.
    pub fn per_container(&self) -> Self {
        self.with_lifetime(Lifetime::PerContainer)
    }

    /// A fresh value every time.
    pub fn per_dependency(&self) -> Self {
        self.with_lifetime(Lifetime::PerDependency)
    }

    /// Freezes `container` as the registering container.
    ///
    /// The first container a binding is bound to wins; binding it again
    /// changes nothing.
    pub fn bind_lifetime(&self, container: &Container) -> Self {
        self.bound_to(container.downgrade())
    }

    pub(crate) fn bound_to(&self, container: WeakContainer) -> Self {
        self.derive(
            self.inner.factory.clone(),
            self.inner.policy.bound_to(container),
        )
    }

    // ── Build ──

    /// Produces a value for `container` according to the lifetime.
    ///
    /// `Ok(None)` means the factory produced nothing.
    pub fn build(&self, container: &Container) -> Result<Option<Value>> {
        let factory = &self.inner.factory;
        trace!(binding = %self, lifetime = %self.lifetime(), "Building");

        if self.lifetime() == Lifetime::Constant {
            return factory.invoke(container, &Locals::default(), Vec::new());
        }

        self.inner.policy.apply(
            container,
            || self.to_string(),
            |target| target.call_with(factory, Locals::default(), Vec::new()),
        )
    }
}

impl Identity for Binding {
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.keys.is_empty() {
            write!(f, "{}", self.inner.factory.name())
        } else {
            write!(f, "{}", render_keys(&self.inner.keys))
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.inner.id)
            .field("keys", &render_keys(&self.inner.keys))
            .field("lifetime", &self.inner.policy.lifetime)
            .field("factory", &self.inner.factory.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::dependant;
    use crate::key::{Injectable, Symbol};
    use std::sync::atomic::AtomicUsize;

    struct Gadget;

    impl Injectable for Gadget {
        fn construct(_: &crate::dependencies::Call<'_>) -> Result<Self> {
            Ok(Gadget)
        }
    }

    fn text(value: &Value) -> String {
        value.downcast_ref::<String>().cloned().unwrap_or_default()
    }

    #[test]
    fn default_lifetimes() {
        assert_eq!(bind(["a"]).unwrap().lifetime(), Lifetime::PerContainer);
        assert_eq!(Binding::anonymous().lifetime(), Lifetime::PerDependency);
        assert_eq!(bind(Vec::<Key>::new()).unwrap().lifetime(), Lifetime::PerDependency);
    }

    #[test]
    fn binding_keys_are_rejected() {
        let inner = bind(["a"]).unwrap();
        let err = bind([Key::from(inner)]).unwrap_err();
        assert!(matches!(err, RabtError::InvalidKey { .. }));
        assert!(err.to_string().contains("is not a valid key to bind to"));
    }

    #[test]
    fn transforms_leave_receiver_untouched() {
        let base = bind(["a"]).unwrap();
        let once = base.once();
        let valued = base.to_value(Value::new(1u8));

        assert_eq!(base.lifetime(), Lifetime::PerContainer);
        assert_eq!(once.lifetime(), Lifetime::Once);
        assert_eq!(valued.lifetime(), Lifetime::Constant);
        assert_ne!(base.id(), once.id());
        assert_eq!(once.keys(), base.keys());
    }

    #[test]
    fn multi_key_binding_serves_all_keys() {
        let token = Symbol::new("token");
        let binding = bind([Key::from("a"), Key::from(token.clone())]).unwrap();
        assert_eq!(binding.keys().len(), 2);
        assert_eq!(binding.keys()[1], Key::from(token));
    }

    #[test]
    fn unconfigured_binding_has_no_factory() {
        let container = Container::new([]);
        let err = bind(["a"]).unwrap().build(&container).unwrap_err();
        assert_eq!(err.to_string(), "No factory for binding 'a'");
    }

    #[test]
    fn single_constructible_type_key_gets_constructor() {
        let container = Container::new([]);
        let value = bind([Key::of::<Gadget>()])
            .unwrap()
            .build(&container)
            .unwrap()
            .unwrap();
        assert!(value.get::<Gadget>().is_some());
    }

    #[test]
    fn to_function_rejects_type_keys() {
        let function = dependant("f", [], |_| Ok(None)).unwrap();
        let err = bind([Key::of::<Gadget>()])
            .unwrap()
            .to_function(function)
            .unwrap_err();
        assert!(matches!(err, RabtError::InvalidKey { .. }));
    }

    #[test]
    fn then_sees_built_value() {
        let container = Container::new([]);
        let seen = Arc::new(AtomicUsize::new(0));
        let observer = seen.clone();

        let binding = bind(["a"])
            .unwrap()
            .to(|_| Ok(Some(Value::new(String::from("built")))))
            .then(move |value| {
                assert_eq!(text(value), "built");
                observer.fetch_add(1, Ordering::SeqCst);
            });

        binding.build(&container).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn with_arguments_replaces_leading_dependencies() {
        let container = Container::new([bind(["second"])
            .unwrap()
            .to_value(Value::new(String::from("resolved")))]);

        let joined = dependant(
            "join",
            [Some(Key::from("first")), Some(Key::from("second"))],
            |call| {
                let first = call.get::<String>(0)?;
                let second = call.get::<String>(1)?;
                Ok(Some(Value::new(format!("{first}+{second}"))))
            },
        )
        .unwrap();

        let binding = Binding::anonymous()
            .with_factory(|_| joined)
            .with_arguments(vec![Value::new(String::from("supplied"))]);

        assert_eq!(binding.factory().dependencies().len(), 1);
        let value = binding.build(&container).unwrap().unwrap();
        assert_eq!(text(&value), "supplied+resolved");
    }

    #[test]
    fn parameter_hook_sees_requesting_container_and_each_dependency() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = seen.clone();
        let greeting = dependant(
            "greeting",
            [Some(Key::from("salutation")), Some(Key::from("name"))],
            |call| {
                let salutation = call.get::<String>(0)?;
                let name = call.get::<String>(1)?;
                Ok(Some(Value::new(format!("{salutation}, {name}"))))
            },
        )
        .unwrap();
        let binding = bind(["greeting"])
            .unwrap()
            .with_factory(|_| greeting)
            .use_parameter_hook(move |container, key| {
                let owner = container.resolve("owner").map(|v| text(&v)).unwrap_or_default();
                record.lock().push((owner, key.to_string()));
                (*key == Key::from("name")).then(|| Value::new(String::from("Ada")))
            });

        let parent = Container::new([
            binding,
            bind(["owner"]).unwrap().to_value(Value::new(String::from("parent"))),
            bind(["salutation"]).unwrap().to_value(Value::new(String::from("Hello"))),
        ]);
        let child = parent
            .child([bind(["owner"]).unwrap().to_value(Value::new(String::from("child")))])
            .unwrap();

        assert_eq!(text(&child.resolve("greeting").unwrap()), "Hello, Ada");
        assert_eq!(
            *seen.lock(),
            vec![
                ("child".to_string(), "'salutation'".to_string()),
                ("child".to_string(), "'name'".to_string()),
            ]
        );
    }

    #[test]
    fn with_dependency_overrides_one_slot() {
        let container = Container::new([
            bind(["a"]).unwrap().to_value(Value::new(String::from("A"))),
            bind(["b"]).unwrap().to_value(Value::new(String::from("B"))),
        ]);

        let pair = dependant("pair", [Some(Key::from("a")), Some(Key::from("b"))], |call| {
            let a = call.get::<String>(0)?;
            let b = call.get::<String>(1)?;
            Ok(Some(Value::new(format!("{a}{b}"))))
        })
        .unwrap();

        let binding = Binding::anonymous()
            .with_factory(|_| pair)
            .with_dependency("b", Value::new(String::from("override")));

        let value = binding.build(&container).unwrap().unwrap();
        assert_eq!(text(&value), "Aoverride");
    }

    #[test]
    fn display_uses_keys_or_factory_name() {
        assert_eq!(bind(["a", "b"]).unwrap().to_string(), "'a', 'b'");
        assert_eq!(
            Binding::anonymous().to_value(Value::Null).to_string(),
            "value"
        );
    }
}
