//! Ad hoc bindings built on top of container introspection.
//!
//! Each helper returns an anonymous [`Binding`] meant to be resolved
//! directly, or listed as a dependency through [`Key::Binding`]:
//!
//! ```
//! use rabt_container::prelude::*;
//!
//! let container = Container::new([
//!     bind(["plugin"]).unwrap().to_value(Value::new("auth")),
//!     bind(["plugin"]).unwrap().to_value(Value::new("cache")),
//! ]);
//!
//! let plugins = container.resolve(all("plugin")).unwrap();
//! assert_eq!(plugins.as_list().unwrap().len(), 2);
//!
//! let missing = container.resolve(optional("theme", None)).unwrap();
//! assert!(missing.is_null());
//! ```

use crate::binding::Binding;
use crate::container::Container;
use crate::dependencies::{Dependant, DependencyList};
use crate::error::{RabtError, Result};
use crate::key::Key;
use crate::locals::Locals;
use crate::value::{Function, Value};

/// Resolves `key` when it is registered anywhere in the chain, else `default`.
///
/// Only explicit registrations count: a constructible type that was never
/// bound or resolved is treated as absent. Without a default the result is
/// [`Value::Null`].
pub fn optional(key: impl Into<Key>, default: Option<Value>) -> Binding {
    let key = key.into();
    Binding::anonymous().to(move |container| {
        if container.registered_bindings().get(&key).is_some() {
            container.resolve(key.clone()).map(Some)
        } else {
            Ok(Some(default.clone().unwrap_or_default()))
        }
    })
}

/// Resolves every binding registered under `key`, parents first, into a
/// [`Value::List`].
pub fn all(key: impl Into<Key>) -> Binding {
    let key = key.into();
    Binding::anonymous().to(move |container| {
        let values = container
            .registered_bindings()
            .get_all(&key)
            .into_iter()
            .map(|binding| container.resolve(Key::Binding(binding)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Value::List(values)))
    })
}

/// Produces a function that builds a fresh value for `key` on every call.
///
/// The call's arguments satisfy `partial` positionally; every other
/// dependency of `key` resolves from the container as usual.
///
/// ```
/// use rabt_container::prelude::*;
///
/// let greeting = dependant("greeting", [Some(Key::from("salutation")), Some(Key::from("name"))], |call| {
///     let salutation = call.get::<String>(0)?;
///     let name = call.get::<String>(1)?;
///     Ok(Some(Value::new(format!("{salutation}, {name}"))))
/// })
/// .unwrap();
///
/// let container = Container::new([
///     bind(["salutation"]).unwrap().to_value(Value::new("Hello".to_string())),
///     bind(["greeting"]).unwrap().with_factory(|_| greeting),
/// ]);
///
/// let factory = container.resolve(make_factory("greeting", vec![Key::from("name")])).unwrap();
/// let greet = factory.as_function().unwrap();
/// let text = greet.call(vec![Value::new("Ada".to_string())]).unwrap();
/// assert_eq!(text.downcast_ref::<String>().unwrap(), "Hello, Ada");
/// ```
pub fn make_factory(key: impl Into<Key>, partial: Vec<Key>) -> Binding {
    let key = key.into();
    Binding::anonymous().to(move |container| {
        let owner = container.downgrade();
        let key = key.clone();
        let partial = partial.clone();
        let name = format!("factory of {key}");

        let function = Function::new(name.clone(), move |args| {
            let container = owner
                .upgrade()
                .ok_or_else(|| RabtError::ContainerDropped { what: name.clone() })?;
            build_fresh(&container, &key, &partial, args).map(Some)
        });
        Ok(Some(Value::Function(function)))
    })
}

fn build_fresh(container: &Container, key: &Key, partial: &[Key], args: Vec<Value>) -> Result<Value> {
    let supplied = Locals::new(partial.iter().cloned(), args);
    let binding = container
        .default_binding(key)?
        .with_factory(|inner| {
            let inner = inner.clone();
            Dependant::new(inner.name().to_string(), DependencyList::empty(), move |call| {
                call.container().call_with(&inner, supplied.clone(), Vec::new())
            })
        })
        .per_dependency();

    container.resolve(Key::Binding(binding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::bind;
    use crate::dependencies::{Call, dependant};
    use crate::key::Injectable;
    use std::sync::Arc;

    struct Engine;

    impl Injectable for Engine {
        fn construct(_: &Call<'_>) -> Result<Self> {
            Ok(Engine)
        }
    }

    struct Car {
        engine: Arc<Engine>,
        model: Arc<String>,
    }

    impl Injectable for Car {
        fn dependencies() -> Vec<Key> {
            vec![Key::of::<Engine>(), Key::from("model")]
        }

        fn construct(call: &Call<'_>) -> Result<Self> {
            Ok(Car {
                engine: call.get::<Engine>(0)?,
                model: call.get::<String>(1)?,
            })
        }
    }

    struct Showroom {
        make_car: Function,
    }

    impl Injectable for Showroom {
        fn dependencies() -> Vec<Key> {
            vec![Key::Binding(make_factory(
                Key::of::<Car>(),
                vec![Key::from("model")],
            ))]
        }

        fn construct(call: &Call<'_>) -> Result<Self> {
            let make_car = call.arg(0)?.as_function().cloned().ok_or_else(|| {
                RabtError::factory("expected a function")
            })?;
            Ok(Showroom { make_car })
        }
    }

    fn string(value: &str) -> Value {
        Value::new(value.to_string())
    }

    fn text(value: &Value) -> String {
        value.downcast_ref::<String>().cloned().unwrap_or_default()
    }

    // ── optional ──

    #[test]
    fn optional_without_registration_is_null() {
        let container = Container::new([]);
        assert!(container.resolve(optional("missing", None)).unwrap().is_null());
        container.dispose().unwrap();
    }

    #[test]
    fn optional_falls_back_to_default() {
        let container = Container::new([]);
        let fallback = string("default");
        let result = container
            .resolve(optional("missing", Some(fallback.clone())))
            .unwrap();
        assert!(result.ptr_eq(&fallback));
    }

    #[test]
    fn optional_observes_registered_lifetime() {
        let container = Container::new([bind([Key::of::<Engine>()]).unwrap()]);

        let optional_engine = container.resolve(optional(Key::of::<Engine>(), None)).unwrap();
        let engine = container.resolve(Key::of::<Engine>()).unwrap();
        assert!(optional_engine.ptr_eq(&engine));
    }

    #[test]
    fn optional_treats_unregistered_constructible_type_as_absent() {
        let container = Container::new([]);
        let result = container.resolve(optional(Key::of::<Engine>(), None)).unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn optional_sees_parent_registration() {
        let parent = Container::new([bind(["k"]).unwrap().to_value(string("parent"))]);
        let child = parent.child([]).unwrap();
        assert_eq!(text(&child.resolve(optional("k", None)).unwrap()), "parent");
    }

    // ── all ──

    #[test]
    fn all_resolves_every_registration_in_order() {
        let container = Container::new([
            bind(["k"]).unwrap().to_value(string("one")),
            bind(["k"]).unwrap().to_value(string("two")),
        ]);

        assert_eq!(text(&container.resolve("k").unwrap()), "two");
        let values = container.resolve(all("k")).unwrap();
        let values: Vec<String> = values.as_list().unwrap().iter().map(text).collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn all_spans_parent_chain() {
        let parent = Container::new([bind(["k"]).unwrap().to_value(string("parent"))]);
        let child = parent
            .child([bind(["k"]).unwrap().to_value(string("child"))])
            .unwrap();

        let values = child.resolve(all("k")).unwrap();
        let values: Vec<String> = values.as_list().unwrap().iter().map(text).collect();
        assert_eq!(values, vec!["parent", "child"]);
    }

    #[test]
    fn all_of_unregistered_key_is_empty() {
        let container = Container::new([]);
        let values = container.resolve(all("nothing")).unwrap();
        assert!(values.as_list().unwrap().is_empty());
    }

    // ── make_factory ──

    #[test]
    fn factory_builds_fresh_instances() {
        let container = Container::new([bind(["model"]).unwrap().to_value(string("coupe"))]);
        let factory = container
            .resolve(make_factory(Key::of::<Car>(), Vec::new()))
            .unwrap();
        let factory = factory.as_function().unwrap();

        let first = factory.call(vec![]).unwrap();
        let second = factory.call(vec![]).unwrap();
        assert!(!first.ptr_eq(&second));

        let first = first.get::<Car>().unwrap();
        let second = second.get::<Car>().unwrap();
        assert!(Arc::ptr_eq(&first.engine, &second.engine));
        assert_eq!(*first.model, "coupe");
    }

    #[test]
    fn factory_arguments_satisfy_partial_dependencies() {
        let container = Container::new([]);
        let showroom = container.get::<Showroom>(Key::of::<Showroom>()).unwrap();

        let roadster = showroom.make_car.call(vec![string("roadster")]).unwrap();
        let sedan = showroom.make_car.call(vec![string("sedan")]).unwrap();

        assert_eq!(*roadster.get::<Car>().unwrap().model, "roadster");
        assert_eq!(*sedan.get::<Car>().unwrap().model, "sedan");
    }

    #[test]
    fn factory_of_function_binding_yields_function() {
        let join = dependant("join", [Some(Key::from("sep"))], |call| {
            let sep = call.get::<String>(0)?;
            let parts: Vec<String> = call.rest(1).iter().map(text).collect();
            Ok(Some(string(&parts.join(sep.as_str()))))
        })
        .unwrap();
        let container = Container::new([bind(["join"]).unwrap().to_function(join).unwrap()]);

        let factory = container
            .resolve(make_factory("join", vec![Key::from("sep")]))
            .unwrap();
        let joiner = factory
            .as_function()
            .unwrap()
            .call(vec![string("-")])
            .unwrap();

        let joined = joiner
            .as_function()
            .unwrap()
            .call(vec![string("foo"), string("bar")])
            .unwrap();
        assert_eq!(text(&joined), "foo-bar");
    }
}
