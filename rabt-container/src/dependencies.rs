//! Dependency lists and the callables that declare them.
//!
//! A [`Dependant`] is a callable with an ordered [`DependencyList`]
//! attached. When invoked through a container, each listed key is
//! resolved in order and passed positionally to the body, followed by any
//! call arguments.
//!
//! ```
//! use rabt_container::prelude::*;
//!
//! let greet = dependant("greet", [Some(Key::from("name"))], |call| {
//!     let name = call.get::<String>(0)?;
//!     Ok(Some(Value::new(format!("hello, {name}"))))
//! })
//! .unwrap();
//!
//! let container = Container::new([
//!     bind(["name"]).unwrap().to_value(Value::new(String::from("rabt"))),
//! ]);
//! let greeting = container.call(&greet, vec![]).unwrap().unwrap();
//! assert_eq!(greeting.downcast_ref::<String>().unwrap(), "hello, rabt");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use rabt_support::rendering::shorten_type_name;

use crate::chain;
use crate::container::Container;
use crate::error::{ArityMismatchError, RabtError, Result, TypeMismatchError};
use crate::key::Key;
use crate::locals::Locals;
use crate::value::Value;

type Body = dyn Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync;

/// An ordered list of keys, every one of them defined.
#[derive(Clone)]
pub struct DependencyList(Arc<[Key]>);

impl DependencyList {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::new([])
    }

    /// Builds a list from possibly missing slots.
    ///
    /// # Errors
    /// Returns [`RabtError::UndefinedDependency`] naming `owner` if any
    /// slot is `None`.
    pub fn from_slots(
        owner: &str,
        slots: impl IntoIterator<Item = Option<Key>>,
    ) -> Result<Self> {
        let keys = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| RabtError::UndefinedDependency {
                    callee: owner.to_string(),
                    index,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(keys))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Key] {
        &self.0
    }

    /// The list without its first `count` entries.
    pub fn skip(&self, count: usize) -> Self {
        Self::new(self.0.iter().skip(count).cloned())
    }
}

impl Default for DependencyList {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for DependencyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(ToString::to_string))
            .finish()
    }
}

impl<'a> IntoIterator for &'a DependencyList {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ═══════════════════════════════════════════
// Dependant
// ═══════════════════════════════════════════

/// A callable with an attached [`DependencyList`].
#[derive(Clone)]
pub struct Dependant {
    name: Arc<str>,
    dependencies: DependencyList,
    params: Option<usize>,
    body: Arc<Body>,
}

impl Dependant {
    pub fn new(
        name: impl Into<Arc<str>>,
        dependencies: DependencyList,
        body: impl Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            dependencies,
            params: None,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &DependencyList {
        &self.dependencies
    }

    /// The declared parameter count, if any.
    pub fn params(&self) -> Option<usize> {
        self.params
    }

    /// Declares how many parameters the body takes.
    ///
    /// # Errors
    /// Returns [`RabtError::ArityMismatch`] if more dependencies are
    /// attached than there are parameters.
    pub fn declare_params(mut self, params: usize) -> Result<Self> {
        if self.dependencies.len() > params {
            return Err(self.arity_mismatch(params));
        }
        self.params = Some(params);
        Ok(self)
    }

    fn arity_mismatch(&self, params: usize) -> RabtError {
        RabtError::ArityMismatch(ArityMismatchError {
            callee: self.name.to_string(),
            dependencies: self.dependencies.len(),
            params,
        })
    }

    /// The same body with a different dependency list.
    pub fn with_dependencies(&self, dependencies: DependencyList) -> Self {
        Self {
            name: self.name.clone(),
            dependencies,
            params: None,
            body: self.body.clone(),
        }
    }

    /// Runs the body with already resolved arguments.
    pub fn invoke(
        &self,
        container: &Container,
        locals: &Locals,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let call = Call {
            container,
            locals,
            args,
            callee: &self.name,
        };
        (self.body)(&call)
    }
}

impl fmt::Debug for Dependant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependant")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("params", &self.params)
            .finish()
    }
}

/// Attaches a dependency list to a callable.
///
/// # Errors
/// Returns [`RabtError::UndefinedDependency`] if any slot is `None`.
pub fn dependant(
    name: impl Into<Arc<str>>,
    slots: impl IntoIterator<Item = Option<Key>>,
    body: impl Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
) -> Result<Dependant> {
    let name = name.into();
    let dependencies = DependencyList::from_slots(&name, slots)?;
    Ok(Dependant::new(name, dependencies, body))
}

/// Attaches a dependency list to a callable taking exactly `params` parameters.
///
/// # Errors
/// Returns [`RabtError::ArityMismatch`] if the list length differs from
/// `params`, and [`RabtError::UndefinedDependency`] if any slot is `None`.
///
/// ```
/// use rabt_container::prelude::*;
///
/// let err = ctor("Service", 2, [Some(Key::from("a"))], |_| Ok(None)).unwrap_err();
/// assert_eq!(err.to_string(), "Service has 1 dependency, but 2 parameters");
/// ```
pub fn ctor(
    name: impl Into<Arc<str>>,
    params: usize,
    slots: impl IntoIterator<Item = Option<Key>>,
    body: impl Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
) -> Result<Dependant> {
    let mut declared = dependant(name, slots, body)?;
    if declared.dependencies.len() != params {
        return Err(declared.arity_mismatch(params));
    }
    declared.params = Some(params);
    Ok(declared)
}

// ═══════════════════════════════════════════
// Call
// ═══════════════════════════════════════════

/// What a [`Dependant`] body receives.
///
/// Positional arguments are the resolved dependencies in declaration
/// order, followed by any extra call arguments.
pub struct Call<'a> {
    container: &'a Container,
    locals: &'a Locals,
    args: Vec<Value>,
    callee: &'a str,
}

impl<'a> Call<'a> {
    /// The requesting container.
    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Locals left over after this call's dependencies were resolved.
    pub fn locals(&self) -> &'a Locals {
        self.locals
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Arguments from position `start` onwards.
    pub fn rest(&self, start: usize) -> &[Value] {
        self.args.get(start..).unwrap_or_default()
    }

    /// The argument at `index`.
    ///
    /// # Errors
    /// Returns [`RabtError::MissingArgument`] if fewer arguments were supplied.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| RabtError::MissingArgument {
            callee: self.callee.to_string(),
            index,
            received: self.args.len(),
        })
    }

    /// The argument at `index` as `Arc<T>`.
    ///
    /// # Errors
    /// Returns [`RabtError::TypeMismatch`] if the argument does not satisfy `T`.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let value = self.arg(index)?;
        value.get::<T>().ok_or_else(|| {
            RabtError::TypeMismatch(TypeMismatchError {
                expected: shorten_type_name(type_name::<T>()),
                found: value.type_name(),
                chain: chain::snapshot(),
            })
        })
    }
}
