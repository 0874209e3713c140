//! Resolved values.
//!
//! Everything a container hands out is a [`Value`]: a type-erased object,
//! a list (from [`all`](crate::helpers::all)), a callable
//! [`Function`], or [`Value::Null`].
//!
//! Objects carry a small cast table describing which nominal types they
//! satisfy. The concrete type is always present; supertypes such as trait
//! objects are declared with [`Instance::implements`]:
//!
//! ```
//! use std::sync::Arc;
//! use rabt_container::value::{Instance, Value};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! let value: Value = Instance::new(English)
//!     .implements::<dyn Greeter>(|e| e)
//!     .into();
//!
//! let greeter: Arc<dyn Greeter> = value.get::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! assert!(value.get::<English>().is_some());
//! assert!(value.get::<String>().is_none());
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rabt_support::rendering::shorten_type_name;

use crate::error::Result;
use crate::lookup::Identity;

type Erased = Arc<dyn Any + Send + Sync>;
type Caster = Arc<dyn Fn(&Erased) -> Option<Box<dyn Any>> + Send + Sync>;
type DisposeHook = Box<dyn FnOnce(&Value) + Send>;
type FunctionBody = dyn Fn(Vec<Value>) -> Result<Option<Value>> + Send + Sync;

/// A value produced by resolution.
#[derive(Clone, Default)]
pub enum Value {
    /// The null-equivalent, e.g. an absent [`optional`](crate::helpers::optional).
    #[default]
    Null,
    /// A type-erased object.
    Object(Object),
    /// An ordered sequence of values.
    List(Vec<Value>),
    /// A callable.
    Function(Function),
}

impl Value {
    /// Wraps a plain value with no declared supertypes.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Instance::new(value).into()
    }

    /// Wraps an already shared value.
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Instance::from_arc(value).into()
    }

    /// Wraps a value that is torn down when its scope is disposed.
    pub fn disposable<T: Dispose + 'static>(value: T) -> Self {
        Instance::new(value).disposable().into()
    }

    /// Retrieves the value as `Arc<U>`, where `U` is the concrete type or
    /// any declared supertype.
    pub fn get<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        let Value::Object(object) = self else {
            return None;
        };
        let caster = object.casts.get(&TypeId::of::<U>())?;
        caster(&object.value)?
            .downcast::<Arc<U>>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Borrows the value as its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns `true` if the value is nominally of the type `type_id`.
    pub fn satisfies(&self, type_id: TypeId) -> bool {
        match self {
            Value::Object(object) => object.casts.contains_key(&type_id),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns `true` if the value exposes a dispose capability.
    pub fn is_disposable(&self) -> bool {
        matches!(self, Value::Object(Object { disposer: Some(_), .. }))
    }

    /// Returns `true` once [`dispose`](Value::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        match self {
            Value::Object(Object {
                disposer: Some(disposer),
                ..
            }) => disposer.disposed.load(Ordering::Acquire),
            _ => false,
        }
    }

    /// Disposes the value.
    ///
    /// Idempotent: only the first call reaches the underlying
    /// [`Dispose`] implementation. Every scope tracking the value stops
    /// tracking it first. Values without a dispose capability are left alone.
    pub fn dispose(&self) -> Result<()> {
        match self {
            Value::Object(Object {
                disposer: Some(disposer),
                ..
            }) => disposer.dispose(self),
            _ => Ok(()),
        }
    }

    /// Registers a hook run just before the value is disposed.
    pub(crate) fn on_dispose(&self, hook: impl FnOnce(&Value) + Send + 'static) {
        if let Value::Object(Object {
            disposer: Some(disposer),
            ..
        }) = self
        {
            disposer.hooks.lock().push(Box::new(hook));
        }
    }

    /// Returns `true` if both values are the same instance.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(&a.value, &b.value),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.body, &b.body),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            _ => false,
        }
    }

    /// Short name of the value's concrete type, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Object(object) => shorten_type_name(object.type_name),
            Value::List(_) => "list".to_string(),
            Value::Function(function) => format!("function {}", function.name()),
        }
    }
}

impl Identity for Value {
    fn is_same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Object(object) => write!(f, "Object({})", object.type_name),
            Value::List(values) => f.debug_list().entries(values).finish(),
            Value::Function(function) => write!(f, "{function:?}"),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl<T: Send + Sync + 'static> From<Instance<T>> for Value {
    fn from(instance: Instance<T>) -> Self {
        Value::Object(Object {
            value: instance.value,
            type_name: type_name::<T>(),
            casts: Arc::new(instance.casts),
            disposer: instance.disposer.map(|target| {
                Arc::new(Disposer {
                    target,
                    disposed: AtomicBool::new(false),
                    hooks: Mutex::new(Vec::new()),
                })
            }),
        })
    }
}

/// A type-erased object and the nominal types it satisfies.
#[derive(Clone)]
pub struct Object {
    value: Erased,
    type_name: &'static str,
    casts: Arc<HashMap<TypeId, Caster>>,
    disposer: Option<Arc<Disposer>>,
}

// ═══════════════════════════════════════════
// Instance builder
// ═══════════════════════════════════════════

/// Typed builder for an object [`Value`].
pub struct Instance<T: Send + Sync + 'static> {
    value: Erased,
    concrete: Arc<T>,
    casts: HashMap<TypeId, Caster>,
    disposer: Option<Arc<dyn Dispose>>,
}

impl<T: Send + Sync + 'static> Instance<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(concrete: Arc<T>) -> Self {
        let identity: Caster = Arc::new(|erased: &Erased| {
            let arc = erased.clone().downcast::<T>().ok()?;
            Some(Box::new(arc) as Box<dyn Any>)
        });

        let mut casts = HashMap::new();
        casts.insert(TypeId::of::<T>(), identity);

        Self {
            value: concrete.clone(),
            concrete,
            casts,
            disposer: None,
        }
    }

    /// Declares that the value also satisfies `U`.
    ///
    /// `cast` is usually the unsizing identity, `|arc| arc`.
    pub fn implements<U: ?Sized + 'static>(
        mut self,
        cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    ) -> Self {
        let caster: Caster = Arc::new(move |erased: &Erased| {
            let arc = erased.clone().downcast::<T>().ok()?;
            Some(Box::new(cast(arc)) as Box<dyn Any>)
        });
        self.casts.insert(TypeId::of::<U>(), caster);
        self
    }

    /// Marks the value as disposable through its [`Dispose`] implementation.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.disposer = Some(self.concrete.clone() as Arc<dyn Dispose>);
        self
    }
}

// ═══════════════════════════════════════════
// Disposal
// ═══════════════════════════════════════════

/// Explicit teardown capability.
pub trait Dispose: Send + Sync {
    fn dispose(&self) -> Result<()>;
}

struct Disposer {
    target: Arc<dyn Dispose>,
    disposed: AtomicBool,
    hooks: Mutex<Vec<DisposeHook>>,
}

impl Disposer {
    fn dispose(&self, value: &Value) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let hooks = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook(value);
        }

        self.target.dispose()
    }
}

// ═══════════════════════════════════════════
// Function
// ═══════════════════════════════════════════

/// A callable value.
///
/// Produced by [`Binding::to_function`](crate::binding::Binding::to_function),
/// [`Container::resolve_function`](crate::container::Container::resolve_function)
/// and [`make_factory`](crate::helpers::make_factory).
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    body: Arc<FunctionBody>,
}

impl Function {
    pub fn new(
        name: impl Into<Arc<str>>,
        body: impl Fn(Vec<Value>) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the function. A body that produces nothing yields [`Value::Null`].
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        Ok((self.body)(args)?.unwrap_or(Value::Null))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RabtError;
    use std::sync::atomic::AtomicUsize;

    trait Shape: Send + Sync {
        fn sides(&self) -> usize;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> usize {
            4
        }
    }

    struct Connection {
        closed: Arc<AtomicUsize>,
    }

    impl Dispose for Connection {
        fn dispose(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    impl Dispose for Broken {
        fn dispose(&self) -> Result<()> {
            Err(RabtError::factory("already closed"))
        }
    }

    #[test]
    fn concrete_type_is_always_satisfied() {
        let value = Value::new(42u32);
        assert!(value.satisfies(TypeId::of::<u32>()));
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert_eq!(*value.get::<u32>().unwrap(), 42);
    }

    #[test]
    fn declared_supertype_is_retrievable() {
        let value: Value = Instance::new(Square).implements::<dyn Shape>(|s| s).into();
        assert!(value.satisfies(TypeId::of::<dyn Shape>()));
        assert_eq!(value.get::<dyn Shape>().unwrap().sides(), 4);
    }

    #[test]
    fn undeclared_supertype_is_not_satisfied() {
        let value = Value::new(Square);
        assert!(!value.satisfies(TypeId::of::<dyn Shape>()));
        assert!(value.get::<dyn Shape>().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let value = Value::new(String::from("x"));
        let other = Value::new(String::from("x"));
        assert!(value.ptr_eq(&value.clone()));
        assert!(!value.ptr_eq(&other));
    }

    #[test]
    fn get_returns_the_same_allocation() {
        let shared = Arc::new(Square);
        let value = Value::from_arc(shared.clone());
        assert!(Arc::ptr_eq(&value.get::<Square>().unwrap(), &shared));
    }

    #[test]
    fn dispose_is_idempotent() {
        let closed = Arc::new(AtomicUsize::new(0));
        let value = Value::disposable(Connection {
            closed: closed.clone(),
        });

        assert!(value.is_disposable());
        value.dispose().unwrap();
        value.clone().dispose().unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(value.is_disposed());
    }

    #[test]
    fn dispose_runs_hooks_first() {
        let closed = Arc::new(AtomicUsize::new(0));
        let value = Value::disposable(Connection {
            closed: closed.clone(),
        });

        let seen = Arc::new(AtomicUsize::new(0));
        let hook_seen = seen.clone();
        let hook_closed = closed.clone();
        value.on_dispose(move |_| {
            hook_seen.store(hook_closed.load(Ordering::SeqCst) + 1, Ordering::SeqCst);
        });

        value.dispose().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_failure_propagates() {
        let value = Value::disposable(Broken);
        assert!(value.dispose().is_err());
        assert!(value.dispose().is_ok());
    }

    #[test]
    fn plain_values_ignore_dispose() {
        let value = Value::new(1u8);
        assert!(!value.is_disposable());
        value.dispose().unwrap();
        assert!(!value.is_disposed());
    }

    #[test]
    fn function_maps_nothing_to_null() {
        let function = Function::new("noop", |_| Ok(None));
        assert!(function.call(vec![]).unwrap().is_null());

        let echo = Function::new("echo", |mut args| Ok(args.pop()));
        let result = echo.call(vec![Value::new(7i32)]).unwrap();
        assert_eq!(result.downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn type_names_are_short() {
        assert_eq!(Value::new(Square).type_name(), "Square");
        assert_eq!(Value::Null.type_name(), "null");
    }
}
