//! Dependency identification keys.
//!
//! A [`Key`] is what callers hand to the container to ask for a value. It is
//! a tagged union fixed at the point a key enters the system:
//!
//! - [`Key::Name`]: a string key, compared by value
//! - [`Key::Symbol`]: an opaque token, compared by identity
//! - [`Key::Type`]: a Rust type marker, compared by [`TypeId`]; it doubles
//!   as a default binding target when it carries a [`Constructor`]
//! - [`Key::Binding`]: a [`Binding`] used directly, bypassing the registry

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use rabt_support::rendering::{quote_name, shorten_type_name};

use crate::binding::Binding;
use crate::container::Container;
use crate::dependencies::{Call, Dependant, DependencyList};
use crate::error::Result;
use crate::lookup::LookupKey;
use crate::value::{Instance, Value};

static CONTAINER_KEY: Lazy<Key> = Lazy::new(Key::marker::<Container>);

/// A key used to request a value from the container.
///
/// # Examples
/// ```
/// use rabt_container::key::{Key, Symbol};
///
/// let name: Key = "database_url".into();
/// assert_eq!(name, Key::from("database_url"));
///
/// let token = Symbol::new("clock");
/// assert_eq!(Key::from(token.clone()), Key::from(token));
/// assert_ne!(Key::from(Symbol::new("clock")), Key::from(Symbol::new("clock")));
/// ```
#[derive(Clone)]
pub enum Key {
    /// A string key.
    Name(Arc<str>),
    /// An opaque identity token.
    Symbol(Symbol),
    /// A type marker, constructible when it carries a constructor.
    Type(TypeKey),
    /// A binding used directly as a dependency.
    Binding(Binding),
}

impl Key {
    /// Creates a constructible key for an [`Injectable`] type.
    ///
    /// Resolving it from a container with no registration for `T`
    /// auto-constructs `T` from its declared dependencies.
    pub fn of<T: Injectable>() -> Self {
        Key::Type(TypeKey::constructible(Constructor::injectable::<T>()))
    }

    /// Creates a non-constructible type marker.
    ///
    /// Markers name abstract types such as trait objects; they only
    /// resolve through an explicit binding.
    pub fn marker<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeKey::marker::<T>())
    }

    /// Creates a type key from an explicit [`Constructor`].
    pub fn constructor(constructor: Constructor) -> Self {
        Key::Type(TypeKey::constructible(constructor))
    }

    /// The key every container binds to itself.
    pub fn container() -> Self {
        CONTAINER_KEY.clone()
    }

    /// Returns the type key if this is a [`Key::Type`].
    pub fn as_type(&self) -> Option<&TypeKey> {
        match self {
            Key::Type(type_key) => Some(type_key),
            _ => None,
        }
    }

    /// Returns `true` for keys that may be used as binding targets.
    pub fn is_bindable(&self) -> bool {
        !matches!(self, Key::Binding(_))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Name(a), Key::Name(b)) => a == b,
            (Key::Symbol(a), Key::Symbol(b)) => a == b,
            (Key::Type(a), Key::Type(b)) => a == b,
            (Key::Binding(a), Key::Binding(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Key::Name(name) => name.hash(state),
            Key::Symbol(symbol) => symbol.hash(state),
            Key::Type(type_key) => type_key.hash(state),
            Key::Binding(binding) => binding.id().hash(state),
        }
    }
}

impl LookupKey for Key {
    fn is_blank(&self) -> bool {
        matches!(self, Key::Name(name) if name.is_empty())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "Key::Name({name:?})"),
            Key::Symbol(symbol) => write!(f, "Key::{symbol:?}"),
            Key::Type(type_key) => write!(f, "Key::Type({})", type_key.type_name()),
            Key::Binding(binding) => write!(f, "Key::Binding({binding:?})"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{}", quote_name(name)),
            Key::Symbol(symbol) => write!(f, "{symbol}"),
            Key::Type(type_key) => write!(f, "{}", type_key.short_name()),
            Key::Binding(binding) => write!(f, "{binding}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<TypeKey> for Key {
    fn from(type_key: TypeKey) -> Self {
        Key::Type(type_key)
    }
}

impl From<Constructor> for Key {
    fn from(constructor: Constructor) -> Self {
        Key::constructor(constructor)
    }
}

impl From<Binding> for Key {
    fn from(binding: Binding) -> Self {
        Key::Binding(binding)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// ═══════════════════════════════════════════
// Symbol
// ═══════════════════════════════════════════

/// An opaque identity token.
///
/// Two symbols are equal only if one is a clone of the other; the
/// description is for diagnostics.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    /// Creates a fresh, unique symbol.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?}#{})", self.description, self.id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

// ═══════════════════════════════════════════
// TypeKey
// ═══════════════════════════════════════════

/// A Rust type used as a key.
///
/// Identity is the [`TypeId`]; the optional constructor only decides
/// whether the key can be auto-constructed.
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    constructor: Option<Constructor>,
}

impl TypeKey {
    /// A non-constructible marker for `T`.
    pub fn marker<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            constructor: None,
        }
    }

    /// A constructible key for whatever `constructor` builds.
    pub fn constructible(constructor: Constructor) -> Self {
        Self {
            type_id: constructor.type_id(),
            type_name: constructor.type_name(),
            constructor: Some(constructor),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths, as used in messages.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// Returns the constructor, if this key can be auto-constructed.
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeKey")
            .field("type_name", &self.type_name)
            .field("constructible", &self.constructor.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Constructor / Injectable
// ═══════════════════════════════════════════

/// A type that knows its own dependencies and how to build itself.
///
/// This is the explicit replacement for constructor metadata: the
/// dependency list is declared next to the type instead of being
/// attached out-of-band.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use rabt_container::prelude::*;
///
/// struct Engine;
/// impl Injectable for Engine {
///     fn construct(_: &Call<'_>) -> Result<Self> { Ok(Engine) }
/// }
///
/// struct Car { engine: Arc<Engine> }
/// impl Injectable for Car {
///     fn dependencies() -> Vec<Key> { vec![Key::of::<Engine>()] }
///     fn construct(call: &Call<'_>) -> Result<Self> {
///         Ok(Car { engine: call.get::<Engine>(0)? })
///     }
/// }
///
/// let container = Container::new([]);
/// let car = container.get::<Car>(Key::of::<Car>()).unwrap();
/// let engine = container.get::<Engine>(Key::of::<Engine>()).unwrap();
/// assert!(Arc::ptr_eq(&car.engine, &engine));
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Keys resolved, in order, and passed positionally to [`construct`](Injectable::construct).
    fn dependencies() -> Vec<Key> {
        Vec::new()
    }

    /// Builds the value from its resolved dependencies.
    fn construct(call: &Call<'_>) -> Result<Self>;

    /// Wraps a constructed value, declaring supertypes or disposal.
    fn instance(self) -> Instance<Self> {
        Instance::new(self)
    }
}

/// A constructible type: its identity plus a factory with a dependency list.
#[derive(Clone)]
pub struct Constructor {
    inner: Arc<ConstructorInner>,
}

struct ConstructorInner {
    type_id: TypeId,
    type_name: &'static str,
    factory: Dependant,
}

impl Constructor {
    /// Creates a constructor for `T`.
    pub fn new<T, F>(dependencies: DependencyList, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Call<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self::with_instance::<T, _>(dependencies, move |call| Ok(Instance::new(construct(call)?)))
    }

    /// Creates a constructor for `T` whose body decides how the value is wrapped.
    pub fn with_instance<T, F>(dependencies: DependencyList, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Call<'_>) -> Result<Instance<T>> + Send + Sync + 'static,
    {
        let name = shorten_type_name(type_name::<T>());
        let factory = Dependant::new(name, dependencies, move |call| {
            Ok(Some(Value::from(construct(call)?)))
        });

        Self {
            inner: Arc::new(ConstructorInner {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                factory,
            }),
        }
    }

    /// Creates the constructor declared by an [`Injectable`] type.
    pub fn injectable<T: Injectable>() -> Self {
        Self::with_instance::<T, _>(DependencyList::new(T::dependencies()), |call| {
            Ok(T::construct(call)?.instance())
        })
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// The factory that builds the type from its resolved dependencies.
    pub fn factory(&self) -> &Dependant {
        &self.inner.factory
    }

    pub fn dependencies(&self) -> &DependencyList {
        self.inner.factory.dependencies()
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("type_name", &self.inner.type_name)
            .field("dependencies", self.dependencies())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::bind;
    use std::collections::HashMap;

    struct Plain;

    impl Injectable for Plain {
        fn construct(_: &Call<'_>) -> Result<Self> {
            Ok(Plain)
        }
    }

    trait Logger: Send + Sync {}

    #[test]
    fn name_keys_compare_by_value() {
        assert_eq!(Key::from("a"), Key::from(String::from("a")));
        assert_ne!(Key::from("a"), Key::from("b"));
    }

    #[test]
    fn symbols_compare_by_identity() {
        let first = Symbol::new("token");
        let second = Symbol::new("token");
        assert_eq!(Key::from(first.clone()), Key::from(first));
        assert_ne!(Key::from(second), Key::from(Symbol::new("token")));
    }

    #[test]
    fn type_keys_compare_by_type_id() {
        assert_eq!(Key::of::<Plain>(), Key::marker::<Plain>());
        assert_ne!(Key::marker::<Plain>(), Key::marker::<String>());
    }

    #[test]
    fn marker_is_not_constructible() {
        let key = Key::marker::<dyn Logger>();
        assert!(key.as_type().unwrap().constructor().is_none());
        assert!(Key::of::<Plain>().as_type().unwrap().constructor().is_some());
    }

    #[test]
    fn binding_keys_compare_by_identity() {
        let binding = bind(["k"]).unwrap();
        let copy = binding.clone();
        assert_eq!(Key::from(binding.clone()), Key::from(copy));
        assert_ne!(Key::from(binding), Key::from(bind(["k"]).unwrap()));
    }

    #[test]
    fn different_variants_never_equal() {
        assert_ne!(Key::from("Plain"), Key::marker::<Plain>());
    }

    #[test]
    fn only_empty_names_are_blank() {
        assert!(Key::from("").is_blank());
        assert!(!Key::from("x").is_blank());
        assert!(!Key::marker::<Plain>().is_blank());
    }

    #[test]
    fn display_names() {
        assert_eq!(Key::from("foo").to_string(), "'foo'");
        assert_eq!(Key::marker::<Plain>().to_string(), "Plain");
        assert_eq!(Key::from(Symbol::new("clock")).to_string(), "Symbol(clock)");
    }

    #[test]
    fn container_key_is_stable() {
        assert_eq!(Key::container(), Key::marker::<Container>());
    }

    #[test]
    fn key_in_hashmap() {
        let mut map = HashMap::new();
        map.insert(Key::from("a"), 1);
        map.insert(Key::marker::<Plain>(), 2);
        assert_eq!(map.get(&Key::from("a")), Some(&1));
        assert_eq!(map.get(&Key::of::<Plain>()), Some(&2));
        assert_eq!(map.get(&Key::from("b")), None);
    }

    #[test]
    fn unsized_type_marker() {
        let key = Key::marker::<dyn Logger>();
        assert!(key.to_string().contains("Logger"));
    }
}
