//! Call-scoped overrides.

use crate::key::Key;
use crate::value::Value;

/// A one-shot set of explicit values for a single resolution call.
///
/// Each entry satisfies at most one dependency: a matching key is consumed
/// and removed, so nested resolutions in the same call do not see it.
/// Keys without a match fall through to normal container resolution.
///
/// # Examples
/// ```
/// use rabt_container::locals::Locals;
/// use rabt_container::value::Value;
///
/// let mut locals = Locals::new(["port".into()], [Value::new(8080u16)]);
/// assert!(locals.take(&"port".into()).is_some());
/// assert!(locals.take(&"port".into()).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Locals {
    entries: Vec<(Key, Value)>,
}

impl Locals {
    /// Pairs `keys` with `values` positionally; extra items on either side are dropped.
    pub fn new(
        keys: impl IntoIterator<Item = Key>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            entries: keys.into_iter().zip(values).collect(),
        }
    }

    pub fn with(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    /// Removes and returns the first value provided for `key`.
    pub fn take(&mut self, key: &Key) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Takes the local for `key`, or computes a value with `fallback`.
    pub fn take_or_else<E>(
        &mut self,
        key: &Key,
        fallback: impl FnOnce(&Key) -> Result<Value, E>,
    ) -> Result<Value, E> {
        match self.take(key) {
            Some(value) => Ok(value),
            None => fallback(key),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
