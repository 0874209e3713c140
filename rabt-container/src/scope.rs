//! Per-container value cache and disposal tracker.
//!
//! A [`Scope`] caches values under the identity of the binding that built
//! them. Values built without a cache key are only tracked, and only when
//! they are disposable, so that [`Scope::dispose`] can tear them down.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::binding::BindingId;
use crate::error::{DisposalFailedError, RabtError, Result};
use crate::lookup::Lookup;
use crate::value::Value;

/// The cache and disposal tracker attached to one container.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    tracked: Lookup<Option<BindingId>, Value>,
    // Held while a cached value is built; re-entered by same-thread recursion.
    building: Mutex<HashMap<BindingId, Arc<ReentrantMutex<()>>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached under `binding`, or computes one.
    ///
    /// A computed value is cached when `binding` is given, and tracked for
    /// disposal when it is given or the value is disposable. A `None`
    /// result is passed through and never cached.
    ///
    /// For a given `binding`, at most one thread computes at a time; the
    /// others wait and receive the cached value.
    pub fn get(
        &self,
        binding: Option<BindingId>,
        compute: impl FnOnce() -> Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        let Some(id) = binding else {
            return self.compute_and_track(None, compute);
        };

        if let Some(cached) = self.cached(binding) {
            return Ok(Some(cached));
        }

        let slot = self.building_slot(id);
        let _building = slot.lock();

        if let Some(cached) = self.cached(binding) {
            return Ok(Some(cached));
        }
        self.compute_and_track(binding, compute)
    }

    fn cached(&self, binding: Option<BindingId>) -> Option<Value> {
        let cached = self.inner.tracked.get(&binding)?;
        trace!(binding = ?binding, "Scope cache hit");
        Some(cached)
    }

    fn building_slot(&self, id: BindingId) -> Arc<ReentrantMutex<()>> {
        self.inner.building.lock().entry(id).or_default().clone()
    }

    fn compute_and_track(
        &self,
        binding: Option<BindingId>,
        compute: impl FnOnce() -> Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        let Some(value) = compute()? else {
            return Ok(None);
        };

        if binding.is_none() && !value.is_disposable() {
            return Ok(Some(value));
        }

        let stored = match binding {
            Some(_) => self.inner.tracked.get_or_add(binding, || value.clone()),
            None => self.inner.tracked.add(None, value.clone()),
        };

        if !value.is_disposable() {
            return Ok(Some(stored));
        }

        if stored.ptr_eq(&value) {
            let scope: Weak<ScopeInner> = Arc::downgrade(&self.inner);
            value.on_dispose(move |disposed| {
                if let Some(scope) = scope.upgrade() {
                    scope.tracked.remove(&binding, disposed);
                }
            });
        } else {
            // Lost to a value cached during a re-entrant build.
            debug!(binding = ?binding, "Disposing superseded value");
            if let Err(error) = value.dispose() {
                debug!(binding = ?binding, %error, "Superseded value failed to dispose");
            }
        }

        Ok(Some(stored))
    }

    /// Disposes every tracked disposable value.
    ///
    /// Every value is attempted even if an earlier one fails; the failures
    /// are returned together. Disposed values stop being tracked, so a
    /// second call does nothing.
    pub fn dispose(&self) -> Result<()> {
        let tracked = self.inner.tracked.values();
        debug!(tracked = tracked.len(), "Disposing scope");

        let failures: Vec<RabtError> = tracked
            .iter()
            .filter(|value| value.is_disposable())
            .filter_map(|value| value.dispose().err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RabtError::DisposalFailed(DisposalFailedError { failures }))
        }
    }

    /// Number of values currently cached or tracked.
    pub fn tracked_len(&self) -> usize {
        self.inner.tracked.len()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("tracked", &self.tracked_len())
            .finish()
    }
}
