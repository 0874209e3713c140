//! The resolution stack.
//!
//! Every [`Container::resolve`](crate::container::Container::resolve) call
//! pushes its key for the duration of the call. The stack is per thread
//! and shared by every container on that thread, so the depth ceiling
//! bounds the total recursion regardless of container nesting. It is only
//! used for diagnostics and the depth guard.

use std::cell::RefCell;

use tracing::warn;

use crate::error::{DepthExceededError, RabtError, Result};
use crate::key::Key;

/// Maximum number of nested resolutions before resolution fails.
pub const MAX_DEPENDENCY_DEPTH: usize = 20;

thread_local! {
    static RESOLVE_CHAIN: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Pops the key pushed by [`enter`] when dropped.
#[must_use]
pub(crate) struct ChainGuard {
    _private: (),
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        RESOLVE_CHAIN.with_borrow_mut(|chain| {
            chain.pop();
        });
    }
}

/// Pushes `key`, failing if the stack is already at the ceiling.
pub(crate) fn enter(key: &Key) -> Result<ChainGuard> {
    RESOLVE_CHAIN.with_borrow_mut(|chain| {
        if chain.len() >= MAX_DEPENDENCY_DEPTH {
            let rendered: Vec<String> = chain.iter().map(ToString::to_string).collect();
            warn!(
                max_depth = MAX_DEPENDENCY_DEPTH,
                key = %key,
                "Dependency depth exceeded"
            );
            return Err(RabtError::DepthExceeded(DepthExceededError {
                max_depth: MAX_DEPENDENCY_DEPTH,
                chain: rendered,
            }));
        }

        chain.push(key.clone());
        Ok(ChainGuard { _private: () })
    })
}

/// The keys being resolved, outermost first.
pub fn snapshot() -> Vec<String> {
    RESOLVE_CHAIN.with_borrow(|chain| chain.iter().map(ToString::to_string).collect())
}

/// The keys being resolved, excluding the innermost one.
///
/// This is the context of an error about the innermost key.
pub(crate) fn context() -> Vec<String> {
    let mut chain = snapshot();
    chain.pop();
    chain
}

/// Current depth of the stack on this thread.
pub fn depth() -> usize {
    RESOLVE_CHAIN.with_borrow(Vec::len)
}
