//! Tracking Context
//!
//! The tracking context records which effect is currently running, so that
//! a read can be attributed to it.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context: a stack of running
//! effects. Running an effect pushes it, and the returned [`ContextGuard`]
//! pops it again when dropped. Reads are attributed to the top of the stack.
//!
//! A stack rather than a single slot means an effect created (or triggered)
//! while another one runs does not clobber the outer effect: once the inner
//! run finishes, the outer one is current again.
//!
//! The context lives inside the runtime's re-entrant execution lock, so it is
//! only ever touched by the thread currently doing reactive work. Borrows of
//! the inner `RefCell` are kept to single statements and never span user
//! code.

use std::cell::RefCell;

use super::effect::Effect;
use super::subscriber::SubscriberId;

/// Stack of effects currently executing on a runtime.
#[derive(Default)]
pub(crate) struct TrackingContext {
    stack: RefCell<Vec<Effect>>,
}

impl TrackingContext {
    /// Push `effect` as the current effect until the guard drops.
    pub fn enter(&self, effect: Effect) -> ContextGuard<'_> {
        let subscriber_id = effect.id();
        self.stack.borrow_mut().push(effect);

        ContextGuard {
            context: self,
            subscriber_id,
        }
    }

    /// The effect reads should currently be attributed to.
    pub fn current(&self) -> Option<Effect> {
        self.stack.borrow().last().cloned()
    }

    /// Whether `id` is anywhere on the stack.
    pub fn is_running(&self, id: SubscriberId) -> bool {
        self.stack.borrow().iter().any(|effect| effect.id() == id)
    }

    /// Number of nested effects running.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the effect panics.
pub(crate) struct ContextGuard<'a> {
    context: &'a TrackingContext,
    subscriber_id: SubscriberId,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.stack.borrow_mut().pop();

        if let Some(effect) = &popped {
            debug_assert_eq!(
                effect.id(),
                self.subscriber_id,
                "TrackingContext mismatch: expected {}, got {}",
                self.subscriber_id,
                effect.id()
            );
        }

        // Dropped outside the borrow: this may be the last handle, and
        // releasing an effect touches the dependency store.
        drop(popped);
    }
}
