//! The [`Listener`] trait and its dispatch result.

use crate::context::CommandContext;

/// Outcome of one listener invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenResult {
    /// Pass the context on to the next listener in the chain.
    Continue,
    /// Stop the chain. No further listeners run.
    Cancel,
    /// Stop the chain and resubmit the context into the next round.
    ///
    /// The next pass restarts the full chain from the top.
    CancelRequeue,
}

impl ListenResult {
    /// Whether the chain stops after this result.
    pub fn stops_chain(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// A named, prioritised handler invoked by the dispatcher.
///
/// Lower priority values run earlier. Listeners must complete quickly
/// and synchronously; blocking I/O inside `handle` stalls the lane that
/// dispatched the command.
///
/// # Contract
///
/// `name()` must be unique within a dispatcher and must not change
/// after registration. `priority()` is read once at registration time.
pub trait Listener: Send + Sync + 'static {
    /// Unique listener name, used for unregistration and introspection.
    fn name(&self) -> &str;

    /// Position in the chain. Lower runs first.
    fn priority(&self) -> i32;

    /// Handle one dispatched context.
    fn handle(&self, ctx: &mut CommandContext) -> ListenResult;
}
