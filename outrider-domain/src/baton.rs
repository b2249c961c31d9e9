use std::sync::Arc;

// ---------------------------------------------------------------------------
// Baton
// ---------------------------------------------------------------------------

/// A caller-chosen execution context for completion continuations.
///
/// The networking thread must never be blocked by caller-side work, so the
/// continuation attached to a command is handed to a `Baton` rather than run
/// in place.  Callers that are happy to run a short continuation on the
/// completing thread use [`InlineBaton`]; callers with their own runtime use
/// [`RuntimeBaton`].
pub trait Baton: Send + Sync {
    // ---
    /// Run `task` on this execution context.  `task` is invoked exactly once.
    fn run(&self, task: Box<dyn FnOnce() + Send>);
}

// ---

/// Shared [`Baton`].
pub type BatonPtr = Arc<dyn Baton>;

// ---------------------------------------------------------------------------
// InlineBaton
// ---------------------------------------------------------------------------

/// Runs the continuation directly on the thread that completed the
/// operation (normally the networking thread).
///
/// Continuations run inline must be short and must not block.
#[derive(Debug, Default)]
pub struct InlineBaton;

impl Baton for InlineBaton {
    fn run(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

// ---------------------------------------------------------------------------
// RuntimeBaton
// ---------------------------------------------------------------------------

/// Hops the continuation onto a caller-owned tokio runtime, keeping
/// caller-side work off the networking thread entirely.
#[derive(Debug, Clone)]
pub struct RuntimeBaton {
    // ---
    handle: tokio::runtime::Handle,
}

// ---

impl RuntimeBaton {
    // ---
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Baton for the runtime the caller is currently inside.
    ///
    /// Panics outside a tokio runtime, same as
    /// [`tokio::runtime::Handle::current`].
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

// ---

impl Baton for RuntimeBaton {
    fn run(&self, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move { task() });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
