//! Load coordination for pending collection initializations.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

/// A joinable unit of work: a cloneable future every holder can await.
///
/// The unit runs once, however many clones await it. It makes progress
/// while at least one holder polls it.
pub type JoinUnit = Shared<BoxFuture<'static, ()>>;

/// Returns a unit that is already complete.
pub fn completed_unit() -> JoinUnit {
    future::ready(()).boxed().shared()
}

#[derive(Default)]
struct LoaderState {
    pending: Vec<JoinUnit>,
    unit: Option<JoinUnit>,
}

/// Aggregates pending initializations into one joinable unit.
///
/// Collections register their initialization with
/// [`add_pending`](LoadCoordinator::add_pending); code that needs every
/// collection loaded awaits [`load`](LoadCoordinator::load). Once the unit
/// settles, the coordinator resets itself for the next cycle.
///
/// # Example
///
/// ```rust
/// use futures::FutureExt;
/// use synccol_engine::LoadCoordinator;
///
/// # futures::executor::block_on(async {
/// let loader = LoadCoordinator::new();
/// loader.add_pending(async {}.boxed().shared());
/// assert!(loader.is_loading());
///
/// loader.load().await;
/// assert!(!loader.is_loading());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct LoadCoordinator {
    state: Arc<Mutex<LoaderState>>,
}

impl LoadCoordinator {
    /// Creates an idle coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the pending set and drops the current unit.
    pub fn init(&self) {
        reset(&self.state);
    }

    /// Registers one pending initialization.
    pub fn add_pending(&self, unit: JoinUnit) {
        self.state.lock().pending.push(unit);
    }

    /// Returns true while initializations are pending.
    pub fn is_loading(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Returns the number of pending initializations.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns the unit joining every pending initialization.
    ///
    /// Repeated calls in one cycle return the same unit. When it settles,
    /// the coordinator is reset.
    pub fn load(&self) -> JoinUnit {
        let mut state = self.state.lock();
        if let Some(unit) = &state.unit {
            if unit.peek().is_none() {
                return unit.clone();
            }
            // Settled before anyone observed its reset.
            state.unit = None;
        }

        let pending = state.pending.clone();
        let weak: Weak<Mutex<LoaderState>> = Arc::downgrade(&self.state);
        let unit = async move {
            let count = pending.len();
            future::join_all(pending).await;
            debug!(count, "pending collections loaded");
            if let Some(state) = weak.upgrade() {
                reset(&state);
            }
        }
        .boxed()
        .shared();

        state.unit = Some(unit.clone());
        unit
    }
}

impl std::fmt::Debug for LoadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoadCoordinator")
            .field("pending", &state.pending.len())
            .field("loading", &state.unit.is_some())
            .finish()
    }
}

fn reset(state: &Mutex<LoaderState>) {
    let mut state = state.lock();
    state.pending.clear();
    state.unit = None;
}
