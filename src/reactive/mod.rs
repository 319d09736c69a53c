//! Fine-grained reactive primitives: signals, deriveds, effects.
//!
//! - [`signal`] creates a mutable reactive value.
//! - [`derived`] creates a lazily memoized computation over other nodes.
//! - [`effect`] creates a side-effecting subscriber, queued on writes and
//!   executed during settlement ([`flush_effects`]).
//!
//! Reads come in two flavors: `get()` registers the in-flight evaluation as
//! a dependent ("tracked"), `peek()` never does. Writes are value-equality
//! no-ops; a real change marks dependents dirty without recomputing anything,
//! so an unobserved derived recomputes at most once no matter how many writes
//! happened since it was last read.
//!
//! Cycles are detected with an explicit per-node evaluating marker rather
//! than stack unwinding: a tracked read of a node already under evaluation
//! fails that evaluation with [`ReactiveError::CyclicDependency`].

mod runtime;

use std::cell::RefCell;
use std::rc::Rc;

pub use runtime::NodeId;
use runtime::{with_runtime, NodeKind};

/// Upper bound on effect settlement passes before the graph is declared
/// divergent. An effect that re-invalidates its own dependencies on every
/// run hits this bound instead of hanging the tick.
pub const MAX_SETTLE_PASSES: usize = 100;

/// Errors surfaced by the reactive layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A derived observed reading itself, directly or transitively, during
    /// its own evaluation. Fatal to that evaluation only.
    #[error("cyclic dependency while evaluating reactive node {node:?}")]
    CyclicDependency { node: NodeId },
    /// Effect settlement exceeded [`MAX_SETTLE_PASSES`].
    #[error("effect settlement still pending after {passes} passes")]
    Divergence { passes: usize },
}

// =============================================================================
// Signal
// =============================================================================

/// A mutable reactive value.
///
/// Cloning a signal clones the handle, not the value; all clones share one
/// underlying slot and one graph node.
pub struct Signal<T> {
    id: NodeId,
    value: Rc<RefCell<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

/// Create a new signal holding `initial`.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    let id = with_runtime(|rt| rt.alloc(NodeKind::Signal));
    Signal {
        id,
        value: Rc::new(RefCell::new(initial)),
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Tracked read: registers the in-flight derived/effect evaluation (if
    /// any) as a dependent, exactly once per evaluation pass.
    pub fn get(&self) -> T {
        with_runtime(|rt| rt.track(self.id));
        self.value.borrow().clone()
    }

    /// Untracked read ("peek"): never registers a dependency, never triggers
    /// re-evaluation. Safe on hot paths.
    pub fn peek(&self) -> T {
        self.value.borrow().clone()
    }

    /// Store `value`. A write equal to the current value (by `PartialEq`) is
    /// a no-op: no dependent is marked dirty, no effect is queued.
    pub fn set(&self, value: T) {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        with_runtime(|rt| rt.invalidate(self.id));
    }

    /// Store the result of `f` applied to the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.value.borrow();
            f(&current)
        };
        self.set(next);
    }

    /// Graph identity of this signal.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Remove this signal from the graph. Dependents keep their memoized
    /// values but stop being invalidated by it.
    pub fn dispose(self) {
        with_runtime(|rt| rt.dispose(self.id));
    }
}

// =============================================================================
// Derived
// =============================================================================

struct DerivedInner<T> {
    memo: RefCell<Option<T>>,
    compute: Box<dyn Fn() -> T>,
}

/// A lazily memoized derived value.
///
/// Marked dirty when any dependency's write occurs; recomputed only when
/// observed again (demand-driven). Dependencies are re-recorded on every
/// evaluation, so a branch no longer read stops invalidating.
pub struct Derived<T> {
    id: NodeId,
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Create a derived computation. Starts dirty; first read evaluates.
pub fn derived<T, F>(compute: F) -> Derived<T>
where
    T: Clone + PartialEq + Default + 'static,
    F: Fn() -> T + 'static,
{
    let id = with_runtime(|rt| {
        rt.alloc(NodeKind::Derived {
            dirty: true,
            evaluating: false,
        })
    });
    Derived {
        id,
        inner: Rc::new(DerivedInner {
            memo: RefCell::new(None),
            compute: Box::new(compute),
        }),
    }
}

impl<T: Clone + PartialEq + Default + 'static> Derived<T> {
    /// Tracked read, surfacing `CyclicDependency` instead of recursing.
    ///
    /// On a cycle the node stays dirty and the memo keeps its previous value.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        with_runtime(|rt| rt.track(self.id));
        if with_runtime(|rt| rt.is_evaluating(self.id)) {
            with_runtime(|rt| rt.mark_cycle(self.id));
            return Err(ReactiveError::CyclicDependency { node: self.id });
        }
        if with_runtime(|rt| rt.is_dirty(self.id)) {
            self.evaluate()?;
        }
        Ok(self.inner.memo.borrow().clone().unwrap_or_default())
    }

    /// Tracked read. On a cycle, logs and falls back to the last memoized
    /// value (or `T::default()` before the first successful evaluation).
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(node = ?self.id, %err, "derived evaluation failed, returning last value");
                self.inner.memo.borrow().clone().unwrap_or_default()
            }
        }
    }

    /// Untracked read of the memo. Never registers a dependency and never
    /// re-evaluates; returns the last computed value even if stale.
    pub fn peek(&self) -> T {
        self.inner.memo.borrow().clone().unwrap_or_default()
    }

    fn evaluate(&self) -> Result<(), ReactiveError> {
        with_runtime(|rt| rt.begin_eval(self.id));
        let value = (self.inner.compute)();
        let cycle = with_runtime(|rt| rt.end_eval(self.id));
        if let Some(node) = cycle {
            // Stay dirty; the value computed on a cyclic pass is not trusted.
            return Err(ReactiveError::CyclicDependency { node });
        }
        *self.inner.memo.borrow_mut() = Some(value);
        with_runtime(|rt| rt.clear_dirty(self.id));
        Ok(())
    }

    /// Graph identity of this derived.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Remove this derived from the graph, scrubbing it from all dependency
    /// and subscriber sets.
    pub fn dispose(self) {
        with_runtime(|rt| rt.dispose(self.id));
    }
}

// =============================================================================
// Effect
// =============================================================================

/// Handle for a registered effect; `stop()` unsubscribes it.
pub struct EffectHandle {
    id: NodeId,
}

/// Create an effect.
///
/// Runs `run` once immediately to establish the initial dependency set.
/// Subsequent runs are queued by dependency writes and executed during
/// [`flush_effects`].
pub fn effect<F: Fn() + 'static>(run: F) -> EffectHandle {
    let run: Rc<dyn Fn()> = Rc::new(run);
    let id = with_runtime(|rt| {
        rt.alloc(NodeKind::Effect {
            run: Rc::clone(&run),
            queued: false,
        })
    });
    run_effect(id, &run);
    EffectHandle { id }
}

impl EffectHandle {
    /// Graph identity of this effect.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Unsubscribe: the effect will never run again.
    pub fn stop(self) {
        with_runtime(|rt| rt.dispose(self.id));
    }
}

fn run_effect(id: NodeId, run: &Rc<dyn Fn()>) {
    with_runtime(|rt| rt.begin_eval(id));
    run();
    let cycle = with_runtime(|rt| rt.end_eval(id));
    if let Some(node) = cycle {
        tracing::warn!(effect = ?id, ?node, "cyclic dependency hit during effect run");
    }
}

/// Run queued effects to quiescence.
///
/// An effect write may queue further effects; each drained batch counts as
/// one pass, bounded by [`MAX_SETTLE_PASSES`]. Returns the number of passes
/// taken.
pub fn flush_effects() -> Result<usize, ReactiveError> {
    let mut passes = 0usize;
    loop {
        let batch = with_runtime(|rt| rt.drain_pending());
        if batch.is_empty() {
            return Ok(passes);
        }
        passes += 1;
        if passes > MAX_SETTLE_PASSES {
            return Err(ReactiveError::Divergence { passes });
        }
        for (id, run) in batch {
            run_effect(id, &run);
        }
    }
}

/// True when at least one effect is queued.
pub fn has_pending_effects() -> bool {
    with_runtime(|rt| rt.has_pending())
}

/// Drop the whole reactive graph (test isolation).
pub fn reset() {
    runtime::reset_runtime();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn test_signal_get_set() {
        reset();
        let count = signal(1);
        assert_eq!(count.get(), 1);
        count.set(5);
        assert_eq!(count.get(), 5);
        assert_eq!(count.peek(), 5);
        count.update(|v| v + 1);
        assert_eq!(count.get(), 6);
    }

    #[test]
    fn test_derived_lazy_recompute() {
        reset();
        let runs = Rc::new(StdCell::new(0));
        let source = signal(1);

        let runs_inner = Rc::clone(&runs);
        let source_inner = source.clone();
        let doubled = derived(move || {
            runs_inner.set(runs_inner.get() + 1);
            source_inner.get() * 2
        });

        // Unobserved: no evaluation yet.
        assert_eq!(runs.get(), 0);

        assert_eq!(doubled.get(), 2);
        assert_eq!(runs.get(), 1);

        // N writes, zero reads: still one evaluation total.
        for value in 2..10 {
            source.set(value);
        }
        assert_eq!(runs.get(), 1);

        // Peek returns the stale memo without evaluating.
        assert_eq!(doubled.peek(), 2);
        assert_eq!(runs.get(), 1);

        // Read once: exactly one recomputation.
        assert_eq!(doubled.get(), 18);
        assert_eq!(runs.get(), 2);

        // Clean read: memoized.
        assert_eq!(doubled.get(), 18);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_equal_write_is_noop() {
        reset();
        let runs = Rc::new(StdCell::new(0));
        let source = signal(7);

        let runs_inner = Rc::clone(&runs);
        let source_inner = source.clone();
        let _watch = effect(move || {
            source_inner.get();
            runs_inner.set(runs_inner.get() + 1);
        });
        assert_eq!(runs.get(), 1); // initial run

        source.set(7);
        assert!(!has_pending_effects());
        flush_effects().unwrap();
        assert_eq!(runs.get(), 1);

        source.set(8);
        assert!(has_pending_effects());
        flush_effects().unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_effect_runs_once_immediately() {
        reset();
        let runs = Rc::new(StdCell::new(0));
        let runs_inner = Rc::clone(&runs);
        let _handle = effect(move || {
            runs_inner.set(runs_inner.get() + 1);
        });
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_effect_stop() {
        reset();
        let runs = Rc::new(StdCell::new(0));
        let source = signal(0);

        let runs_inner = Rc::clone(&runs);
        let source_inner = source.clone();
        let handle = effect(move || {
            source_inner.get();
            runs_inner.set(runs_inner.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        handle.stop();
        source.set(1);
        flush_effects().unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_transitive_invalidation() {
        reset();
        let source = signal(1);
        let source_inner = source.clone();
        let doubled = derived(move || source_inner.get() * 2);
        let doubled_inner = doubled.clone();
        let quadrupled = derived(move || doubled_inner.get() * 2);

        assert_eq!(quadrupled.get(), 4);
        source.set(3);
        assert_eq!(quadrupled.get(), 12);
    }

    #[test]
    fn test_self_cycle_detected() {
        reset();
        let holder: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));
        let holder_inner = Rc::clone(&holder);
        let cyclic = derived(move || {
            let inner = holder_inner.borrow().clone();
            match inner {
                Some(derived) => derived.get() + 1,
                None => 0,
            }
        });
        *holder.borrow_mut() = Some(cyclic.clone());

        match cyclic.try_get() {
            Err(ReactiveError::CyclicDependency { node }) => assert_eq!(node, cyclic.id()),
            other => panic!("expected cyclic dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_mutual_cycle_detected() {
        reset();
        let slot_a: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));
        let slot_b: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));

        let slot_b_inner = Rc::clone(&slot_b);
        let a = derived(move || {
            slot_b_inner
                .borrow()
                .clone()
                .map(|d| d.get())
                .unwrap_or(0)
                + 1
        });
        let slot_a_inner = Rc::clone(&slot_a);
        let b = derived(move || {
            slot_a_inner
                .borrow()
                .clone()
                .map(|d| d.get())
                .unwrap_or(0)
                + 1
        });
        *slot_a.borrow_mut() = Some(a.clone());
        *slot_b.borrow_mut() = Some(b.clone());

        assert!(matches!(
            a.try_get(),
            Err(ReactiveError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_divergence_bound() {
        reset();
        let source = signal(0u64);
        let source_inner = source.clone();
        let _handle = effect(move || {
            let value = source_inner.get();
            source_inner.set(value + 1);
        });

        match flush_effects() {
            Err(ReactiveError::Divergence { passes }) => {
                assert!(passes > MAX_SETTLE_PASSES);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_dependency_set_replaced_on_reeval() {
        reset();
        let gate = signal(true);
        let left = signal(1);
        let right = signal(100);

        let runs = Rc::new(StdCell::new(0));
        let runs_inner = Rc::clone(&runs);
        let gate_inner = gate.clone();
        let left_inner = left.clone();
        let right_inner = right.clone();
        let picked = derived(move || {
            runs_inner.set(runs_inner.get() + 1);
            if gate_inner.get() {
                left_inner.get()
            } else {
                right_inner.get()
            }
        });

        assert_eq!(picked.get(), 1);
        gate.set(false);
        assert_eq!(picked.get(), 100);
        let runs_so_far = runs.get();

        // `left` is no longer a dependency: writing it must not dirty.
        left.set(2);
        assert_eq!(picked.get(), 100);
        assert_eq!(runs.get(), runs_so_far);
    }

    #[test]
    fn test_dispose_scrubs_edges() {
        reset();
        let source = signal(1);
        let source_inner = source.clone();
        let doubled = derived(move || source_inner.get() * 2);
        assert_eq!(doubled.get(), 2);

        doubled.dispose();
        // Write after dispose must not panic or leak into a freed slot.
        source.set(5);
        flush_effects().unwrap();
    }
}
