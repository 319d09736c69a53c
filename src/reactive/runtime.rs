//! Reactive graph runtime - node arena and dependency bookkeeping.
//!
//! The runtime lives in a thread_local and holds the graph structure only:
//! dependency edges, dirty flags, evaluation markers, and the pending effect
//! queue. Values stay typed inside the `Signal`/`Derived` handles.
//!
//! Nodes are arena slots with a free pool for O(1) reuse. Edges are stored by
//! `NodeId` in both directions, never by owning reference, so disposing a node
//! scrubs it from every other node's sets without dangling.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Identity of a node in the reactive graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

pub(crate) enum NodeKind {
    Signal,
    Derived { dirty: bool, evaluating: bool },
    Effect { run: Rc<dyn Fn()>, queued: bool },
}

pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    /// Nodes this node read during its last evaluation.
    pub(crate) deps: HashSet<NodeId>,
    /// Nodes that read this node during their last evaluation.
    pub(crate) subs: HashSet<NodeId>,
}

#[derive(Default)]
pub(crate) struct Runtime {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    /// Stack of evaluations currently in flight (deriveds and effects).
    observers: Vec<NodeId>,
    /// Per-evaluation record of a cycle hit, innermost scope last.
    cycle_scopes: Vec<Option<NodeId>>,
    /// Effects waiting for the next settlement pass.
    pending: Vec<NodeId>,
}

impl Runtime {
    pub(crate) fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            deps: HashSet::new(),
            subs: HashSet::new(),
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                index
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        NodeId(index)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Register the in-flight evaluation (if any) as a dependent of `id`.
    ///
    /// The edge is recorded in both directions, at most once per evaluation
    /// pass (the sets dedupe).
    pub(crate) fn track(&mut self, id: NodeId) {
        let Some(&observer) = self.observers.last() else {
            return;
        };
        if observer == id || self.node(id).is_none() {
            return;
        }
        if let Some(node) = self.node_mut(id) {
            node.subs.insert(observer);
        }
        if let Some(node) = self.node_mut(observer) {
            node.deps.insert(id);
        }
    }

    /// Enter an evaluation: drop stale dependency edges (they are re-recorded
    /// by the reads that follow), set the evaluating marker, push scopes.
    pub(crate) fn begin_eval(&mut self, id: NodeId) {
        let old_deps: Vec<NodeId> = self
            .node_mut(id)
            .map(|node| node.deps.drain().collect())
            .unwrap_or_default();
        for dep in old_deps {
            if let Some(node) = self.node_mut(dep) {
                node.subs.remove(&id);
            }
        }
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Derived { evaluating, .. } = &mut node.kind {
                *evaluating = true;
            }
        }
        self.observers.push(id);
        self.cycle_scopes.push(None);
    }

    /// Leave an evaluation. Returns the node on which a cycle was hit during
    /// this evaluation window, if any; a hit propagates to the enclosing
    /// scope so a transitive cycle fails every evaluation on the path.
    pub(crate) fn end_eval(&mut self, id: NodeId) -> Option<NodeId> {
        self.observers.pop();
        let hit = self.cycle_scopes.pop().flatten();
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Derived { evaluating, .. } = &mut node.kind {
                *evaluating = false;
            }
        }
        if let Some(hit_node) = hit {
            if let Some(outer) = self.cycle_scopes.last_mut() {
                outer.get_or_insert(hit_node);
            }
        }
        hit
    }

    /// Record that a tracked read hit a node already being evaluated.
    pub(crate) fn mark_cycle(&mut self, node: NodeId) {
        if let Some(scope) = self.cycle_scopes.last_mut() {
            scope.get_or_insert(node);
        }
    }

    pub(crate) fn is_evaluating(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).map(|node| &node.kind),
            Some(NodeKind::Derived {
                evaluating: true,
                ..
            })
        )
    }

    pub(crate) fn is_dirty(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).map(|node| &node.kind),
            Some(NodeKind::Derived { dirty: true, .. })
        )
    }

    pub(crate) fn clear_dirty(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Derived { dirty, .. } = &mut node.kind {
                *dirty = false;
            }
        }
    }

    /// Propagate a write: mark dependent deriveds dirty transitively and
    /// queue dependent effects. Nothing is recomputed here - invalidation
    /// stays lazy until the value is observed again.
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        let mut stack: Vec<NodeId> = self
            .node(id)
            .map(|node| node.subs.iter().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            let mut queue_effect = false;
            let mut descend: Vec<NodeId> = Vec::new();
            if let Some(node) = self.node_mut(next) {
                match &mut node.kind {
                    NodeKind::Derived { dirty, .. } if !*dirty => {
                        *dirty = true;
                        descend.extend(node.subs.iter().copied());
                    }
                    NodeKind::Effect { queued, .. } if !*queued => {
                        *queued = true;
                        queue_effect = true;
                    }
                    _ => {}
                }
            }
            if queue_effect {
                self.pending.push(next);
            }
            stack.extend(descend);
        }
    }

    /// Take the currently pending effects as one settlement batch.
    pub(crate) fn drain_pending(&mut self) -> Vec<(NodeId, Rc<dyn Fn()>)> {
        let pending = std::mem::take(&mut self.pending);
        let mut batch = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(node) = self.node_mut(id) {
                if let NodeKind::Effect { run, queued } = &mut node.kind {
                    *queued = false;
                    batch.push((id, Rc::clone(run)));
                }
            }
        }
        batch
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Remove a node and scrub it from every other node's edge sets.
    pub(crate) fn dispose(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0).and_then(|slot| slot.take()) else {
            return;
        };
        for dep in node.deps {
            if let Some(other) = self.node_mut(dep) {
                other.subs.remove(&id);
            }
        }
        for sub in node.subs {
            if let Some(other) = self.node_mut(sub) {
                other.deps.remove(&id);
            }
        }
        self.pending.retain(|&pending| pending != id);
        self.free.push(id.0);
    }
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::default());
}

/// Run a closure against the thread-local runtime.
///
/// Callers must not invoke user code (closures that read or write the graph)
/// while inside; the borrow is held for the duration.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|runtime| f(&mut runtime.borrow_mut()))
}

/// Drop the whole runtime (test isolation).
pub(crate) fn reset_runtime() {
    RUNTIME.with(|runtime| *runtime.borrow_mut() = Runtime::default());
}
