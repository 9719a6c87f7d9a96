//! Pull-based derivation cache.
//!
//! Two derived nodes sit on top of the parameters:
//!
//! ```text
//! richness ─┐
//! climate ──┼──▶ AdjustedFeatures ──┐
//! pesticide ┘                       ├──▶ CropSummary
//! spring ───────────────────────────┤
//! buzz ─────────────────────────────┘
//! ```
//!
//! A parameter change stales every node that depends on it, directly or
//! transitively. Nothing recomputes until read. A cached value is tagged with
//! the masked parameter snapshot it was computed from, so a node only serves
//! a value whose inputs match the current parameters.
//!
//! Concurrent readers of the same snapshot share one computation: the first
//! reader installs an in-flight cell, the rest block on it and receive the
//! same `Arc`. A read of that snapshot from inside its own computation has
//! no value to wait for and fails with [`ModelError::ReentrantRead`].

use crate::error::ModelError;
use crate::params::{ChangeSet, ParameterListener, ParameterName, ScenarioParameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// The derived nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    AdjustedFeatures,
    CropSummary,
}

impl NodeKind {
    pub const ALL: [NodeKind; 2] = [NodeKind::AdjustedFeatures, NodeKind::CropSummary];

    /// Parameters read directly by this node's computation.
    pub fn direct_dependencies(&self) -> &'static [ParameterName] {
        match self {
            NodeKind::AdjustedFeatures => &[
                ParameterName::Richness,
                ParameterName::ClimateScenario,
                ParameterName::PesticidePressure,
            ],
            NodeKind::CropSummary => &[
                ParameterName::SpringVulnerability,
                ParameterName::BuzzVulnerability,
            ],
        }
    }

    /// Nodes this node reads.
    pub fn upstream(&self) -> &'static [NodeKind] {
        match self {
            NodeKind::AdjustedFeatures => &[],
            NodeKind::CropSummary => &[NodeKind::AdjustedFeatures],
        }
    }

    /// Nodes that read this node.
    pub fn downstream(&self) -> &'static [NodeKind] {
        match self {
            NodeKind::AdjustedFeatures => &[NodeKind::CropSummary],
            NodeKind::CropSummary => &[],
        }
    }

    /// True if a change to `name` reaches this node.
    pub fn depends_on(&self, name: ParameterName) -> bool {
        self.direct_dependencies().contains(&name)
            || self.upstream().iter().any(|up| up.depends_on(name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::AdjustedFeatures => "adjusted_features",
            NodeKind::CropSummary => "crop_summary",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a node's cached value may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Stale,
    Clean,
}

/// The parameters a node depends on, masked and bit-exact.
///
/// Parameters outside the node's transitive dependencies are zeroed, so a
/// change to them does not alter the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey([u64; 5]);

impl SnapshotKey {
    pub fn for_node(kind: NodeKind, params: &ScenarioParameters) -> Self {
        let mut slots = [0u64; 5];
        for (slot, name) in slots.iter_mut().zip(ParameterName::ALL) {
            if kind.depends_on(name) {
                *slot = parameter_bits(params, name);
            }
        }
        SnapshotKey(slots)
    }
}

fn parameter_bits(params: &ScenarioParameters, name: ParameterName) -> u64 {
    match name {
        ParameterName::Richness => params.richness as u64,
        ParameterName::ClimateScenario => params.climate as u64,
        ParameterName::PesticidePressure => params.pesticide_pressure.bits(),
        ParameterName::SpringVulnerability => params.spring_vulnerability.bits(),
        ParameterName::BuzzVulnerability => params.buzz_vulnerability.bits(),
    }
}

// =============================================================================
// NODES
// =============================================================================

type Cell<T> = Arc<OnceLock<Arc<T>>>;

struct InFlight<T> {
    key: SnapshotKey,
    cell: Cell<T>,
    /// Thread running the computation
    owner: ThreadId,
}

struct NodeSlot<T> {
    state: NodeState,
    cached: Option<(SnapshotKey, Arc<T>)>,
    in_flight: Option<InFlight<T>>,
}

/// One cached derivation.
pub struct DerivedNode<T> {
    kind: NodeKind,
    slot: Mutex<NodeSlot<T>>,
    computations: AtomicU64,
}

impl<T> DerivedNode<T> {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            slot: Mutex::new(NodeSlot {
                state: NodeState::Stale,
                cached: None,
                in_flight: None,
            }),
            computations: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> NodeState {
        self.lock().state
    }

    /// Number of times the computation has run.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Marks the node stale. The cached value stays until replaced but is
    /// no longer served.
    pub fn invalidate(&self) {
        let mut slot = self.lock();
        if slot.state == NodeState::Clean {
            tracing::debug!("Node {} marked stale", self.kind);
        }
        slot.state = NodeState::Stale;
    }

    /// Returns the value for `params`, computing it if needed.
    ///
    /// # Errors
    /// [`ModelError::ReentrantRead`] if called from inside this node's own
    /// computation for the same snapshot.
    pub fn get_or_compute<F>(&self, params: &ScenarioParameters, compute: F) -> Result<Arc<T>, ModelError>
    where
        F: FnOnce() -> T,
    {
        let key = SnapshotKey::for_node(self.kind, params);
        let me = thread::current().id();

        let cell = {
            let mut slot = self.lock();
            if slot.state == NodeState::Clean {
                if let Some((cached_key, value)) = &slot.cached {
                    if *cached_key == key {
                        return Ok(Arc::clone(value));
                    }
                }
            }
            let joinable = match &slot.in_flight {
                Some(flight) if flight.key == key && flight.owner == me => {
                    tracing::warn!("Re-entrant read of {} during its own computation", self.kind);
                    return Err(ModelError::ReentrantRead(self.kind));
                }
                Some(flight) if flight.key == key => Some(Arc::clone(&flight.cell)),
                _ => None,
            };
            joinable.unwrap_or_else(|| {
                let cell: Cell<T> = Arc::new(OnceLock::new());
                slot.in_flight = Some(InFlight {
                    key,
                    cell: Arc::clone(&cell),
                    owner: me,
                });
                cell
            })
        };
        let _unwind = UnwindGuard { node: self, cell: &cell };

        // Lock released: other readers of this key block inside get_or_init
        let value = Arc::clone(cell.get_or_init(|| {
            let started = Instant::now();
            let value = Arc::new(compute());
            let count = self.computations.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                "Computed {} (#{}) in {:?}",
                self.kind,
                count,
                started.elapsed()
            );
            value
        }));

        let mut slot = self.lock();
        if slot.owns_flight(&cell) {
            slot.in_flight = None;
            slot.cached = Some((key, Arc::clone(&value)));
            slot.state = NodeState::Clean;
        }
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, NodeSlot<T>> {
        // Slot updates are single assignments; a poisoned lock still holds
        // a consistent slot.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> NodeSlot<T> {
    fn owns_flight(&self, cell: &Cell<T>) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|flight| Arc::ptr_eq(&flight.cell, cell))
    }
}

/// Clears a flight whose computation panicked, so the owning thread can
/// read the node again.
struct UnwindGuard<'a, T> {
    node: &'a DerivedNode<T>,
    cell: &'a Cell<T>,
}

impl<T> Drop for UnwindGuard<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut slot = self.node.lock();
            if slot.owns_flight(self.cell) {
                slot.in_flight = None;
            }
        }
    }
}

impl<T> fmt::Debug for DerivedNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedNode")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("computations", &self.computations())
            .finish()
    }
}

// =============================================================================
// CACHE
// =============================================================================

/// The derivation graph: one node per [`NodeKind`].
#[derive(Debug)]
pub struct ReactiveCache<A, C> {
    adjusted: DerivedNode<A>,
    crops: DerivedNode<C>,
}

impl<A, C> Default for ReactiveCache<A, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, C> ReactiveCache<A, C> {
    pub fn new() -> Self {
        Self {
            adjusted: DerivedNode::new(NodeKind::AdjustedFeatures),
            crops: DerivedNode::new(NodeKind::CropSummary),
        }
    }

    pub fn adjusted(&self) -> &DerivedNode<A> {
        &self.adjusted
    }

    pub fn crops(&self) -> &DerivedNode<C> {
        &self.crops
    }

    /// Stales `kind` and everything downstream of it.
    pub fn invalidate(&self, kind: NodeKind) {
        match kind {
            NodeKind::AdjustedFeatures => self.adjusted.invalidate(),
            NodeKind::CropSummary => self.crops.invalidate(),
        }
        for downstream in kind.downstream() {
            self.invalidate(*downstream);
        }
    }

    /// Stales every node reached by a change.
    pub fn invalidate_for(&self, changes: &ChangeSet) {
        for kind in NodeKind::ALL {
            if kind.direct_dependencies().iter().any(|p| changes.contains(*p)) {
                self.invalidate(kind);
            }
        }
    }

    pub fn node_state(&self, kind: NodeKind) -> NodeState {
        match kind {
            NodeKind::AdjustedFeatures => self.adjusted.state(),
            NodeKind::CropSummary => self.crops.state(),
        }
    }

    pub fn computations(&self, kind: NodeKind) -> u64 {
        match kind {
            NodeKind::AdjustedFeatures => self.adjusted.computations(),
            NodeKind::CropSummary => self.crops.computations(),
        }
    }
}

impl<A, C> ParameterListener for ReactiveCache<A, C>
where
    A: Send + Sync,
    C: Send + Sync,
{
    fn parameters_changed(&self, changes: &ChangeSet, _current: &ScenarioParameters) {
        self.invalidate_for(changes);
    }
}
