//! Transition-table compaction.
//!
//! During construction an operator accumulates a flat map from representer
//! state tuples (one per child dimension) to the result states those
//! children produce. [`TransitionBuilder::build`] converts that map into a
//! nested dimension-by-dimension lookup structure keyed by state number.
//!
//! The projection that produced the representer states is lossy: a full
//! state can legitimately appear in the represented set of more than one
//! representer state in a dimension. Such "critical" states get a private
//! carved-out sub-table built from exactly the entries relevant to them;
//! every other represented state shares its bucket's sub-table. The
//! invariant this buys: every state number maps to exactly one branch at
//! every dimension it can reach.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

use crate::leaf::{LeafId, LeafRegistry, PredicatedLeaf};
use crate::production::Symbol;
use crate::repstate::{RepId, RepPool};
use crate::state::{ClosedState, StateNum};

/// One representer state per child dimension.
pub type RepTuple = SmallVec<[RepId; 4]>;

/// The flat transition map an operator fills while the fixed point runs.
#[derive(Debug)]
pub struct TransitionBuilder {
    arity: usize,
    transitions: BTreeMap<RepTuple, BTreeSet<StateNum>>,
}

impl TransitionBuilder {
    pub fn new(arity: usize) -> Self {
        debug_assert!(arity >= 1, "leaf operators have no transition table");
        TransitionBuilder {
            arity,
            transitions: BTreeMap::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Record that `tuple` reaches every state in `results`.
    pub fn add(&mut self, tuple: RepTuple, results: impl IntoIterator<Item = StateNum>) {
        debug_assert_eq!(tuple.len(), self.arity);
        self.transitions.entry(tuple).or_default().extend(results);
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Compile the accumulated map into its nested lookup structure.
    pub fn build<NT: Symbol, Op: Symbol>(
        &self,
        pool: &RepPool<NT, Op>,
        catalogue: &[ClosedState<NT, Op>],
        leaves: &mut LeafRegistry<NT, Op>,
    ) -> TransitionPlane {
        let entries: Vec<(&RepTuple, &BTreeSet<StateNum>)> = self.transitions.iter().collect();
        build_plane(&entries, 0, self.arity, pool, catalogue, leaves)
    }
}

/// One dimension of a compiled transition table. Interior dimensions map a
/// child's state number to the next dimension; the final dimension maps it
/// to a predicated leaf.
#[derive(Debug)]
pub enum TransitionPlane {
    Interior {
        index: FxHashMap<StateNum, u32>,
        planes: Vec<TransitionPlane>,
    },
    Final {
        index: FxHashMap<StateNum, u32>,
        leaves: Vec<LeafId>,
    },
}

impl TransitionPlane {
    pub fn is_final(&self) -> bool {
        matches!(self, TransitionPlane::Final { .. })
    }

    /// Follow an interior dimension with a child's state number.
    pub fn next(&self, state: StateNum) -> Option<&TransitionPlane> {
        match self {
            TransitionPlane::Interior { index, planes } => index
                .get(&state)
                .map(|&slot| &planes[slot as usize]),
            TransitionPlane::Final { .. } => None,
        }
    }

    /// Resolve the final dimension with the last child's state number.
    pub fn leaf_for(&self, state: StateNum) -> Option<LeafId> {
        match self {
            TransitionPlane::Final { index, leaves } => {
                index.get(&state).map(|&slot| leaves[slot as usize])
            }
            TransitionPlane::Interior { .. } => None,
        }
    }

    /// Is `state` a valid trailing child in this (final) dimension?
    pub fn accepts_variadic_child(&self, state: StateNum) -> bool {
        match self {
            TransitionPlane::Final { index, .. } => index.contains_key(&state),
            TransitionPlane::Interior { .. } => false,
        }
    }
}

fn build_plane<NT: Symbol, Op: Symbol>(
    entries: &[(&RepTuple, &BTreeSet<StateNum>)],
    dim: usize,
    arity: usize,
    pool: &RepPool<NT, Op>,
    catalogue: &[ClosedState<NT, Op>],
    leaves: &mut LeafRegistry<NT, Op>,
) -> TransitionPlane {
    let is_final = dim + 1 == arity;

    // Partition the entries by their representer state in this dimension.
    let buckets: BTreeSet<RepId> = entries.iter().map(|(tuple, _)| tuple[dim]).collect();

    // A state claimed by more than one bucket's representer state is
    // critical and needs its own branch.
    let mut claims: BTreeMap<StateNum, u32> = BTreeMap::new();
    for &rep in &buckets {
        for &s in pool.entry(rep).represented() {
            *claims.entry(s).or_insert(0) += 1;
        }
    }
    let critical: Vec<StateNum> = claims
        .iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(&s, _)| s)
        .collect();

    let mut processed: BTreeSet<StateNum> = critical.iter().copied().collect();

    // (states routed here, entries the branch is built from)
    let mut partitions: Vec<(Vec<StateNum>, Vec<(&RepTuple, &BTreeSet<StateNum>)>)> = Vec::new();

    for &s in &critical {
        let subset: Vec<_> = entries
            .iter()
            .filter(|(tuple, _)| pool.entry(tuple[dim]).represented().contains(&s))
            .copied()
            .collect();
        partitions.push((vec![s], subset));
    }

    // Remaining represented states share one branch per bucket.
    for &rep in &buckets {
        let pending: Vec<StateNum> = {
            let mut v: Vec<StateNum> = pool
                .entry(rep)
                .represented()
                .iter()
                .filter(|s| !processed.contains(s) && !catalogue[s.index()].is_empty())
                .copied()
                .collect();
            v.sort();
            v
        };
        if pending.is_empty() {
            continue;
        }
        processed.extend(pending.iter().copied());

        let subset: Vec<_> = entries
            .iter()
            .filter(|(tuple, _)| {
                pool.entry(tuple[dim])
                    .represented()
                    .iter()
                    .any(|s| pending.binary_search(s).is_ok())
            })
            .copied()
            .collect();
        partitions.push((pending, subset));
    }

    if is_final {
        let mut index = FxHashMap::default();
        let mut slots = Vec::new();
        for (states, subset) in partitions {
            let mut leaf = PredicatedLeaf::new();
            for (_, results) in &subset {
                for &r in results.iter() {
                    leaf.add_state(&catalogue[r.index()]);
                }
            }
            let slot = slots.len() as u32;
            slots.push(leaves.push(leaf));
            for s in states {
                index.insert(s, slot);
            }
        }
        TransitionPlane::Final {
            index,
            leaves: slots,
        }
    } else {
        let mut index = FxHashMap::default();
        let mut planes = Vec::new();
        for (states, subset) in partitions {
            let slot = planes.len() as u32;
            planes.push(build_plane(
                &subset,
                dim + 1,
                arity,
                pool,
                catalogue,
                leaves,
            ));
            for s in states {
                index.insert(s, slot);
            }
        }
        TransitionPlane::Interior { index, planes }
    }
}

#[cfg(test)]
#[path = "tests/plane.rs"]
mod tests;
