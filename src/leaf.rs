//! Predicated leaves: the final-dimension cells of a transition table.
//!
//! A leaf holds one constituent state per reachable combination of
//! satisfied guard predicates. Candidate construction generates every
//! non-empty guard combination that can occur, so label-time resolution is
//! an exact lookup of the satisfied subset; only the empty combination can
//! miss.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::handle::HandleId;
use crate::production::{ArityKind, Symbol};
use crate::state::ClosedState;

/// Index of a leaf in the table's registry. This is the opaque
/// transition-table-leaf reference stored on labeled nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeafId(pub(crate) u32);

impl LeafId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A composite cell keyed by sorted guard-predicate lists.
#[derive(Debug, Clone)]
pub struct PredicatedLeaf<NT, Op> {
    /// Constituents keyed by the exact guard combination they presuppose.
    /// Values are private merged copies; the representative state number of
    /// the first contributor is preserved.
    variants: BTreeMap<Vec<HandleId>, ClosedState<NT, Op>>,
    /// Sorted, deduplicated master list of every guard relevant here.
    guards: Vec<HandleId>,
    /// Composite arity kind; a fixed/variadic mix resolves to variadic.
    pub arity_kind: Option<ArityKind>,
}

impl<NT: Symbol, Op: Symbol> PredicatedLeaf<NT, Op> {
    pub fn new() -> Self {
        PredicatedLeaf {
            variants: BTreeMap::new(),
            guards: Vec::new(),
            arity_kind: None,
        }
    }

    pub fn from_states<'a, I>(states: I) -> Self
    where
        I: IntoIterator<Item = &'a ClosedState<NT, Op>>,
        NT: 'a,
        Op: 'a,
    {
        let mut leaf = PredicatedLeaf::new();
        for state in states {
            leaf.add_state(state);
        }
        leaf
    }

    /// Fold a state into the cell. A state keyed to a new guard combination
    /// becomes a fresh constituent; one keyed to an existing combination is
    /// merged in, keeping per-nonterminal whichever entry costs less and
    /// unioning closure derivations.
    pub fn add_state(&mut self, state: &ClosedState<NT, Op>) {
        if state.is_empty() {
            return;
        }

        self.arity_kind = match (self.arity_kind, state.arity_kind) {
            (None, kind) => kind,
            (kind, None) => kind,
            (Some(a), Some(b)) if a == b => Some(a),
            _ => Some(ArityKind::Variadic),
        };

        match self.variants.get_mut(state.guards()) {
            Some(existing) => existing.merge_from(state),
            None => {
                self.variants.insert(state.guards().to_vec(), state.clone());
            }
        }

        for &g in state.guards() {
            if let Err(pos) = self.guards.binary_search(&g) {
                self.guards.insert(pos, g);
            }
        }
    }

    /// The master guard list a labeler must evaluate, sorted.
    pub fn guards(&self) -> &[HandleId] {
        &self.guards
    }

    /// Look up the constituent for an exactly-matching satisfied subset.
    /// A miss is only possible for the empty subset.
    pub fn resolve(&self, satisfied: &[HandleId]) -> Option<&ClosedState<NT, Op>> {
        self.variants.get(satisfied)
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Constituents in canonical (guard-list) order.
    pub fn variants(&self) -> impl Iterator<Item = (&[HandleId], &ClosedState<NT, Op>)> {
        self.variants.iter().map(|(k, v)| (k.as_slice(), v))
    }
}

impl<NT: Symbol, Op: Symbol> Default for PredicatedLeaf<NT, Op> {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat registry of every leaf in a table, addressed by [`LeafId`].
#[derive(Debug, Default)]
pub struct LeafRegistry<NT, Op> {
    leaves: Vec<PredicatedLeaf<NT, Op>>,
}

impl<NT: Symbol, Op: Symbol> LeafRegistry<NT, Op> {
    pub fn new() -> Self {
        LeafRegistry { leaves: Vec::new() }
    }

    pub fn push(&mut self, leaf: PredicatedLeaf<NT, Op>) -> LeafId {
        let id = LeafId(self.leaves.len() as u32);
        self.leaves.push(leaf);
        id
    }

    pub fn get(&self, id: LeafId) -> &PredicatedLeaf<NT, Op> {
        &self.leaves[id.index()]
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredicatedLeaf<NT, Op>> {
        self.leaves.iter()
    }
}
