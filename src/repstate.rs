//! Representer states: lossy per-operator-dimension projections of states.
//!
//! A representer state keeps only the (nonterminal, cost) pairs that some
//! pattern of one operator actually reads at one child position. Many full
//! states collapse to one representer state whenever they agree on the
//! costs that matter there, which is what keeps transition tables small.
//!
//! Representer states are interned in a table-global pool so that the
//! transition builder can ask, for any canonical instance, which full
//! states it represents; critical-state splitting needs that information.

use hashbrown::HashMap;
use rustc_hash::FxHashSet;

use crate::cost::Cost;
use crate::production::Symbol;
use crate::state::StateNum;

/// Index of a canonical representer state in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepId(u32);

impl RepId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The structural identity of a representer state: the originating state's
/// node tag plus the restricted cost vector in sorted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepKey<NT, Op> {
    pub node_type: Option<Op>,
    /// Sorted by nonterminal; only finite costs appear.
    pub costs: Vec<(NT, Cost)>,
}

/// A canonical representer state plus the set of full states it represents.
#[derive(Debug)]
pub struct RepEntry<NT, Op> {
    pub node_type: Option<Op>,
    costs: Vec<(NT, Cost)>,
    represented: FxHashSet<StateNum>,
}

impl<NT: Symbol, Op: Symbol> RepEntry<NT, Op> {
    /// Cost of `nt` in this projection, or infinite if the dimension's
    /// patterns never read it.
    pub fn cost(&self, nt: &NT) -> Cost {
        match self.costs.binary_search_by(|(k, _)| k.cmp(nt)) {
            Ok(pos) => self.costs[pos].1,
            Err(_) => Cost::INFINITE,
        }
    }

    pub fn costs(&self) -> &[(NT, Cost)] {
        &self.costs
    }

    pub fn represented(&self) -> &FxHashSet<StateNum> {
        &self.represented
    }
}

/// The canonical pool. Interning is keyed by structural equality, so two
/// projections that agree on every relevant (nonterminal, cost) pair share
/// one entry, and that entry accumulates both originating states.
#[derive(Debug, Default)]
pub struct RepPool<NT, Op> {
    entries: Vec<RepEntry<NT, Op>>,
    index: HashMap<RepKey<NT, Op>, RepId>,
}

impl<NT: Symbol, Op: Symbol> RepPool<NT, Op> {
    pub fn new() -> Self {
        RepPool {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Intern a projection, returning the canonical id.
    pub fn intern(&mut self, key: RepKey<NT, Op>) -> RepId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = RepId(self.entries.len() as u32);
        self.entries.push(RepEntry {
            node_type: key.node_type.clone(),
            costs: key.costs.clone(),
            represented: FxHashSet::default(),
        });
        self.index.insert(key, id);
        id
    }

    /// Record that `state` projects onto the canonical instance `id`.
    pub fn add_represented(&mut self, id: RepId, state: StateNum) {
        self.entries[id.index()].represented.insert(state);
    }

    pub fn entry(&self, id: RepId) -> &RepEntry<NT, Op> {
        &self.entries[id.index()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(nt_costs: &[(&'static str, u64)]) -> RepKey<&'static str, &'static str> {
        RepKey {
            node_type: Some("Lit"),
            costs: nt_costs
                .iter()
                .map(|&(nt, c)| (nt, Cost::new(c as u32)))
                .collect(),
        }
    }

    #[test]
    fn equal_projections_intern_to_one_entry() {
        let mut pool = RepPool::new();
        let a = pool.intern(key(&[("Int", 1)]));
        let b = pool.intern(key(&[("Int", 1)]));
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn differing_costs_stay_distinct() {
        let mut pool = RepPool::new();
        let a = pool.intern(key(&[("Int", 1)]));
        let b = pool.intern(key(&[("Int", 2)]));
        assert_ne!(a, b);
    }

    #[test]
    fn node_type_is_part_of_identity() {
        let mut pool = RepPool::new();
        let a = pool.intern(key(&[("Int", 1)]));
        let b = pool.intern(RepKey {
            node_type: Some("Other"),
            costs: vec![("Int", Cost::new(1))],
        });
        assert_ne!(a, b);
    }

    #[test]
    fn represented_states_accumulate_across_interning() {
        let mut pool = RepPool::new();
        let a = pool.intern(key(&[("Int", 1)]));
        pool.add_represented(a, StateNum(2));
        let b = pool.intern(key(&[("Int", 1)]));
        pool.add_represented(b, StateNum(3));
        assert_eq!(pool.entry(a).represented().len(), 2);
    }

    #[test]
    fn cost_lookup_uses_binary_search() {
        let mut pool = RepPool::new();
        let a = pool.intern(key(&[("Int", 1), ("Short", 3)]));
        let entry = pool.entry(a);
        assert_eq!(entry.cost(&"Int"), Cost::new(1));
        assert_eq!(entry.cost(&"Short"), Cost::new(3));
        assert_eq!(entry.cost(&"String"), Cost::INFINITE);
    }
}
