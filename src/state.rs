//! States: best-cost-per-nonterminal summaries with an open/closed lifecycle.
//!
//! A state starts open, accumulating pattern productions and closure
//! candidates while the driver evaluates a tree shape. `close()` consumes
//! the open state and returns the frozen form, so mutation after freeze is
//! unrepresentable rather than a runtime assertion.
//!
//! Structural identity (the canonicalization key) is defined on the
//! pre-close production map only (node tag, per-nonterminal production
//! identity, guard list). Closure derivations are excluded: they are
//! recomputable from that map plus the global closure set. Costs are
//! excluded too: a recursive pattern rediscovers the same production map
//! at ever-drifting costs, and those states must collapse or the fixed
//! point never terminates. Two states with the same production map get the
//! same cost map up to that drift, so the production map is the valid key.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::cost::Cost;
use crate::handle::HandleId;
use crate::production::{ArityKind, ProdId, Production, ProductionKind, Symbol};

/// A state's permanent number in the catalogue.
///
/// Two numbers are reserved process-wide: 0 is the error state, 1 the
/// null-child state. Real states are numbered in discovery order from 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateNum(pub(crate) u32);

impl StateNum {
    pub const ERROR: StateNum = StateNum(0);
    pub const NULL: StateNum = StateNum(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for StateNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A production recorded as a nonterminal's best match, with its cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CostedProduction {
    pub prod: ProdId,
    pub cost: Cost,
}

/// A closure candidate admitted to an open state but not yet materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingClosure<NT> {
    closure: ProdId,
    source: NT,
    cost: Cost,
}

/// A materialized closure derivation: evaluate the antecedent production,
/// then apply the closure's conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedClosure {
    pub closure: ProdId,
    pub cost: Cost,
    /// The production (pattern or earlier closure) deriving the source
    /// nonterminal in this state.
    pub antecedent: ProdId,
}

/// Returned when a production would mix fixed and variadic arity kinds in
/// one state; the table maps this to a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityConflict;

/// A state under construction. Mutations require strict cost improvement.
#[derive(Debug, Clone)]
pub struct OpenState<NT, Op> {
    node_type: Option<Op>,
    matched: HashMap<NT, CostedProduction>,
    pending: HashMap<NT, PendingClosure<NT>>,
    /// Sorted; the guard combination this state's productions presuppose.
    guards: Vec<HandleId>,
    arity_kind: Option<ArityKind>,
}

impl<NT: Symbol, Op: Symbol> OpenState<NT, Op> {
    pub fn new(node_type: Option<Op>) -> Self {
        OpenState {
            node_type,
            matched: HashMap::new(),
            pending: HashMap::new(),
            guards: Vec::new(),
            arity_kind: None,
        }
    }

    pub fn node_type(&self) -> Option<&Op> {
        self.node_type.as_ref()
    }

    pub fn guards(&self) -> &[HandleId] {
        &self.guards
    }

    pub fn has_guard(&self, guard: HandleId) -> bool {
        self.guards.binary_search(&guard).is_ok()
    }

    /// The guard list this state would have after adding `guard`.
    pub fn guards_with(&self, guard: HandleId) -> Vec<HandleId> {
        let mut guards = self.guards.clone();
        if let Err(pos) = guards.binary_search(&guard) {
            guards.insert(pos, guard);
        }
        guards
    }

    /// Copy this state into a sibling that additionally presupposes `guard`.
    pub fn with_guard(&self, guard: HandleId) -> Self {
        let mut copy = self.clone();
        copy.guards = self.guards_with(guard);
        copy
    }

    /// Best known cost for `nt`, counting admitted closure candidates.
    pub fn cost(&self, nt: &NT) -> Cost {
        match (self.matched.get(nt), self.pending.get(nt)) {
            (Some(m), Some(p)) => m.cost.min(p.cost),
            (Some(m), None) => m.cost,
            (None, Some(p)) => p.cost,
            (None, None) => Cost::INFINITE,
        }
    }

    /// True if no pattern production has been recorded.
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Record `prod` as the best production for its target.
    ///
    /// The caller must have established that `cost` strictly improves on the
    /// current best; the first production fixes the state's arity kind and a
    /// fixed/variadic mix is rejected.
    pub fn set_production(
        &mut self,
        pid: ProdId,
        prod: &Production<NT, Op>,
        cost: Cost,
    ) -> Result<(), ArityConflict> {
        debug_assert!(cost < self.cost(&prod.target), "cost must strictly improve");
        debug_assert!(
            !matches!(prod.kind, ProductionKind::Closure { .. }),
            "closures go through add_closure"
        );

        match self.arity_kind {
            None => self.arity_kind = Some(prod.arity_kind()),
            Some(kind) if kind != prod.arity_kind() => return Err(ArityConflict),
            Some(_) => {}
        }

        self.matched
            .insert(prod.target.clone(), CostedProduction { prod: pid, cost });
        // A cheaper pattern displaces any closure candidate for the target.
        if self
            .pending
            .get(&prod.target)
            .is_some_and(|p| p.cost >= cost)
        {
            self.pending.remove(&prod.target);
        }
        Ok(())
    }

    /// Admit `closure` as a candidate iff it strictly improves on the best
    /// known cost for its target. Returns whether it was novel; the caller
    /// uses this to detect the closure fixpoint.
    pub fn add_closure(&mut self, cid: ProdId, closure: &Production<NT, Op>) -> bool {
        let Some(source) = closure.source() else {
            return false;
        };

        let source_cost = self.cost(source);
        if source_cost.is_infinite() {
            return false;
        }

        let candidate = closure.own_cost.saturating_add(source_cost);
        if candidate < self.cost(&closure.target) {
            self.pending.insert(
                closure.target.clone(),
                PendingClosure {
                    closure: cid,
                    source: source.clone(),
                    cost: candidate,
                },
            );
            true
        } else {
            false
        }
    }

    /// Freeze the state: the open cost map becomes final, and every pending
    /// closure candidate is materialized once its source nonterminal has a
    /// producer in the closed map, wiring the antecedent link.
    pub fn close(self) -> ClosedState<NT, Op> {
        let OpenState {
            node_type,
            matched,
            mut pending,
            guards,
            arity_kind,
        } = self;

        let mut derived: HashMap<NT, DerivedClosure> = HashMap::new();

        while !pending.is_empty() {
            let ready: Vec<NT> = pending
                .iter()
                .filter_map(|(target, entry)| {
                    let producer = matched
                        .get(&entry.source)
                        .map(|m| m.prod)
                        .or_else(|| derived.get(&entry.source).map(|d| d.closure));
                    producer.map(|_| target.clone())
                })
                .collect();

            // Admission requires a reachable source, and cheaper cycles
            // cannot be admitted (a cycle's cost sum is non-negative), so
            // the pending set always drains.
            debug_assert!(!ready.is_empty(), "pending closure with unreachable source");
            if ready.is_empty() {
                break;
            }

            for target in ready {
                let entry = pending.remove(&target).expect("ready entry present");
                let antecedent = matched
                    .get(&entry.source)
                    .map(|m| m.prod)
                    .or_else(|| derived.get(&entry.source).map(|d| d.closure))
                    .expect("source producer present");
                derived.insert(
                    target,
                    DerivedClosure {
                        closure: entry.closure,
                        cost: entry.cost,
                        antecedent,
                    },
                );
            }
        }

        ClosedState {
            number: StateNum(u32::MAX),
            node_type,
            matched,
            derived,
            guards,
            arity_kind,
        }
    }
}

/// The structural identity of a state: its node tag, pre-close production
/// map, and guard list, in canonical sorted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonKey<NT, Op> {
    node_type: Option<Op>,
    entries: Vec<(NT, ProdId)>,
    guards: Vec<HandleId>,
}

/// A frozen state. Never mutated after canonicalization; `merge_from` is
/// only used on private copies inside predicated leaves.
#[derive(Debug, Clone)]
pub struct ClosedState<NT, Op> {
    pub(crate) number: StateNum,
    node_type: Option<Op>,
    matched: HashMap<NT, CostedProduction>,
    derived: HashMap<NT, DerivedClosure>,
    guards: Vec<HandleId>,
    pub arity_kind: Option<ArityKind>,
}

impl<NT: Symbol, Op: Symbol> ClosedState<NT, Op> {
    /// Rebuild a frozen state from serialized parts.
    pub(crate) fn from_parts(
        number: StateNum,
        node_type: Option<Op>,
        matched: impl IntoIterator<Item = (NT, CostedProduction)>,
        derived: impl IntoIterator<Item = (NT, DerivedClosure)>,
        guards: Vec<HandleId>,
        arity_kind: Option<ArityKind>,
    ) -> Self {
        ClosedState {
            number,
            node_type,
            matched: matched.into_iter().collect(),
            derived: derived.into_iter().collect(),
            guards,
            arity_kind,
        }
    }

    pub fn number(&self) -> StateNum {
        self.number
    }

    pub fn node_type(&self) -> Option<&Op> {
        self.node_type.as_ref()
    }

    pub fn guards(&self) -> &[HandleId] {
        &self.guards
    }

    /// Best cost for producing `nt`, or infinite if unreachable.
    pub fn cost(&self, nt: &NT) -> Cost {
        let matched = self.matched.get(nt).map_or(Cost::INFINITE, |m| m.cost);
        let derived = self.derived.get(nt).map_or(Cost::INFINITE, |d| d.cost);
        matched.min(derived)
    }

    pub fn reachable(&self, nt: &NT) -> bool {
        self.cost(nt).is_finite()
    }

    /// The production deriving `nt` in this state, if any. When a closure
    /// derivation undercuts a pattern, the closure wins; its antecedent
    /// chain leads back to the pattern that starts the evaluation.
    pub fn production_for(&self, nt: &NT) -> Option<ProdId> {
        match (self.matched.get(nt), self.derived.get(nt)) {
            (Some(m), Some(d)) => Some(if d.cost < m.cost { d.closure } else { m.prod }),
            (Some(m), None) => Some(m.prod),
            (None, Some(d)) => Some(d.closure),
            (None, None) => None,
        }
    }

    pub fn matched_for(&self, nt: &NT) -> Option<CostedProduction> {
        self.matched.get(nt).copied()
    }

    pub fn derived_for(&self, nt: &NT) -> Option<&DerivedClosure> {
        self.derived.get(nt)
    }

    /// True if no pattern production was recorded pre-close.
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Every nonterminal this state can produce, sorted.
    pub fn nonterminals(&self) -> Vec<&NT> {
        let mut nts: Vec<&NT> = self.matched.keys().chain(self.derived.keys()).collect();
        nts.sort();
        nts.dedup();
        nts
    }

    /// Pre-close entries in canonical order (for identity and images).
    pub fn matched_entries(&self) -> Vec<(&NT, CostedProduction)> {
        let mut entries: Vec<_> = self.matched.iter().map(|(nt, cp)| (nt, *cp)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Closure derivations in canonical order.
    pub fn derived_entries(&self) -> Vec<(&NT, DerivedClosure)> {
        let mut entries: Vec<_> = self.derived.iter().map(|(nt, d)| (nt, *d)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// The canonicalization key. Closures and costs are deliberately
    /// absent; see the module docs.
    pub fn canon_key(&self) -> CanonKey<NT, Op> {
        CanonKey {
            node_type: self.node_type.clone(),
            entries: self
                .matched_entries()
                .into_iter()
                .map(|(nt, cp)| (nt.clone(), cp.prod))
                .collect(),
            guards: self.guards.clone(),
        }
    }

    /// Fold another state's entries into this one: per nonterminal the
    /// lower cost wins, and closure derivations are unioned. Used when a
    /// predicated leaf aggregates states keyed to the same guard list; the
    /// incumbent's number is preserved.
    pub(crate) fn merge_from(&mut self, other: &ClosedState<NT, Op>) {
        for (nt, cp) in other.matched.iter() {
            if cp.cost < self.cost(nt) {
                self.matched.insert(nt.clone(), *cp);
            }
        }
        for (nt, d) in other.derived.iter() {
            if d.cost < self.cost(nt) {
                self.derived.insert(nt.clone(), *d);
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/state.rs"]
mod tests;
