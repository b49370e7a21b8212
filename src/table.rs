//! The production table: grammar registry, fixed-point driver, and the
//! frozen catalogue of canonical states.
//!
//! Lifecycle: `new → register* → generate_states() → frozen`. Registration
//! and construction are single-threaded; once frozen, every structure is
//! immutable and safe for unbounded concurrent read-only use.

use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::cost::Cost;
use crate::handle::{HandleId, HandleRegistry};
use crate::leaf::{LeafId, LeafRegistry, PredicatedLeaf};
use crate::metrics::{BuildMetrics, BuildReport};
use crate::operator::{Operator, OperatorBody};
use crate::plane::RepTuple;
use crate::production::{ProdId, Production, ProductionKind, Symbol};
use crate::repstate::{RepId, RepKey, RepPool};
use crate::state::{CanonKey, ClosedState, OpenState, StateNum};

#[cfg(feature = "tracing")]
use crate::trace::{debug, info, trace};

/// Fatal configuration errors surfaced by registration or
/// `generate_states()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError<NT, Op> {
    /// A state was fed both fixed-arity and variadic productions.
    MixedArity { node_type: Option<Op>, target: NT },
    /// Registering this closure would complete a cycle of zero-cost
    /// closures, which the closure fixpoint could not terminate on.
    ZeroCostClosureCycle { target: NT, source: NT },
    /// An operator finished construction with neither a leaf nor a
    /// compiled table; typically a child nonterminal has no productions.
    EmptyOperator { node_type: Op, arity: usize },
    /// `generate_states()` was invoked on an already-frozen table.
    AlreadyGenerated,
    /// An operation that requires a frozen table ran before generation.
    NotGenerated,
    /// A registration call arrived after the table froze.
    Frozen,
}

impl<NT: fmt::Debug, Op: fmt::Debug> fmt::Display for GrammarError<NT, Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::MixedArity { node_type, target } => write!(
                f,
                "cannot mix variadic and fixed-arity productions for {:?} (node type {:?})",
                target, node_type
            ),
            GrammarError::ZeroCostClosureCycle { target, source } => write!(
                f,
                "closure {:?} <- {:?} completes a zero-cost closure cycle",
                target, source
            ),
            GrammarError::EmptyOperator { node_type, arity } => write!(
                f,
                "operator {:?}/{} has no reachable transitions",
                node_type, arity
            ),
            GrammarError::AlreadyGenerated => write!(f, "state generation already ran"),
            GrammarError::NotGenerated => write!(f, "table has not been generated"),
            GrammarError::Frozen => write!(f, "cannot register rules on a frozen table"),
        }
    }
}

impl<NT: fmt::Debug, Op: fmt::Debug> std::error::Error for GrammarError<NT, Op> {}

/// The BURS grammar and its compiled transition tables.
pub struct ProductionTable<NT, Op> {
    /// All registered productions; identity is arena index.
    productions: Vec<Production<NT, Op>>,
    /// Closures in registration order, applied by the closure fixpoint.
    closure_order: Vec<ProdId>,
    null_order: Vec<ProdId>,
    error_order: Vec<ProdId>,
    patterns_by_tag: BTreeMap<Op, Vec<ProdId>>,
    /// Every nonterminal the grammar mentions; the projection scan set.
    nonterminals: BTreeSet<NT>,
    /// (source, target) edges of zero-cost closures, for cycle rejection.
    zero_closures: Vec<(NT, NT)>,
    handles: HandleRegistry,

    /// Canonical states in discovery order; index is the state number.
    states: Vec<ClosedState<NT, Op>>,
    canon: HashMap<CanonKey<NT, Op>, StateNum>,
    pool: RepPool<NT, Op>,
    operators: BTreeMap<Op, Vec<Option<Operator<Op>>>>,
    leaves: LeafRegistry<NT, Op>,
    metrics: BuildMetrics,
    frozen: bool,
}

impl<NT: Symbol, Op: Symbol> ProductionTable<NT, Op> {
    pub fn new() -> Self {
        ProductionTable {
            productions: Vec::new(),
            closure_order: Vec::new(),
            null_order: Vec::new(),
            error_order: Vec::new(),
            patterns_by_tag: BTreeMap::new(),
            nonterminals: BTreeSet::new(),
            zero_closures: Vec::new(),
            handles: HandleRegistry::new(),
            states: Vec::new(),
            canon: HashMap::new(),
            pool: RepPool::new(),
            operators: BTreeMap::new(),
            leaves: LeafRegistry::new(),
            metrics: BuildMetrics::new(),
            frozen: false,
        }
    }

    // ---------------------------------------------------------------- handles

    /// Intern a guard/callback name into an opaque handle.
    pub fn intern_handle(&mut self, name: &str) -> HandleId {
        self.handles.intern(name)
    }

    /// Resolve a handle back to its registered name.
    pub fn handle_name(&self, handle: HandleId) -> Option<&str> {
        self.handles.resolve(handle)
    }

    // ----------------------------------------------------------- registration

    /// Add a pattern-matching production.
    ///
    /// `child_types` are the nonterminals the subtree's children must
    /// produce; with `is_variadic`, the final entry covers one-or-more
    /// trailing children.
    #[allow(clippy::too_many_arguments)]
    pub fn add_pattern_match(
        &mut self,
        target: NT,
        node_type: Op,
        cost: u32,
        guard: Option<HandleId>,
        pre_callback: Option<HandleId>,
        post_callback: Option<HandleId>,
        is_variadic: bool,
        child_types: Vec<NT>,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        if self.frozen {
            return Err(GrammarError::Frozen);
        }

        self.nonterminals.insert(target.clone());
        for child in &child_types {
            self.nonterminals.insert(child.clone());
        }

        let arity = child_types.len();
        let prod = Production::pattern(
            target,
            node_type.clone(),
            cost,
            guard,
            pre_callback,
            post_callback,
            is_variadic,
            child_types,
        );
        let pid = self.push_production(prod);

        self.patterns_by_tag
            .entry(node_type.clone())
            .or_default()
            .push(pid);
        self.ensure_operator(&node_type, arity);
        Ok(pid)
    }

    /// Pattern with unit callbacks elided.
    pub fn add_pattern(
        &mut self,
        target: NT,
        node_type: Op,
        cost: u32,
        child_types: Vec<NT>,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        self.add_pattern_match(target, node_type, cost, None, None, None, false, child_types)
    }

    /// Variadic pattern with callbacks elided.
    pub fn add_variadic_pattern(
        &mut self,
        target: NT,
        node_type: Op,
        cost: u32,
        child_types: Vec<NT>,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        self.add_pattern_match(target, node_type, cost, None, None, None, true, child_types)
    }

    /// Add a nonterminal-to-nonterminal closure.
    pub fn add_closure(
        &mut self,
        target: NT,
        source: NT,
        cost: u32,
        post_callback: Option<HandleId>,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        if self.frozen {
            return Err(GrammarError::Frozen);
        }

        if cost == 0 {
            // A cycle of zero-cost closures would never converge; refuse it
            // here rather than diverging inside close().
            if source == target || self.zero_path_exists(&target, &source) {
                return Err(GrammarError::ZeroCostClosureCycle { target, source });
            }
            self.zero_closures.push((source.clone(), target.clone()));
        }

        self.nonterminals.insert(target.clone());
        self.nonterminals.insert(source.clone());

        let pid = self.push_production(Production::closure(target, source, cost, post_callback));
        self.closure_order.push(pid);
        Ok(pid)
    }

    /// Unit-cost closure without a callback.
    pub fn add_closure_unit(
        &mut self,
        target: NT,
        source: NT,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        self.add_closure(target, source, 1, None)
    }

    /// Add a production that derives an absent (null) child subtree.
    pub fn add_null_pointer_production(
        &mut self,
        target: NT,
        cost: u32,
        post_callback: Option<HandleId>,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        if self.frozen {
            return Err(GrammarError::Frozen);
        }
        self.nonterminals.insert(target.clone());
        let pid = self.push_production(Production::null_leaf(target, cost, post_callback));
        self.null_order.push(pid);
        Ok(pid)
    }

    /// Install a fallback production on the reserved error state.
    pub fn add_error_handler(
        &mut self,
        target: NT,
        callback: HandleId,
    ) -> Result<ProdId, GrammarError<NT, Op>> {
        if self.frozen {
            return Err(GrammarError::Frozen);
        }
        self.nonterminals.insert(target.clone());
        let pid = self.push_production(Production::error_handler(target, callback));
        self.error_order.push(pid);
        Ok(pid)
    }

    fn push_production(&mut self, prod: Production<NT, Op>) -> ProdId {
        let pid = ProdId(self.productions.len() as u32);
        self.productions.push(prod);
        pid
    }

    fn ensure_operator(&mut self, tag: &Op, arity: usize) {
        let slots = self.operators.entry(tag.clone()).or_default();
        if slots.len() <= arity {
            slots.resize_with(arity + 1, || None);
        }
        if slots[arity].is_none() {
            slots[arity] = Some(Operator::new(tag.clone(), arity));
        }
    }

    /// Is there a path `from ~> to` through zero-cost closure edges?
    fn zero_path_exists(&self, from: &NT, to: &NT) -> bool {
        let mut stack = vec![from];
        let mut visited: BTreeSet<&NT> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for (source, target) in &self.zero_closures {
                if source == current {
                    stack.push(target);
                }
            }
        }
        false
    }

    // ----------------------------------------------------------- construction

    /// Run the table-construction fixed point to completion.
    ///
    /// Seeds the reserved error and null-child states and the leaf states
    /// of every nullary operator, then drives the worklist: each popped
    /// state is projected onto every operator dimension, novel representer
    /// states are permuted into candidate result states, and every
    /// non-empty candidate is closed, canonicalized, and recorded as a
    /// transition. Terminates because costs only decrease and the space of
    /// distinct canonical states is finite.
    pub fn generate_states(&mut self) -> Result<(), GrammarError<NT, Op>> {
        if self.frozen {
            return Err(GrammarError::AlreadyGenerated);
        }

        // Reserved state 0: the error state, carrying error handlers.
        let mut error_open: OpenState<NT, Op> = OpenState::new(None);
        for i in 0..self.error_order.len() {
            let pid = self.error_order[i];
            let prod = &self.productions[pid.index()];
            if prod.own_cost < error_open.cost(&prod.target) {
                let target = prod.target.clone();
                error_open
                    .set_production(pid, prod, prod.own_cost)
                    .map_err(|_| GrammarError::MixedArity {
                        node_type: None,
                        target,
                    })?;
            }
        }
        self.run_closures(&mut error_open);
        let mut error_state = error_open.close();
        error_state.number = StateNum::ERROR;
        // Deliberately not canonicalized: the error state is reserved and
        // must never be unified with a grammar state.
        self.states.push(error_state);

        // Reserved state 1: the null-child state, derived once from the
        // null-pointer productions.
        let mut null_open: OpenState<NT, Op> = OpenState::new(None);
        for i in 0..self.null_order.len() {
            let pid = self.null_order[i];
            let prod = &self.productions[pid.index()];
            if prod.own_cost < null_open.cost(&prod.target) {
                let target = prod.target.clone();
                null_open
                    .set_production(pid, prod, prod.own_cost)
                    .map_err(|_| GrammarError::MixedArity {
                        node_type: None,
                        target,
                    })?;
            }
        }
        self.run_closures(&mut null_open);
        let (null_num, null_novel) = self.canonicalize(null_open.close());
        debug_assert_eq!(null_num, StateNum::NULL);

        let mut worklist: VecDeque<StateNum> = VecDeque::new();
        if null_novel && !self.states[null_num.index()].is_empty() {
            worklist.push_back(null_num);
        }

        let mut operators = std::mem::take(&mut self.operators);

        // Leaf states per nullary operator form the initial worklist.
        for (tag, slots) in operators.iter_mut() {
            let Some(op) = slots.get_mut(0).and_then(|slot| slot.as_mut()) else {
                continue;
            };
            debug_assert_eq!(op.arity, 0);

            let empty: RepTuple = SmallVec::new();
            let candidates = self.build_candidates(tag, 0, &empty)?;
            let mut constituents: Vec<StateNum> = Vec::new();
            for mut cand in candidates {
                if cand.is_empty() {
                    continue;
                }
                self.run_closures(&mut cand);
                let (num, novel) = self.canonicalize(cand.close());
                if novel {
                    worklist.push_back(num);
                }
                constituents.push(num);
            }

            #[cfg(feature = "tracing")]
            debug!(tag = ?tag, states = constituents.len(), "leaf operator seeded");

            let leaf =
                PredicatedLeaf::from_states(constituents.iter().map(|&n| &self.states[n.index()]));
            op.body = OperatorBody::Leaf(self.leaves.push(leaf));
        }

        // Main loop: permute every popped state against every non-leaf
        // operator dimension.
        while let Some(num) = worklist.pop_front() {
            self.metrics.worklist_pops += 1;

            #[cfg(feature = "tracing")]
            trace!(state = num.raw(), "worklist pop");

            for slots in operators.values_mut() {
                for slot in slots.iter_mut() {
                    let Some(op) = slot.as_mut() else { continue };
                    if op.arity == 0 {
                        continue;
                    }
                    self.compute_transitions(op, num, &mut worklist)?;
                }
            }
        }

        // Finalization: compile every operator, resolve arity kinds.
        for (tag, slots) in operators.iter_mut() {
            for slot in slots.iter_mut() {
                let Some(op) = slot.as_mut() else { continue };

                op.variadic = self.patterns_by_tag.get(tag).is_some_and(|patterns| {
                    patterns.iter().any(|&pid| {
                        let p = &self.productions[pid.index()];
                        p.is_variadic && p.accepts_arity(op.arity)
                    })
                });

                if op.arity == 0 {
                    if matches!(op.body, OperatorBody::Unbuilt) {
                        return Err(GrammarError::EmptyOperator {
                            node_type: tag.clone(),
                            arity: 0,
                        });
                    }
                    continue;
                }

                let builder = op.builder.take().expect("non-leaf operator has a builder");
                if builder.is_empty() {
                    return Err(GrammarError::EmptyOperator {
                        node_type: tag.clone(),
                        arity: op.arity,
                    });
                }
                let plane = builder.build(&self.pool, &self.states, &mut self.leaves);
                op.body = OperatorBody::Table(plane);
            }
        }

        self.operators = operators;
        self.metrics.rep_states = self.pool.len() as u64;
        self.metrics.leaves = self.leaves.len() as u64;
        self.frozen = true;

        #[cfg(feature = "tracing")]
        info!(
            states = self.states.len(),
            rep_states = self.pool.len(),
            leaves = self.leaves.len(),
            "table generation complete"
        );

        Ok(())
    }

    /// Project `num` onto one operator dimension, permute any novelty, and
    /// record the resulting transitions.
    fn compute_transitions(
        &mut self,
        op: &mut Operator<Op>,
        num: StateNum,
        worklist: &mut VecDeque<StateNum>,
    ) -> Result<(), GrammarError<NT, Op>> {
        let arity = op.arity;
        let tag = op.node_type.clone();

        for dim in 0..arity {
            let Some(rep) = self.project(&tag, dim, num) else {
                continue;
            };
            if op.knows_rep(dim, rep) {
                continue;
            }
            op.add_rep(dim, rep);

            #[cfg(feature = "tracing")]
            trace!(tag = ?tag, dim, state = num.raw(), "novel representer state");

            for tuple in op.permutations(dim, rep) {
                self.metrics.permutations += 1;

                let candidates = self.build_candidates(&tag, arity, &tuple)?;
                let mut results: SmallVec<[StateNum; 4]> = SmallVec::new();
                for mut cand in candidates {
                    if cand.is_empty() {
                        continue;
                    }
                    self.run_closures(&mut cand);
                    let (snum, novel) = self.canonicalize(cand.close());
                    if novel {
                        worklist.push_back(snum);
                    }
                    results.push(snum);
                }

                if !results.is_empty() {
                    op.builder
                        .as_mut()
                        .expect("arity >= 1")
                        .add(tuple, results.iter().copied());
                    self.metrics.transitions += 1;
                }
            }
        }
        Ok(())
    }

    /// Restrict a state's cost vector to the nonterminals the operator's
    /// patterns read at `dim`, and intern the result. Returns None for an
    /// empty projection (nothing relevant is reachable).
    fn project(&mut self, tag: &Op, dim: usize, num: StateNum) -> Option<RepId> {
        let state = &self.states[num.index()];
        let patterns = self.patterns_by_tag.get(tag)?;

        let mut costs: Vec<(NT, Cost)> = Vec::new();
        for nt in &self.nonterminals {
            let cost = state.cost(nt);
            if cost.is_infinite() {
                continue;
            }
            let read = patterns
                .iter()
                .any(|&pid| self.productions[pid.index()].uses_child_nonterminal(nt, dim));
            if read {
                costs.push((nt.clone(), cost));
            }
        }
        if costs.is_empty() {
            return None;
        }

        let key = RepKey {
            node_type: state.node_type().cloned(),
            costs,
        };
        let rep = self.pool.intern(key);
        self.pool.add_represented(rep, num);
        Some(rep)
    }

    /// Evaluate every pattern of `tag` accepting `arity` against a
    /// representer tuple, producing candidate states with guard
    /// copy-splitting.
    fn build_candidates(
        &self,
        tag: &Op,
        arity: usize,
        tuple: &RepTuple,
    ) -> Result<Vec<OpenState<NT, Op>>, GrammarError<NT, Op>> {
        let mut candidates = vec![OpenState::new(Some(tag.clone()))];
        let Some(patterns) = self.patterns_by_tag.get(tag) else {
            return Ok(candidates);
        };

        for &pid in patterns {
            let prod = &self.productions[pid.index()];
            if !prod.accepts_arity(arity) {
                continue;
            }
            self.coalesce(pid, prod, tuple, &mut candidates)?;
        }
        Ok(candidates)
    }

    /// Fold one pattern into the candidate list under cost coalescing.
    ///
    /// An unreachable term in the cost sum skips the pattern outright. A
    /// guarded pattern either improves the candidates that already carry
    /// its guard, or copy-splits a sibling so that every satisfiable guard
    /// combination exists exactly once.
    fn coalesce(
        &self,
        pid: ProdId,
        prod: &Production<NT, Op>,
        tuple: &RepTuple,
        candidates: &mut Vec<OpenState<NT, Op>>,
    ) -> Result<(), GrammarError<NT, Op>> {
        let mut cost = prod.own_cost;
        for (dim, &rep) in tuple.iter().enumerate() {
            let nt = prod
                .child_nonterminal(dim)
                .expect("pattern accepts this arity");
            cost = cost.saturating_add(self.pool.entry(rep).cost(nt));
            if cost.is_infinite() {
                return Ok(());
            }
        }

        let mut i = 0;
        while i < candidates.len() {
            match prod.guard {
                Some(guard) => {
                    if candidates[i].has_guard(guard) {
                        if cost < candidates[i].cost(&prod.target) {
                            candidates[i]
                                .set_production(pid, prod, cost)
                                .map_err(|_| self.mixed_arity(prod))?;
                        }
                    } else {
                        let augmented = candidates[i].guards_with(guard);
                        let exists = candidates
                            .iter()
                            .any(|c| c.guards() == augmented.as_slice());
                        if !exists {
                            let mut sibling = candidates[i].with_guard(guard);
                            if cost < sibling.cost(&prod.target) {
                                sibling
                                    .set_production(pid, prod, cost)
                                    .map_err(|_| self.mixed_arity(prod))?;
                            }
                            candidates.push(sibling);
                        }
                    }
                }
                None => {
                    if cost < candidates[i].cost(&prod.target) {
                        candidates[i]
                            .set_production(pid, prod, cost)
                            .map_err(|_| self.mixed_arity(prod))?;
                    }
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn mixed_arity(&self, prod: &Production<NT, Op>) -> GrammarError<NT, Op> {
        GrammarError::MixedArity {
            node_type: prod.node_type().cloned(),
            target: prod.target.clone(),
        }
    }

    /// Apply every registered closure to an open state until no further
    /// cost improves.
    fn run_closures(&self, state: &mut OpenState<NT, Op>) {
        loop {
            let mut changed = false;
            for &cid in &self.closure_order {
                let closure = &self.productions[cid.index()];
                changed |= state.add_closure(cid, closure);
            }
            if !changed {
                break;
            }
        }
    }

    /// Enter a closed state into the catalogue, or collapse it onto the
    /// structurally-equal state already there. The canonical state keeps
    /// its original number either way.
    fn canonicalize(&mut self, mut state: ClosedState<NT, Op>) -> (StateNum, bool) {
        let key = state.canon_key();
        if let Some(&num) = self.canon.get(&key) {
            self.metrics.states_reused += 1;
            (num, false)
        } else {
            let num = StateNum(self.states.len() as u32);
            state.number = num;
            self.canon.insert(key, num);
            self.states.push(state);
            self.metrics.states_created += 1;
            (num, true)
        }
    }

    // ---------------------------------------------------------------- queries

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// A state by number; None for numbers the catalogue never assigned.
    pub fn state(&self, num: StateNum) -> Option<&ClosedState<NT, Op>> {
        self.states.get(num.index())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The state catalogue in discovery (numbering) order.
    pub fn catalogue(&self) -> impl Iterator<Item = &ClosedState<NT, Op>> {
        self.states.iter()
    }

    pub fn error_state(&self) -> &ClosedState<NT, Op> {
        &self.states[StateNum::ERROR.index()]
    }

    pub fn null_state(&self) -> &ClosedState<NT, Op> {
        &self.states[StateNum::NULL.index()]
    }

    pub fn production(&self, pid: ProdId) -> &Production<NT, Op> {
        &self.productions[pid.index()]
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn leaf(&self, id: LeafId) -> &PredicatedLeaf<NT, Op> {
        self.leaves.get(id)
    }

    pub fn build_report(&self) -> BuildReport {
        self.metrics.report()
    }

    /// The operator handling a `(tag, arity)` tuple: the exact-arity
    /// operator if one exists, else the largest variadic operator whose
    /// fixed arity is at most `arity`.
    pub(crate) fn operator_for(&self, tag: &Op, arity: usize) -> Option<&Operator<Op>> {
        let slots = self.operators.get(tag)?;
        if let Some(Some(op)) = slots.get(arity) {
            return Some(op);
        }
        slots
            .iter()
            .rev()
            .flatten()
            .find(|op| op.variadic && op.arity >= 1 && op.arity <= arity)
    }

    pub(crate) fn states(&self) -> &[ClosedState<NT, Op>] {
        &self.states
    }

    pub(crate) fn leaves(&self) -> &LeafRegistry<NT, Op> {
        &self.leaves
    }

    pub(crate) fn productions(&self) -> &[Production<NT, Op>] {
        &self.productions
    }

    pub(crate) fn operators(
        &self,
    ) -> impl Iterator<Item = (&Op, usize, &Operator<Op>)> {
        self.operators.iter().flat_map(|(tag, slots)| {
            slots
                .iter()
                .enumerate()
                .filter_map(move |(arity, slot)| slot.as_ref().map(|op| (tag, arity, op)))
        })
    }

    /// Rebuild a frozen table from deserialized parts; see `image`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_frozen_parts(
        productions: Vec<Production<NT, Op>>,
        closure_order: Vec<ProdId>,
        null_order: Vec<ProdId>,
        error_order: Vec<ProdId>,
        handles: HandleRegistry,
        states: Vec<ClosedState<NT, Op>>,
        operators: BTreeMap<Op, Vec<Option<Operator<Op>>>>,
        leaves: LeafRegistry<NT, Op>,
    ) -> Self {
        let mut patterns_by_tag: BTreeMap<Op, Vec<ProdId>> = BTreeMap::new();
        let mut nonterminals: BTreeSet<NT> = BTreeSet::new();
        for (i, prod) in productions.iter().enumerate() {
            nonterminals.insert(prod.target.clone());
            for child in prod.child_types() {
                nonterminals.insert(child.clone());
            }
            if let ProductionKind::Pattern { node_type, .. } = &prod.kind {
                patterns_by_tag
                    .entry(node_type.clone())
                    .or_default()
                    .push(ProdId(i as u32));
            }
        }

        let mut canon = HashMap::new();
        for state in states.iter().skip(1) {
            canon.insert(state.canon_key(), state.number());
        }

        ProductionTable {
            productions,
            closure_order,
            null_order,
            error_order,
            patterns_by_tag,
            nonterminals,
            zero_closures: Vec::new(),
            handles,
            states,
            canon,
            pool: RepPool::new(),
            operators,
            leaves,
            metrics: BuildMetrics::new(),
            frozen: true,
        }
    }

    /// Render a human-readable dump of the catalogue and operator tables.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "states: {}", self.states.len())?;
        for state in &self.states {
            write!(
                out,
                "  state {} {:?}",
                state.number(),
                state.node_type()
            )?;
            if !state.guards().is_empty() {
                let names: Vec<&str> = state
                    .guards()
                    .iter()
                    .filter_map(|&g| self.handles.resolve(g))
                    .collect();
                write!(out, " guards={:?}", names)?;
            }
            writeln!(out)?;
            for (nt, cp) in state.matched_entries() {
                writeln!(out, "    {:?} <- p{} cost {}", nt, cp.prod.raw(), cp.cost)?;
            }
            for (nt, d) in state.derived_entries() {
                writeln!(
                    out,
                    "    {:?} <- closure p{} cost {} via p{}",
                    nt,
                    d.closure.raw(),
                    d.cost,
                    d.antecedent.raw()
                )?;
            }
        }
        writeln!(out, "operators:")?;
        for (tag, arity, op) in self.operators() {
            let body = match &op.body {
                OperatorBody::Unbuilt => "unbuilt",
                OperatorBody::Leaf(_) => "leaf",
                OperatorBody::Table(_) => "table",
            };
            writeln!(
                out,
                "  {:?}/{} {}{}",
                tag,
                arity,
                body,
                if op.variadic { " variadic" } else { "" }
            )?;
        }
        Ok(())
    }
}

impl<NT: Symbol, Op: Symbol> Default for ProductionTable<NT, Op> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/table.rs"]
mod tests;
