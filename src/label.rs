//! Labeling: the bottom-up walk that assigns state numbers to a tree.
//!
//! Children are labeled before their parent; the parent's operator is then
//! walked dimension by dimension using the children's state numbers (or the
//! reserved null-child number for absent children). Any miss (unknown
//! tag/arity, a child state with no index entry, an unsatisfiable guard
//! combination) resolves to the reserved error state and the walk
//! continues; only a guard-evaluation failure aborts the tree.

use std::fmt;

use crate::cost::Cost;
use crate::handle::HandleId;
use crate::leaf::LeafId;
use crate::node::{GuardContext, TreeNode};
use crate::operator::OperatorBody;
use crate::plane::TransitionPlane;
use crate::production::Symbol;
use crate::state::StateNum;
use crate::table::ProductionTable;

/// Errors surfaced by `label()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelError<E> {
    /// A caller-supplied guard predicate failed; propagated unmodified.
    Guard(E),
    /// The table has not been generated.
    NotGenerated,
}

impl<E: fmt::Display> fmt::Display for LabelError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelError::Guard(e) => write!(f, "guard evaluation failed: {}", e),
            LabelError::NotGenerated => write!(f, "table has not been generated"),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for LabelError<E> {}

impl<NT: Symbol, Op: Symbol> ProductionTable<NT, Op> {
    /// Label a tree, assigning every node a state number and (where a leaf
    /// was resolved) an opaque leaf reference.
    pub fn label<N, G>(&self, node: &mut N, ctx: &mut G) -> Result<(), LabelError<G::Error>>
    where
        N: TreeNode<Op>,
        G: GuardContext<N>,
    {
        if !self.is_frozen() {
            return Err(LabelError::NotGenerated);
        }
        self.label_node(node, ctx)
    }

    fn label_node<N, G>(&self, node: &mut N, ctx: &mut G) -> Result<(), LabelError<G::Error>>
    where
        N: TreeNode<Op>,
        G: GuardContext<N>,
    {
        for i in 0..node.child_count() {
            if let Some(child) = node.child_mut(i) {
                self.label_node(child, ctx)?;
            }
        }

        let arity = node.child_count();
        let Some(op) = self.operator_for(node.node_type(), arity) else {
            node.set_state_number(StateNum::ERROR);
            return Ok(());
        };

        match &op.body {
            OperatorBody::Leaf(leaf_id) => {
                let leaf_id = *leaf_id;
                self.resolve_leaf(leaf_id, node, ctx)
            }
            OperatorBody::Table(plane) => {
                let fixed = op.arity;
                debug_assert!(fixed >= 1 && fixed <= arity);

                // Interior dimensions: children 0..fixed-1 select nested
                // planes by state number.
                let mut current: &TransitionPlane = plane;
                for i in 0..fixed - 1 {
                    match current.next(child_state(node, i)) {
                        Some(next) => current = next,
                        None => {
                            node.set_state_number(StateNum::ERROR);
                            return Ok(());
                        }
                    }
                }

                // Final dimension. For a variadic operator the same index
                // map is reused for every trailing child; each must be
                // present, and the last child's entry selects the leaf.
                let mut leaf_id = None;
                for i in fixed - 1..arity {
                    match current.leaf_for(child_state(node, i)) {
                        Some(id) => leaf_id = Some(id),
                        None => {
                            node.set_state_number(StateNum::ERROR);
                            return Ok(());
                        }
                    }
                }

                match leaf_id {
                    Some(id) => self.resolve_leaf(id, node, ctx),
                    None => {
                        node.set_state_number(StateNum::ERROR);
                        Ok(())
                    }
                }
            }
            OperatorBody::Unbuilt => {
                debug_assert!(false, "frozen table with an unbuilt operator");
                node.set_state_number(StateNum::ERROR);
                Ok(())
            }
        }
    }

    /// Evaluate a leaf's master guard list against the node and bucket it
    /// into the constituent for exactly the satisfied subset. An absent
    /// combination (only possible for the empty subset) is an unmatched
    /// input and resolves to the error state.
    fn resolve_leaf<N, G>(
        &self,
        leaf_id: LeafId,
        node: &mut N,
        ctx: &mut G,
    ) -> Result<(), LabelError<G::Error>>
    where
        N: TreeNode<Op>,
        G: GuardContext<N>,
    {
        let leaf = self.leaf(leaf_id);

        let mut satisfied: Vec<HandleId> = Vec::new();
        for &guard in leaf.guards() {
            if ctx.test(guard, node).map_err(LabelError::Guard)? {
                satisfied.push(guard);
            }
        }

        match leaf.resolve(&satisfied) {
            Some(state) => {
                node.set_state_number(state.number());
                node.set_leaf_ref(leaf_id);
            }
            None => {
                debug_assert!(satisfied.is_empty(), "non-empty combinations are registered");
                node.set_state_number(StateNum::ERROR);
            }
        }
        Ok(())
    }

    /// Can the node's resolved state produce `goal` at finite cost?
    ///
    /// Unlabeled nodes cannot produce anything. An error-state node can
    /// produce exactly the goals with registered error handlers.
    pub fn can_produce<N>(&self, node: &N, goal: &NT) -> bool
    where
        N: TreeNode<Op>,
    {
        self.cost_for(node, goal).is_finite()
    }

    /// The cost at which the node's resolved state produces `goal`.
    pub fn cost_for<N>(&self, node: &N, goal: &NT) -> Cost
    where
        N: TreeNode<Op>,
    {
        match node.state_number().and_then(|num| self.state(num)) {
            Some(state) => state.cost(goal),
            None => Cost::INFINITE,
        }
    }

    /// Can an absent (null) subtree produce `goal`?
    pub fn can_produce_absent(&self, goal: &NT) -> bool {
        self.null_state().cost(goal).is_finite()
    }

    /// Convenience guard for `label` + `can_produce` against a goal, as a
    /// one-shot query.
    pub fn labels_to<N, G>(
        &self,
        node: &mut N,
        goal: &NT,
        ctx: &mut G,
    ) -> Result<bool, LabelError<G::Error>>
    where
        N: TreeNode<Op>,
        G: GuardContext<N>,
    {
        self.label(node, ctx)?;
        Ok(self.can_produce(node, goal))
    }
}

/// A child's state number: its assigned number, or the reserved null-child
/// number when the child is absent.
fn child_state<Op, N: TreeNode<Op>>(node: &N, idx: usize) -> StateNum {
    match node.child(idx) {
        Some(child) => child.state_number().unwrap_or(StateNum::ERROR),
        None => StateNum::NULL,
    }
}

#[cfg(test)]
#[path = "tests/label.rs"]
mod tests;
