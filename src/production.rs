//! The grammar's rule model.
//!
//! A production derives one nonterminal at a cost. The four rule kinds are a
//! closed set, so dispatch is an exhaustive match on [`ProductionKind`]
//! rather than downcasting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::cost::Cost;
use crate::handle::HandleId;

/// Bound alias for the client-supplied symbol alphabets (nonterminals and
/// node tags). No structure beyond equality, hashing, and a total order is
/// assumed; the order only buys deterministic iteration.
pub trait Symbol: Clone + Eq + Hash + Ord + fmt::Debug {}

impl<T: Clone + Eq + Hash + Ord + fmt::Debug> Symbol for T {}

/// Index of a production in the table's arena. Production identity is index
/// identity; states compare and hash their entries through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProdId(pub(crate) u32);

impl ProdId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Whether a production, state, or operator covers a fixed number of
/// children or a variadic trailing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArityKind {
    Fixed,
    Variadic,
}

/// What a production matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionKind<NT, Op> {
    /// An `opcode(child, child, ...)` tree shape. The last child type may be
    /// marked variadic on the owning production, in which case it covers
    /// one-or-more trailing children.
    Pattern { node_type: Op, child_types: Vec<NT> },
    /// A nonterminal-to-nonterminal conversion, independent of tree shape.
    Closure { source: NT },
    /// Applies only to an absent (null) child subtree.
    NullLeaf,
    /// The fallback installed on the reserved error state.
    ErrorHandler,
}

/// One grammar rule. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production<NT, Op> {
    /// The nonterminal this production derives.
    pub target: NT,
    /// The production's own figure of merit; child costs are added on top.
    pub own_cost: Cost,
    /// Set when the final child type extends over a variadic tail.
    pub is_variadic: bool,
    /// Semantic guard predicate, or None if selection is purely by cost.
    pub guard: Option<HandleId>,
    /// Callback run before deriving children, or None.
    pub pre_callback: Option<HandleId>,
    /// Callback run after deriving children, or None.
    pub post_callback: Option<HandleId>,
    pub kind: ProductionKind<NT, Op>,
}

impl<NT: Symbol, Op: Symbol> Production<NT, Op> {
    pub fn pattern(
        target: NT,
        node_type: Op,
        cost: u32,
        guard: Option<HandleId>,
        pre_callback: Option<HandleId>,
        post_callback: Option<HandleId>,
        is_variadic: bool,
        child_types: Vec<NT>,
    ) -> Self {
        Production {
            target,
            own_cost: Cost::new(cost),
            is_variadic,
            guard,
            pre_callback,
            post_callback,
            kind: ProductionKind::Pattern {
                node_type,
                child_types,
            },
        }
    }

    pub fn closure(target: NT, source: NT, cost: u32, post_callback: Option<HandleId>) -> Self {
        Production {
            target,
            own_cost: Cost::new(cost),
            is_variadic: false,
            guard: None,
            pre_callback: None,
            post_callback,
            kind: ProductionKind::Closure { source },
        }
    }

    pub fn null_leaf(target: NT, cost: u32, post_callback: Option<HandleId>) -> Self {
        Production {
            target,
            own_cost: Cost::new(cost),
            is_variadic: false,
            guard: None,
            pre_callback: None,
            post_callback,
            kind: ProductionKind::NullLeaf,
        }
    }

    pub fn error_handler(target: NT, callback: HandleId) -> Self {
        Production {
            target,
            own_cost: Cost::new(1),
            is_variadic: false,
            guard: None,
            pre_callback: Some(callback),
            post_callback: None,
            kind: ProductionKind::ErrorHandler,
        }
    }

    /// The node tag this production matches, for pattern productions.
    pub fn node_type(&self) -> Option<&Op> {
        match &self.kind {
            ProductionKind::Pattern { node_type, .. } => Some(node_type),
            _ => None,
        }
    }

    /// The closure's source nonterminal, for closure productions.
    pub fn source(&self) -> Option<&NT> {
        match &self.kind {
            ProductionKind::Closure { source } => Some(source),
            _ => None,
        }
    }

    pub fn child_types(&self) -> &[NT] {
        match &self.kind {
            ProductionKind::Pattern { child_types, .. } => child_types,
            _ => &[],
        }
    }

    /// Nominal arity: the number of declared child types.
    pub fn arity(&self) -> usize {
        self.child_types().len()
    }

    pub fn is_leaf_pattern(&self) -> bool {
        matches!(&self.kind, ProductionKind::Pattern { child_types, .. } if child_types.is_empty())
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    pub fn arity_kind(&self) -> ArityKind {
        if self.is_variadic {
            ArityKind::Variadic
        } else {
            ArityKind::Fixed
        }
    }

    /// The nonterminal a child at `index` must produce. For a variadic
    /// pattern, indices past the declared list reuse the final child type.
    pub fn child_nonterminal(&self, index: usize) -> Option<&NT> {
        let children = self.child_types();
        if self.is_variadic && index >= children.len() {
            children.last()
        } else {
            children.get(index)
        }
    }

    /// Does this pattern read nonterminal `nt` at child position `dim`?
    /// Accounts for variadic tail reuse of the last child slot.
    pub fn uses_child_nonterminal(&self, nt: &NT, dim: usize) -> bool {
        self.child_nonterminal(dim) == Some(nt)
    }

    /// Can this pattern fire for a subtree with `arity` children?
    pub fn accepts_arity(&self, arity: usize) -> bool {
        if self.is_variadic {
            self.arity() <= arity
        } else {
            self.arity() == arity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary() -> Production<&'static str, &'static str> {
        Production::pattern("Int", "Add", 1, None, None, None, false, vec!["Int", "Int"])
    }

    fn variadic() -> Production<&'static str, &'static str> {
        Production::pattern(
            "String",
            "Concat",
            1,
            None,
            None,
            None,
            true,
            vec!["String"],
        )
    }

    #[test]
    fn fixed_pattern_accepts_exact_arity_only() {
        let p = binary();
        assert!(p.accepts_arity(2));
        assert!(!p.accepts_arity(1));
        assert!(!p.accepts_arity(3));
    }

    #[test]
    fn variadic_pattern_accepts_trailing_run() {
        let p = variadic();
        assert!(p.accepts_arity(1));
        assert!(p.accepts_arity(5));
        assert!(!p.accepts_arity(0), "a variadic tail needs at least one child");
    }

    #[test]
    fn variadic_tail_reuses_last_child_type() {
        let p = variadic();
        assert_eq!(p.child_nonterminal(0), Some(&"String"));
        assert_eq!(p.child_nonterminal(4), Some(&"String"));
    }

    #[test]
    fn fixed_pattern_has_no_tail() {
        let p = binary();
        assert_eq!(p.child_nonterminal(1), Some(&"Int"));
        assert_eq!(p.child_nonterminal(2), None);
    }

    #[test]
    fn uses_child_nonterminal_respects_position() {
        let p = Production::<&str, &str>::pattern(
            "Pair",
            "Mk",
            1,
            None,
            None,
            None,
            false,
            vec!["Left", "Right"],
        );
        assert!(p.uses_child_nonterminal(&"Left", 0));
        assert!(!p.uses_child_nonterminal(&"Left", 1));
        assert!(p.uses_child_nonterminal(&"Right", 1));
    }

    #[test]
    fn closure_carries_source() {
        let c = Production::<&str, &str>::closure("Int", "Short", 1, None);
        assert_eq!(c.source(), Some(&"Short"));
        assert_eq!(c.node_type(), None);
        assert_eq!(c.arity(), 0);
    }

    #[test]
    fn error_handler_has_unit_cost() {
        let mut reg = crate::handle::HandleRegistry::new();
        let cb = reg.intern("recover");
        let e = Production::<&str, &str>::error_handler("Int", cb);
        assert_eq!(e.own_cost, Cost::new(1));
        assert_eq!(e.pre_callback, Some(cb));
    }
}
