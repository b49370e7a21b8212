//! Operators: per-(node tag, arity) transition containers.
//!
//! During construction an operator tracks the representer states discovered
//! for each of its child dimensions and accumulates transitions in a
//! [`TransitionBuilder`]. After the fixed point converges it carries either
//! a composite leaf (arity 0) or a compiled transition table.

use crate::leaf::LeafId;
use crate::plane::{RepTuple, TransitionBuilder, TransitionPlane};
use crate::production::Symbol;
use crate::repstate::RepId;

/// What an operator dispatches through once the table is frozen.
#[derive(Debug)]
pub enum OperatorBody {
    /// Construction has not finished (or failed for this operator).
    Unbuilt,
    /// Arity-0: a composite leaf resolved directly.
    Leaf(LeafId),
    /// Arity ≥ 1: the root dimension of the nested table.
    Table(TransitionPlane),
}

#[derive(Debug)]
pub struct Operator<Op> {
    pub node_type: Op,
    pub arity: usize,
    /// Representer states known per dimension, in discovery order. A
    /// representer state only needs to be permuted once per dimension, so
    /// remembering them is what makes the fixed point converge.
    reps: Vec<Vec<RepId>>,
    /// Flat transition map; compiled into `body` at finalization.
    pub builder: Option<TransitionBuilder>,
    pub body: OperatorBody,
    /// True if a variadic pattern matches at this operator's arity;
    /// resolved at finalization, used by labeling's arity fallback.
    pub variadic: bool,
}

impl<Op: Symbol> Operator<Op> {
    pub fn new(node_type: Op, arity: usize) -> Self {
        Operator {
            node_type,
            arity,
            reps: vec![Vec::new(); arity],
            builder: (arity >= 1).then(|| TransitionBuilder::new(arity)),
            body: OperatorBody::Unbuilt,
            variadic: false,
        }
    }

    pub fn knows_rep(&self, dim: usize, rep: RepId) -> bool {
        self.reps[dim].contains(&rep)
    }

    pub fn add_rep(&mut self, dim: usize, rep: RepId) {
        debug_assert!(!self.knows_rep(dim, rep));
        self.reps[dim].push(rep);
    }

    pub fn reps(&self, dim: usize) -> &[RepId] {
        &self.reps[dim]
    }

    /// Every tuple of representer states across all dimensions where
    /// `fixed_dim` is pinned to `fixed` and the other dimensions range over
    /// their known sets. If any other dimension knows no representer state
    /// yet, nothing is reachable and no tuples are produced. Tuples are
    /// exhaustive and never repeat.
    pub fn permutations(&self, fixed_dim: usize, fixed: RepId) -> Vec<RepTuple> {
        debug_assert!(fixed_dim < self.arity);

        for (d, reps) in self.reps.iter().enumerate() {
            if d != fixed_dim && reps.is_empty() {
                return Vec::new();
            }
        }

        let mut out = Vec::new();
        let mut odometer = vec![0usize; self.arity];
        loop {
            let tuple: RepTuple = (0..self.arity)
                .map(|d| {
                    if d == fixed_dim {
                        fixed
                    } else {
                        self.reps[d][odometer[d]]
                    }
                })
                .collect();
            out.push(tuple);

            let mut d = 0;
            loop {
                if d == self.arity {
                    return out;
                }
                if d == fixed_dim {
                    d += 1;
                    continue;
                }
                odometer[d] += 1;
                if odometer[d] < self.reps[d].len() {
                    break;
                }
                odometer[d] = 0;
                d += 1;
            }
        }
    }
}
