//! The serialization image of a frozen table.
//!
//! A [`TableImage`] is a deterministic, self-contained snapshot: the
//! production arena (with guard/callback handles spelled out by name, since
//! raw handles are not stable across processes), the state catalogue, the
//! leaf registry, and every operator's leaf-or-plane tree. Reconstructing a
//! table from its image yields one that labels any corpus identically,
//! without re-running the fixed point. The external storage format (JSON,
//! XML, ...) is the caller's choice; these types only fix the field tree.
//!
//! Every list in an image is sorted (states by number, map entries by key,
//! guard lists by name), so structurally identical tables produce equal
//! images regardless of interning order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cost::Cost;
use crate::handle::{HandleId, HandleRegistry};
use crate::leaf::{LeafId, LeafRegistry, PredicatedLeaf};
use crate::operator::{Operator, OperatorBody};
use crate::plane::TransitionPlane;
use crate::production::{ArityKind, ProdId, Production, ProductionKind, Symbol};
use crate::state::{ClosedState, CostedProduction, DerivedClosure, StateNum};
use crate::table::{GrammarError, ProductionTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableImage<NT, Op> {
    pub productions: Vec<ProductionImage<NT, Op>>,
    pub states: Vec<StateImage<NT, Op>>,
    pub leaves: Vec<LeafImage<NT, Op>>,
    pub operators: Vec<OperatorImage<Op>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionImage<NT, Op> {
    pub target: NT,
    pub cost: Cost,
    pub variadic: bool,
    pub guard: Option<String>,
    pub pre_callback: Option<String>,
    pub post_callback: Option<String>,
    pub kind: ProductionKindImage<NT, Op>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductionKindImage<NT, Op> {
    Pattern { node_type: Op, child_types: Vec<NT> },
    Closure { source: NT },
    NullLeaf,
    ErrorHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateImage<NT, Op> {
    pub number: StateNum,
    pub node_type: Option<Op>,
    pub arity_kind: Option<ArityKind>,
    /// Guard names, sorted lexicographically.
    pub guards: Vec<String>,
    /// (nonterminal, production, cost), sorted by nonterminal.
    pub matched: Vec<(NT, ProdId, Cost)>,
    /// (nonterminal, closure, cost, antecedent), sorted by nonterminal.
    pub derived: Vec<(NT, ProdId, Cost, ProdId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafImage<NT, Op> {
    pub arity_kind: Option<ArityKind>,
    /// (guard names, merged constituent), sorted by guard names.
    pub variants: Vec<(Vec<String>, StateImage<NT, Op>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorImage<Op> {
    pub node_type: Op,
    pub arity: u32,
    pub variadic: bool,
    pub body: OperatorBodyImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorBodyImage {
    Leaf(LeafId),
    Table(PlaneImage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneImage {
    /// (state number, branch slot), sorted by state number.
    pub index: Vec<(StateNum, u32)>,
    pub body: PlaneBodyImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaneBodyImage {
    Interior(Vec<PlaneImage>),
    Final(Vec<LeafId>),
}

impl<NT: Symbol, Op: Symbol> ProductionTable<NT, Op> {
    /// Snapshot a frozen table into its serialization image.
    pub fn to_image(&self) -> Result<TableImage<NT, Op>, GrammarError<NT, Op>> {
        if !self.is_frozen() {
            return Err(GrammarError::NotGenerated);
        }

        let productions = self
            .productions()
            .iter()
            .map(|p| self.production_image(p))
            .collect();

        let states = self
            .states()
            .iter()
            .map(|s| self.state_image(s))
            .collect();

        let leaves = self
            .leaves()
            .iter()
            .map(|leaf| self.leaf_image(leaf))
            .collect();

        let mut operators = Vec::new();
        for (tag, arity, op) in self.operators() {
            let body = match &op.body {
                OperatorBody::Leaf(id) => OperatorBodyImage::Leaf(*id),
                OperatorBody::Table(plane) => OperatorBodyImage::Table(plane_image(plane)),
                OperatorBody::Unbuilt => return Err(GrammarError::NotGenerated),
            };
            operators.push(OperatorImage {
                node_type: tag.clone(),
                arity: arity as u32,
                variadic: op.variadic,
                body,
            });
        }

        Ok(TableImage {
            productions,
            states,
            leaves,
            operators,
        })
    }

    fn production_image(&self, p: &Production<NT, Op>) -> ProductionImage<NT, Op> {
        let name = |h: Option<HandleId>| {
            h.and_then(|h| self.handle_name(h)).map(String::from)
        };
        ProductionImage {
            target: p.target.clone(),
            cost: p.own_cost,
            variadic: p.is_variadic,
            guard: name(p.guard),
            pre_callback: name(p.pre_callback),
            post_callback: name(p.post_callback),
            kind: match &p.kind {
                ProductionKind::Pattern {
                    node_type,
                    child_types,
                } => ProductionKindImage::Pattern {
                    node_type: node_type.clone(),
                    child_types: child_types.clone(),
                },
                ProductionKind::Closure { source } => ProductionKindImage::Closure {
                    source: source.clone(),
                },
                ProductionKind::NullLeaf => ProductionKindImage::NullLeaf,
                ProductionKind::ErrorHandler => ProductionKindImage::ErrorHandler,
            },
        }
    }

    fn state_image(&self, state: &ClosedState<NT, Op>) -> StateImage<NT, Op> {
        let mut guards: Vec<String> = state
            .guards()
            .iter()
            .filter_map(|&g| self.handle_name(g))
            .map(String::from)
            .collect();
        guards.sort();

        StateImage {
            number: state.number(),
            node_type: state.node_type().cloned(),
            arity_kind: state.arity_kind,
            guards,
            matched: state
                .matched_entries()
                .into_iter()
                .map(|(nt, cp)| (nt.clone(), cp.prod, cp.cost))
                .collect(),
            derived: state
                .derived_entries()
                .into_iter()
                .map(|(nt, d)| (nt.clone(), d.closure, d.cost, d.antecedent))
                .collect(),
        }
    }

    fn leaf_image(&self, leaf: &PredicatedLeaf<NT, Op>) -> LeafImage<NT, Op> {
        let mut variants: Vec<(Vec<String>, StateImage<NT, Op>)> = leaf
            .variants()
            .map(|(guards, state)| {
                let mut names: Vec<String> = guards
                    .iter()
                    .filter_map(|&g| self.handle_name(g))
                    .map(String::from)
                    .collect();
                names.sort();
                (names, self.state_image(state))
            })
            .collect();
        variants.sort_by(|a, b| a.0.cmp(&b.0));

        LeafImage {
            arity_kind: leaf.arity_kind,
            variants,
        }
    }

    /// Reconstruct an operationally identical frozen table from an image.
    pub fn from_image(image: TableImage<NT, Op>) -> Result<Self, GrammarError<NT, Op>> {
        let mut handles = HandleRegistry::new();

        let mut productions: Vec<Production<NT, Op>> = Vec::new();
        let mut closure_order = Vec::new();
        let mut null_order = Vec::new();
        let mut error_order = Vec::new();

        for (i, p) in image.productions.into_iter().enumerate() {
            let pid = ProdId(i as u32);
            let guard = p.guard.as_deref().map(|n| handles.intern(n));
            let pre = p.pre_callback.as_deref().map(|n| handles.intern(n));
            let post = p.post_callback.as_deref().map(|n| handles.intern(n));

            let kind = match p.kind {
                ProductionKindImage::Pattern {
                    node_type,
                    child_types,
                } => ProductionKind::Pattern {
                    node_type,
                    child_types,
                },
                ProductionKindImage::Closure { source } => {
                    closure_order.push(pid);
                    ProductionKind::Closure { source }
                }
                ProductionKindImage::NullLeaf => {
                    null_order.push(pid);
                    ProductionKind::NullLeaf
                }
                ProductionKindImage::ErrorHandler => {
                    error_order.push(pid);
                    ProductionKind::ErrorHandler
                }
            };

            productions.push(Production {
                target: p.target,
                own_cost: p.cost,
                is_variadic: p.variadic,
                guard,
                pre_callback: pre,
                post_callback: post,
                kind,
            });
        }

        let states: Vec<ClosedState<NT, Op>> = image
            .states
            .into_iter()
            .map(|s| state_from_image(s, &mut handles))
            .collect();

        let mut leaves = LeafRegistry::new();
        for leaf_img in image.leaves {
            let mut leaf = PredicatedLeaf::new();
            for (_, variant) in leaf_img.variants {
                leaf.add_state(&state_from_image(variant, &mut handles));
            }
            leaf.arity_kind = leaf_img.arity_kind;
            leaves.push(leaf);
        }

        let mut operators: BTreeMap<Op, Vec<Option<Operator<Op>>>> = BTreeMap::new();
        for op_img in image.operators {
            let arity = op_img.arity as usize;
            let mut op = Operator::new(op_img.node_type.clone(), arity);
            op.builder = None;
            op.variadic = op_img.variadic;
            op.body = match op_img.body {
                OperatorBodyImage::Leaf(id) => OperatorBody::Leaf(id),
                OperatorBodyImage::Table(plane) => OperatorBody::Table(plane_from_image(plane)),
            };

            let slots = operators.entry(op_img.node_type).or_default();
            if slots.len() <= arity {
                slots.resize_with(arity + 1, || None);
            }
            slots[arity] = Some(op);
        }

        Ok(ProductionTable::from_frozen_parts(
            productions,
            closure_order,
            null_order,
            error_order,
            handles,
            states,
            operators,
            leaves,
        ))
    }
}

fn state_from_image<NT: Symbol, Op: Symbol>(
    image: StateImage<NT, Op>,
    handles: &mut HandleRegistry,
) -> ClosedState<NT, Op> {
    let mut guards: Vec<HandleId> = image
        .guards
        .iter()
        .map(|name| handles.intern(name))
        .collect();
    guards.sort();

    ClosedState::from_parts(
        image.number,
        image.node_type,
        image
            .matched
            .into_iter()
            .map(|(nt, prod, cost)| (nt, CostedProduction { prod, cost })),
        image.derived.into_iter().map(|(nt, closure, cost, antecedent)| {
            (
                nt,
                DerivedClosure {
                    closure,
                    cost,
                    antecedent,
                },
            )
        }),
        guards,
        image.arity_kind,
    )
}

fn plane_image(plane: &TransitionPlane) -> PlaneImage {
    match plane {
        TransitionPlane::Interior { index, planes } => PlaneImage {
            index: sorted_index(index),
            body: PlaneBodyImage::Interior(planes.iter().map(plane_image).collect()),
        },
        TransitionPlane::Final { index, leaves } => PlaneImage {
            index: sorted_index(index),
            body: PlaneBodyImage::Final(leaves.clone()),
        },
    }
}

fn sorted_index(index: &FxHashMap<StateNum, u32>) -> Vec<(StateNum, u32)> {
    let mut entries: Vec<(StateNum, u32)> = index.iter().map(|(&s, &slot)| (s, slot)).collect();
    entries.sort();
    entries
}

fn plane_from_image(image: PlaneImage) -> TransitionPlane {
    let index: FxHashMap<StateNum, u32> = image.index.into_iter().collect();
    match image.body {
        PlaneBodyImage::Interior(planes) => TransitionPlane::Interior {
            index,
            planes: planes.into_iter().map(plane_from_image).collect(),
        },
        PlaneBodyImage::Final(leaves) => TransitionPlane::Final { index, leaves },
    }
}

#[cfg(test)]
#[path = "tests/image.rs"]
mod tests;
