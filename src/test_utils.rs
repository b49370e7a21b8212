use std::convert::Infallible;

use crate::handle::HandleId;
use crate::leaf::LeafId;
use crate::node::{GuardContext, TreeNode};
use crate::state::StateNum;
use crate::table::ProductionTable;

/// Shared symbol alphabet for tests: plain static strings.
pub(crate) type Nt = &'static str;
pub(crate) type Tag = &'static str;

pub(crate) fn setup() -> ProductionTable<Nt, Tag> {
    ProductionTable::new()
}

/// A minimal tree node for exercising the labeler.
#[derive(Debug, Clone)]
pub(crate) struct T {
    pub tag: Tag,
    pub children: Vec<Option<T>>,
    /// Attributes a guard context can test against.
    pub attrs: Vec<&'static str>,
    state: Option<StateNum>,
    leaf: Option<LeafId>,
}

impl T {
    pub fn leaf(tag: Tag) -> T {
        T {
            tag,
            children: Vec::new(),
            attrs: Vec::new(),
            state: None,
            leaf: None,
        }
    }

    pub fn node(tag: Tag, children: Vec<T>) -> T {
        T {
            tag,
            children: children.into_iter().map(Some).collect(),
            attrs: Vec::new(),
            state: None,
            leaf: None,
        }
    }

    /// A node with an explicitly absent child at the given positions.
    pub fn with_holes(tag: Tag, children: Vec<Option<T>>) -> T {
        T {
            tag,
            children,
            attrs: Vec::new(),
            state: None,
            leaf: None,
        }
    }

    pub fn with_attrs(mut self, attrs: &[&'static str]) -> T {
        self.attrs = attrs.to_vec();
        self
    }
}

impl TreeNode<Tag> for T {
    fn node_type(&self) -> &Tag {
        &self.tag
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, idx: usize) -> Option<&Self> {
        self.children.get(idx).and_then(|c| c.as_ref())
    }

    fn child_mut(&mut self, idx: usize) -> Option<&mut Self> {
        self.children.get_mut(idx).and_then(|c| c.as_mut())
    }

    fn state_number(&self) -> Option<StateNum> {
        self.state
    }

    fn set_state_number(&mut self, number: StateNum) {
        self.state = Some(number);
    }

    fn leaf_ref(&self) -> Option<LeafId> {
        self.leaf
    }

    fn set_leaf_ref(&mut self, leaf: LeafId) {
        self.leaf = Some(leaf);
    }
}

/// Guard context that satisfies a guard iff the node carries an attribute
/// with the guard's registered name.
pub(crate) struct AttrGuards {
    names: Vec<(HandleId, &'static str)>,
}

impl AttrGuards {
    pub fn new(names: Vec<(HandleId, &'static str)>) -> Self {
        AttrGuards { names }
    }
}

impl GuardContext<T> for AttrGuards {
    type Error = Infallible;

    fn test(&mut self, guard: HandleId, node: &T) -> Result<bool, Self::Error> {
        let satisfied = self
            .names
            .iter()
            .any(|&(h, name)| h == guard && node.attrs.contains(&name));
        Ok(satisfied)
    }
}

/// Guard context that fails on every evaluation, for abort-path tests.
pub(crate) struct FailingGuards;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GuardBoom;

impl std::fmt::Display for GuardBoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "guard exploded")
    }
}

impl GuardContext<T> for FailingGuards {
    type Error = GuardBoom;

    fn test(&mut self, _guard: HandleId, _node: &T) -> Result<bool, Self::Error> {
        Err(GuardBoom)
    }
}
