use proptest::prelude::*;

use burg::cost::Cost;
use burg::leaf::LeafId;
use burg::node::{NoGuards, TreeNode};
use burg::state::StateNum;
use burg::table::ProductionTable;

type Nt = &'static str;
type Tag = &'static str;

const NTS: [Nt; 4] = ["A", "B", "C", "D"];
const LEAF_TAGS: [Tag; 4] = ["lit0", "lit1", "lit2", "lit3"];
const UNARY_TAGS: [Tag; 2] = ["un0", "un1"];
const BINARY_TAGS: [Tag; 2] = ["bin0", "bin1"];
const VARIADIC_TAG: Tag = "cat0";

#[derive(Debug, Clone)]
enum Rule {
    Unary { tag: usize, target: usize, child: usize, cost: u32 },
    Binary { tag: usize, target: usize, left: usize, right: usize, cost: u32 },
    Closure { target: usize, source: usize, cost: u32 },
    Variadic { target: usize, child: usize, cost: u32 },
}

#[derive(Debug, Clone)]
struct Grammar {
    leaf_costs: [u32; 4],
    rules: Vec<Rule>,
}

impl Grammar {
    fn build(&self) -> ProductionTable<Nt, Tag> {
        let mut table = ProductionTable::new();
        // Every nonterminal gets a leaf production, so no operator can end
        // up without transitions.
        for (i, &tag) in LEAF_TAGS.iter().enumerate() {
            table
                .add_pattern(NTS[i], tag, self.leaf_costs[i], vec![])
                .expect("leaf registration");
        }
        for rule in &self.rules {
            match *rule {
                Rule::Unary { tag, target, child, cost } => {
                    table
                        .add_pattern(NTS[target], UNARY_TAGS[tag], cost, vec![NTS[child]])
                        .expect("unary registration");
                }
                Rule::Binary { tag, target, left, right, cost } => {
                    table
                        .add_pattern(
                            NTS[target],
                            BINARY_TAGS[tag],
                            cost,
                            vec![NTS[left], NTS[right]],
                        )
                        .expect("binary registration");
                }
                Rule::Closure { target, source, cost } => {
                    if target != source {
                        table
                            .add_closure(NTS[target], NTS[source], cost, None)
                            .expect("positive-cost closures never cycle fatally");
                    }
                }
                Rule::Variadic { target, child, cost } => {
                    table
                        .add_variadic_pattern(NTS[target], VARIADIC_TAG, cost, vec![NTS[child]])
                        .expect("variadic registration");
                }
            }
        }
        table.generate_states().expect("construction converges");
        table
    }

    fn closures(&self) -> impl Iterator<Item = (Nt, Nt, u32)> + '_ {
        self.rules.iter().filter_map(|r| match *r {
            Rule::Closure { target, source, cost } if target != source => {
                Some((NTS[target], NTS[source], cost))
            }
            _ => None,
        })
    }
}

fn rule_strategy() -> impl Strategy<Value = Rule> {
    prop_oneof![
        (0..2usize, 0..4usize, 0..4usize, 0..4u32)
            .prop_map(|(tag, target, child, cost)| Rule::Unary { tag, target, child, cost }),
        (0..2usize, 0..4usize, 0..4usize, 0..4usize, 0..4u32).prop_map(
            |(tag, target, left, right, cost)| Rule::Binary { tag, target, left, right, cost }
        ),
        (0..4usize, 0..4usize, 1..3u32)
            .prop_map(|(target, source, cost)| Rule::Closure { target, source, cost }),
        (0..4usize, 0..4usize, 0..3u32)
            .prop_map(|(target, child, cost)| Rule::Variadic { target, child, cost }),
    ]
}

fn grammar_strategy() -> impl Strategy<Value = Grammar> {
    (
        [1..4u32, 1..4u32, 1..4u32, 1..4u32],
        proptest::collection::vec(rule_strategy(), 0..8),
    )
        .prop_map(|(leaf_costs, rules)| Grammar { leaf_costs, rules })
}

/// A plain test tree.
#[derive(Debug, Clone)]
struct Node {
    tag: Tag,
    children: Vec<Option<Node>>,
    state: Option<StateNum>,
    leaf: Option<LeafId>,
}

impl Node {
    fn new(tag: Tag, children: Vec<Option<Node>>) -> Node {
        Node {
            tag,
            children,
            state: None,
            leaf: None,
        }
    }
}

impl TreeNode<Tag> for Node {
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

fn tree_strategy() -> impl Strategy<Value = Node> {
    let leaf = (0..4usize).prop_map(|i| Node::new(LEAF_TAGS[i], vec![]));
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (0..2usize, inner.clone())
                .prop_map(|(t, c)| Node::new(UNARY_TAGS[t], vec![Some(c)])),
            (0..2usize, inner.clone(), inner.clone())
                .prop_map(|(t, a, b)| Node::new(BINARY_TAGS[t], vec![Some(a), Some(b)])),
            // An absent child exercises the null-child path.
            (0..2usize, inner.clone())
                .prop_map(|(t, a)| Node::new(BINARY_TAGS[t], vec![Some(a), None])),
            proptest::collection::vec(inner, 1..4)
                .prop_map(|kids| Node::new(VARIADIC_TAG, kids.into_iter().map(Some).collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn construction_reserves_exactly_two_states(grammar in grammar_strategy()) {
        let table = grammar.build();
        prop_assert!(table.state_count() >= 2);
        prop_assert_eq!(table.error_state().number(), StateNum::ERROR);
        prop_assert_eq!(table.null_state().number(), StateNum::NULL);
        prop_assert!(table.error_state().is_empty());
    }

    #[test]
    fn catalogue_numbers_are_sequential_and_keys_distinct(grammar in grammar_strategy()) {
        let table = grammar.build();
        let states: Vec<_> = table.catalogue().collect();
        for (i, state) in states.iter().enumerate() {
            prop_assert_eq!(state.number().index(), i);
        }
        // No structural duplicates past the reserved error state.
        let keys: Vec<_> = states.iter().skip(1).map(|s| s.canon_key()).collect();
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                prop_assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn closures_are_sound_in_every_state(grammar in grammar_strategy()) {
        let table = grammar.build();
        for state in table.catalogue() {
            for (target, source, cost) in grammar.closures() {
                if state.reachable(&source) {
                    prop_assert!(
                        state.cost(&target)
                            <= state.cost(&source).saturating_add(Cost::new(cost)),
                        "state {}: {} should be within {} of {}",
                        state.number(),
                        target,
                        cost,
                        source
                    );
                }
            }
        }
    }

    #[test]
    fn construction_is_deterministic(grammar in grammar_strategy()) {
        let a = grammar.build().to_image().expect("frozen");
        let b = grammar.build().to_image().expect("frozen");
        prop_assert_eq!(a, b);
    }

    #[test]
    fn round_trip_preserves_labeling(
        grammar in grammar_strategy(),
        trees in proptest::collection::vec(tree_strategy(), 1..6),
    ) {
        let original = grammar.build();
        let reloaded = ProductionTable::from_image(original.to_image().expect("frozen"))
            .expect("image reconstructs");

        for tree in trees {
            let mut a = tree.clone();
            let mut b = tree;
            original.label(&mut a, &mut NoGuards).expect("label original");
            reloaded.label(&mut b, &mut NoGuards).expect("label reloaded");

            prop_assert_eq!(a.state_number(), b.state_number());
            for nt in NTS {
                prop_assert_eq!(
                    original.can_produce(&a, &nt),
                    reloaded.can_produce(&b, &nt)
                );
                prop_assert_eq!(original.cost_for(&a, &nt), reloaded.cost_for(&b, &nt));
            }
        }
    }

    #[test]
    fn relabeling_is_idempotent(
        grammar in grammar_strategy(),
        tree in tree_strategy(),
    ) {
        let table = grammar.build();
        let mut first = tree.clone();
        table.label(&mut first, &mut NoGuards).expect("first label");
        let mut second = first.clone();
        table.label(&mut second, &mut NoGuards).expect("second label");
        prop_assert_eq!(first.state_number(), second.state_number());
    }
}
