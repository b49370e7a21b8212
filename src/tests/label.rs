use super::*;
use crate::node::NoGuards;
use crate::test_utils::{setup, T};

fn call_grammar() -> ProductionTable<&'static str, &'static str> {
    let mut table = setup();
    table.add_pattern("Fn", "FnName", 1, vec![]).unwrap();
    table.add_pattern("Arg", "ArgLiteral", 1, vec![]).unwrap();
    table
        .add_pattern_match("Val", "Call", 1, None, None, None, true, vec!["Fn", "Arg"])
        .unwrap();
    table.generate_states().unwrap();
    table
}

#[test]
fn labeling_assigns_states_bottom_up() {
    let mut table = setup();
    table.add_pattern("Int", "IntLiteral", 1, vec![]).unwrap();
    table.add_pattern("Int", "Neg", 1, vec!["Int"]).unwrap();
    table.generate_states().unwrap();

    let mut tree = T::node("Neg", vec![T::leaf("IntLiteral")]);
    table.label(&mut tree, &mut NoGuards).unwrap();

    let child = tree.child(0).unwrap();
    assert!(child.state_number().is_some(), "children are labeled first");
    assert_ne!(child.state_number(), tree.state_number());
    assert!(tree.leaf_ref().is_some(), "resolution records the leaf");
}

#[test]
fn deep_chains_label_without_issue() {
    let mut table = setup();
    table.add_pattern("Int", "IntLiteral", 1, vec![]).unwrap();
    table.add_pattern("Int", "Neg", 1, vec!["Int"]).unwrap();
    table.generate_states().unwrap();

    let mut tree = T::leaf("IntLiteral");
    for _ in 0..200 {
        tree = T::node("Neg", vec![tree]);
    }
    table.label(&mut tree, &mut NoGuards).unwrap();
    assert!(table.can_produce(&tree, &"Int"));
}

#[test]
fn variadic_pattern_with_fixed_prefix_walks_interior_then_tail() {
    let table = call_grammar();

    let mut tree = T::node(
        "Call",
        vec![
            T::leaf("FnName"),
            T::leaf("ArgLiteral"),
            T::leaf("ArgLiteral"),
            T::leaf("ArgLiteral"),
        ],
    );
    table.label(&mut tree, &mut NoGuards).unwrap();
    assert!(table.can_produce(&tree, &"Val"));
}

#[test]
fn variadic_tail_rejects_a_fixed_prefix_state() {
    let table = call_grammar();

    // A function name in an argument slot cannot produce Arg.
    let mut tree = T::node(
        "Call",
        vec![T::leaf("FnName"), T::leaf("ArgLiteral"), T::leaf("FnName")],
    );
    table.label(&mut tree, &mut NoGuards).unwrap();
    assert_eq!(tree.state_number(), Some(StateNum::ERROR));
}

#[test]
fn exact_arity_operator_is_preferred_over_variadic_fallback() {
    let mut table = setup();
    table
        .add_pattern("String", "StringLiteral", 1, vec![])
        .unwrap();
    table
        .add_variadic_pattern("String", "Concat", 1, vec!["String"])
        .unwrap();
    table
        .add_pattern("String", "Concat", 7, vec!["String", "String"])
        .unwrap();
    table.generate_states().unwrap();

    let mut pair = T::node(
        "Concat",
        vec![T::leaf("StringLiteral"), T::leaf("StringLiteral")],
    );
    table.label(&mut pair, &mut NoGuards).unwrap();

    // The exact 2-ary operator handles the pair; the variadic pattern
    // still competes inside it and wins on cost.
    assert!(table.can_produce(&pair, &"String"));
    assert_eq!(table.cost_for(&pair, &"String"), Cost::new(3), "1 + 1 + 1");
}

#[test]
fn unlabeled_nodes_produce_nothing() {
    let table = call_grammar();
    let tree = T::leaf("FnName");
    assert!(!table.can_produce(&tree, &"Fn"));
    assert_eq!(table.cost_for(&tree, &"Fn"), Cost::INFINITE);
}

#[test]
fn relabeling_is_stable() {
    let table = call_grammar();
    let mut tree = T::node("Call", vec![T::leaf("FnName"), T::leaf("ArgLiteral")]);
    table.label(&mut tree, &mut NoGuards).unwrap();
    let first = tree.state_number();
    table.label(&mut tree, &mut NoGuards).unwrap();
    assert_eq!(tree.state_number(), first);
}

#[test]
fn labels_to_combines_label_and_query() {
    let table = call_grammar();
    let mut tree = T::node("Call", vec![T::leaf("FnName"), T::leaf("ArgLiteral")]);
    assert!(table.labels_to(&mut tree, &"Val", &mut NoGuards).unwrap());
    assert!(!table.labels_to(&mut tree, &"Fn", &mut NoGuards).unwrap());
}
