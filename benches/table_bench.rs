//! Table-construction and labeling benchmarks using Criterion.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure:
//! - The fixed-point driver on an instruction-selection-sized grammar
//! - Labeling throughput on deep and wide trees
//! - Serialization image construction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use burg::leaf::LeafId;
use burg::node::{NoGuards, TreeNode};
use burg::state::StateNum;
use burg::table::ProductionTable;

type Nt = &'static str;
type Tag = &'static str;

#[derive(Debug, Clone)]
struct Node {
    tag: Tag,
    children: Vec<Option<Node>>,
    state: Option<StateNum>,
    leaf: Option<LeafId>,
}

impl Node {
    fn leaf(tag: Tag) -> Node {
        Node {
            tag,
            children: Vec::new(),
            state: None,
            leaf: None,
        }
    }

    fn node(tag: Tag, children: Vec<Node>) -> Node {
        Node {
            tag,
            children: children.into_iter().map(Some).collect(),
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

/// A small instruction-selection-shaped grammar: registers, immediates,
/// addressing modes, and statements.
fn register_grammar(table: &mut ProductionTable<Nt, Tag>) {
    table.add_pattern("Reg", "Temp", 1, vec![]).unwrap();
    table.add_pattern("Imm", "Const", 1, vec![]).unwrap();
    table.add_closure("Reg", "Imm", 1, None).unwrap();

    table
        .add_pattern("Reg", "Add", 1, vec!["Reg", "Reg"])
        .unwrap();
    table
        .add_pattern("Reg", "Add", 2, vec!["Reg", "Imm"])
        .unwrap();
    table
        .add_pattern("Reg", "Sub", 1, vec!["Reg", "Reg"])
        .unwrap();
    table
        .add_pattern("Reg", "Mul", 3, vec!["Reg", "Reg"])
        .unwrap();
    table
        .add_pattern("Addr", "Add", 0, vec!["Reg", "Imm"])
        .unwrap();
    table.add_pattern("Addr", "Frame", 1, vec![]).unwrap();
    table.add_pattern("Reg", "Load", 2, vec!["Addr"]).unwrap();
    table
        .add_pattern("Stmt", "Store", 1, vec!["Addr", "Reg"])
        .unwrap();
    table
        .add_variadic_pattern("Stmt", "Seq", 1, vec!["Stmt"])
        .unwrap();
}

fn build_table() -> ProductionTable<Nt, Tag> {
    let mut table = ProductionTable::new();
    register_grammar(&mut table);
    table.generate_states().unwrap();
    table
}

/// Build an expression tree of the given depth:
/// Add(Mul(t, c), Add(t, ...)).
fn expression(depth: usize) -> Node {
    if depth == 0 {
        Node::leaf("Temp")
    } else {
        Node::node(
            "Add",
            vec![
                Node::node("Mul", vec![Node::leaf("Temp"), Node::leaf("Const")]),
                expression(depth - 1),
            ],
        )
    }
}

fn bench_generate_states(c: &mut Criterion) {
    c.bench_function("generate_states", |b| {
        b.iter(|| {
            let mut table = ProductionTable::new();
            register_grammar(&mut table);
            table.generate_states().unwrap();
            black_box(table.state_count())
        })
    });
}

fn bench_label_depth(c: &mut Criterion) {
    let table = build_table();
    let mut group = c.benchmark_group("label_depth");
    for depth in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let template = expression(depth);
            b.iter(|| {
                let mut tree = template.clone();
                table.label(&mut tree, &mut NoGuards).unwrap();
                black_box(tree.state_number())
            })
        });
    }
    group.finish();
}

fn bench_label_variadic(c: &mut Criterion) {
    let table = build_table();
    let stores: Vec<Node> = (0..64)
        .map(|_| {
            Node::node(
                "Store",
                vec![Node::leaf("Frame"), Node::leaf("Temp")],
            )
        })
        .collect();
    let template = Node::node("Seq", stores);

    c.bench_function("label_variadic_seq", |b| {
        b.iter(|| {
            let mut tree = template.clone();
            table.label(&mut tree, &mut NoGuards).unwrap();
            black_box(tree.state_number())
        })
    });
}

fn bench_to_image(c: &mut Criterion) {
    let table = build_table();
    c.bench_function("to_image", |b| {
        b.iter(|| black_box(table.to_image().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_generate_states,
    bench_label_depth,
    bench_label_variadic,
    bench_to_image
);
criterion_main!(benches);
