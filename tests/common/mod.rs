// tests/common/mod.rs
//! Shared harness for the inference integration suites: build a program
//! through the AST DSL, run the analyzer, and (optionally) replay inference
//! to check the fixpoint is stable.

#![allow(dead_code)]

use beryl::errors::InferError;
use beryl::frontend::{Ast, AstBuilder, Interner, NodeId};
use beryl::sema::Analyzer;

/// Build a program and run inference, returning the analyzer (which owns
/// the typed arena) and the root node.
pub fn infer(build: impl FnMut(&mut AstBuilder) -> NodeId) -> (Analyzer, NodeId) {
    let (result, analyzer, root) = infer_result(build);
    if let Err(e) = result {
        panic!("inference failed: {e}");
    }
    (analyzer, root)
}

/// Build a program and expect inference to fail.
pub fn infer_err(build: impl FnMut(&mut AstBuilder) -> NodeId) -> InferError {
    let (result, ..) = infer_result(build);
    match result {
        Ok(()) => panic!("expected an inference error"),
        Err(e) => e,
    }
}

pub fn infer_result(
    mut build: impl FnMut(&mut AstBuilder) -> NodeId,
) -> (Result<(), InferError>, Analyzer, NodeId) {
    let mut ast = Ast::new();
    let mut interner = Interner::new();
    let root = {
        let mut b = AstBuilder::new(&mut ast, &mut interner);
        build(&mut b)
    };
    let mut analyzer = Analyzer::new(ast, interner);
    let result = analyzer.analyze(root);
    (result, analyzer, root)
}

/// Snapshot every type cell, replay inference on the same arena, and check
/// the snapshot is reproduced: propagation must already be at its fixpoint.
pub fn assert_replay_identical(analyzer: &mut Analyzer, root: NodeId) {
    let len = analyzer.ast.len();
    let before: Vec<_> = (0..len)
        .map(|i| analyzer.ast.ty(NodeId::new(i as u32)))
        .collect();
    analyzer.analyze(root).expect("replay failed");
    assert_eq!(
        analyzer.ast.len(),
        len,
        "replay must not grow the node arena"
    );
    let after: Vec<_> = (0..len)
        .map(|i| analyzer.ast.ty(NodeId::new(i as u32)))
        .collect();
    assert_eq!(before, after, "replay changed inferred types");
}

/// Rendered type of a node, for readable assertions.
pub fn ty(analyzer: &Analyzer, node: NodeId) -> String {
    analyzer.display_node_type(node)
}
