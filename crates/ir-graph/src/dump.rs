use std::fmt::Write;
use std::sync::Arc;

use crate::node::{NodePtr, Value};
use crate::traversal::post_order;

/// Text listing of every node reachable from `roots`, operands first, one
/// node per line followed by its fingerprint.
pub fn dump_graph(roots: &[Value]) -> String {
    let nodes: Vec<NodePtr> = roots.iter().map(|v| Arc::clone(v.node())).collect();
    let mut out = String::new();
    for node in post_order(&nodes, |_| false) {
        let _ = writeln!(out, "{}  # {}", node, node.fingerprint());
    }
    let outputs: Vec<String> = roots.iter().map(|v| v.to_string()).collect();
    let _ = writeln!(out, "ROOT ({})", outputs.join(", "));
    out
}
