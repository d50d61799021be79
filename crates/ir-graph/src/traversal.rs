use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::node::{Node, NodePtr};

/// Nodes reachable from `roots` in post-order: every node after all of its
/// operands, operands visited in declared order, each node once.
///
/// Nodes for which `skip` returns true are left out together with anything
/// reachable only through them.
pub fn post_order<F>(roots: &[NodePtr], skip: F) -> Vec<NodePtr>
where
    F: Fn(&Node) -> bool,
{
    let mut order = Vec::new();
    let mut seen = FxHashSet::default();
    // (node, index of the next operand to visit)
    let mut stack: Vec<(NodePtr, usize)> = Vec::new();

    for root in roots {
        if skip(root) || !seen.insert(root.id()) {
            continue;
        }
        stack.push((Arc::clone(root), 0));

        while let Some((node, next)) = stack.last_mut() {
            let child = node.operands().get(*next).map(|v| Arc::clone(v.node()));
            *next += 1;
            match child {
                Some(child) => {
                    if !skip(&child) && seen.insert(child.id()) {
                        stack.push((child, 0));
                    }
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        order.push(done);
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Value;
    use crate::ops::{cumsum, parameter};
    use ir_tensor::{DType, ValueShape};

    fn leaf(index: usize) -> Value {
        parameter(index, ValueShape::array(DType::F32, &[4]), "x").unwrap()
    }

    #[test]
    fn test_chain() {
        let x = leaf(0);
        let a = cumsum(&x, 0, None).unwrap();
        let b = cumsum(&a, 0, None).unwrap();
        let order = post_order(&[b.node().clone()], |_| false);
        let ids: Vec<_> = order.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![x.node().id(), a.node().id(), b.node().id()]);
    }

    #[test]
    fn test_shared_operand_visited_once() {
        let x = leaf(0);
        let a = cumsum(&x, 0, None).unwrap();
        let b = cumsum(&x, 0, None).unwrap();
        let order = post_order(&[a.node().clone(), b.node().clone()], |_| false);
        assert_eq!(order.len(), 3);
        assert!(Arc::ptr_eq(&order[0], x.node()));
        assert!(Arc::ptr_eq(&order[1], a.node()));
        assert!(Arc::ptr_eq(&order[2], b.node()));
    }

    #[test]
    fn test_operands_in_declared_order() {
        let early = leaf(0);
        let token = crate::ops::create_token().unwrap();
        let out = crate::ops::collective_permute(&early, &token, vec![]).unwrap();
        let order = post_order(&[out.data.node().clone()], |_| false);
        assert!(Arc::ptr_eq(&order[0], early.node()));
        assert!(Arc::ptr_eq(&order[1], token.node()));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_skip_prunes_subgraph() {
        let x = leaf(0);
        let a = cumsum(&x, 0, None).unwrap();
        let b = cumsum(&a, 0, None).unwrap();
        let a_id = a.node().id();
        let order = post_order(&[b.node().clone()], |n| n.id() == a_id);
        assert_eq!(order.len(), 1);
        assert!(Arc::ptr_eq(&order[0], b.node()));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let root = leaf(0);
        let mut value = root.clone();
        for _ in 0..100_000 {
            value = cumsum(&value, 0, None).unwrap();
        }
        let order = post_order(&[value.node().clone()], |_| false);
        assert_eq!(order.len(), 100_001);
        assert!(Arc::ptr_eq(&order[0], root.node()));

        drop(order);
        drop(value);
        assert_eq!(Arc::strong_count(root.node()), 1);
    }
}
