//! Dominator tree over a function's CFG.
//!
//! Immediate dominators come from `petgraph`'s `simple_fast` (Cooper, Harvey and Kennedy).
//! The tree stores the parent relation and the induced child lists so that analyses can walk
//! it top-down from the entry block.

use crate::cfg_ir::{BlockId, Function};
use petgraph::algo::dominators::simple_fast;
use std::collections::HashMap;

/// Immediate-dominator tree rooted at the function's entry block.
///
/// Blocks unreachable from the entry are not part of the tree.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    root: BlockId,
    idom: HashMap<BlockId, BlockId>,
    children: HashMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    pub fn compute(func: &Function) -> Self {
        let doms = simple_fast(&func.cfg, func.entry);
        let mut idom = HashMap::new();
        let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();

        for node in func.cfg.node_indices() {
            if let Some(parent) = doms.immediate_dominator(node) {
                idom.insert(node, parent);
                children.entry(parent).or_default().push(node);
            }
        }
        for list in children.values_mut() {
            list.sort();
        }

        tracing::debug!(
            "dominator tree for {}: {} of {} blocks reachable",
            func.name,
            idom.len() + 1,
            func.block_count()
        );

        Self {
            root: func.entry,
            idom,
            children,
        }
    }

    pub const fn root(&self) -> BlockId {
        self.root
    }

    /// Parent of `block` in the tree; `None` for the root and for unreachable blocks.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    /// Blocks immediately dominated by `block`, ordered by index.
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `block` is reachable from the entry.
    pub fn contains(&self, block: BlockId) -> bool {
        block == self.root || self.idom.contains_key(&block)
    }

    /// Whether `a` dominates `b`. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.contains(b) {
            return false;
        }
        let mut cursor = Some(b);
        while let Some(node) = cursor {
            if node == a {
                return true;
            }
            cursor = self.immediate_dominator(node);
        }
        false
    }

    /// Blocks of the tree, each listed after its parent.
    pub fn pre_order(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.idom.len() + 1);
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        order
    }
}
