//! Module computing, for every basic block, the integer values that are visible on entry to it.
//!
//! A value is visible in block `C` when it is a function argument or when it is defined by an
//! integer-typed instruction of a block that strictly dominates `C`. Arguments are seeded into the
//! entry block; every other block inherits from its immediate dominator both the dominator's own
//! reachable set and the integer values the dominator defines. Walking the dominator tree
//! top-down therefore accumulates the transitive closure in a single pass.
//!
//! # Usage
//! ```rust
//! use cleft_analysis::ReachableIntegerValues;
//! use cleft_core::cfg_ir::{FunctionBuilder, Type};
//! use cleft_core::DominatorTree;
//!
//! let mut b = FunctionBuilder::new("f", &[Type::I32]);
//! let x = b.param(0);
//! let next = b.create_block();
//! let y = b.add(x, 1);
//! b.jump(next);
//! b.switch_to_block(next);
//! b.ret(Some(y.into()));
//! let func = b.finish().unwrap();
//!
//! let mut analysis = ReachableIntegerValues::new();
//! analysis.run(&func, &DominatorTree::compute(&func));
//! assert!(analysis.values(next).unwrap().contains(&y));
//! ```

use cleft_core::cfg_ir::{BlockId, Function};
use cleft_core::{DominatorTree, ValueId};
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::debug;

/// Block → ordered set of integer values visible at the block's entry.
pub type ReachableValuesMap = HashMap<BlockId, IndexSet<ValueId>>;

/// Reachable integer values analysis.
///
/// The same instance can be run over several functions; each run starts from a clean map.
#[derive(Debug, Default, Clone)]
pub struct ReachableIntegerValues {
    map: ReachableValuesMap,
}

impl ReachableIntegerValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the map for `func`, discarding the result of any previous run.
    pub fn run(&mut self, func: &Function, tree: &DominatorTree) {
        self.map.clear();
        self.map = compute(func, tree);
    }

    /// The computed map.
    pub const fn map(&self) -> &ReachableValuesMap {
        &self.map
    }

    /// Values visible at the entry of `block`.
    pub fn values(&self, block: BlockId) -> Option<&IndexSet<ValueId>> {
        self.map.get(&block)
    }
}

/// Integer-typed values defined by the instructions of each block.
pub fn defined_integer_values(func: &Function) -> HashMap<BlockId, IndexSet<ValueId>> {
    let mut defined = HashMap::new();
    for block in func.blocks() {
        let values: &mut IndexSet<ValueId> = defined.entry(block).or_default();
        for inst in &func.cfg[block].instructions {
            let Some(result) = inst.result() else {
                continue;
            };
            if func.value_type(result).is_ok_and(|ty| ty.is_integer()) {
                values.insert(result);
            }
        }
    }
    defined
}

/// Computes the reachable integer values of every block of `func`.
///
/// Blocks the dominator tree does not reach end up with an empty set.
pub fn compute(func: &Function, tree: &DominatorTree) -> ReachableValuesMap {
    let defined = defined_integer_values(func);
    let mut map: ReachableValuesMap = func
        .blocks()
        .map(|block| (block, IndexSet::new()))
        .collect();

    // Arguments dominate everything and are never defined inside a block.
    map.entry(tree.root())
        .or_default()
        .extend(func.params.iter().copied());

    let mut worklist = vec![tree.root()];
    while let Some(parent) = worklist.pop() {
        debug!("processing bb{}", parent.index());
        let mut inherited: IndexSet<ValueId> = map.get(&parent).cloned().unwrap_or_default();
        if let Some(local) = defined.get(&parent) {
            inherited.extend(local.iter().copied());
        }
        for &child in tree.children(parent) {
            debug!("updating dominated child bb{}", child.index());
            worklist.push(child);
            map.entry(child)
                .or_default()
                .extend(inherited.iter().copied());
        }
    }
    map
}
