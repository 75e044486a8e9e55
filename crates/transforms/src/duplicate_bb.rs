//! Guarded basic block duplication.
//!
//! Each selected block `B` is split right after its merge nodes. `B` keeps the merges and
//! gains a guard `icmp eq ctx, 0` on a context value visible at its entry; both arms of the
//! guard receive a clone of `B`'s body, and the tail block merges what the clones produce:
//!
//! ```text
//!                 THEN (clone)
//! B(ctx == 0) <                > TAIL(merges) --> TERM
//!                 ELSE (clone)
//! ```
//!
//! Targets are chosen up front against the reachable values computed for the untouched
//! function. Duplicating a block replaces the values it defines with merge nodes, so later
//! targets look their context value up in a [`RewriteMap`] first.

use crate::selector::RandomSelector;
use crate::Transform;
use cleft_analysis::{ReachableIntegerValues, ReachableValuesMap};
use cleft_core::cfg_ir::{
    BlockId, Function, IfThenElse, Instruction, MergeNode, Opcode, Operand, Operation, Predicate,
    Type, ValueId,
};
use cleft_core::DominatorTree;
use cleft_utils::errors::{CfgIrError, TransformError};
use cleft_utils::Ratio;
use rand::{rngs::StdRng, Rng};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Original value → value that replaced it. Values without an entry are unchanged.
pub type RewriteMap = HashMap<ValueId, ValueId>;

/// A block to duplicate and the value its guard tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicationTarget {
    pub block: BlockId,
    pub context: ValueId,
}

/// Counters of one [`duplicate_blocks`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicationSummary {
    /// Blocks that were duplicated.
    pub duplicated: usize,
    /// Instructions cloned into each arm.
    pub cloned_instructions: usize,
    /// Merge nodes added to tail blocks.
    pub merges_created: usize,
}

impl DuplicationSummary {
    pub const fn mutated(&self) -> bool {
        self.duplicated > 0
    }
}

/// Follows `value` through `rewrite` until it reaches a value that was not replaced.
pub fn resolve(rewrite: &RewriteMap, value: ValueId) -> ValueId {
    let mut current = value;
    // Bounded so a malformed map cannot loop forever.
    for _ in 0..=rewrite.len() {
        match rewrite.get(&current) {
            Some(next) if *next != current => current = *next,
            _ => break,
        }
    }
    current
}

/// Picks the blocks to duplicate, in block order.
///
/// Landing blocks are skipped without drawing. For every other block one draw decides whether
/// it is a candidate; candidates without any reachable integer value are dropped, the others
/// get a context value picked uniformly from their reachable set.
pub fn select_targets<R: Rng>(
    func: &Function,
    reachable: &ReachableValuesMap,
    ratio: Ratio,
    selector: &mut RandomSelector<R>,
) -> Result<Vec<DuplicationTarget>, TransformError> {
    let mut targets = Vec::new();
    for block in func.blocks() {
        if func.block(block)?.landing_pad {
            debug!("bb{}: landing block, skipped", block.index());
            continue;
        }
        if !selector.should_apply(ratio) {
            continue;
        }
        let candidates: Vec<ValueId> = reachable
            .get(&block)
            .map(|values| values.iter().copied().collect())
            .unwrap_or_default();
        if candidates.is_empty() {
            debug!("bb{}: no context value found", block.index());
            continue;
        }
        let context = *selector.pick_one(&candidates)?;
        debug!(
            "bb{}: picking {} as random context value",
            block.index(),
            context
        );
        targets.push(DuplicationTarget { block, context });
    }
    Ok(targets)
}

/// Selects targets in `func` and duplicates each of them.
///
/// `reachable` must have been computed on `func` before any mutation. On error the remaining
/// targets are abandoned; blocks already duplicated stay duplicated.
pub fn duplicate_blocks<R: Rng>(
    func: &mut Function,
    reachable: &ReachableValuesMap,
    ratio: Ratio,
    selector: &mut RandomSelector<R>,
) -> Result<DuplicationSummary, TransformError> {
    let targets = select_targets(func, reachable, ratio, selector)?;
    let mut rewrite = RewriteMap::new();
    let mut summary = DuplicationSummary::default();
    for target in targets {
        let cloned = duplicate(func, target, &mut rewrite)?;
        summary.duplicated += 1;
        summary.cloned_instructions += cloned.instructions;
        summary.merges_created += cloned.merges;
    }
    Ok(summary)
}

/// What a single duplication produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplicated {
    pub diamond: IfThenElse,
    pub instructions: usize,
    pub merges: usize,
}

/// Duplicates one block, recording the values it replaces in `rewrite`.
pub fn duplicate(
    func: &mut Function,
    target: DuplicationTarget,
    rewrite: &mut RewriteMap,
) -> Result<Duplicated, CfgIrError> {
    let DuplicationTarget { block, context } = target;
    let head = func.block(block)?.first_non_merge();
    let context = resolve(rewrite, context);
    func.value_type(context)?;

    let cond = func.create_value(Type::I1);
    let diamond = func.split_block_and_insert_if_then_else(block, head, cond.into())?;
    func.insert_before_terminator(
        block,
        Instruction::Op(Operation {
            result: Some(cond),
            opcode: Opcode::Icmp(Predicate::Eq),
            operands: vec![context.into(), Operand::Const(0)],
        }),
    )?;

    let IfThenElse {
        then_block,
        else_block,
        tail,
    } = diamond;
    let mut then_map: HashMap<ValueId, ValueId> = HashMap::new();
    let mut else_map: HashMap<ValueId, ValueId> = HashMap::new();
    let mut tail_map: HashMap<ValueId, ValueId> = HashMap::new();

    let body_len = func.block(tail)?.instructions.len() - 1;
    let mut merges = 0;
    let mut at = 0;
    for _ in 0..body_len {
        let original = func.block(tail)?.instructions[at].clone();

        let mut then_clone = func.clone_instruction(&original)?;
        then_clone.remap(&then_map);
        let mut else_clone = func.clone_instruction(&original)?;
        else_clone.remap(&else_map);
        let then_value = then_clone.result();
        let else_value = else_clone.result();
        func.insert_before_terminator(then_block, then_clone)?;
        func.insert_before_terminator(else_block, else_clone)?;

        match (original.result(), then_value, else_value) {
            (Some(value), Some(then_value), Some(else_value)) => {
                then_map.insert(value, then_value);
                else_map.insert(value, else_value);

                let ty = func.value_type(value)?;
                let merge = func.create_value(ty);
                func.block_mut(tail)?.instructions[at] = Instruction::Merge(MergeNode {
                    result: merge,
                    incoming: vec![
                        (then_block, then_value.into()),
                        (else_block, else_value.into()),
                    ],
                });
                // Later instructions now read the merge; their clones must still see
                // the clone of their own arm.
                then_map.insert(merge, then_value);
                else_map.insert(merge, else_value);
                tail_map.insert(value, merge);

                func.replace_all_uses_with(value, merge);
                rewrite.insert(value, merge);
                merges += 1;
                at += 1;
            }
            _ => {
                func.block_mut(tail)?.instructions.remove(at);
            }
        }
    }

    if let Some(term) = func.block_mut(tail)?.instructions.last_mut() {
        term.remap(&tail_map);
    }

    debug!(
        "duplicated bb{} on {}: then=bb{} else=bb{} tail=bb{}, {} merges",
        block.index(),
        context,
        then_block.index(),
        else_block.index(),
        tail.index(),
        merges
    );

    Ok(Duplicated {
        diamond,
        instructions: body_len,
        merges,
    })
}

/// Duplicates randomly selected blocks behind a guard on a reachable integer value.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateBb {
    ratio: Ratio,
}

impl DuplicateBb {
    pub const fn new(ratio: Ratio) -> Self {
        Self { ratio }
    }

    pub const fn ratio(&self) -> Ratio {
        self.ratio
    }
}

impl Default for DuplicateBb {
    fn default() -> Self {
        Self::new(Ratio::ALWAYS)
    }
}

impl Transform for DuplicateBb {
    fn name(&self) -> &'static str {
        "DuplicateBB"
    }

    fn apply(&self, ir: &mut Function, rng: &mut StdRng) -> Result<bool, TransformError> {
        let tree = DominatorTree::compute(ir);
        let mut analysis = ReachableIntegerValues::new();
        analysis.run(ir, &tree);

        let mut selector = RandomSelector::new(rng);
        let summary = duplicate_blocks(ir, analysis.map(), self.ratio, &mut selector)?;
        info!(
            "{}: duplicated {} blocks, {} instructions cloned",
            ir.name, summary.duplicated, summary.cloned_instructions
        );
        Ok(summary.mutated())
    }
}
