//! Structural and SSA well-formedness checks for a [`Function`].
//!
//! Transforms assume their input passes these checks, and tests run them on
//! every transformed function.

use crate::cfg_ir::{BlockId, Function, Instruction, Opcode, Operand, Terminator, Type, ValueId};
use crate::dominators::DominatorTree;
use cleft_utils::errors::CfgIrError;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// Checks that `func` is well formed:
///
/// * every block ends with its only terminator and merges form a prefix,
/// * graph edges agree with terminators,
/// * every used value exists and is defined exactly once,
/// * merge nodes list each predecessor exactly once,
/// * definitions dominate their uses (merge uses are checked at the end of the incoming block),
/// * branch conditions and arithmetic operands are integers, memory operands are pointers.
pub fn verify(func: &Function) -> Result<(), CfgIrError> {
    if func.cfg.node_count() == 0 || func.cfg.node_weight(func.entry).is_none() {
        return Err(CfgIrError::NoEntryBlock);
    }

    for block in func.blocks() {
        check_layout(func, block)?;
        check_edges(func, block)?;
    }

    let defs = collect_definitions(func)?;
    let tree = DominatorTree::compute(func);

    for block in func.blocks() {
        check_merges(func, block)?;
        for (index, inst) in func.cfg[block].instructions.iter().enumerate() {
            check_types(func, block, inst)?;
            match inst {
                Instruction::Merge(merge) => {
                    for (pred, op) in &merge.incoming {
                        if let Operand::Value(value) = op {
                            check_use(func, &tree, &defs, *pred, usize::MAX, *value)?;
                        }
                    }
                }
                _ => {
                    for value in inst.used_values() {
                        check_use(func, &tree, &defs, block, index, value)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn malformed(block: BlockId, reason: impl Into<String>) -> CfgIrError {
    CfgIrError::MalformedBlock {
        block: block.index(),
        reason: reason.into(),
    }
}

fn check_layout(func: &Function, block: BlockId) -> Result<(), CfgIrError> {
    let insts = &func.cfg[block].instructions;
    if !matches!(insts.last(), Some(Instruction::Terminator(_))) {
        return Err(CfgIrError::MissingTerminator(block.index()));
    }
    if insts[..insts.len() - 1].iter().any(Instruction::is_terminator) {
        return Err(malformed(block, "terminator before the end of the block"));
    }
    let head = func.cfg[block].first_non_merge();
    if insts[head..].iter().any(Instruction::is_merge) {
        return Err(malformed(block, "merge node after a non-merge instruction"));
    }
    Ok(())
}

fn check_edges(func: &Function, block: BlockId) -> Result<(), CfgIrError> {
    let mut expected = func.cfg[block]
        .terminator()
        .map(Terminator::successors)
        .unwrap_or_default();
    let mut actual: Vec<_> = func
        .cfg
        .edges(block)
        .map(|e| (e.target(), *e.weight()))
        .collect();
    expected.sort();
    actual.sort();
    if expected != actual {
        return Err(CfgIrError::EdgeMismatch(block.index()));
    }
    Ok(())
}

/// Maps each value to its defining block and position; parameters map to `None`.
fn collect_definitions(
    func: &Function,
) -> Result<HashMap<ValueId, Option<(BlockId, usize)>>, CfgIrError> {
    let mut defs = HashMap::new();
    for param in &func.params {
        if defs.insert(*param, None).is_some() {
            return Err(CfgIrError::Redefinition(param.0));
        }
    }
    for block in func.blocks() {
        for (index, inst) in func.cfg[block].instructions.iter().enumerate() {
            if let Some(result) = inst.result() {
                func.value_type(result)?;
                if defs.insert(result, Some((block, index))).is_some() {
                    return Err(CfgIrError::Redefinition(result.0));
                }
            }
        }
    }
    Ok(defs)
}

fn check_merges(func: &Function, block: BlockId) -> Result<(), CfgIrError> {
    let preds: HashSet<BlockId> = func.predecessors(block).into_iter().collect();
    for merge in func.cfg[block].merges() {
        let invalid = |reason: &str| CfgIrError::InvalidMerge {
            block: block.index(),
            value: merge.result.0,
            reason: reason.to_string(),
        };
        let mut seen = HashSet::new();
        for (pred, _) in &merge.incoming {
            if !preds.contains(pred) {
                return Err(invalid(&format!("bb{} is not a predecessor", pred.index())));
            }
            if !seen.insert(*pred) {
                return Err(invalid(&format!("bb{} listed twice", pred.index())));
            }
        }
        if seen.len() != preds.len() {
            return Err(invalid("missing incoming value for a predecessor"));
        }
    }
    Ok(())
}

fn check_use(
    func: &Function,
    tree: &DominatorTree,
    defs: &HashMap<ValueId, Option<(BlockId, usize)>>,
    block: BlockId,
    index: usize,
    value: ValueId,
) -> Result<(), CfgIrError> {
    func.value_type(value)?;
    let Some(def) = defs.get(&value) else {
        return Err(CfgIrError::UnknownValue(value.0));
    };
    let Some((def_block, def_index)) = def else {
        return Ok(());
    };
    // Code unreachable from the entry has no dominance information.
    if !tree.contains(block) {
        return Ok(());
    }
    let dominated = if *def_block == block {
        *def_index < index
    } else {
        tree.dominates(*def_block, block)
    };
    if !dominated {
        return Err(CfgIrError::DominanceViolation {
            block: block.index(),
            value: value.0,
        });
    }
    Ok(())
}

fn operand_type(func: &Function, op: Operand) -> Result<Option<Type>, CfgIrError> {
    op.as_value().map(|v| func.value_type(v)).transpose()
}

fn check_types(func: &Function, block: BlockId, inst: &Instruction) -> Result<(), CfgIrError> {
    let mismatch = |reason: &str| CfgIrError::TypeMismatch {
        block: block.index(),
        reason: reason.to_string(),
    };
    match inst {
        Instruction::Terminator(Terminator::Branch { cond, .. }) => {
            if matches!(operand_type(func, *cond)?, Some(Type::Ptr)) {
                return Err(mismatch("branch condition must be an integer"));
            }
        }
        Instruction::Op(op) => {
            let arity = match op.opcode {
                Opcode::Binary(_) | Opcode::Icmp(_) | Opcode::Store => 2,
                Opcode::Load | Opcode::Copy => 1,
                Opcode::Alloca => 0,
            };
            if op.operands.len() != arity {
                return Err(mismatch(&format!("{} expects {arity} operands", op.opcode)));
            }
            if matches!(op.opcode, Opcode::Load | Opcode::Store)
                && operand_type(func, op.operands[0])? != Some(Type::Ptr)
            {
                return Err(mismatch(&format!("{} needs a pointer operand", op.opcode)));
            }
            if matches!(op.opcode, Opcode::Binary(_)) {
                for operand in &op.operands {
                    if operand_type(func, *operand)? == Some(Type::Ptr) {
                        return Err(mismatch(&format!("{} on a pointer", op.opcode)));
                    }
                }
            }
            if op.result.is_none() != matches!(op.opcode, Opcode::Store) {
                return Err(mismatch(&format!("{} result mismatch", op.opcode)));
            }
        }
        _ => {}
    }
    Ok(())
}
