//! CFG update operations

use cleft_utils::errors::CfgIrError;
use petgraph::visit::EdgeRef;

use super::{BlockId, Function, Instruction, Operand, Terminator, ValueId};

/// Blocks produced by [`Function::split_block_and_insert_if_then_else`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfThenElse {
    /// Taken when the condition is non-zero. Ends with a jump to `tail`.
    pub then_block: BlockId,
    /// Taken when the condition is zero. Ends with a jump to `tail`.
    pub else_block: BlockId,
    /// Holds the instructions from the split point on, including the original terminator.
    pub tail: BlockId,
}

impl Function {
    /// Installs `term` as the terminator of `block`, replacing the current one if present,
    /// and rebuilds the block's outgoing edges to match.
    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) -> Result<(), CfgIrError> {
        let data = self.block_mut(block)?;
        if data.terminator().is_some() {
            data.instructions.pop();
        }
        data.instructions.push(Instruction::Terminator(term));
        self.sync_edges(block)
    }

    /// Inserts `inst` right before the terminator of `block`.
    pub fn insert_before_terminator(
        &mut self,
        block: BlockId,
        inst: Instruction,
    ) -> Result<(), CfgIrError> {
        let data = self.block_mut(block)?;
        if data.terminator().is_none() {
            return Err(CfgIrError::MissingTerminator(block.index()));
        }
        let at = data.instructions.len() - 1;
        data.instructions.insert(at, inst);
        Ok(())
    }

    /// Replaces the outgoing edges of `block` with the successors of its terminator.
    fn sync_edges(&mut self, block: BlockId) -> Result<(), CfgIrError> {
        let successors = self
            .block(block)?
            .terminator()
            .map(Terminator::successors)
            .unwrap_or_default();

        // Edge removal swaps indices around, so look the next edge up every round.
        while let Some(edge) = self.cfg.edges(block).next().map(|e| e.id()) {
            self.cfg.remove_edge(edge);
        }
        for (target, kind) in successors {
            if self.cfg.node_weight(target).is_none() {
                return Err(CfgIrError::UnknownBlock(target.index()));
            }
            self.cfg.add_edge(block, target, kind);
        }
        Ok(())
    }

    /// Splits `block` before instruction `split_at` and inserts an if-then-else diamond.
    ///
    /// The goal is to go from
    ///
    /// ```text
    /// BLOCK --> TERM
    /// ```
    ///
    /// to
    ///
    /// ```text
    ///               THEN
    /// BLOCK(cond) <      > TAIL --> TERM
    ///               ELSE
    /// ```
    ///
    /// `block` keeps the instructions before `split_at` and now ends with a branch on `cond`.
    /// `tail` receives the rest, including the terminator, and therefore the successors; merge
    /// nodes in those successors are updated to name `tail` as their incoming block.
    pub fn split_block_and_insert_if_then_else(
        &mut self,
        block: BlockId,
        split_at: usize,
        cond: Operand,
    ) -> Result<IfThenElse, CfgIrError> {
        let data = self.block(block)?;
        if data.terminator().is_none() {
            return Err(CfgIrError::MissingTerminator(block.index()));
        }
        if split_at >= data.instructions.len() || split_at > data.first_non_merge() {
            return Err(CfgIrError::MalformedBlock {
                block: block.index(),
                reason: format!("cannot split at instruction {split_at}"),
            });
        }
        let old_successors = self.successors(block);

        let tail = self.add_block();
        let moved = self.block_mut(block)?.instructions.split_off(split_at);
        self.block_mut(tail)?.instructions = moved;
        self.sync_edges(tail)?;
        for succ in old_successors {
            for merge in self.block_mut(succ)?.merges_mut() {
                for (pred, _) in merge.incoming.iter_mut() {
                    if *pred == block {
                        *pred = tail;
                    }
                }
            }
        }

        let then_block = self.add_block();
        self.set_terminator(then_block, Terminator::Jump { target: tail })?;
        let else_block = self.add_block();
        self.set_terminator(else_block, Terminator::Jump { target: tail })?;

        self.set_terminator(
            block,
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            },
        )?;

        tracing::debug!(
            "split bb{} into then=bb{} else=bb{} tail=bb{}",
            block.index(),
            then_block.index(),
            else_block.index(),
            tail.index()
        );

        Ok(IfThenElse {
            then_block,
            else_block,
            tail,
        })
    }

    /// Replaces every use of `from` in the function with `to`.
    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) {
        for block in self.cfg.node_weights_mut() {
            for inst in &mut block.instructions {
                inst.for_each_operand_mut(|op| {
                    if *op == Operand::Value(from) {
                        *op = Operand::Value(to);
                    }
                });
            }
        }
    }

    /// Copies `inst`, giving the copy a fresh result value of the same type.
    pub fn clone_instruction(&mut self, inst: &Instruction) -> Result<Instruction, CfgIrError> {
        let mut copy = inst.clone();
        match &mut copy {
            Instruction::Op(op) => {
                if let Some(result) = op.result {
                    let ty = self.value_type(result)?;
                    op.result = Some(self.create_value(ty));
                }
            }
            Instruction::Merge(merge) => {
                let ty = self.value_type(merge.result)?;
                merge.result = self.create_value(ty);
            }
            Instruction::Terminator(_) => {}
        }
        Ok(copy)
    }
}
