//! Programmatic construction of [`Function`]s.

use super::{
    BasicBlock, BinaryOp, BlockId, Function, Instruction, MergeNode, Opcode, Operand, Operation,
    Predicate, Terminator, Type, ValueId,
};
use cleft_utils::errors::CfgIrError;

/// Appends instructions to a function under construction, one block at a time.
///
/// Instructions go to the end of the current block; terminators close it. Merge nodes are
/// placed after the merges already at the head of the current block. `finish` runs the
/// verifier, so a builder cannot hand out a malformed function.
///
/// # Examples
/// ```
/// use cleft_core::cfg_ir::{FunctionBuilder, Type};
///
/// let mut b = FunctionBuilder::new("add", &[Type::I32, Type::I32]);
/// let (x, y) = (b.param(0), b.param(1));
/// let sum = b.add(x, y);
/// b.ret(Some(sum.into()));
/// let func = b.finish().unwrap();
/// assert_eq!(func.block_count(), 1);
/// ```
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    current: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, params: &[Type]) -> Self {
        let func = Function::new(name, params);
        let current = func.entry;
        Self { func, current }
    }

    /// The `index`-th parameter.
    ///
    /// # Panics
    /// Panics if the function has fewer parameters.
    pub fn param(&self, index: usize) -> ValueId {
        self.func.params[index]
    }

    pub const fn entry_block(&self) -> BlockId {
        self.func.entry
    }

    pub const fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn create_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    /// Creates a block flagged as an exception landing block.
    pub fn create_landing_pad(&mut self) -> BlockId {
        self.func.cfg.add_node(BasicBlock {
            instructions: Vec::new(),
            landing_pad: true,
        })
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = block;
    }

    fn push(&mut self, inst: Instruction) {
        self.func.cfg[self.current].instructions.push(inst);
    }

    fn operand_type(&self, operand: Operand) -> Type {
        operand
            .as_value()
            .and_then(|v| self.func.value_type(v).ok())
            .unwrap_or(Type::I64)
    }

    /// Emits an operation producing a value of type `ty`.
    pub fn op(&mut self, opcode: Opcode, ty: Type, operands: Vec<Operand>) -> ValueId {
        let result = self.func.create_value(ty);
        self.push(Instruction::Op(Operation {
            result: Some(result),
            opcode,
            operands,
        }));
        result
    }

    /// Emits `lhs op rhs`; the result takes the type of the first value operand.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = match lhs.as_value() {
            Some(_) => self.operand_type(lhs),
            None => self.operand_type(rhs),
        };
        self.op(Opcode::Binary(op), ty, vec![lhs, rhs])
    }

    pub fn add(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    pub fn and(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn icmp(
        &mut self,
        pred: Predicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        self.op(Opcode::Icmp(pred), Type::I1, vec![lhs.into(), rhs.into()])
    }

    pub fn alloca(&mut self) -> ValueId {
        self.op(Opcode::Alloca, Type::Ptr, Vec::new())
    }

    pub fn load(&mut self, ty: Type, ptr: ValueId) -> ValueId {
        self.op(Opcode::Load, ty, vec![ptr.into()])
    }

    pub fn store(&mut self, ptr: ValueId, value: impl Into<Operand>) {
        self.push(Instruction::Op(Operation {
            result: None,
            opcode: Opcode::Store,
            operands: vec![ptr.into(), value.into()],
        }));
    }

    pub fn copy(&mut self, value: impl Into<Operand>) -> ValueId {
        let value = value.into();
        let ty = self.operand_type(value);
        self.op(Opcode::Copy, ty, vec![value])
    }

    /// Adds a merge node to the head of the current block.
    pub fn merge(&mut self, ty: Type, incoming: &[(BlockId, Operand)]) -> ValueId {
        let result = self.func.create_value(ty);
        let block = &mut self.func.cfg[self.current];
        let at = block.first_non_merge();
        block.instructions.insert(
            at,
            Instruction::Merge(MergeNode {
                result,
                incoming: incoming.to_vec(),
            }),
        );
        result
    }

    /// Adds an incoming pair to an existing merge node, for loops whose back edge value is
    /// only known once the loop body is built.
    pub fn add_incoming(
        &mut self,
        merge: ValueId,
        pred: BlockId,
        value: impl Into<Operand>,
    ) -> Result<(), CfgIrError> {
        let value = value.into();
        for block in self.func.cfg.node_weights_mut() {
            if let Some(node) = block.merges_mut().find(|m| m.result == merge) {
                node.incoming.push((pred, value));
                return Ok(());
            }
        }
        Err(CfgIrError::UnknownValue(merge.0))
    }

    fn terminate(&mut self, term: Terminator) {
        let block = self.current;
        // An unknown target leaves the edges out of sync; `finish` reports it.
        let _ = self.func.set_terminator(block, term);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump { target });
    }

    pub fn branch(&mut self, cond: impl Into<Operand>, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond: cond.into(),
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Return { value });
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    /// Verifies and returns the function.
    pub fn finish(self) -> Result<Function, CfgIrError> {
        crate::verify::verify(&self.func)?;
        Ok(self.func)
    }
}
