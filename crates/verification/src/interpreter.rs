//! Reference interpreter for the IR.
//!
//! Integers are kept sign-extended from their bit width (`i1` is kept as 0 or 1) and every
//! arithmetic result wraps. `alloca` hands out a fresh zeroed slot; pointers are slot indices.
//! Pointer arguments get a slot each, initialised with the argument value, and the final
//! contents of those slots are part of the result.

use crate::{VerificationError, VerificationResult};
use cleft_core::cfg_ir::{
    BinaryOp, Function, Instruction, Opcode, Operand, Operation, Predicate, Terminator, Type,
    ValueId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observable result of running a function to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Returned value, if any.
    pub value: Option<i64>,
    /// Final contents of the slots behind pointer arguments, in parameter order.
    pub memory: Vec<i64>,
    /// Instructions executed, merges included.
    pub steps: u64,
}

/// Runs `func` on `args` with an instruction budget of `fuel`.
pub fn execute(func: &Function, args: &[i64], fuel: u64) -> VerificationResult<Execution> {
    Interpreter::new(func, fuel).run(args)
}

/// Reduces `value` to `bits` bits.
pub fn wrap(value: i64, bits: u32) -> i64 {
    match bits {
        1 => value & 1,
        b if b >= 64 => value,
        _ => {
            let shift = 64 - bits;
            (value << shift) >> shift
        }
    }
}

fn binary(op: BinaryOp, lhs: i64, rhs: i64, bits: u32) -> i64 {
    let mask = if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    };
    let amount = (rhs as u64) % u64::from(bits.max(1));
    match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::And => lhs & rhs,
        BinaryOp::Or => lhs | rhs,
        BinaryOp::Xor => lhs ^ rhs,
        BinaryOp::Shl => lhs.wrapping_shl(amount as u32),
        BinaryOp::LShr => (((lhs as u64) & mask) >> amount) as i64,
    }
}

fn compare(pred: Predicate, lhs: i64, rhs: i64) -> bool {
    match pred {
        Predicate::Eq => lhs == rhs,
        Predicate::Ne => lhs != rhs,
        Predicate::Slt => lhs < rhs,
        Predicate::Sle => lhs <= rhs,
        Predicate::Sgt => lhs > rhs,
        Predicate::Sge => lhs >= rhs,
    }
}

/// Interpreter state for a single call.
#[derive(Debug)]
pub struct Interpreter<'f> {
    func: &'f Function,
    env: HashMap<ValueId, i64>,
    memory: Vec<i64>,
    fuel: u64,
    steps: u64,
    /// Index of the block being executed, for trap reports.
    block: usize,
}

impl<'f> Interpreter<'f> {
    pub fn new(func: &'f Function, fuel: u64) -> Self {
        Self {
            func,
            env: HashMap::new(),
            memory: Vec::new(),
            fuel,
            steps: 0,
            block: func.entry.index(),
        }
    }

    pub fn run(mut self, args: &[i64]) -> VerificationResult<Execution> {
        let func = self.func;
        if args.len() != func.params.len() {
            return Err(VerificationError::ArityMismatch {
                expected: func.params.len(),
                got: args.len(),
            });
        }

        let mut arg_slots = Vec::new();
        for (param, arg) in func.params.iter().zip(args) {
            let value = match func.value_type(*param)? {
                Type::Ptr => {
                    let slot = self.alloc(*arg);
                    arg_slots.push(slot);
                    slot as i64
                }
                ty => wrap(*arg, ty.bits()),
            };
            self.env.insert(*param, value);
        }

        let mut block = func.entry;
        let mut pred = None;
        'blocks: loop {
            let data = func.block(block)?;
            self.block = block.index();

            // Merges read their inputs before any of them is written.
            let mut merged = Vec::new();
            for merge in data.merges() {
                self.tick()?;
                let incoming = pred
                    .and_then(|from| merge.incoming_from(from))
                    .ok_or_else(|| VerificationError::Trap {
                        block: block.index(),
                        reason: format!("no incoming value for {}", merge.result),
                    })?;
                merged.push((merge.result, self.operand(incoming)?));
            }
            self.env.extend(merged);

            for inst in &data.instructions[data.first_non_merge()..] {
                self.tick()?;
                match inst {
                    Instruction::Merge(_) => {
                        return Err(VerificationError::Trap {
                            block: block.index(),
                            reason: "merge after the block head".into(),
                        })
                    }
                    Instruction::Op(op) => self.step(op)?,
                    Instruction::Terminator(Terminator::Jump { target }) => {
                        pred = Some(block);
                        block = *target;
                        continue 'blocks;
                    }
                    Instruction::Terminator(Terminator::Branch {
                        cond,
                        then_block,
                        else_block,
                    }) => {
                        let taken = self.operand(*cond)? != 0;
                        pred = Some(block);
                        block = if taken { *then_block } else { *else_block };
                        continue 'blocks;
                    }
                    Instruction::Terminator(Terminator::Return { value }) => {
                        let value = value.map(|v| self.operand(v)).transpose()?;
                        let memory = arg_slots.iter().map(|slot| self.memory[*slot]).collect();
                        return Ok(Execution {
                            value,
                            memory,
                            steps: self.steps,
                        });
                    }
                    Instruction::Terminator(Terminator::Unreachable) => {
                        return Err(VerificationError::Trap {
                            block: block.index(),
                            reason: "reached unreachable".into(),
                        })
                    }
                }
            }
            return Err(VerificationError::Trap {
                block: block.index(),
                reason: "fell off the end of the block".into(),
            });
        }
    }

    fn tick(&mut self) -> VerificationResult<()> {
        if self.steps >= self.fuel {
            return Err(VerificationError::OutOfFuel(self.steps));
        }
        self.steps += 1;
        Ok(())
    }

    fn alloc(&mut self, init: i64) -> usize {
        self.memory.push(init);
        self.memory.len() - 1
    }

    fn operand(&self, operand: Operand) -> VerificationResult<i64> {
        match operand {
            Operand::Const(value) => Ok(value),
            Operand::Value(value) => self
                .env
                .get(&value)
                .copied()
                .ok_or(VerificationError::Undefined(value.0)),
        }
    }

    fn arg(&self, op: &Operation, index: usize) -> VerificationResult<i64> {
        let operand = op
            .operands
            .get(index)
            .copied()
            .ok_or_else(|| VerificationError::Trap {
                block: self.block,
                reason: format!("{} is missing operand {index}", op.opcode),
            })?;
        self.operand(operand)
    }

    /// Width the operands of `op` are read at: the type of its first value operand.
    fn operand_bits(&self, op: &Operation) -> VerificationResult<u32> {
        match op.operands.iter().find_map(|o| o.as_value()) {
            Some(value) => Ok(self.func.value_type(value)?.bits()),
            None => Ok(64),
        }
    }

    fn slot(&self, op: &Operation) -> VerificationResult<usize> {
        let ptr = self.arg(op, 0)?;
        usize::try_from(ptr)
            .ok()
            .filter(|slot| *slot < self.memory.len())
            .ok_or_else(|| VerificationError::Trap {
                block: self.block,
                reason: format!("invalid pointer {ptr}"),
            })
    }

    fn step(&mut self, op: &Operation) -> VerificationResult<()> {
        let result_bits = match op.result {
            Some(result) => self.func.value_type(result)?.bits(),
            None => 64,
        };
        let value = match op.opcode {
            Opcode::Binary(bin) => {
                let bits = self.operand_bits(op)?;
                let (lhs, rhs) = (wrap(self.arg(op, 0)?, bits), wrap(self.arg(op, 1)?, bits));
                Some(wrap(binary(bin, lhs, rhs, result_bits), result_bits))
            }
            Opcode::Icmp(pred) => {
                let bits = self.operand_bits(op)?;
                let (lhs, rhs) = (wrap(self.arg(op, 0)?, bits), wrap(self.arg(op, 1)?, bits));
                Some(i64::from(compare(pred, lhs, rhs)))
            }
            Opcode::Alloca => Some(self.alloc(0) as i64),
            Opcode::Load => {
                let slot = self.slot(op)?;
                Some(wrap(self.memory[slot], result_bits))
            }
            Opcode::Store => {
                let slot = self.slot(op)?;
                self.memory[slot] = self.arg(op, 1)?;
                None
            }
            Opcode::Copy => Some(self.arg(op, 0)?),
        };
        if let (Some(result), Some(value)) = (op.result, value) {
            self.env.insert(result, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleft_core::cfg_ir::FunctionBuilder;

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(255, 8), -1);
        assert_eq!(wrap(128, 8), -128);
        assert_eq!(wrap(0x8000, 16), -32768);
        assert_eq!(wrap(3, 1), 1);
        assert_eq!(wrap(i64::MIN, 64), i64::MIN);
        assert_eq!(wrap(0x1_0000_0005, 32), 5);
    }

    #[test]
    fn test_arithmetic_wraps_at_width() {
        let mut b = FunctionBuilder::new("f", &[Type::I8]);
        let x = b.param(0);
        let y = b.add(x, 1);
        b.ret(Some(y.into()));
        let func = b.finish().unwrap();
        assert_eq!(execute(&func, &[127], 100).unwrap().value, Some(-128));
        assert_eq!(execute(&func, &[5], 100).unwrap().value, Some(6));
    }

    #[test]
    fn test_loop_with_merge() {
        // sum = 0; i = 0; do { sum += i; i += 1 } while i < n
        let mut b = FunctionBuilder::new("sum", &[Type::I32]);
        let n = b.param(0);
        let entry = b.entry_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.jump(body);
        b.switch_to_block(body);
        let i = b.merge(Type::I32, &[(entry, 0i64.into())]);
        let sum = b.merge(Type::I32, &[(entry, 0i64.into())]);
        let sum_next = b.add(sum, i);
        let i_next = b.add(i, 1);
        let more = b.icmp(Predicate::Slt, i_next, n);
        b.branch(more, body, exit);
        b.add_incoming(i, body, i_next).unwrap();
        b.add_incoming(sum, body, sum_next).unwrap();
        b.switch_to_block(exit);
        b.ret(Some(sum_next.into()));
        let func = b.finish().unwrap();

        assert_eq!(execute(&func, &[5], 1_000).unwrap().value, Some(10));
        assert!(matches!(
            execute(&func, &[1_000_000], 1_000),
            Err(VerificationError::OutOfFuel(1_000))
        ));
    }

    #[test]
    fn test_pointer_arguments_are_observable() {
        let mut b = FunctionBuilder::new("bump", &[Type::Ptr]);
        let p = b.param(0);
        let old = b.load(Type::I32, p);
        let new = b.add(old, 2);
        b.store(p, new);
        let slot = b.alloca();
        b.store(slot, 9);
        let nine = b.load(Type::I32, slot);
        b.ret(Some(nine.into()));
        let func = b.finish().unwrap();

        let run = execute(&func, &[40], 100).unwrap();
        assert_eq!(run.value, Some(9));
        assert_eq!(run.memory, vec![42]);
    }

    #[test]
    fn test_arity_and_unreachable() {
        let mut b = FunctionBuilder::new("f", &[Type::I32]);
        b.unreachable();
        let func = b.finish().unwrap();
        assert!(matches!(
            execute(&func, &[], 10),
            Err(VerificationError::ArityMismatch { expected: 1, got: 0 })
        ));
        assert!(matches!(
            execute(&func, &[0], 10),
            Err(VerificationError::Trap { block: 0, .. })
        ));
    }
}
