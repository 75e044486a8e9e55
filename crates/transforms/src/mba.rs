use crate::selector::RandomSelector;
use crate::Transform;
use cleft_core::cfg_ir::{BinaryOp, Function, Instruction, Opcode, Operand, Operation};
use cleft_utils::errors::TransformError;
use cleft_utils::Ratio;
use rand::{rngs::StdRng, Rng};
use tracing::{debug, info};

/// Mixed boolean arithmetic substitution.
///
/// Rewrites integer additions using `a + b == (a ^ b) + 2 * (a & b)`. The final addition keeps
/// the original result value, so users need no update.
#[derive(Debug, Clone, Copy)]
pub struct Mba {
    ratio: Ratio,
}

impl Mba {
    pub const fn new(ratio: Ratio) -> Self {
        Self { ratio }
    }
}

impl Default for Mba {
    fn default() -> Self {
        Self::new(Ratio::ALWAYS)
    }
}

/// Substitutes the selected additions of `func` and returns how many were rewritten.
///
/// One draw is made per binary operation, additions or not, in block and instruction order.
pub fn substitute<R: Rng>(
    func: &mut Function,
    ratio: Ratio,
    selector: &mut RandomSelector<R>,
) -> Result<usize, TransformError> {
    let mut count = 0;
    let blocks: Vec<_> = func.blocks().collect();
    for block in blocks {
        let original = func.block(block)?.instructions.clone();
        let mut rewritten = Vec::with_capacity(original.len());
        for inst in original {
            let selected = match &inst {
                Instruction::Op(Operation {
                    result: Some(result),
                    opcode: Opcode::Binary(op),
                    operands,
                }) => match operands.as_slice() {
                    [a, b] => Some((*result, *op, *a, *b)),
                    _ => None,
                },
                _ => None,
            };
            let Some((result, op, a, b)) = selected else {
                rewritten.push(inst);
                continue;
            };
            if !selector.should_apply(ratio) {
                rewritten.push(inst);
                continue;
            }
            let ty = func.value_type(result)?;
            if op != BinaryOp::Add || !ty.is_integer() {
                rewritten.push(inst);
                continue;
            }

            let xor = func.create_value(ty);
            let and = func.create_value(ty);
            let twice = func.create_value(ty);
            let binary = |result, op, operands: Vec<Operand>| {
                Instruction::Op(Operation {
                    result: Some(result),
                    opcode: Opcode::Binary(op),
                    operands,
                })
            };
            rewritten.push(binary(xor, BinaryOp::Xor, vec![a, b]));
            rewritten.push(binary(and, BinaryOp::And, vec![a, b]));
            rewritten.push(binary(
                twice,
                BinaryOp::Mul,
                vec![Operand::Const(2), and.into()],
            ));
            rewritten.push(binary(
                result,
                BinaryOp::Add,
                vec![xor.into(), twice.into()],
            ));
            debug!("{result} = add {a}, {b} -> ({a} ^ {b}) + 2 * ({a} & {b})");
            count += 1;
        }
        func.block_mut(block)?.instructions = rewritten;
    }
    Ok(count)
}

impl Transform for Mba {
    fn name(&self) -> &'static str {
        "MBA"
    }

    fn apply(&self, ir: &mut Function, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut selector = RandomSelector::new(rng);
        let count = substitute(ir, self.ratio, &mut selector)?;
        info!("{}: substituted {} instructions", ir.name, count);
        Ok(count > 0)
    }
}
