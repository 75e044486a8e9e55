/// Module for representing a function as a Control Flow Graph (CFG) of basic blocks holding an
/// Intermediate Representation (IR) in Static Single Assignment (SSA) form.
///
/// Blocks are the nodes of a `petgraph` directed graph and are addressed by their stable node
/// index. Every block ends with exactly one terminator, and the graph edges always mirror the
/// successors named by that terminator: mutation goes through the helpers in `updates`, which keep
/// the two in sync. Values are numbered densely per function and carry a type; only the
/// integer/non-integer distinction matters to the analyses built on top of this module.
use cleft_utils::errors::CfgIrError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use self::builder::FunctionBuilder;
pub use self::updates::IfThenElse;

mod builder;
mod updates;

/// Identifier of a basic block: its index in the function's graph.
pub type BlockId = NodeIndex;

/// A unique identifier for a value in SSA form.
///
/// Each `ValueId` names either a function argument or the result of exactly one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Integer with the given bit width (1 to 64).
    Int(u8),
    /// Address of a stack slot.
    Ptr,
}

impl Type {
    pub const I1: Self = Self::Int(1);
    pub const I8: Self = Self::Int(8);
    pub const I16: Self = Self::Int(16);
    pub const I32: Self = Self::Int(32);
    pub const I64: Self = Self::Int(64);

    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Bit width; pointers are 64 bits wide.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Int(bits) => bits as u32,
            Self::Ptr => 64,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Ptr => f.write_str("ptr"),
        }
    }
}

/// Per-value metadata stored in the function's value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueData {
    pub ty: Type,
}

/// An instruction operand: either an SSA value or an integer immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Const(i64),
}

impl Operand {
    pub const fn as_value(self) -> Option<ValueId> {
        match self {
            Self::Value(v) => Some(v),
            Self::Const(_) => None,
        }
    }

    /// Rewrites the operand through `map`; values without an entry are left untouched.
    pub fn remap(&mut self, map: &HashMap<ValueId, ValueId>) {
        if let Self::Value(v) = self {
            if let Some(new) = map.get(v) {
                *v = *new;
            }
        }
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Self::Value(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Const(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Const(c) => write!(f, "{c}"),
        }
    }
}

/// Two-operand integer arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    LShr,
}

/// Integer comparison predicates. Ordered comparisons are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Operation performed by a non-terminator, non-merge instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `lhs op rhs`, result has the operands' integer type.
    Binary(BinaryOp),
    /// `lhs pred rhs`, result is `i1`.
    Icmp(Predicate),
    /// Allocates a stack slot, result is a pointer.
    Alloca,
    /// Reads the slot named by the single pointer operand.
    Load,
    /// Writes operand 1 into the slot named by operand 0; produces no value.
    Store,
    /// Forwards its single operand.
    Copy,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Binary(BinaryOp::Add) => "add",
            Self::Binary(BinaryOp::Sub) => "sub",
            Self::Binary(BinaryOp::Mul) => "mul",
            Self::Binary(BinaryOp::And) => "and",
            Self::Binary(BinaryOp::Or) => "or",
            Self::Binary(BinaryOp::Xor) => "xor",
            Self::Binary(BinaryOp::Shl) => "shl",
            Self::Binary(BinaryOp::LShr) => "lshr",
            Self::Icmp(Predicate::Eq) => "icmp eq",
            Self::Icmp(Predicate::Ne) => "icmp ne",
            Self::Icmp(Predicate::Slt) => "icmp slt",
            Self::Icmp(Predicate::Sle) => "icmp sle",
            Self::Icmp(Predicate::Sgt) => "icmp sgt",
            Self::Icmp(Predicate::Sge) => "icmp sge",
            Self::Alloca => "alloca",
            Self::Load => "load",
            Self::Store => "store",
            Self::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// An ordinary instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub result: Option<ValueId>,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

/// A join selector (phi): yields the operand paired with the predecessor control arrived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeNode {
    pub result: ValueId,
    pub incoming: Vec<(BlockId, Operand)>,
}

impl MergeNode {
    /// Operand flowing in from `pred`, if `pred` is listed.
    pub fn incoming_from(&self, pred: BlockId) -> Option<Operand> {
        self.incoming
            .iter()
            .find(|(block, _)| *block == pred)
            .map(|(_, op)| *op)
    }
}

/// The final instruction of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Jump {
        target: BlockId,
    },
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return {
        value: Option<Operand>,
    },
    Unreachable,
}

impl Terminator {
    /// Successor blocks paired with the kind of edge leading to them.
    pub fn successors(&self) -> Vec<(BlockId, EdgeType)> {
        match self {
            Self::Jump { target } => vec![(*target, EdgeType::Jump)],
            Self::Branch {
                then_block,
                else_block,
                ..
            } => vec![
                (*then_block, EdgeType::BranchTrue),
                (*else_block, EdgeType::BranchFalse),
            ],
            Self::Return { .. } | Self::Unreachable => Vec::new(),
        }
    }
}

/// Represents the type of edge connecting blocks in the CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeType {
    /// Unconditional jump.
    Jump,
    /// Conditional branch taken when the condition is non-zero.
    BranchTrue,
    /// Conditional branch taken when the condition is zero.
    BranchFalse,
}

/// An instruction, tagged by the role it plays in the block layout.
///
/// Merge nodes may only form a prefix of a block and the terminator is always last; keeping
/// the three roles as separate variants lets transforms skip merges and treat the terminator
/// specially by pattern matching instead of by inspecting opcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Merge(MergeNode),
    Op(Operation),
    Terminator(Terminator),
}

impl Instruction {
    pub const fn result(&self) -> Option<ValueId> {
        match self {
            Self::Merge(merge) => Some(merge.result),
            Self::Op(op) => op.result,
            Self::Terminator(_) => None,
        }
    }

    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }

    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Terminator(_))
    }

    /// All operands read by the instruction, in order.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Self::Merge(merge) => merge.incoming.iter().map(|(_, op)| *op).collect(),
            Self::Op(op) => op.operands.clone(),
            Self::Terminator(Terminator::Branch { cond, .. }) => vec![*cond],
            Self::Terminator(Terminator::Return { value: Some(value) }) => vec![*value],
            Self::Terminator(_) => Vec::new(),
        }
    }

    /// Applies `f` to every operand in place.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Self::Merge(merge) => merge.incoming.iter_mut().for_each(|(_, op)| f(op)),
            Self::Op(op) => op.operands.iter_mut().for_each(f),
            Self::Terminator(Terminator::Branch { cond, .. }) => f(cond),
            Self::Terminator(Terminator::Return { value: Some(value) }) => f(value),
            Self::Terminator(_) => {}
        }
    }

    /// Rewrites operands through `map`, ignoring values it has no entry for.
    pub fn remap(&mut self, map: &HashMap<ValueId, ValueId>) {
        self.for_each_operand_mut(|op| op.remap(map));
    }

    /// Values used by the instruction.
    pub fn used_values(&self) -> impl Iterator<Item = ValueId> {
        self.operands().into_iter().filter_map(Operand::as_value)
    }
}

/// A basic block: merges, then ordinary instructions, then one terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    /// Exception landing blocks are never transformed.
    #[serde(default)]
    pub landing_pad: bool,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Terminator> {
        match self.instructions.last() {
            Some(Instruction::Terminator(term)) => Some(term),
            _ => None,
        }
    }

    /// Index of the first instruction that is not a merge node.
    pub fn first_non_merge(&self) -> usize {
        self.instructions
            .iter()
            .position(|inst| !inst.is_merge())
            .unwrap_or(self.instructions.len())
    }

    pub fn merges(&self) -> impl Iterator<Item = &MergeNode> {
        self.instructions.iter().filter_map(|inst| match inst {
            Instruction::Merge(merge) => Some(merge),
            _ => None,
        })
    }

    pub fn merges_mut(&mut self) -> impl Iterator<Item = &mut MergeNode> {
        self.instructions.iter_mut().filter_map(|inst| match inst {
            Instruction::Merge(merge) => Some(merge),
            _ => None,
        })
    }
}

/// A function: typed parameters, a value table and a CFG with a single entry block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<ValueId>,
    pub values: Vec<ValueData>,
    pub cfg: DiGraph<BasicBlock, EdgeType>,
    pub entry: BlockId,
}

impl Function {
    /// Creates a function with the given parameter types and an empty entry block.
    pub fn new(name: impl Into<String>, params: &[Type]) -> Self {
        let mut cfg = DiGraph::new();
        let entry = cfg.add_node(BasicBlock::default());
        let mut func = Self {
            name: name.into(),
            params: Vec::with_capacity(params.len()),
            values: Vec::new(),
            cfg,
            entry,
        };
        for ty in params {
            let param = func.create_value(*ty);
            func.params.push(param);
        }
        func
    }

    /// Allocates a fresh value of type `ty` in the value table.
    pub fn create_value(&mut self, ty: Type) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty });
        id
    }

    pub fn value_type(&self, value: ValueId) -> Result<Type, CfgIrError> {
        self.values
            .get(value.index())
            .map(|data| data.ty)
            .ok_or(CfgIrError::UnknownValue(value.0))
    }

    pub fn is_param(&self, value: ValueId) -> bool {
        self.params.contains(&value)
    }

    pub fn add_block(&mut self) -> BlockId {
        self.cfg.add_node(BasicBlock::default())
    }

    pub fn block(&self, id: BlockId) -> Result<&BasicBlock, CfgIrError> {
        self.cfg
            .node_weight(id)
            .ok_or(CfgIrError::UnknownBlock(id.index()))
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock, CfgIrError> {
        self.cfg
            .node_weight_mut(id)
            .ok_or(CfgIrError::UnknownBlock(id.index()))
    }

    /// Block ids in index order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.cfg.node_indices()
    }

    pub fn block_count(&self) -> usize {
        self.cfg.node_count()
    }

    /// Distinct predecessors of `block`, ordered by index.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let mut preds: Vec<BlockId> = self
            .cfg
            .neighbors_directed(block, Direction::Incoming)
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    /// Distinct successors of `block`, ordered by index.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let mut succs: Vec<BlockId> = self
            .cfg
            .neighbors_directed(block, Direction::Outgoing)
            .collect();
        succs.sort();
        succs.dedup();
        succs
    }

    /// Total number of instructions, terminators and merges included.
    pub fn instruction_count(&self) -> usize {
        self.cfg
            .node_weights()
            .map(|block| block.instructions.len())
            .sum()
    }

    /// Formats `inst` the way it appears in the function listing.
    pub fn display_instruction<'a>(&'a self, inst: &'a Instruction) -> impl fmt::Display + 'a {
        InstructionDisplay { func: self, inst }
    }

    fn write_instruction(&self, f: &mut fmt::Formatter<'_>, inst: &Instruction) -> fmt::Result {
        let ty_of = |v: ValueId| {
            self.values
                .get(v.index())
                .map_or_else(|| "?".to_string(), |data| data.ty.to_string())
        };
        match inst {
            Instruction::Merge(merge) => {
                write!(f, "{}: {} = merge", merge.result, ty_of(merge.result))?;
                for (i, (block, op)) in merge.incoming.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}[bb{}: {op}]", block.index())?;
                }
                Ok(())
            }
            Instruction::Op(op) => {
                if let Some(result) = op.result {
                    write!(f, "{}: {} = ", result, ty_of(result))?;
                }
                write!(f, "{}", op.opcode)?;
                for (i, operand) in op.operands.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{operand}")?;
                }
                Ok(())
            }
            Instruction::Terminator(Terminator::Jump { target }) => {
                write!(f, "jump bb{}", target.index())
            }
            Instruction::Terminator(Terminator::Branch {
                cond,
                then_block,
                else_block,
            }) => write!(
                f,
                "branch {cond}, bb{}, bb{}",
                then_block.index(),
                else_block.index()
            ),
            Instruction::Terminator(Terminator::Return { value: Some(value) }) => {
                write!(f, "return {value}")
            }
            Instruction::Terminator(Terminator::Return { value: None }) => f.write_str("return"),
            Instruction::Terminator(Terminator::Unreachable) => f.write_str("unreachable"),
        }
    }
}

struct InstructionDisplay<'a> {
    func: &'a Function,
    inst: &'a Instruction,
}

impl fmt::Display for InstructionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.func.write_instruction(f, self.inst)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let ty = self.values.get(param.index()).map(|data| data.ty);
            match ty {
                Some(ty) => write!(f, "{param}: {ty}")?,
                None => write!(f, "{param}: ?")?,
            }
        }
        writeln!(f, ") {{")?;
        for block in self.cfg.node_indices() {
            let data = &self.cfg[block];
            let marker = if block == self.entry { " ; entry" } else { "" };
            let pad = if data.landing_pad { " landingpad" } else { "" };
            writeln!(f, "bb{}:{pad}{marker}", block.index())?;
            for inst in &data.instructions {
                f.write_str("    ")?;
                self.write_instruction(f, inst)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}

/// A compilation unit: a named list of functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}
