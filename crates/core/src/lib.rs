pub mod cfg_ir;
pub mod dominators;
pub mod verify;

pub use cfg_ir::{BlockId, Function, Module, ValueId};
pub use dominators::DominatorTree;
