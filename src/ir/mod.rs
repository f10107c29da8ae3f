pub mod ir;
pub mod lowering;

pub use ir::{FunctionIr, GlobalInit, GlobalVar, IrProgram, Opcode, Operand, Quadruple};
pub use lowering::IrGenerator;
