//! Quadruple three-address IR: opcodes, operands, per-function code, and
//! the whole-program container consumed by the backend.

use std::rc::Rc;

use crate::frontend::sema::types::TypeRef;

/// Quadruple opcodes. Integer and floating arithmetic are distinct
/// opcode families; the lowering chooses by operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    FNeg,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    // Integer comparisons
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Float comparisons
    FEq,
    FNe,
    FLt,
    FLe,
    FGt,
    FGe,
    // Logical
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    // Data movement
    Assign,
    Load,
    Store,
    LoadAddr,
    // Address arithmetic
    IndexAddr,
    MemberAddr,
    // Control flow
    Label,
    Jump,
    JumpTrue,
    JumpFalse,
    // Calls
    Param,
    Call,
    Return,
    // Conversions
    IntToFloat,
    FloatToInt,
    IntExtend,
    IntTrunc,
    PtrToInt,
    IntToPtr,
    // Other
    Nop,
    Comment,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::FAdd => "FADD",
            Opcode::FSub => "FSUB",
            Opcode::FMul => "FMUL",
            Opcode::FDiv => "FDIV",
            Opcode::FNeg => "FNEG",
            Opcode::BitAnd => "BITAND",
            Opcode::BitOr => "BITOR",
            Opcode::BitXor => "BITXOR",
            Opcode::BitNot => "BITNOT",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Le => "LE",
            Opcode::Gt => "GT",
            Opcode::Ge => "GE",
            Opcode::FEq => "FEQ",
            Opcode::FNe => "FNE",
            Opcode::FLt => "FLT",
            Opcode::FLe => "FLE",
            Opcode::FGt => "FGT",
            Opcode::FGe => "FGE",
            Opcode::LogicalAnd => "AND",
            Opcode::LogicalOr => "OR",
            Opcode::LogicalNot => "NOT",
            Opcode::Assign => "ASSIGN",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::LoadAddr => "LOADADDR",
            Opcode::IndexAddr => "INDEXADDR",
            Opcode::MemberAddr => "MEMBERADDR",
            Opcode::Label => "LABEL",
            Opcode::Jump => "JUMP",
            Opcode::JumpTrue => "JTRUE",
            Opcode::JumpFalse => "JFALSE",
            Opcode::Param => "PARAM",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::IntToFloat => "ITOF",
            Opcode::FloatToInt => "FTOI",
            Opcode::IntExtend => "EXT",
            Opcode::IntTrunc => "TRUNC",
            Opcode::PtrToInt => "PTOI",
            Opcode::IntToPtr => "ITOP",
            Opcode::Nop => "NOP",
            Opcode::Comment => "COMMENT",
        }
    }
}

/// A quadruple operand.
#[derive(Debug, Clone)]
pub enum Operand {
    None,
    Temp { name: String, ty: TypeRef },
    Variable { name: String, ty: TypeRef },
    IntConst { value: i64, ty: Option<TypeRef> },
    FloatConst { value: f64, ty: Option<TypeRef> },
    StringConst { label: String },
    Label { name: String },
    Global { name: String, ty: TypeRef },
}

impl Operand {
    pub fn none() -> Operand {
        Operand::None
    }

    pub fn temp(name: String, ty: TypeRef) -> Operand {
        Operand::Temp { name, ty }
    }

    pub fn variable(name: String, ty: TypeRef) -> Operand {
        Operand::Variable { name, ty }
    }

    pub fn int_const(value: i64) -> Operand {
        Operand::IntConst { value, ty: None }
    }

    pub fn int_const_typed(value: i64, ty: TypeRef) -> Operand {
        Operand::IntConst { value, ty: Some(ty) }
    }

    pub fn float_const(value: f64, ty: TypeRef) -> Operand {
        Operand::FloatConst { value, ty: Some(ty) }
    }

    pub fn string_const(label: String) -> Operand {
        Operand::StringConst { label }
    }

    pub fn label(name: String) -> Operand {
        Operand::Label { name }
    }

    pub fn global(name: String, ty: TypeRef) -> Operand {
        Operand::Global { name, ty }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    /// The semantic type carried by the operand, if any.
    pub fn ty(&self) -> Option<TypeRef> {
        match self {
            Operand::Temp { ty, .. }
            | Operand::Variable { ty, .. }
            | Operand::Global { ty, .. } => Some(Rc::clone(ty)),
            Operand::IntConst { ty, .. } | Operand::FloatConst { ty, .. } => ty.clone(),
            _ => None,
        }
    }

    /// Whether the operand carries a floating-point value.
    pub fn is_float(&self) -> bool {
        match self {
            Operand::FloatConst { .. } => true,
            _ => self.ty().is_some_and(|t| t.is_float()),
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::None => write!(f, "_"),
            Operand::Temp { name, .. } | Operand::Variable { name, .. } => write!(f, "{}", name),
            Operand::IntConst { value, .. } => write!(f, "{}", value),
            Operand::FloatConst { value, .. } => write!(f, "{}", value),
            Operand::StringConst { label } => write!(f, "{}", label),
            Operand::Label { name } => write!(f, "{}", name),
            Operand::Global { name, .. } => write!(f, "{}", name),
        }
    }
}

/// One IR operation: `result = arg1 op arg2`.
#[derive(Debug, Clone)]
pub struct Quadruple {
    pub opcode: Opcode,
    pub result: Operand,
    pub arg1: Operand,
    pub arg2: Operand,
}

impl Quadruple {
    pub fn new(opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) -> Self {
        Self { opcode, result, arg1, arg2 }
    }
}

impl std::fmt::Display for Quadruple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.opcode.name(),
            self.result,
            self.arg1,
            self.arg2
        )
    }
}

/// IR for a single function.
#[derive(Debug)]
pub struct FunctionIr {
    pub name: String,
    pub return_type: TypeRef,
    /// Uniquified parameter names with their types, in order.
    pub params: Vec<(String, TypeRef)>,
    pub code: Vec<Quadruple>,
    pub is_variadic: bool,
}

/// One entry of a flattened global initializer. The ordered sequence
/// reproduces the in-memory layout including interior padding.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    Integer { value: i64, size: i64 },
    Float { value: f64, size: i64 },
    /// Reference to a string literal label in `.rodata`.
    StringLabel(String),
    /// Address of another global or function.
    Address(String),
    Zero { size: i64 },
}

#[derive(Debug)]
pub struct GlobalVar {
    pub name: String,
    pub ty: TypeRef,
    pub is_extern: bool,
    pub has_initializer: bool,
    pub init_values: Vec<GlobalInit>,
}

/// The complete IR program handed to the emitter.
#[derive(Debug, Default)]
pub struct IrProgram {
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<FunctionIr>,
    /// Ordered (label, bytes) pairs; labels begin with `.LC`.
    pub string_literals: Vec<(String, String)>,
}

impl IrProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the quadruple listing grouped by function (the `-i` view).
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for func in &self.functions {
            out.push_str(&format!("\nFunction: {}\n", func.name));
            for (i, quad) in func.code.iter().enumerate() {
                out.push_str(&format!("  [{}] {}\n", i, quad));
            }
        }
        out
    }
}
