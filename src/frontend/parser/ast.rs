//! AST node definitions.
//!
//! Nodes are plain tagged variants; the payload slots `ty`, `is_lvalue`,
//! `scope_id`, `folded`, and `label` start empty and are populated exactly
//! once by later phases: the semantic analyzer fills expression types,
//! lvalue flags, scope ids, and folded case values; the IR generator fills
//! case labels.

use crate::common::source::SourceLocation;
use crate::frontend::sema::types::TypeRef;

/// A complete translation unit (one preprocessed source file).
#[derive(Debug)]
pub struct TranslationUnit {
    pub decls: Vec<ExternalDecl>,
}

#[derive(Debug)]
pub enum ExternalDecl {
    Function(FunctionDef),
    Declaration(Declaration),
}

/// A function definition (prototypes are `Declaration`s with function
/// declarators and no body).
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: TypeSpec,
    pub params: Vec<ParamDecl>,
    pub variadic: bool,
    pub body: CompoundStmt,
    pub storage: StorageClass,
    /// Function scope id, set by semantic analysis.
    pub scope_id: Option<usize>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Option<String>,
    pub ty: TypeSpec,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    None,
    Static,
    Extern,
    Register,
    Auto,
}

/// A declaration: specifiers plus zero or more init-declarators.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// The type built from the declaration specifiers, before any
    /// declarator is applied.
    pub base: TypeSpec,
    pub declarators: Vec<InitDeclarator>,
    pub storage: StorageClass,
    pub is_typedef: bool,
    pub is_const: bool,
    pub is_volatile: bool,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct InitDeclarator {
    pub name: String,
    /// The declarator's complete type (base folded through the
    /// pointer/array/function structure).
    pub ty: TypeSpec,
    pub init: Option<Expr>,
    pub loc: SourceLocation,
}

/// Syntactic types, distinct from resolved semantic types.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Void,
    Basic { kind: BasicKind, unsigned: bool },
    Pointer(Box<TypeSpec>),
    Array(Box<TypeSpec>, Option<Box<Expr>>),
    Function {
        ret: Box<TypeSpec>,
        params: Vec<ParamDecl>,
        variadic: bool,
    },
    Record {
        is_union: bool,
        tag: Option<String>,
        fields: Option<Vec<FieldDecl>>,
    },
    Enum {
        tag: Option<String>,
        constants: Option<Vec<EnumConstant>>,
    },
    /// A typedef name recognized via the parser's typedef-name set.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Char,
    Short,
    Int,
    Long,
    LongLong,
    Float,
    Double,
    LongDouble,
}

/// A struct/union member declaration. `name` is `None` for an anonymous
/// struct/union member whose fields promote into the enclosing record.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Option<String>,
    pub ty: TypeSpec,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub name: String,
    pub value: Option<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct CompoundStmt {
    pub items: Vec<BlockItem>,
    /// Block scope id, set by semantic analysis.
    pub scope_id: Option<usize>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum BlockItem {
    Declaration(Declaration),
    Statement(Stmt),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: SourceLocation) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Option<Expr>),
    Compound(CompoundStmt),
    If {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<ForInit>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        /// Scope id for declarations in the init clause, set by sema.
        scope_id: Option<usize>,
    },
    Switch {
        cond: Expr,
        body: Box<Stmt>,
    },
    Case {
        value: Expr,
        body: Box<Stmt>,
        /// Constant-folded case value, set by semantic analysis.
        folded: Option<i64>,
        /// Emitted label, set by the IR generator.
        label: Option<String>,
    },
    Default {
        body: Box<Stmt>,
        /// Emitted label, set by the IR generator.
        label: Option<String>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Goto(String),
    Label {
        name: String,
        body: Box<Stmt>,
    },
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Declaration(Declaration),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: SourceLocation,
    /// Resolved semantic type, set by semantic analysis.
    pub ty: Option<TypeRef>,
    /// Lvalue flag, set by semantic analysis.
    pub is_lvalue: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: SourceLocation) -> Self {
        Self { kind, loc, ty: None, is_lvalue: false }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    CharLiteral(char),
    StringLiteral(String),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        ty: TypeSpec,
        operand: Box<Expr>,
    },
    SizeofExpr(Box<Expr>),
    SizeofType(TypeSpec),
    /// `base[index]`; a null base encodes the `[index] =` designator
    /// inside initializer lists.
    Subscript {
        base: Option<Box<Expr>>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `base.member` / `base->member`; a null base encodes the
    /// `.member =` designator inside initializer lists.
    Member {
        base: Option<Box<Expr>>,
        member: String,
        arrow: bool,
    },
    InitList(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    LogicalNot,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Deref,
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LogicalAnd,
    LogicalOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    Comma,
}

impl BinOp {
    /// For compound assignments, the underlying arithmetic operator.
    pub fn compound_base(self) -> Option<BinOp> {
        Some(match self {
            BinOp::AddAssign => BinOp::Add,
            BinOp::SubAssign => BinOp::Sub,
            BinOp::MulAssign => BinOp::Mul,
            BinOp::DivAssign => BinOp::Div,
            BinOp::ModAssign => BinOp::Mod,
            BinOp::AndAssign => BinOp::BitAnd,
            BinOp::OrAssign => BinOp::BitOr,
            BinOp::XorAssign => BinOp::BitXor,
            BinOp::ShlAssign => BinOp::Shl,
            BinOp::ShrAssign => BinOp::Shr,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        self == BinOp::Assign || self.compound_base().is_some()
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// Operator spelling for AST dumps and diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::LogicalAnd => "&&",
            BinOp::LogicalOr => "||",
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
            BinOp::ModAssign => "%=",
            BinOp::AndAssign => "&=",
            BinOp::OrAssign => "|=",
            BinOp::XorAssign => "^=",
            BinOp::ShlAssign => "<<=",
            BinOp::ShrAssign => ">>=",
            BinOp::Comma => ",",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc => "++pre",
            UnaryOp::PreDec => "--pre",
            UnaryOp::PostInc => "post++",
            UnaryOp::PostDec => "post--",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        }
    }
}
