//! AST dump in a stable indented-tree form, two spaces per level.
//! Used by the `-a` stop point. Equal ASTs print identically, so the
//! output doubles as a cheap structural fingerprint in tests.

use super::ast::{
    BasicKind, BlockItem, CompoundStmt, Declaration, Expr, ExprKind, ExternalDecl, ForInit,
    FunctionDef, Stmt, StmtKind, TranslationUnit, TypeSpec,
};

pub fn print_translation_unit(unit: &TranslationUnit) -> String {
    let mut out = String::from("TranslationUnit\n");
    let mut printer = Printer { out: &mut out, indent: 1 };
    for decl in &unit.decls {
        printer.print_external_decl(decl);
    }
    out
}

/// Render a syntactic type in the compact suffix notation used by the
/// dump and by diagnostics (`int*[4]`, `int(int, int)*(int)`).
pub fn type_to_string(ty: &TypeSpec) -> String {
    match ty {
        TypeSpec::Void => "void".to_string(),
        TypeSpec::Basic { kind, unsigned } => {
            let name = match kind {
                BasicKind::Char => "char",
                BasicKind::Short => "short",
                BasicKind::Int => "int",
                BasicKind::Long => "long",
                BasicKind::LongLong => "long long",
                BasicKind::Float => "float",
                BasicKind::Double => "double",
                BasicKind::LongDouble => "long double",
            };
            if *unsigned {
                format!("unsigned {}", name)
            } else {
                name.to_string()
            }
        }
        TypeSpec::Pointer(inner) => format!("{}*", type_to_string(inner)),
        TypeSpec::Array(elem, len) => match len {
            Some(expr) => match &expr.kind {
                ExprKind::IntLiteral(n) => format!("{}[{}]", type_to_string(elem), n),
                _ => format!("{}[expr]", type_to_string(elem)),
            },
            None => format!("{}[]", type_to_string(elem)),
        },
        TypeSpec::Function { ret, params, variadic } => {
            let mut s = format!("{}(", type_to_string(ret));
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                s.push_str(&type_to_string(&p.ty));
            }
            if *variadic {
                if !params.is_empty() {
                    s.push_str(", ");
                }
                s.push_str("...");
            }
            s.push(')');
            s
        }
        TypeSpec::Record { is_union, tag, .. } => {
            let kw = if *is_union { "union" } else { "struct" };
            match tag {
                Some(t) => format!("{} {}", kw, t),
                None => format!("{} <anonymous>", kw),
            }
        }
        TypeSpec::Enum { tag, .. } => match tag {
            Some(t) => format!("enum {}", t),
            None => "enum <anonymous>".to_string(),
        },
        TypeSpec::Named(name) => name.clone(),
    }
}

struct Printer<'a> {
    out: &'a mut String,
    indent: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn print_external_decl(&mut self, decl: &ExternalDecl) {
        match decl {
            ExternalDecl::Function(func) => self.print_function(func),
            ExternalDecl::Declaration(d) => self.print_declaration(d),
        }
    }

    fn print_function(&mut self, func: &FunctionDef) {
        self.line(&format!(
            "FunctionDecl: {} -> {}",
            func.name,
            type_to_string(&func.return_type)
        ));
        self.nested(|p| {
            for param in &func.params {
                p.line(&format!(
                    "ParamDecl: {} : {}",
                    param.name.as_deref().unwrap_or("<anonymous>"),
                    type_to_string(&param.ty)
                ));
            }
            if func.variadic {
                p.line("ParamDecl: ...");
            }
            p.print_compound(&func.body);
        });
    }

    fn print_declaration(&mut self, decl: &Declaration) {
        if decl.declarators.is_empty() {
            match &decl.base {
                TypeSpec::Record { is_union, tag, fields } => {
                    let kw = if *is_union { "UnionDecl" } else { "StructDecl" };
                    self.line(&format!(
                        "{}: {}",
                        kw,
                        tag.as_deref().unwrap_or("<anonymous>")
                    ));
                    if let Some(fields) = fields {
                        self.nested(|p| {
                            for field in fields {
                                p.line(&format!(
                                    "FieldDecl: {} : {}",
                                    field.name.as_deref().unwrap_or("<anonymous>"),
                                    type_to_string(&field.ty)
                                ));
                            }
                        });
                    }
                }
                TypeSpec::Enum { tag, constants } => {
                    self.line(&format!(
                        "EnumDecl: {}",
                        tag.as_deref().unwrap_or("<anonymous>")
                    ));
                    if let Some(constants) = constants {
                        self.nested(|p| {
                            for c in constants {
                                match &c.value {
                                    Some(v) => {
                                        p.line(&format!("EnumConstant: {}", c.name));
                                        p.nested(|p| p.print_expr(v));
                                    }
                                    None => p.line(&format!("EnumConstant: {}", c.name)),
                                }
                            }
                        });
                    }
                }
                other => self.line(&format!("Decl: {}", type_to_string(other))),
            }
            return;
        }

        for d in &decl.declarators {
            let label = if decl.is_typedef { "TypedefDecl" } else { "VarDecl" };
            self.line(&format!("{}: {} : {}", label, d.name, type_to_string(&d.ty)));
            if let Some(init) = &d.init {
                self.nested(|p| p.print_expr(init));
            }
        }
    }

    fn print_compound(&mut self, block: &CompoundStmt) {
        self.line("CompoundStmt");
        self.nested(|p| {
            for item in &block.items {
                match item {
                    BlockItem::Declaration(d) => p.print_declaration(d),
                    BlockItem::Statement(s) => p.print_stmt(s),
                }
            }
        });
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(None) => self.line("NullStmt"),
            StmtKind::Expr(Some(e)) => {
                self.line("ExprStmt");
                self.nested(|p| p.print_expr(e));
            }
            StmtKind::Compound(block) => self.print_compound(block),
            StmtKind::If { cond, then_stmt, else_stmt } => {
                self.line("IfStmt");
                self.nested(|p| {
                    p.print_expr(cond);
                    p.print_stmt(then_stmt);
                    if let Some(e) = else_stmt {
                        p.print_stmt(e);
                    }
                });
            }
            StmtKind::While { cond, body } => {
                self.line("WhileStmt");
                self.nested(|p| {
                    p.print_expr(cond);
                    p.print_stmt(body);
                });
            }
            StmtKind::DoWhile { body, cond } => {
                self.line("DoWhileStmt");
                self.nested(|p| {
                    p.print_stmt(body);
                    p.print_expr(cond);
                });
            }
            StmtKind::For { init, cond, step, body, .. } => {
                self.line("ForStmt");
                self.nested(|p| {
                    match init.as_deref() {
                        Some(ForInit::Declaration(d)) => p.print_declaration(d),
                        Some(ForInit::Expr(e)) => p.print_expr(e),
                        None => p.line("NullInit"),
                    }
                    match cond {
                        Some(c) => p.print_expr(c),
                        None => p.line("NullCond"),
                    }
                    match step {
                        Some(s) => p.print_expr(s),
                        None => p.line("NullStep"),
                    }
                    p.print_stmt(body);
                });
            }
            StmtKind::Switch { cond, body } => {
                self.line("SwitchStmt");
                self.nested(|p| {
                    p.print_expr(cond);
                    p.print_stmt(body);
                });
            }
            StmtKind::Case { value, body, .. } => {
                self.line("CaseStmt");
                self.nested(|p| {
                    p.print_expr(value);
                    p.print_stmt(body);
                });
            }
            StmtKind::Default { body, .. } => {
                self.line("DefaultStmt");
                self.nested(|p| p.print_stmt(body));
            }
            StmtKind::Break => self.line("BreakStmt"),
            StmtKind::Continue => self.line("ContinueStmt"),
            StmtKind::Return(None) => self.line("ReturnStmt"),
            StmtKind::Return(Some(e)) => {
                self.line("ReturnStmt");
                self.nested(|p| p.print_expr(e));
            }
            StmtKind::Goto(name) => self.line(&format!("GotoStmt: {}", name)),
            StmtKind::Label { name, body } => {
                self.line(&format!("LabelStmt: {}", name));
                self.nested(|p| p.print_stmt(body));
            }
        }
    }

    fn print_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLiteral(v) => self.line(&format!("IntLiteral: {}", v)),
            ExprKind::FloatLiteral(v) => self.line(&format!("FloatLiteral: {}", v)),
            ExprKind::CharLiteral(c) => self.line(&format!("CharLiteral: {:?}", c)),
            ExprKind::StringLiteral(s) => self.line(&format!("StringLiteral: {:?}", s)),
            ExprKind::Identifier(name) => self.line(&format!("Identifier: {}", name)),
            ExprKind::Unary { op, operand } => {
                self.line(&format!("UnaryExpr: {}", op.symbol()));
                self.nested(|p| p.print_expr(operand));
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.line(&format!("BinaryExpr: {}", op.symbol()));
                self.nested(|p| {
                    p.print_expr(lhs);
                    p.print_expr(rhs);
                });
            }
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                self.line("ConditionalExpr");
                self.nested(|p| {
                    p.print_expr(cond);
                    p.print_expr(then_expr);
                    p.print_expr(else_expr);
                });
            }
            ExprKind::Cast { ty, operand } => {
                self.line(&format!("CastExpr: {}", type_to_string(ty)));
                self.nested(|p| p.print_expr(operand));
            }
            ExprKind::SizeofExpr(e) => {
                self.line("SizeofExpr");
                self.nested(|p| p.print_expr(e));
            }
            ExprKind::SizeofType(ty) => self.line(&format!("SizeofType: {}", type_to_string(ty))),
            ExprKind::Subscript { base, index } => {
                self.line("SubscriptExpr");
                self.nested(|p| {
                    match base {
                        Some(b) => p.print_expr(b),
                        None => p.line("NullBase"),
                    }
                    p.print_expr(index);
                });
            }
            ExprKind::Call { callee, args } => {
                self.line("CallExpr");
                self.nested(|p| {
                    p.print_expr(callee);
                    for arg in args {
                        p.print_expr(arg);
                    }
                });
            }
            ExprKind::Member { base, member, arrow } => {
                let op = if *arrow { "->" } else { "." };
                self.line(&format!("MemberExpr: {}{}", op, member));
                if let Some(b) = base {
                    self.nested(|p| p.print_expr(b));
                }
            }
            ExprKind::InitList(items) => {
                self.line("InitListExpr");
                self.nested(|p| {
                    for item in items {
                        p.print_expr(item);
                    }
                });
            }
        }
    }
}
