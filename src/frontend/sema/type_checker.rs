//! Bottom-up expression typing.
//!
//! `check_expr` computes each expression's semantic type, sets the
//! is-lvalue flag, and stores both back into the AST node so the IR
//! generator can read them cheaply. Every rule violation attaches a
//! diagnostic with the source location; analysis continues so multiple
//! problems surface in one run.

use std::rc::Rc;

use crate::frontend::parser::ast::{BinOp, Expr, ExprKind, UnaryOp};
use super::sema::SemanticAnalyzer;
use super::symbol_table::SymbolKind;
use super::types::{can_implicitly_convert, common_type, compatible, Type, TypeRef};

impl SemanticAnalyzer {
    /// Type an expression, decorating the node. Returns `None` when the
    /// expression is erroneous (a diagnostic has been recorded).
    pub(super) fn check_expr(&mut self, expr: &mut Expr) -> Option<TypeRef> {
        let loc = expr.loc.clone();
        let mut is_lvalue = false;
        // sizeof folds to a constant here so later passes see a literal.
        let mut sizeof_fold: Option<i64> = None;

        let ty: Option<TypeRef> = match &mut expr.kind {
            ExprKind::IntLiteral(v) => {
                if *v > i32::MAX as i64 || *v < i32::MIN as i64 {
                    Some(Type::long())
                } else {
                    Some(Type::int())
                }
            }
            ExprKind::FloatLiteral(_) => Some(Type::double()),
            ExprKind::CharLiteral(_) => Some(Type::char_type()),
            ExprKind::StringLiteral(_) => Some(Type::pointer(Type::char_type())),
            ExprKind::Identifier(name) => match self.symbols.lookup(name) {
                Some(sym) => match sym.kind {
                    SymbolKind::EnumConstant => Some(Type::int()),
                    SymbolKind::Variable | SymbolKind::Parameter => {
                        is_lvalue = true;
                        Some(Rc::clone(&sym.ty))
                    }
                    SymbolKind::Function => Some(Rc::clone(&sym.ty)),
                    SymbolKind::TypeDef => {
                        self.error(&loc, format!("unexpected type name '{}'", name));
                        None
                    }
                    _ => Some(Rc::clone(&sym.ty)),
                },
                None => {
                    self.error(&loc, format!("use of undeclared identifier '{}'", name));
                    None
                }
            },
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let operand_ty = self.check_expr(operand)?;
                let operand_lvalue = operand.is_lvalue;
                match op {
                    UnaryOp::Deref => {
                        is_lvalue = true;
                        match &*operand_ty {
                            Type::Pointer(p) => Some(Rc::clone(p)),
                            Type::Array { elem, .. } => Some(Rc::clone(elem)),
                            _ => {
                                self.error(
                                    &loc,
                                    format!("cannot dereference non-pointer type '{}'", operand_ty),
                                );
                                None
                            }
                        }
                    }
                    UnaryOp::AddrOf => {
                        if !operand_lvalue {
                            self.warning(&loc, "taking the address of a non-lvalue");
                        }
                        Some(Type::pointer(operand_ty))
                    }
                    UnaryOp::Plus | UnaryOp::Neg => {
                        if operand_ty.is_arithmetic() {
                            Some(operand_ty)
                        } else {
                            self.error(
                                &loc,
                                format!("unary '{}' requires an arithmetic operand, got '{}'",
                                    if op == UnaryOp::Neg { "-" } else { "+" }, operand_ty),
                            );
                            None
                        }
                    }
                    UnaryOp::BitNot => {
                        if operand_ty.is_integer() {
                            Some(operand_ty)
                        } else {
                            self.error(
                                &loc,
                                format!("'~' requires an integer operand, got '{}'", operand_ty),
                            );
                            None
                        }
                    }
                    UnaryOp::LogicalNot => {
                        if operand_ty.is_scalar() || operand_ty.is_array() {
                            Some(Type::int())
                        } else {
                            self.error(
                                &loc,
                                format!("'!' requires a scalar operand, got '{}'", operand_ty),
                            );
                            None
                        }
                    }
                    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                        if !operand_lvalue {
                            self.error(&loc, "increment/decrement target is not an lvalue");
                            None
                        } else if operand_ty.is_scalar() {
                            Some(operand_ty)
                        } else {
                            self.error(
                                &loc,
                                format!("cannot increment value of type '{}'", operand_ty),
                            );
                            None
                        }
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let result = self.check_binary(op, lhs, rhs, &loc);
                result
            }
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                let cond_ty = self.check_expr(cond);
                if let Some(ct) = &cond_ty {
                    if !ct.is_scalar() && !ct.is_array() {
                        let cloc = cond.loc.clone();
                        self.error(
                            &cloc,
                            format!("conditional condition has non-scalar type '{}'", ct),
                        );
                    }
                }
                let then_ty = self.check_expr(then_expr)?;
                let else_ty = self.check_expr(else_expr)?;
                if then_ty.is_arithmetic() && else_ty.is_arithmetic() {
                    Some(common_type(&then_ty, &else_ty))
                } else if compatible(&then_ty, &else_ty) {
                    Some(then_ty)
                } else if then_ty.is_pointer() && else_ty.is_pointer() {
                    Some(then_ty)
                } else {
                    self.error(
                        &loc,
                        format!(
                            "incompatible conditional branches: '{}' and '{}'",
                            then_ty, else_ty
                        ),
                    );
                    None
                }
            }
            ExprKind::Cast { ty, operand } => {
                let target_loc = loc.clone();
                let target = self.resolve_type(&ty.clone(), &target_loc);
                self.check_expr(operand)?;
                target
            }
            ExprKind::SizeofExpr(operand) => {
                // sizeof("...") counts the terminator; arrays do not decay.
                if let ExprKind::StringLiteral(s) = &operand.kind {
                    sizeof_fold = Some(s.len() as i64 + 1);
                } else {
                    self.check_expr(operand);
                    sizeof_fold = Some(operand.ty.as_ref().map_or(0, |t| t.size()));
                }
                Some(Type::ulong())
            }
            ExprKind::SizeofType(spec) => {
                let spec = spec.clone();
                if let Some(target) = self.resolve_type(&spec, &loc) {
                    sizeof_fold = Some(target.size());
                }
                Some(Type::ulong())
            }
            ExprKind::Subscript { base, index } => {
                is_lvalue = true;
                let Some(base_expr) = base else {
                    // Null base only occurs for designators, which are
                    // handled by initializer checking.
                    return None;
                };
                let base_ty = self.check_expr(base_expr)?;
                let index_ty = self.check_expr(index)?;
                if !index_ty.is_integer() {
                    let iloc = index.loc.clone();
                    self.error(
                        &iloc,
                        format!("array subscript has non-integer type '{}'", index_ty),
                    );
                }
                match &*base_ty {
                    Type::Array { elem, .. } => Some(Rc::clone(elem)),
                    Type::Pointer(p) => Some(Rc::clone(p)),
                    _ => {
                        self.error(
                            &loc,
                            format!("subscripted value of type '{}' is not an array or pointer", base_ty),
                        );
                        None
                    }
                }
            }
            ExprKind::Call { callee, args } => self.check_call(callee, args, &loc),
            ExprKind::Member { base, member, arrow } => {
                is_lvalue = true;
                let arrow = *arrow;
                let member = member.clone();
                let Some(base_expr) = base else {
                    return None;
                };
                let base_ty = self.check_expr(base_expr)?;
                let record_ty = if arrow {
                    match &*base_ty {
                        Type::Pointer(p) => Rc::clone(p),
                        _ => {
                            self.error(
                                &loc,
                                format!("'->' requires a pointer to struct/union, got '{}'", base_ty),
                            );
                            return None;
                        }
                    }
                } else {
                    base_ty
                };
                if !record_ty.is_record() {
                    self.error(
                        &loc,
                        format!("member access on non-struct/union type '{}'", record_ty),
                    );
                    return None;
                }
                match record_ty.find_member(&member) {
                    Some(m) => Some(m.ty),
                    None => {
                        self.error(
                            &loc,
                            format!("no member named '{}' in '{}'", member, record_ty),
                        );
                        None
                    }
                }
            }
            ExprKind::InitList(_) => {
                // Legal only as an initializer; handled there.
                self.error(&loc, "initializer list used outside of initialization");
                None
            }
        };

        if let Some(n) = sizeof_fold {
            expr.kind = ExprKind::IntLiteral(n);
        }
        expr.is_lvalue = is_lvalue;
        expr.ty = ty.clone();
        ty
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        loc: &crate::common::source::SourceLocation,
    ) -> Option<TypeRef> {
        if op.is_assignment() {
            let lhs_ty = self.check_expr(lhs)?;
            let rhs_ty = self.check_expr(rhs)?;
            if !lhs.is_lvalue {
                self.error(loc, "assignment target is not an lvalue");
                return None;
            }
            if let Some(base) = op.compound_base() {
                // The compound's arithmetic part obeys the binary rules.
                self.check_binary_arith(base, &lhs_ty, &rhs_ty, loc)?;
            } else if !can_implicitly_convert(&rhs_ty, &lhs_ty) {
                self.error(
                    loc,
                    format!("cannot assign '{}' to '{}'", rhs_ty, lhs_ty),
                );
                return None;
            } else if (rhs_ty.is_integer() && lhs_ty.is_pointer())
                || (rhs_ty.is_pointer() && lhs_ty.is_integer())
            {
                self.warning(
                    loc,
                    format!("implicit conversion between '{}' and '{}'", rhs_ty, lhs_ty),
                );
            }
            return Some(lhs_ty);
        }

        if op == BinOp::Comma {
            self.check_expr(lhs)?;
            return self.check_expr(rhs);
        }

        if op == BinOp::LogicalAnd || op == BinOp::LogicalOr {
            let lhs_ty = self.check_expr(lhs)?;
            let rhs_ty = self.check_expr(rhs)?;
            for (ty, side) in [(&lhs_ty, "left"), (&rhs_ty, "right")] {
                if !ty.is_scalar() && !ty.is_array() {
                    self.error(
                        loc,
                        format!("{} operand of logical operator has non-scalar type '{}'", side, ty),
                    );
                }
            }
            return Some(Type::int());
        }

        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;
        self.check_binary_arith(op, &lhs_ty, &rhs_ty, loc)
    }

    /// Typing for the non-assignment, non-logical binary operators.
    fn check_binary_arith(
        &mut self,
        op: BinOp,
        lhs_ty: &TypeRef,
        rhs_ty: &TypeRef,
        loc: &crate::common::source::SourceLocation,
    ) -> Option<TypeRef> {
        let l = decayed(lhs_ty);
        let r = decayed(rhs_ty);

        match op {
            BinOp::Add | BinOp::Sub => {
                // Pointer arithmetic: ptr ± int, int + ptr, ptr - ptr.
                match (l.is_pointer(), r.is_pointer()) {
                    (true, false) => {
                        if r.is_integer() {
                            return Some(l);
                        }
                        self.error(loc, format!("invalid pointer arithmetic with '{}'", r));
                        return None;
                    }
                    (false, true) => {
                        if op == BinOp::Add && l.is_integer() {
                            return Some(r);
                        }
                        self.error(loc, format!("invalid pointer arithmetic with '{}'", l));
                        return None;
                    }
                    (true, true) => {
                        if op == BinOp::Sub && compatible(&l, &r) {
                            return Some(Type::long());
                        }
                        self.error(loc, "invalid operands to pointer arithmetic");
                        return None;
                    }
                    (false, false) => {}
                }
                if l.is_arithmetic() && r.is_arithmetic() {
                    Some(common_type(&l, &r))
                } else {
                    self.error(
                        loc,
                        format!("invalid operands to binary '{}' ('{}' and '{}')", op.symbol(), l, r),
                    );
                    None
                }
            }
            BinOp::Mul | BinOp::Div => {
                if l.is_arithmetic() && r.is_arithmetic() {
                    Some(common_type(&l, &r))
                } else {
                    self.error(
                        loc,
                        format!("invalid operands to binary '{}' ('{}' and '{}')", op.symbol(), l, r),
                    );
                    None
                }
            }
            BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                if l.is_integer() && r.is_integer() {
                    Some(common_type(&l, &r))
                } else {
                    self.error(
                        loc,
                        format!("'{}' requires integer operands ('{}' and '{}')", op.symbol(), l, r),
                    );
                    None
                }
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let ok = (l.is_arithmetic() && r.is_arithmetic())
                    || (l.is_pointer() && r.is_pointer())
                    || (l.is_pointer() && r.is_integer())
                    || (l.is_integer() && r.is_pointer());
                if ok {
                    Some(Type::int())
                } else {
                    self.error(
                        loc,
                        format!("invalid comparison between '{}' and '{}'", l, r),
                    );
                    None
                }
            }
            _ => None,
        }
    }

    fn check_call(
        &mut self,
        callee: &mut Expr,
        args: &mut [Expr],
        loc: &crate::common::source::SourceLocation,
    ) -> Option<TypeRef> {
        let callee_ty = self.check_expr(callee)?;
        let fn_ty = match &*callee_ty {
            Type::Function { .. } => callee_ty.clone(),
            Type::Pointer(p) if p.is_function() => Rc::clone(p),
            _ => {
                self.error(
                    loc,
                    format!("called object of type '{}' is not a function", callee_ty),
                );
                return None;
            }
        };
        let Type::Function { ret, params, variadic } = &*fn_ty else {
            return None;
        };

        if (*variadic && args.len() < params.len())
            || (!*variadic && args.len() != params.len())
        {
            self.error(
                loc,
                format!(
                    "call expects {}{} argument(s), got {}",
                    if *variadic { "at least " } else { "" },
                    params.len(),
                    args.len()
                ),
            );
        }

        for (i, arg) in args.iter_mut().enumerate() {
            let Some(arg_ty) = self.check_expr(arg) else {
                continue;
            };
            if let Some(param_ty) = params.get(i) {
                if !can_implicitly_convert(&decayed(&arg_ty), param_ty)
                    && !can_implicitly_convert(&arg_ty, param_ty)
                {
                    let aloc = arg.loc.clone();
                    self.error(
                        &aloc,
                        format!(
                            "argument {} has type '{}', expected '{}'",
                            i + 1,
                            arg_ty,
                            param_ty
                        ),
                    );
                }
            }
        }

        Some(Rc::clone(ret))
    }

    /// Check an initializer against its target type. Braced lists recurse
    /// into aggregates; designators rebase the cursor.
    pub(super) fn check_initializer(&mut self, target: &TypeRef, init: &mut Expr) {
        let loc = init.loc.clone();
        match &mut init.kind {
            ExprKind::InitList(items) => match &**target {
                Type::Array { elem, len } => {
                    if *len >= 0 && items.len() as i64 > *len {
                        self.error(
                            &loc,
                            format!(
                                "too many initializers for array of {} element(s)",
                                len
                            ),
                        );
                    }
                    for item in items.iter_mut() {
                        match &mut item.kind {
                            ExprKind::Binary { op: BinOp::Assign, lhs, rhs }
                                if matches!(lhs.kind, ExprKind::Subscript { base: None, .. }) =>
                            {
                                let ExprKind::Subscript { index, .. } = &lhs.kind else {
                                    unreachable!()
                                };
                                if super::const_eval::eval_const_expr(index, &self.symbols)
                                    .is_none()
                                {
                                    let iloc = lhs.loc.clone();
                                    self.error(&iloc, "array designator is not a constant");
                                }
                                self.check_initializer(elem, rhs);
                            }
                            _ => self.check_initializer(elem, item),
                        }
                    }
                }
                Type::Struct(rec) => {
                    let members = rec.borrow().members.clone();
                    let mut cursor = 0usize;
                    for item in items.iter_mut() {
                        match &mut item.kind {
                            ExprKind::Binary { op: BinOp::Assign, lhs, rhs }
                                if matches!(lhs.kind, ExprKind::Member { base: None, .. }) =>
                            {
                                let ExprKind::Member { member, .. } = &lhs.kind else {
                                    unreachable!()
                                };
                                match members.iter().position(|m| &m.name == member) {
                                    Some(idx) => {
                                        cursor = idx + 1;
                                        let mty = members[idx].ty.clone();
                                        self.check_initializer(&mty, rhs);
                                    }
                                    None => {
                                        let iloc = lhs.loc.clone();
                                        let msg = format!(
                                            "no member named '{}' in initializer",
                                            member
                                        );
                                        self.error(&iloc, msg);
                                    }
                                }
                            }
                            _ => {
                                if let Some(m) = members.get(cursor) {
                                    let mty = m.ty.clone();
                                    self.check_initializer(&mty, item);
                                    cursor += 1;
                                } else {
                                    self.error(&loc, "too many initializers for struct");
                                    break;
                                }
                            }
                        }
                    }
                }
                Type::Union(rec) => {
                    let first = rec.borrow().members.first().cloned();
                    if let (Some(member), Some(item)) = (first, items.first_mut()) {
                        self.check_initializer(&member.ty, item);
                    }
                }
                _ => {
                    // Scalar wrapped in braces: `int x = {1};`
                    if let Some(item) = items.first_mut() {
                        self.check_initializer(target, item);
                    }
                }
            },
            _ => {
                let Some(ty) = self.check_expr(init) else {
                    return;
                };
                if !can_implicitly_convert(&ty, target) {
                    self.error(
                        &loc,
                        format!("cannot initialize '{}' with '{}'", target, ty),
                    );
                }
            }
        }
    }
}

/// Arrays decay to pointers and functions to function pointers in most
/// expression contexts.
fn decayed(ty: &TypeRef) -> TypeRef {
    match &**ty {
        Type::Array { elem, .. } => Type::pointer(Rc::clone(elem)),
        Type::Function { .. } => Type::pointer(Rc::clone(ty)),
        _ => Rc::clone(ty),
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::frontend::sema::SemanticAnalyzer;

    fn analyze(src: &str) -> SemanticAnalyzer {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let mut unit = parser.parse_translation_unit();
        assert!(!parser.has_errors(), "parse errors: {:?}", parser.errors());
        let mut sema = SemanticAnalyzer::new();
        sema.analyze(&mut unit);
        sema
    }

    fn ok(src: &str) {
        let sema = analyze(src);
        assert!(
            sema.errors().is_empty(),
            "unexpected errors for {:?}: {:?}",
            src,
            sema.errors()
        );
    }

    fn bad(src: &str) {
        let sema = analyze(src);
        assert!(!sema.errors().is_empty(), "expected errors for {:?}", src);
    }

    #[test]
    fn assignment_requires_lvalue() {
        bad("int main() { 3 = 4; return 0; }");
        bad("int main() { int a; (a + 1) = 2; return 0; }");
        ok("int main() { int a; a = 2; return a; }");
    }

    #[test]
    fn pointer_arithmetic_rules() {
        ok("int main() { int a[3]; int *p = a; p = p + 1; return p - a; }");
        bad("int main() { int *p; double d; p = p + d; return 0; }");
        bad("int main() { int *p; double *q; return p - q; }");
    }

    #[test]
    fn mod_and_bitnot_require_integers() {
        bad("int main() { double d; return 1 % d; }");
        bad("int main() { double d; return ~d; }");
        ok("int main() { return (7 % 3) + ~0; }");
    }

    #[test]
    fn call_arity_and_types() {
        bad("int f(int a); int main() { return f(1, 2); }");
        bad("int f(int a); int main() { struct S; return f(); }");
        ok("int f(int a, int b); int main() { return f(1, 'x'); }");
        ok("int printf(char *fmt, ...); int main() { printf(\"%d %d\", 1, 2); return 0; }");
        bad("int main() { int x; return x(); }");
    }

    #[test]
    fn member_access_rules() {
        ok("struct P { int x; }; int main() { struct P p; p.x = 1; return p.x; }");
        bad("struct P { int x; }; int main() { struct P p; return p.y; }");
        bad("struct P { int x; }; int main() { struct P p; return p->x; }");
        ok("struct P { int x; }; int main() { struct P p; struct P *q = &p; return q->x; }");
    }

    #[test]
    fn deref_requires_pointer() {
        bad("int main() { int x; return *x; }");
        ok("int main() { int x = 3; int *p = &x; return *p; }");
    }

    #[test]
    fn string_initializes_char_array() {
        ok("int main() { char s[] = \"hi\"; return s[0]; }");
        ok("char g[6] = \"hello\";");
    }

    #[test]
    fn sizeof_is_unsigned_long() {
        ok("int main() { return sizeof(int) + sizeof 1 == 8 ? 0 : 1; }");
    }
}
