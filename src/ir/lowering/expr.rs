//! Expression lowering.

use std::rc::Rc;

use crate::frontend::parser::ast::{BinOp, Expr, ExprKind, UnaryOp};
use crate::frontend::sema::types::{Type, TypeRef};
use crate::ir::ir::{Opcode, Operand};
use super::IrGenerator;

impl IrGenerator<'_> {
    /// The semantic type the analyzer attached, with an int fallback for
    /// nodes that carry none.
    fn expr_ty(expr: &Expr) -> TypeRef {
        expr.ty.clone().unwrap_or_else(Type::int)
    }

    pub(super) fn gen_expr(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Operand::int_const_typed(*v, Self::expr_ty(expr)),
            ExprKind::FloatLiteral(v) => Operand::float_const(*v, Type::double()),
            ExprKind::CharLiteral(c) => {
                Operand::int_const_typed(*c as i64, Type::char_type())
            }
            ExprKind::StringLiteral(s) => {
                let label = self.add_string_literal(s);
                Operand::string_const(label)
            }
            ExprKind::Identifier(name) => self.symbol_operand(name),
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, expr),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs, expr),
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                self.gen_conditional(cond, then_expr, else_expr, expr)
            }
            ExprKind::Cast { operand, .. } => {
                let src = self.gen_expr(operand);
                self.convert_type(src, &Self::expr_ty(expr))
            }
            // sizeof was folded to an integer literal during analysis.
            ExprKind::SizeofExpr(_) | ExprKind::SizeofType(_) => {
                Operand::int_const_typed(0, Type::ulong())
            }
            ExprKind::Subscript { base, index } => {
                let Some(base) = base else { return Operand::none() };
                let elem_ty = Self::expr_ty(expr);
                let addr = self.gen_index_addr(base, index, &elem_ty);
                let result = Operand::temp(self.new_temp(), elem_ty);
                self.emit(Opcode::Load, result.clone(), addr, Operand::none());
                result
            }
            ExprKind::Member { base, member, arrow } => {
                let Some(base) = base else { return Operand::none() };
                let member_ty = Self::expr_ty(expr);
                let addr = self.gen_member_addr(base, member, *arrow, &member_ty);
                let result = Operand::temp(self.new_temp(), member_ty);
                self.emit(Opcode::Load, result.clone(), addr, Operand::none());
                result
            }
            ExprKind::Call { callee, args } => self.gen_call(callee, args, expr),
            ExprKind::InitList(_) => Operand::none(),
        }
    }

    // ----- unary -----

    fn gen_unary(&mut self, op: UnaryOp, operand: &Expr, expr: &Expr) -> Operand {
        match op {
            UnaryOp::Plus => self.gen_expr(operand),
            UnaryOp::Neg => {
                let val = self.gen_expr(operand);
                let ty = Self::expr_ty(expr);
                let opcode = if ty.is_float() { Opcode::FNeg } else { Opcode::Neg };
                let result = Operand::temp(self.new_temp(), ty);
                self.emit(opcode, result.clone(), val, Operand::none());
                result
            }
            UnaryOp::BitNot => {
                let val = self.gen_expr(operand);
                let result = Operand::temp(self.new_temp(), Self::expr_ty(expr));
                self.emit(Opcode::BitNot, result.clone(), val, Operand::none());
                result
            }
            UnaryOp::LogicalNot => {
                let val = self.gen_expr(operand);
                let result = Operand::temp(self.new_temp(), Type::int());
                self.emit(Opcode::LogicalNot, result.clone(), val, Operand::none());
                result
            }
            UnaryOp::Deref => {
                let ptr = self.gen_expr(operand);
                let ptr = self.decay(ptr);
                let result = Operand::temp(self.new_temp(), Self::expr_ty(expr));
                self.emit(Opcode::Load, result.clone(), ptr, Operand::none());
                result
            }
            UnaryOp::AddrOf => self.gen_lvalue_addr(operand),
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.gen_incdec(op, operand)
            }
        }
    }

    /// Increment/decrement: address the target, load, add the (pointer
    /// scaled) delta, store. Postfix returns the pre-value, prefix the
    /// post-value.
    fn gen_incdec(&mut self, op: UnaryOp, operand: &Expr) -> Operand {
        let addr = self.gen_lvalue_addr(operand);
        let ty = Self::expr_ty(operand);
        let old = Operand::temp(self.new_temp(), Rc::clone(&ty));
        self.emit(Opcode::Load, old.clone(), addr.clone(), Operand::none());

        let delta = match ty.pointee() {
            Some(p) => p.size().max(1),
            None => 1,
        };
        let is_inc = matches!(op, UnaryOp::PreInc | UnaryOp::PostInc);
        let opcode = match (is_inc, ty.is_float()) {
            (true, false) => Opcode::Add,
            (false, false) => Opcode::Sub,
            (true, true) => Opcode::FAdd,
            (false, true) => Opcode::FSub,
        };
        let delta_op = if ty.is_float() {
            Operand::float_const(delta as f64, Type::double())
        } else {
            Operand::int_const_typed(delta, Type::long())
        };
        let new = Operand::temp(self.new_temp(), Rc::clone(&ty));
        self.emit(opcode, new.clone(), old.clone(), delta_op);
        self.emit(Opcode::Store, addr, new.clone(), Operand::none());

        if matches!(op, UnaryOp::PostInc | UnaryOp::PostDec) {
            old
        } else {
            new
        }
    }

    // ----- binary -----

    fn gen_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, expr: &Expr) -> Operand {
        if op == BinOp::Assign {
            return self.gen_assignment(lhs, rhs);
        }
        if let Some(base) = op.compound_base() {
            return self.gen_compound_assignment(base, lhs, rhs);
        }
        match op {
            BinOp::LogicalAnd => self.gen_short_circuit(true, lhs, rhs),
            BinOp::LogicalOr => self.gen_short_circuit(false, lhs, rhs),
            BinOp::Comma => {
                self.gen_expr(lhs);
                self.gen_expr(rhs)
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let lval = self.gen_expr(lhs);
                let rval = self.gen_expr(rhs);
                self.gen_comparison(op, lval, rval)
            }
            _ => {
                let lval = self.gen_expr(lhs);
                let rval = self.gen_expr(rhs);
                let lty = Self::expr_ty(lhs);
                let rty = Self::expr_ty(rhs);
                self.gen_arith_values(op, lval, lty, rval, rty, Self::expr_ty(expr))
            }
        }
    }

    /// Arithmetic/bitwise on already-evaluated operands. Pointer operands
    /// decay and integer offsets are scaled by the pointee size.
    fn gen_arith_values(
        &mut self,
        op: BinOp,
        lval: Operand,
        lty: TypeRef,
        rval: Operand,
        rty: TypeRef,
        result_ty: TypeRef,
    ) -> Operand {
        let l_ptr = lty.is_pointer() || lty.is_array();
        let r_ptr = rty.is_pointer() || rty.is_array();

        if (op == BinOp::Add || op == BinOp::Sub) && (l_ptr || r_ptr) {
            return self.gen_pointer_arith(op, lval, lty, rval, rty, result_ty);
        }

        let is_float = result_ty.is_float();
        let opcode = match (op, is_float) {
            (BinOp::Add, false) => Opcode::Add,
            (BinOp::Sub, false) => Opcode::Sub,
            (BinOp::Mul, false) => Opcode::Mul,
            (BinOp::Div, false) => Opcode::Div,
            (BinOp::Mod, false) => Opcode::Mod,
            (BinOp::Add, true) => Opcode::FAdd,
            (BinOp::Sub, true) => Opcode::FSub,
            (BinOp::Mul, true) => Opcode::FMul,
            (BinOp::Div, true) => Opcode::FDiv,
            (BinOp::BitAnd, _) => Opcode::BitAnd,
            (BinOp::BitOr, _) => Opcode::BitOr,
            (BinOp::BitXor, _) => Opcode::BitXor,
            (BinOp::Shl, _) => Opcode::Shl,
            (BinOp::Shr, _) => Opcode::Shr,
            _ => Opcode::Nop,
        };

        let (lval, rval) = if is_float {
            (
                self.to_float(lval),
                self.to_float(rval),
            )
        } else {
            (lval, rval)
        };

        let result = Operand::temp(self.new_temp(), result_ty);
        self.emit(opcode, result.clone(), lval, rval);
        result
    }

    /// Pointer ± integer with pointee-size scaling, and pointer
    /// difference divided back to an element count.
    fn gen_pointer_arith(
        &mut self,
        op: BinOp,
        lval: Operand,
        lty: TypeRef,
        rval: Operand,
        rty: TypeRef,
        result_ty: TypeRef,
    ) -> Operand {
        let l_ptr = lty.is_pointer() || lty.is_array();
        let r_ptr = rty.is_pointer() || rty.is_array();

        if l_ptr && r_ptr {
            // Pointer difference: byte delta divided by the element size.
            let elem = lty
                .pointee()
                .or_else(|| lty.element())
                .map(|t| t.size().max(1))
                .unwrap_or(1);
            let lval = self.decay(lval);
            let rval = self.decay(rval);
            let diff = Operand::temp(self.new_temp(), Type::long());
            self.emit(Opcode::Sub, diff.clone(), lval, rval);
            if elem == 1 {
                return diff;
            }
            let result = Operand::temp(self.new_temp(), Type::long());
            self.emit(
                Opcode::Div,
                result.clone(),
                diff,
                Operand::int_const_typed(elem, Type::long()),
            );
            return result;
        }

        let (ptr_val, ptr_ty, int_val) = if l_ptr {
            (lval, lty, rval)
        } else {
            (rval, rty, lval)
        };
        let elem = ptr_ty
            .pointee()
            .or_else(|| ptr_ty.element())
            .map(|t| t.size().max(1))
            .unwrap_or(1);

        let ptr_val = self.decay(ptr_val);
        let scaled = self.scale_index(int_val, elem);
        let opcode = if op == BinOp::Add { Opcode::Add } else { Opcode::Sub };
        let result = Operand::temp(self.new_temp(), result_ty);
        self.emit(opcode, result.clone(), ptr_val, scaled);
        result
    }

    /// Multiply an index by the element size; constant indices fold.
    fn scale_index(&mut self, index: Operand, elem_size: i64) -> Operand {
        if elem_size == 1 {
            return index;
        }
        if let Operand::IntConst { value, .. } = &index {
            return Operand::int_const_typed(value * elem_size, Type::long());
        }
        let scaled = Operand::temp(self.new_temp(), Type::long());
        self.emit(
            Opcode::Mul,
            scaled.clone(),
            index,
            Operand::int_const_typed(elem_size, Type::long()),
        );
        scaled
    }

    /// Comparison; the opcode family follows the operand types and the
    /// result is always int.
    fn gen_comparison(&mut self, op: BinOp, lval: Operand, rval: Operand) -> Operand {
        let is_float = lval.is_float() || rval.is_float();
        let opcode = match (op, is_float) {
            (BinOp::Eq, false) => Opcode::Eq,
            (BinOp::Ne, false) => Opcode::Ne,
            (BinOp::Lt, false) => Opcode::Lt,
            (BinOp::Gt, false) => Opcode::Gt,
            (BinOp::Le, false) => Opcode::Le,
            (BinOp::Ge, false) => Opcode::Ge,
            (BinOp::Eq, true) => Opcode::FEq,
            (BinOp::Ne, true) => Opcode::FNe,
            (BinOp::Lt, true) => Opcode::FLt,
            (BinOp::Gt, true) => Opcode::FGt,
            (BinOp::Le, true) => Opcode::FLe,
            (BinOp::Ge, true) => Opcode::FGe,
            _ => Opcode::Nop,
        };
        let (lval, rval) = if is_float {
            (self.to_float(lval), self.to_float(rval))
        } else {
            (self.decay(lval), self.decay(rval))
        };
        let result = Operand::temp(self.new_temp(), Type::int());
        self.emit(opcode, result.clone(), lval, rval);
        result
    }

    /// Short-circuit `&&` / `||`: explicit branches writing 1 or 0 into
    /// a temporary; the second operand is only evaluated when needed.
    fn gen_short_circuit(&mut self, is_and: bool, lhs: &Expr, rhs: &Expr) -> Operand {
        let result = Operand::temp(self.new_temp(), Type::int());
        let short_label = self.new_label(if is_and { "and_false" } else { "or_true" });
        let end_label = self.new_label(if is_and { "and_end" } else { "or_end" });

        let lval = self.gen_expr(lhs);
        if is_and {
            self.emit_jump_false(lval, &short_label);
        } else {
            self.emit_jump_true(lval, &short_label);
        }

        let rval = self.gen_expr(rhs);
        if is_and {
            self.emit_jump_false(rval, &short_label);
        } else {
            self.emit_jump_true(rval, &short_label);
        }

        let (taken, skipped) = if is_and { (1, 0) } else { (0, 1) };
        self.emit(
            Opcode::Assign,
            result.clone(),
            Operand::int_const_typed(taken, Type::int()),
            Operand::none(),
        );
        self.emit_jump(&end_label);
        self.emit_label(&short_label);
        self.emit(
            Opcode::Assign,
            result.clone(),
            Operand::int_const_typed(skipped, Type::int()),
            Operand::none(),
        );
        self.emit_label(&end_label);
        result
    }

    // ----- assignment -----

    fn gen_assignment(&mut self, lhs: &Expr, rhs: &Expr) -> Operand {
        let value = self.gen_expr(rhs);
        let target_ty = Self::expr_ty(lhs);
        let value = self.convert_type(value, &target_ty);
        let addr = self.gen_lvalue_addr(lhs);
        self.emit(Opcode::Store, addr, value.clone(), Operand::none());
        value
    }

    fn gen_compound_assignment(&mut self, base: BinOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let addr = self.gen_lvalue_addr(lhs);
        let target_ty = Self::expr_ty(lhs);
        let current = Operand::temp(self.new_temp(), Rc::clone(&target_ty));
        self.emit(Opcode::Load, current.clone(), addr.clone(), Operand::none());

        let rval = self.gen_expr(rhs);
        let rty = Self::expr_ty(rhs);
        let combined = match base {
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                self.gen_comparison(base, current, rval)
            }
            _ => self.gen_arith_values(
                base,
                current,
                Rc::clone(&target_ty),
                rval,
                rty,
                Rc::clone(&target_ty),
            ),
        };
        let combined = self.convert_type(combined, &target_ty);
        self.emit(Opcode::Store, addr, combined.clone(), Operand::none());
        combined
    }

    // ----- conditional -----

    fn gen_conditional(
        &mut self,
        cond: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
        expr: &Expr,
    ) -> Operand {
        let result_ty = Self::expr_ty(expr);
        let result = Operand::temp(self.new_temp(), Rc::clone(&result_ty));
        let else_label = self.new_label("cond_false");
        let end_label = self.new_label("cond_end");

        let cond_val = self.gen_expr(cond);
        self.emit_jump_false(cond_val, &else_label);

        let then_val = self.gen_expr(then_expr);
        let then_val = self.convert_type(then_val, &result_ty);
        self.emit(Opcode::Assign, result.clone(), then_val, Operand::none());
        self.emit_jump(&end_label);

        self.emit_label(&else_label);
        let else_val = self.gen_expr(else_expr);
        let else_val = self.convert_type(else_val, &result_ty);
        self.emit(Opcode::Assign, result.clone(), else_val, Operand::none());

        self.emit_label(&end_label);
        result
    }

    // ----- calls -----

    fn gen_call(&mut self, callee: &Expr, args: &[Expr], expr: &Expr) -> Operand {
        // Parameter types of the callee, for argument conversion.
        let callee_fn_ty: Option<TypeRef> = callee.ty.as_ref().map(|t| match &**t {
            Type::Pointer(p) if p.is_function() => Rc::clone(p),
            _ => Rc::clone(t),
        });
        let param_tys: Vec<TypeRef> = match callee_fn_ty.as_deref() {
            Some(Type::Function { params, .. }) => params.clone(),
            _ => Vec::new(),
        };

        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let mut val = self.gen_expr(arg);
            if let Some(param_ty) = param_tys.get(i) {
                val = self.convert_type(val, param_ty);
            } else {
                val = self.decay(val);
            }
            values.push(val);
        }

        // Params are emitted in reverse source order; the emitter
        // reverses the accumulated list back.
        for val in values.iter().rev() {
            self.emit(Opcode::Param, Operand::none(), val.clone(), Operand::none());
        }

        let callee_op = match &callee.kind {
            ExprKind::Identifier(name) => {
                let op = self.symbol_operand(name);
                match op {
                    Operand::Label { .. } => op,
                    other => other,
                }
            }
            _ => self.gen_expr(callee),
        };

        let ret_ty = Self::expr_ty(expr);
        let result = if ret_ty.is_void() {
            Operand::none()
        } else {
            Operand::temp(self.new_temp(), ret_ty)
        };
        self.emit(
            Opcode::Call,
            result.clone(),
            callee_op,
            Operand::int_const(args.len() as i64),
        );
        result
    }

    // ----- addresses -----

    fn gen_index_addr(&mut self, base: &Expr, index: &Expr, elem_ty: &TypeRef) -> Operand {
        let base_val = self.gen_expr(base);
        let index_val = self.gen_expr(index);
        let addr = Operand::temp(self.new_temp(), Type::pointer(Rc::clone(elem_ty)));
        self.emit(Opcode::IndexAddr, addr.clone(), base_val, index_val);
        addr
    }

    fn gen_member_addr(
        &mut self,
        base: &Expr,
        member: &str,
        arrow: bool,
        member_ty: &TypeRef,
    ) -> Operand {
        let base_val = if arrow {
            self.gen_expr(base)
        } else {
            self.gen_lvalue_addr(base)
        };

        let record_ty = Self::expr_ty(base);
        let record_ty = if arrow {
            record_ty.pointee().unwrap_or(record_ty)
        } else {
            record_ty
        };
        let offset = record_ty
            .find_member(member)
            .map(|m| m.offset)
            .unwrap_or(0);

        let addr = Operand::temp(self.new_temp(), Type::pointer(Rc::clone(member_ty)));
        self.emit(
            Opcode::MemberAddr,
            addr.clone(),
            base_val,
            Operand::int_const(offset),
        );
        addr
    }

    /// Compute the address of an lvalue expression.
    pub(super) fn gen_lvalue_addr(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                let target = self.symbol_operand(name);
                let ty = Self::expr_ty(expr);
                let addr = Operand::temp(self.new_temp(), Type::pointer(ty));
                self.emit(Opcode::LoadAddr, addr.clone(), target, Operand::none());
                addr
            }
            ExprKind::Unary { op: UnaryOp::Deref, operand } => {
                let ptr = self.gen_expr(operand);
                self.decay(ptr)
            }
            ExprKind::Subscript { base: Some(base), index } => {
                let elem_ty = Self::expr_ty(expr);
                self.gen_index_addr(base, index, &elem_ty)
            }
            ExprKind::Member { base: Some(base), member, arrow } => {
                let member_ty = Self::expr_ty(expr);
                self.gen_member_addr(base, member, *arrow, &member_ty)
            }
            _ => {
                self.emit_comment("address of non-lvalue expression");
                let ty = Self::expr_ty(expr);
                let val = self.gen_expr(expr);
                // Materialize in a temporary and address that.
                let tmp = Operand::temp(self.new_temp(), Rc::clone(&ty));
                self.emit(Opcode::Assign, tmp.clone(), val, Operand::none());
                let addr = Operand::temp(self.new_temp(), Type::pointer(ty));
                self.emit(Opcode::LoadAddr, addr.clone(), tmp, Operand::none());
                addr
            }
        }
    }

    // ----- conversions -----

    /// Array operands decay to pointers via `LoadAddr`.
    pub(super) fn decay(&mut self, val: Operand) -> Operand {
        let Some(ty) = val.ty() else { return val };
        let Some(elem) = ty.element() else { return val };
        let addr = Operand::temp(self.new_temp(), Type::pointer(elem));
        self.emit(Opcode::LoadAddr, addr.clone(), val, Operand::none());
        addr
    }

    fn to_float(&mut self, val: Operand) -> Operand {
        if val.is_float() {
            return val;
        }
        if let Operand::IntConst { value, .. } = &val {
            return Operand::float_const(*value as f64, Type::double());
        }
        let result = Operand::temp(self.new_temp(), Type::double());
        self.emit(Opcode::IntToFloat, result.clone(), val, Operand::none());
        result
    }

    /// Emit whatever conversion moves `src` to `target`, or pass it
    /// through when none is needed.
    pub(super) fn convert_type(&mut self, src: Operand, target: &TypeRef) -> Operand {
        // Constants convert in place.
        if let Operand::IntConst { value, .. } = &src {
            if target.is_float() {
                return Operand::float_const(*value as f64, Rc::clone(target));
            }
            return Operand::int_const_typed(*value, Rc::clone(target));
        }
        let Some(src_ty) = src.ty() else { return src };

        if src_ty.is_float() && target.is_float() {
            return src;
        }
        if src_ty.is_integer() && target.is_float() {
            let result = Operand::temp(self.new_temp(), Rc::clone(target));
            self.emit(Opcode::IntToFloat, result.clone(), src, Operand::none());
            return result;
        }
        if src_ty.is_float() && target.is_integer() {
            let result = Operand::temp(self.new_temp(), Rc::clone(target));
            self.emit(Opcode::FloatToInt, result.clone(), src, Operand::none());
            return result;
        }
        if src_ty.is_integer() && target.is_integer() {
            let from = src_ty.size();
            let to = target.size();
            if from == to {
                return src;
            }
            let opcode = if from < to { Opcode::IntExtend } else { Opcode::IntTrunc };
            let result = Operand::temp(self.new_temp(), Rc::clone(target));
            self.emit(opcode, result.clone(), src, Operand::none());
            return result;
        }
        if src_ty.is_pointer() && target.is_integer() {
            let result = Operand::temp(self.new_temp(), Rc::clone(target));
            self.emit(Opcode::PtrToInt, result.clone(), src, Operand::none());
            return result;
        }
        if src_ty.is_integer() && target.is_pointer() {
            let result = Operand::temp(self.new_temp(), Rc::clone(target));
            self.emit(Opcode::IntToPtr, result.clone(), src, Operand::none());
            return result;
        }
        if src_ty.is_array() && target.is_pointer() {
            return self.decay(src);
        }
        src
    }
}
