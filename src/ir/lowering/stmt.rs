//! Statement and local-declaration lowering.

use std::rc::Rc;

use crate::frontend::parser::ast::{
    BinOp, Declaration, Expr, ExprKind, ForInit, Stmt, StmtKind,
};
use crate::frontend::sema::const_eval::eval_const_expr;
use crate::frontend::sema::symbol_table::SymbolKind;
use crate::frontend::sema::types::{Type, TypeRef};
use crate::ir::ir::{Opcode, Operand};
use super::{IrGenerator, SwitchFrame};

impl IrGenerator<'_> {
    pub(super) fn gen_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Expr(None) => {}
            StmtKind::Expr(Some(e)) => {
                self.gen_expr(e);
            }
            StmtKind::Compound(block) => self.gen_compound(block),
            StmtKind::If { cond, then_stmt, else_stmt } => {
                let else_label = self.new_label("else");
                let end_label = self.new_label("endif");
                let cond_val = self.gen_expr(cond);
                match else_stmt {
                    Some(else_stmt) => {
                        self.emit_jump_false(cond_val, &else_label);
                        self.gen_stmt(then_stmt);
                        self.emit_jump(&end_label);
                        self.emit_label(&else_label);
                        self.gen_stmt(else_stmt);
                        self.emit_label(&end_label);
                    }
                    None => {
                        self.emit_jump_false(cond_val, &end_label);
                        self.gen_stmt(then_stmt);
                        self.emit_label(&end_label);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                let start_label = self.new_label("while");
                let end_label = self.new_label("endwhile");
                self.emit_label(&start_label);
                let cond_val = self.gen_expr(cond);
                self.emit_jump_false(cond_val, &end_label);
                self.break_targets.push(end_label.clone());
                self.continue_targets.push(start_label.clone());
                self.gen_stmt(body);
                self.continue_targets.pop();
                self.break_targets.pop();
                self.emit_jump(&start_label);
                self.emit_label(&end_label);
            }
            StmtKind::DoWhile { body, cond } => {
                let start_label = self.new_label("do");
                let cond_label = self.new_label("docond");
                let end_label = self.new_label("enddo");
                self.emit_label(&start_label);
                self.break_targets.push(end_label.clone());
                self.continue_targets.push(cond_label.clone());
                self.gen_stmt(body);
                self.continue_targets.pop();
                self.break_targets.pop();
                self.emit_label(&cond_label);
                let cond_val = self.gen_expr(cond);
                self.emit_jump_true(cond_val, &start_label);
                self.emit_label(&end_label);
            }
            StmtKind::For { init, cond, step, body, scope_id } => {
                let cond_label = self.new_label("forcond");
                let inc_label = self.new_label("forinc");
                let end_label = self.new_label("endfor");

                let old_scope = scope_id.map(|id| self.symbols.set_current_scope(id));

                match init.as_deref_mut() {
                    Some(ForInit::Declaration(decl)) => self.gen_local_declaration(decl),
                    Some(ForInit::Expr(e)) => {
                        self.gen_expr(e);
                    }
                    None => {}
                }

                self.emit_label(&cond_label);
                if let Some(c) = cond {
                    let cond_val = self.gen_expr(c);
                    self.emit_jump_false(cond_val, &end_label);
                }

                self.break_targets.push(end_label.clone());
                self.continue_targets.push(inc_label.clone());
                self.gen_stmt(body);
                self.continue_targets.pop();
                self.break_targets.pop();

                self.emit_label(&inc_label);
                if let Some(s) = step {
                    self.gen_expr(s);
                }
                self.emit_jump(&cond_label);
                self.emit_label(&end_label);

                if let Some(old) = old_scope {
                    self.symbols.set_current_scope(old);
                }
            }
            StmtKind::Switch { cond, body } => {
                let dispatch_label = self.new_label("switchtable");
                let end_label = self.new_label("endswitch");

                // The condition lands in a temp the dispatch block can
                // re-read after the body.
                let cond_val = self.gen_expr(cond);
                let cond_tmp = Operand::temp(self.new_temp(), Type::long());
                self.emit(Opcode::Assign, cond_tmp.clone(), cond_val, Operand::none());
                self.emit_jump(&dispatch_label);

                self.switch_stack.push(SwitchFrame {
                    cond: cond_tmp,
                    default_label: None,
                    end_label: end_label.clone(),
                    cases: Vec::new(),
                });
                self.break_targets.push(end_label.clone());
                self.gen_stmt(body);
                self.break_targets.pop();
                self.emit_jump(&end_label);

                // Dispatch block: an Eq + JumpTrue cascade over the
                // recorded cases, then default or end.
                let frame = self.switch_stack.pop().unwrap();
                self.emit_label(&dispatch_label);
                for (value, label) in &frame.cases {
                    let cmp = Operand::temp(self.new_temp(), Type::int());
                    self.emit(
                        Opcode::Eq,
                        cmp.clone(),
                        frame.cond.clone(),
                        Operand::int_const_typed(*value, Type::long()),
                    );
                    self.emit_jump_true(cmp, label);
                }
                match &frame.default_label {
                    Some(label) => self.emit_jump(label),
                    None => self.emit_jump(&end_label),
                }
                self.emit_label(&end_label);
            }
            StmtKind::Case { value, body, folded, label } => {
                let case_label = self.new_label("case");
                *label = Some(case_label.clone());
                let case_value = folded
                    .or_else(|| eval_const_expr(value, self.symbols))
                    .unwrap_or(0);
                if let Some(frame) = self.switch_stack.last_mut() {
                    frame.cases.push((case_value, case_label.clone()));
                }
                self.emit_label(&case_label);
                self.gen_stmt(body);
            }
            StmtKind::Default { body, label } => {
                let default_label = self.new_label("default");
                *label = Some(default_label.clone());
                if let Some(frame) = self.switch_stack.last_mut() {
                    frame.default_label = Some(default_label.clone());
                }
                self.emit_label(&default_label);
                self.gen_stmt(body);
            }
            StmtKind::Break => {
                if let Some(target) = self.break_targets.last().cloned() {
                    self.emit_jump(&target);
                }
            }
            StmtKind::Continue => {
                if let Some(target) = self.continue_targets.last().cloned() {
                    self.emit_jump(&target);
                }
            }
            StmtKind::Return(value) => {
                match value {
                    Some(e) => {
                        let val = self.gen_expr(e);
                        let ret_ty = self
                            .current
                            .as_ref()
                            .map(|f| Rc::clone(&f.return_type))
                            .unwrap_or_else(Type::int);
                        let val = self.convert_type(val, &ret_ty);
                        self.emit(Opcode::Return, Operand::none(), val, Operand::none());
                    }
                    None => {
                        self.emit(Opcode::Return, Operand::none(), Operand::none(), Operand::none());
                    }
                }
            }
            StmtKind::Goto(target) => {
                let target = target.clone();
                self.emit_jump(&target);
            }
            StmtKind::Label { name, body } => {
                let name = name.clone();
                self.emit_label(&name);
                self.gen_stmt(body);
            }
        }
    }

    // ----- local declarations -----

    pub(super) fn gen_local_declaration(&mut self, decl: &mut Declaration) {
        if decl.is_typedef {
            return;
        }
        let scope_id = self.symbols.current_scope_id();
        for d in &mut decl.declarators {
            let Some(sym) = self.symbols.lookup_in_scope(scope_id, &d.name) else {
                continue;
            };
            if sym.kind == SymbolKind::Function {
                continue;
            }
            let var_ty = Rc::clone(&sym.ty);
            let ir_name = self.register_local(scope_id, &d.name);
            let var = Operand::variable(ir_name, Rc::clone(&var_ty));

            let Some(init) = &d.init else { continue };
            self.gen_local_init(&var, &var_ty, init);
        }
    }

    /// Lower a local initializer. Scalars assign; aggregates address the
    /// variable and store element by element.
    fn gen_local_init(&mut self, var: &Operand, var_ty: &TypeRef, init: &Expr) {
        match (&init.kind, &**var_ty) {
            (ExprKind::InitList(_), _) | (ExprKind::StringLiteral(_), Type::Array { .. }) => {
                let addr = Operand::temp(self.new_temp(), Type::pointer(Rc::clone(var_ty)));
                self.emit(Opcode::LoadAddr, addr.clone(), var.clone(), Operand::none());
                self.gen_init_into(&addr, var_ty, init);
            }
            _ => {
                let val = self.gen_expr(init);
                let val = self.convert_type(val, var_ty);
                self.emit(Opcode::Assign, var.clone(), val, Operand::none());
            }
        }
    }

    /// Store an initializer through `addr` (a pointer to the target).
    /// Handles nested lists, designators, and char arrays from strings.
    fn gen_init_into(&mut self, addr: &Operand, target_ty: &TypeRef, init: &Expr) {
        match (&init.kind, &**target_ty) {
            (ExprKind::StringLiteral(s), Type::Array { elem, len }) => {
                // Expand byte by byte, including the terminator, zero
                // filling the remainder of a longer array.
                let total = if *len >= 0 { *len } else { s.len() as i64 + 1 };
                let bytes: Vec<i64> = s
                    .bytes()
                    .map(|b| b as i64)
                    .chain(std::iter::once(0))
                    .collect();
                for i in 0..total {
                    let byte = bytes.get(i as usize).copied().unwrap_or(0);
                    let elem_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(elem)));
                    self.emit(
                        Opcode::IndexAddr,
                        elem_addr.clone(),
                        addr.clone(),
                        Operand::int_const(i),
                    );
                    self.emit(
                        Opcode::Store,
                        elem_addr,
                        Operand::int_const_typed(byte, Rc::clone(elem)),
                        Operand::none(),
                    );
                }
            }
            (ExprKind::InitList(items), Type::Array { elem, len }) => {
                let mut cursor: i64 = 0;
                let mut highest: i64 = 0;
                for item in items {
                    // `[index] = value` designators rebase the cursor.
                    let (index, value) = match designated_index(item) {
                        Some((idx_expr, value)) => {
                            let idx = eval_const_expr(idx_expr, self.symbols).unwrap_or(cursor);
                            (idx, value)
                        }
                        None => (cursor, item),
                    };
                    let elem_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(elem)));
                    self.emit(
                        Opcode::IndexAddr,
                        elem_addr.clone(),
                        addr.clone(),
                        Operand::int_const(index),
                    );
                    self.gen_init_into(&elem_addr, elem, value);
                    cursor = index + 1;
                    highest = highest.max(cursor);
                }
                // Zero the tail of a partially initialized array.
                if *len > highest {
                    for i in highest..*len {
                        let elem_addr =
                            Operand::temp(self.new_temp(), Type::pointer(Rc::clone(elem)));
                        self.emit(
                            Opcode::IndexAddr,
                            elem_addr.clone(),
                            addr.clone(),
                            Operand::int_const(i),
                        );
                        self.gen_zero_into(&elem_addr, elem);
                    }
                }
            }
            (ExprKind::InitList(items), Type::Struct(rec)) => {
                let members = rec.borrow().members.clone();
                let mut cursor = 0usize;
                for item in items {
                    let (member_idx, value) = match designated_member(item) {
                        Some((name, value)) => {
                            match members.iter().position(|m| m.name == name) {
                                Some(idx) => (idx, value),
                                None => continue,
                            }
                        }
                        None => (cursor, item),
                    };
                    let Some(member) = members.get(member_idx) else { continue };
                    let member_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(&member.ty)));
                    self.emit(
                        Opcode::MemberAddr,
                        member_addr.clone(),
                        addr.clone(),
                        Operand::int_const(member.offset),
                    );
                    self.gen_init_into(&member_addr, &member.ty, value);
                    cursor = member_idx + 1;
                }
            }
            (ExprKind::InitList(items), Type::Union(rec)) => {
                let first = rec.borrow().members.first().cloned();
                if let (Some(member), Some(item)) = (first, items.first()) {
                    let member_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(&member.ty)));
                    self.emit(
                        Opcode::MemberAddr,
                        member_addr.clone(),
                        addr.clone(),
                        Operand::int_const(0),
                    );
                    self.gen_init_into(&member_addr, &member.ty, item);
                }
            }
            (ExprKind::InitList(items), _) => {
                // Scalar wrapped in braces.
                if let Some(item) = items.first() {
                    self.gen_init_into(addr, target_ty, item);
                }
            }
            _ => {
                let val = self.gen_expr(init);
                let val = self.convert_type(val, target_ty);
                self.emit(Opcode::Store, addr.clone(), val, Operand::none());
            }
        }
    }

    /// Zero initialize through `addr`; aggregates recurse element-wise.
    fn gen_zero_into(&mut self, addr: &Operand, target_ty: &TypeRef) {
        match &**target_ty {
            Type::Array { elem, len } => {
                for i in 0..(*len).max(0) {
                    let elem_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(elem)));
                    self.emit(
                        Opcode::IndexAddr,
                        elem_addr.clone(),
                        addr.clone(),
                        Operand::int_const(i),
                    );
                    self.gen_zero_into(&elem_addr, elem);
                }
            }
            Type::Struct(rec) => {
                let members = rec.borrow().members.clone();
                for member in members {
                    let member_addr =
                        Operand::temp(self.new_temp(), Type::pointer(Rc::clone(&member.ty)));
                    self.emit(
                        Opcode::MemberAddr,
                        member_addr.clone(),
                        addr.clone(),
                        Operand::int_const(member.offset),
                    );
                    self.gen_zero_into(&member_addr, &member.ty);
                }
            }
            _ if target_ty.is_float() => {
                self.emit(
                    Opcode::Store,
                    addr.clone(),
                    Operand::float_const(0.0, Rc::clone(target_ty)),
                    Operand::none(),
                );
            }
            _ => {
                self.emit(
                    Opcode::Store,
                    addr.clone(),
                    Operand::int_const_typed(0, Rc::clone(target_ty)),
                    Operand::none(),
                );
            }
        }
    }
}

/// Match `[index] = value` items produced by the parser for designators.
fn designated_index(item: &Expr) -> Option<(&Expr, &Expr)> {
    if let ExprKind::Binary { op: BinOp::Assign, lhs, rhs } = &item.kind {
        if let ExprKind::Subscript { base: None, index } = &lhs.kind {
            return Some((index, rhs));
        }
    }
    None
}

/// Match `.member = value` items produced by the parser for designators.
fn designated_member(item: &Expr) -> Option<(&str, &Expr)> {
    if let ExprKind::Binary { op: BinOp::Assign, lhs, rhs } = &item.kind {
        if let ExprKind::Member { base: None, member, .. } = &lhs.kind {
            return Some((member, rhs));
        }
    }
    None
}
