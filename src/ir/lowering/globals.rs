//! Global variable lowering: flattening compile-time-constant
//! initializers into ordered `GlobalInit` sequences that reproduce the
//! in-memory layout, interior padding included.

use std::rc::Rc;

use crate::frontend::parser::ast::{Declaration, Expr, ExprKind, StorageClass, UnaryOp};
use crate::frontend::sema::const_eval::eval_const_expr;
use crate::frontend::sema::symbol_table::SymbolKind;
use crate::frontend::sema::types::{IntKind, Type, TypeRef};
use crate::ir::ir::{GlobalInit, GlobalVar};
use super::IrGenerator;

impl IrGenerator<'_> {
    pub(super) fn gen_global_declaration(&mut self, decl: &Declaration) {
        if decl.is_typedef {
            return;
        }
        for d in &decl.declarators {
            let Some(sym) = self.symbols.lookup_in_scope(0, &d.name) else {
                continue;
            };
            if sym.kind != SymbolKind::Variable {
                continue;
            }
            let ty = Rc::clone(&sym.ty);
            let is_extern = sym.storage == StorageClass::Extern;

            let mut init_values = Vec::new();
            let has_initializer = d.init.is_some();
            if let Some(init) = &d.init {
                self.collect_global_init(init, &ty, &mut init_values);
            }
            self.program.globals.push(GlobalVar {
                name: d.name.clone(),
                ty,
                is_extern,
                has_initializer,
                init_values,
            });
        }
    }

    /// Flatten one initializer for the given target type. Non-constant
    /// expressions degrade to zero fill.
    fn collect_global_init(&mut self, init: &Expr, ty: &TypeRef, out: &mut Vec<GlobalInit>) {
        let size = ty.size().max(1);
        match &**ty {
            Type::Float { .. } => {
                let value = match &init.kind {
                    ExprKind::FloatLiteral(v) => Some(*v),
                    _ => eval_const_expr(init, self.symbols).map(|v| v as f64),
                };
                match value {
                    Some(v) => out.push(GlobalInit::Float { value: v, size }),
                    None => out.push(GlobalInit::Zero { size }),
                }
            }
            Type::Pointer(_) => match &init.kind {
                ExprKind::StringLiteral(s) => {
                    let label = self.add_string_literal(s);
                    out.push(GlobalInit::StringLabel(label));
                }
                ExprKind::Unary { op: UnaryOp::AddrOf, operand } => {
                    if let ExprKind::Identifier(name) = &operand.kind {
                        out.push(GlobalInit::Address(name.clone()));
                    } else {
                        out.push(GlobalInit::Zero { size });
                    }
                }
                // A function name decays to its address.
                ExprKind::Identifier(name)
                    if self.symbol_type(name).is_some_and(|t| t.is_function()) =>
                {
                    out.push(GlobalInit::Address(name.clone()));
                }
                _ => match eval_const_expr(init, self.symbols) {
                    Some(v) => out.push(GlobalInit::Integer { value: v, size }),
                    None => out.push(GlobalInit::Zero { size }),
                },
            },
            Type::Array { elem, len } => match &init.kind {
                ExprKind::StringLiteral(s)
                    if matches!(**elem, Type::Integer { kind: IntKind::Char, .. }) =>
                {
                    // Expanded byte by byte with the terminator, zero
                    // padded to the declared length.
                    let declared = if *len >= 0 { *len } else { s.len() as i64 + 1 };
                    let mut emitted = 0i64;
                    for b in s.bytes().take(declared as usize) {
                        out.push(GlobalInit::Integer { value: b as i64, size: 1 });
                        emitted += 1;
                    }
                    if emitted < declared {
                        out.push(GlobalInit::Zero { size: declared - emitted });
                    }
                }
                ExprKind::InitList(items) => {
                    let elem_size = elem.size().max(1);
                    let declared = if *len >= 0 { *len } else { items.len() as i64 };
                    let mut cursor = 0i64;
                    for item in items {
                        let (index, value) = match designated_index(item) {
                            Some((idx_expr, value)) => (
                                eval_const_expr(idx_expr, self.symbols).unwrap_or(cursor),
                                value,
                            ),
                            None => (cursor, item),
                        };
                        if index > cursor {
                            out.push(GlobalInit::Zero { size: (index - cursor) * elem_size });
                        }
                        self.collect_global_init(value, elem, out);
                        cursor = index + 1;
                    }
                    if declared > cursor {
                        out.push(GlobalInit::Zero { size: (declared - cursor) * elem_size });
                    }
                }
                _ => out.push(GlobalInit::Zero { size }),
            },
            Type::Struct(rec) => {
                let members = rec.borrow().members.clone();
                match &init.kind {
                    ExprKind::InitList(items) => {
                        // Map each member index to its initializer,
                        // honoring `.member =` designators.
                        let mut values: Vec<Option<&Expr>> = vec![None; members.len()];
                        let mut cursor = 0usize;
                        for item in items {
                            match designated_member(item) {
                                Some((name, value)) => {
                                    if let Some(idx) =
                                        members.iter().position(|m| m.name == name)
                                    {
                                        values[idx] = Some(value);
                                        cursor = idx + 1;
                                    }
                                }
                                None => {
                                    if cursor < values.len() {
                                        values[cursor] = Some(item);
                                        cursor += 1;
                                    }
                                }
                            }
                        }

                        // Emit members in layout order with interior and
                        // tail padding as explicit zero runs.
                        let mut pos = 0i64;
                        for (member, value) in members.iter().zip(&values) {
                            if member.offset > pos {
                                out.push(GlobalInit::Zero { size: member.offset - pos });
                                pos = member.offset;
                            }
                            match value {
                                Some(v) => self.collect_global_init(v, &member.ty, out),
                                None => out.push(GlobalInit::Zero { size: member.ty.size().max(1) }),
                            }
                            pos += member.ty.size();
                        }
                        if size > pos {
                            out.push(GlobalInit::Zero { size: size - pos });
                        }
                    }
                    _ => out.push(GlobalInit::Zero { size }),
                }
            }
            Type::Union(rec) => {
                // First member only, then zero fill to the union size.
                let first = rec.borrow().members.first().cloned();
                match (&init.kind, first) {
                    (ExprKind::InitList(items), Some(member)) if !items.is_empty() => {
                        self.collect_global_init(&items[0], &member.ty, out);
                        let used = member.ty.size();
                        if size > used {
                            out.push(GlobalInit::Zero { size: size - used });
                        }
                    }
                    _ => out.push(GlobalInit::Zero { size }),
                }
            }
            _ => {
                // Integer scalars (including enums).
                match &init.kind {
                    ExprKind::InitList(items) if !items.is_empty() => {
                        self.collect_global_init(&items[0], ty, out);
                    }
                    _ => match eval_const_expr(init, self.symbols) {
                        Some(v) => out.push(GlobalInit::Integer { value: v, size }),
                        None => out.push(GlobalInit::Zero { size }),
                    },
                }
            }
        }
    }
}

fn designated_index(item: &Expr) -> Option<(&Expr, &Expr)> {
    if let ExprKind::Binary { op: crate::frontend::parser::ast::BinOp::Assign, lhs, rhs } =
        &item.kind
    {
        if let ExprKind::Subscript { base: None, index } = &lhs.kind {
            return Some((index, rhs));
        }
    }
    None
}

fn designated_member(item: &Expr) -> Option<(&str, &Expr)> {
    if let ExprKind::Binary { op: crate::frontend::parser::ast::BinOp::Assign, lhs, rhs } =
        &item.kind
    {
        if let ExprKind::Member { base: None, member, .. } = &lhs.kind {
            return Some((member, rhs));
        }
    }
    None
}
