//! The semantic analyzer: a single walk over the AST that resolves
//! syntactic types to semantic types, installs symbols, enforces the
//! declaration and statement constraints, and decorates AST nodes in
//! place (expression types, lvalue flags, scope ids, folded case
//! values). Scope ids recorded here are replayed by the IR generator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::common::error::Diagnostic;
use crate::common::source::SourceLocation;
use crate::frontend::parser::ast::{
    BlockItem, CompoundStmt, Declaration, Expr, ExprKind, ExternalDecl, FieldDecl, ForInit,
    FunctionDef, Stmt, StmtKind, StorageClass, TranslationUnit, TypeSpec,
};
use super::const_eval::eval_const_expr;
use super::symbol_table::{ScopeKind, Symbol, SymbolKind, SymbolTable};
use super::types::{
    can_implicitly_convert, compatible, EnumType, FloatKind, IntKind, Member, RecordType, Type,
    TypeRef,
};

pub struct SemanticAnalyzer {
    pub(super) symbols: SymbolTable,
    pub(super) errors: Vec<Diagnostic>,
    pub(super) warnings: Vec<Diagnostic>,
    pub(super) loop_depth: u32,
    pub(super) switch_depth: u32,
    anon_tag_counter: u32,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        super::builtins::register_runtime_functions(&mut symbols);
        Self {
            symbols,
            errors: Vec::new(),
            warnings: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            anon_tag_counter: 0,
        }
    }

    /// Analyze a translation unit in place. Returns true when no errors
    /// were recorded.
    pub fn analyze(&mut self, unit: &mut TranslationUnit) -> bool {
        for decl in &mut unit.decls {
            match decl {
                ExternalDecl::Function(func) => self.analyze_function(func),
                ExternalDecl::Declaration(d) => self.analyze_declaration(d),
            }
        }
        debug!(
            "semantic analysis finished: {} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        );
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Hand the populated symbol table to the IR generator.
    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbols
    }

    pub(super) fn error(&mut self, loc: &SourceLocation, message: impl Into<String>) {
        self.errors
            .push(Diagnostic::error(message).with_location(loc.clone()));
    }

    pub(super) fn warning(&mut self, loc: &SourceLocation, message: impl Into<String>) {
        self.warnings
            .push(Diagnostic::warning(message).with_location(loc.clone()));
    }

    // ----- type resolution -----

    /// Resolve a syntactic type to a semantic type, registering tags on
    /// first sight. Returns `None` after recording a diagnostic.
    pub(super) fn resolve_type(&mut self, spec: &TypeSpec, loc: &SourceLocation) -> Option<TypeRef> {
        match spec {
            TypeSpec::Void => Some(Type::void()),
            TypeSpec::Basic { kind, unsigned } => Some(basic_to_semantic(*kind, *unsigned)),
            TypeSpec::Named(name) => match self.symbols.lookup(name) {
                Some(sym) if sym.kind == SymbolKind::TypeDef => Some(Rc::clone(&sym.ty)),
                _ => {
                    self.error(loc, format!("unknown type name '{}'", name));
                    None
                }
            },
            TypeSpec::Pointer(inner) => {
                let pointee = self.resolve_type(inner, loc)?;
                Some(Type::pointer(pointee))
            }
            TypeSpec::Array(elem, len) => {
                let elem_ty = self.resolve_type(elem, loc)?;
                let length = match len {
                    None => -1,
                    Some(expr) => match eval_const_expr(expr, &self.symbols) {
                        Some(n) if n >= 0 => n,
                        Some(_) => {
                            self.error(loc, "array size must be non-negative");
                            return None;
                        }
                        None => {
                            self.error(loc, "array size is not a constant expression");
                            return None;
                        }
                    },
                };
                Some(Type::array(elem_ty, length))
            }
            TypeSpec::Function { ret, params, variadic } => {
                let ret_ty = self.resolve_type(ret, loc)?;
                let mut param_tys = Vec::with_capacity(params.len());
                for p in params {
                    let ty = self.resolve_type(&p.ty, &p.loc)?;
                    param_tys.push(adjust_parameter_type(ty));
                }
                Some(Type::function(ret_ty, param_tys, *variadic))
            }
            TypeSpec::Record { is_union, tag, fields } => {
                self.resolve_record(*is_union, tag.as_deref(), fields.as_deref(), loc)
            }
            TypeSpec::Enum { tag, constants } => {
                self.resolve_enum(tag.as_deref(), constants.as_deref(), loc)
            }
        }
    }

    fn fresh_anon_tag(&mut self) -> String {
        let tag = format!("__anon{}", self.anon_tag_counter);
        self.anon_tag_counter += 1;
        tag
    }

    fn resolve_record(
        &mut self,
        is_union: bool,
        tag: Option<&str>,
        fields: Option<&[FieldDecl]>,
        loc: &SourceLocation,
    ) -> Option<TypeRef> {
        let expected_kind = if is_union { SymbolKind::UnionTag } else { SymbolKind::StructTag };
        let keyword = if is_union { "union" } else { "struct" };
        let tag_name = match tag {
            Some(t) => t.to_string(),
            None => self.fresh_anon_tag(),
        };

        // Locate or register the tag; the tag namespace is flat.
        let existing = self.symbols.lookup_tag(&tag_name).cloned();
        let ty = match existing {
            Some(sym) => {
                if sym.kind != expected_kind {
                    self.error(loc, format!("'{}' is not a {}", tag_name, keyword));
                    return None;
                }
                Rc::clone(&sym.ty)
            }
            None => {
                let rec = Rc::new(RefCell::new(RecordType {
                    tag: tag_name.clone(),
                    members: Vec::new(),
                    complete: false,
                }));
                let ty: TypeRef = Rc::new(if is_union {
                    Type::Union(rec)
                } else {
                    Type::Struct(rec)
                });
                let mut sym =
                    Symbol::new(tag_name.clone(), expected_kind, Rc::clone(&ty), loc.clone());
                sym.is_defined = false;
                self.symbols.add_tag(sym);
                ty
            }
        };

        let Some(fields) = fields else {
            return Some(ty);
        };

        // A member list completes the record.
        let rec = match &*ty {
            Type::Struct(rec) | Type::Union(rec) => Rc::clone(rec),
            _ => return Some(ty),
        };
        if rec.borrow().complete {
            // Each declarator of `struct S {...} a, b;` re-resolves the
            // same member list; only a genuinely different list is a
            // redefinition.
            let same_fields = {
                let rec = rec.borrow();
                fields
                    .iter()
                    .filter_map(|f| f.name.as_ref())
                    .all(|name| rec.members.iter().any(|m| &m.name == name))
            };
            if !same_fields {
                self.error(loc, format!("redefinition of '{} {}'", keyword, tag_name));
            }
            return Some(ty);
        }

        let mut members: Vec<Member> = Vec::new();
        let mut offset: i64 = 0;
        for field in fields {
            let Some(field_ty) = self.resolve_type(&field.ty, &field.loc) else {
                continue;
            };
            if !field_ty.is_function() && field_ty.size() == 0 && !field_ty.is_array() {
                self.error(&field.loc, "member has incomplete type");
                continue;
            }
            match &field.name {
                Some(name) => {
                    if members.iter().any(|m| &m.name == name) {
                        self.error(&field.loc, format!("duplicate member '{}'", name));
                        continue;
                    }
                    let member_offset = if is_union {
                        0
                    } else {
                        align_up(offset, field_ty.alignment())
                    };
                    if !is_union {
                        offset = member_offset + field_ty.size();
                    }
                    members.push(Member {
                        name: name.clone(),
                        ty: field_ty,
                        offset: member_offset,
                    });
                }
                None => {
                    // Anonymous struct/union member: hoist its fields
                    // into the enclosing record at the member's offset.
                    let base = if is_union {
                        0
                    } else {
                        align_up(offset, field_ty.alignment())
                    };
                    let inner = match &*field_ty {
                        Type::Struct(r) | Type::Union(r) => r.borrow().members.clone(),
                        _ => {
                            self.error(&field.loc, "anonymous member must be a struct or union");
                            continue;
                        }
                    };
                    for m in inner {
                        if members.iter().any(|x| x.name == m.name) {
                            self.error(
                                &field.loc,
                                format!("duplicate member '{}' from anonymous member", m.name),
                            );
                            continue;
                        }
                        members.push(Member {
                            name: m.name,
                            ty: m.ty,
                            offset: base + m.offset,
                        });
                    }
                    if !is_union {
                        offset = base + field_ty.size();
                    }
                }
            }
        }

        {
            let mut rec = rec.borrow_mut();
            rec.members = members;
            rec.complete = true;
        }
        Some(ty)
    }

    fn resolve_enum(
        &mut self,
        tag: Option<&str>,
        constants: Option<&[crate::frontend::parser::ast::EnumConstant]>,
        loc: &SourceLocation,
    ) -> Option<TypeRef> {
        let tag_name = match tag {
            Some(t) => t.to_string(),
            None => self.fresh_anon_tag(),
        };

        let existing = self.symbols.lookup_tag(&tag_name).cloned();
        let ty = match existing {
            Some(sym) => {
                if sym.kind != SymbolKind::EnumTag {
                    self.error(loc, format!("'{}' is not an enum", tag_name));
                    return None;
                }
                Rc::clone(&sym.ty)
            }
            None => {
                let en = Rc::new(RefCell::new(EnumType {
                    tag: tag_name.clone(),
                    constants: HashMap::new(),
                    complete: false,
                }));
                let ty: TypeRef = Rc::new(Type::Enum(en));
                let sym = Symbol::new(tag_name.clone(), SymbolKind::EnumTag, Rc::clone(&ty), loc.clone());
                self.symbols.add_tag(sym);
                ty
            }
        };

        let Some(constants) = constants else {
            return Some(ty);
        };

        let en = match &*ty {
            Type::Enum(en) => Rc::clone(en),
            _ => return Some(ty),
        };
        if en.borrow().complete {
            let same = {
                let en = en.borrow();
                constants.len() == en.constants.len()
                    && constants.iter().all(|c| en.constants.contains_key(&c.name))
            };
            if !same {
                self.error(loc, format!("redefinition of 'enum {}'", tag_name));
            }
            return Some(ty);
        }

        let mut next_value: i64 = 0;
        for constant in constants {
            let value = match &constant.value {
                Some(expr) => match eval_const_expr(expr, &self.symbols) {
                    Some(v) => v,
                    None => {
                        self.error(
                            &constant.loc,
                            format!("enumerator value for '{}' is not a constant", constant.name),
                        );
                        next_value
                    }
                },
                None => next_value,
            };
            next_value = value.wrapping_add(1);

            en.borrow_mut().constants.insert(constant.name.clone(), value);

            let mut sym = Symbol::new(
                constant.name.clone(),
                SymbolKind::EnumConstant,
                Type::int(),
                constant.loc.clone(),
            );
            sym.enum_value = value;
            if !self.symbols.add_symbol(sym) {
                self.error(
                    &constant.loc,
                    format!("redefinition of enumerator '{}'", constant.name),
                );
            }
        }
        en.borrow_mut().complete = true;
        Some(ty)
    }

    // ----- declarations -----

    fn analyze_function(&mut self, func: &mut FunctionDef) {
        let Some(ret_ty) = self.resolve_type(&func.return_type, &func.loc) else {
            return;
        };

        let mut param_tys = Vec::with_capacity(func.params.len());
        for p in &func.params {
            match self.resolve_type(&p.ty, &p.loc) {
                Some(ty) => param_tys.push(adjust_parameter_type(ty)),
                None => return,
            }
        }
        let fn_ty = Type::function(Rc::clone(&ret_ty), param_tys.clone(), func.variadic);

        // Install or validate the function symbol at file scope.
        match self.symbols.lookup_in_scope(0, &func.name).cloned() {
            Some(existing) => {
                if existing.kind != SymbolKind::Function {
                    self.error(&func.loc, format!("redefinition of '{}'", func.name));
                    return;
                }
                if !compatible(&existing.ty, &fn_ty) {
                    self.error(
                        &func.loc,
                        format!(
                            "conflicting types for '{}': '{}' vs '{}'",
                            func.name, fn_ty, existing.ty
                        ),
                    );
                    return;
                }
                if existing.is_defined {
                    self.error(&func.loc, format!("redefinition of '{}'", func.name));
                    return;
                }
                let old = self.symbols.set_current_scope(0);
                if let Some(sym) = self.symbols.lookup_local_mut(&func.name) {
                    sym.is_defined = true;
                    sym.ty = Rc::clone(&fn_ty);
                }
                self.symbols.set_current_scope(old);
            }
            None => {
                let mut sym = Symbol::new(
                    func.name.clone(),
                    SymbolKind::Function,
                    Rc::clone(&fn_ty),
                    func.loc.clone(),
                );
                sym.storage = func.storage;
                sym.is_defined = true;
                sym.global_label = Some(func.name.clone());
                let old = self.symbols.set_current_scope(0);
                self.symbols.add_symbol(sym);
                self.symbols.set_current_scope(old);
            }
        }

        let scope_id = self.symbols.enter_scope(ScopeKind::Function);
        func.scope_id = Some(scope_id);
        self.symbols.set_function_info(&func.name, Rc::clone(&ret_ty));

        for (param, ty) in func.params.iter().zip(&param_tys) {
            let Some(name) = &param.name else {
                self.error(&param.loc, "parameter name omitted in function definition");
                continue;
            };
            let mut sym = Symbol::new(
                name.clone(),
                SymbolKind::Parameter,
                Rc::clone(ty),
                param.loc.clone(),
            );
            sym.stack_offset = Some(self.symbols.allocate_local(ty.size().max(8), ty.alignment().max(8)));
            sym.is_defined = true;
            if !self.symbols.add_symbol(sym) {
                self.error(&param.loc, format!("duplicate parameter '{}'", name));
            }
        }

        // The body shares the function scope so parameters and top-level
        // locals live together.
        func.body.scope_id = Some(scope_id);
        self.analyze_block_items(&mut func.body);

        if !ret_ty.is_void() && !block_contains_return(&func.body) {
            self.warning(
                &func.loc,
                format!("non-void function '{}' may not return a value", func.name),
            );
        }

        self.symbols.exit_scope();
    }

    pub(super) fn analyze_declaration(&mut self, decl: &mut Declaration) {
        if decl.declarators.is_empty() {
            // Tag or enum declaration for side effects only.
            self.resolve_type(&decl.base, &decl.loc);
            return;
        }

        let is_global = self.symbols.is_global_scope();

        for d in &mut decl.declarators {
            let Some(mut ty) = self.resolve_type(&d.ty, &d.loc) else {
                continue;
            };

            if decl.is_typedef {
                let mut sym = Symbol::new(d.name.clone(), SymbolKind::TypeDef, ty, d.loc.clone());
                sym.is_defined = true;
                if !self.symbols.add_symbol(sym) {
                    self.error(&d.loc, format!("redefinition of typedef '{}'", d.name));
                }
                continue;
            }

            if ty.is_function() {
                self.declare_function_prototype(&d.name, &ty, decl.storage, &d.loc);
                continue;
            }

            if ty.is_void() {
                self.error(&d.loc, format!("variable '{}' declared void", d.name));
                continue;
            }

            // Infer the length of an incomplete array from its initializer.
            if let Type::Array { elem, len } = &*ty {
                if *len < 0 {
                    if let Some(init) = &d.init {
                        let inferred = match &init.kind {
                            ExprKind::InitList(items) => Some(items.len() as i64),
                            ExprKind::StringLiteral(s) => Some(s.len() as i64 + 1),
                            _ => None,
                        };
                        if let Some(n) = inferred {
                            ty = Type::array(Rc::clone(elem), n);
                        }
                    }
                }
            }

            if is_global {
                self.declare_global_variable(d.name.clone(), Rc::clone(&ty), decl.storage, &d.loc);
            } else {
                let mut sym = Symbol::new(
                    d.name.clone(),
                    SymbolKind::Variable,
                    Rc::clone(&ty),
                    d.loc.clone(),
                );
                sym.storage = decl.storage;
                sym.stack_offset = Some(self.symbols.allocate_local(ty.size(), ty.alignment()));
                sym.is_defined = true;
                if !self.symbols.add_symbol(sym) {
                    self.error(&d.loc, format!("redefinition of '{}'", d.name));
                    continue;
                }
            }

            if let Some(init) = &mut d.init {
                self.check_initializer(&ty, init);
            }
        }
    }

    fn declare_function_prototype(
        &mut self,
        name: &str,
        ty: &TypeRef,
        storage: StorageClass,
        loc: &SourceLocation,
    ) {
        let old = self.symbols.set_current_scope(0);
        match self.symbols.lookup_local(name).cloned() {
            Some(existing) => {
                if existing.kind != SymbolKind::Function || !compatible(&existing.ty, ty) {
                    self.error(
                        loc,
                        format!("conflicting declaration of '{}'", name),
                    );
                }
            }
            None => {
                let mut sym = Symbol::new(name.to_string(), SymbolKind::Function, Rc::clone(ty), loc.clone());
                sym.storage = storage;
                sym.global_label = Some(name.to_string());
                self.symbols.add_symbol(sym);
            }
        }
        self.symbols.set_current_scope(old);
    }

    fn declare_global_variable(
        &mut self,
        name: String,
        ty: TypeRef,
        storage: StorageClass,
        loc: &SourceLocation,
    ) {
        match self.symbols.lookup_in_scope(0, &name).cloned() {
            Some(existing) => {
                if !compatible(&existing.ty, &ty) {
                    self.error(
                        loc,
                        format!(
                            "conflicting types for '{}': '{}' vs '{}'",
                            name, ty, existing.ty
                        ),
                    );
                    return;
                }
                if storage == StorageClass::Extern {
                    // An extern after a definition is accepted silently.
                    return;
                }
                if existing.is_defined {
                    self.error(loc, format!("redefinition of '{}'", name));
                    return;
                }
                if let Some(sym) = self.symbols.lookup_local_mut(&name) {
                    sym.is_defined = true;
                    sym.ty = ty;
                }
            }
            None => {
                let mut sym = Symbol::new(name.clone(), SymbolKind::Variable, ty, loc.clone());
                sym.storage = storage;
                sym.global_label = Some(name);
                sym.is_defined = storage != StorageClass::Extern;
                self.symbols.add_symbol(sym);
            }
        }
    }

    // ----- statements -----

    /// Analyze the items of a compound whose scope id is already set.
    fn analyze_block_items(&mut self, block: &mut CompoundStmt) {
        for item in &mut block.items {
            match item {
                BlockItem::Declaration(d) => self.analyze_declaration(d),
                BlockItem::Statement(s) => self.analyze_stmt(s),
            }
        }
    }

    fn analyze_compound(&mut self, block: &mut CompoundStmt) {
        let id = self.symbols.enter_scope(ScopeKind::Block);
        block.scope_id = Some(id);
        self.analyze_block_items(block);
        self.symbols.exit_scope();
    }

    pub(super) fn analyze_stmt(&mut self, stmt: &mut Stmt) {
        let loc = stmt.loc.clone();
        match &mut stmt.kind {
            StmtKind::Expr(None) => {}
            StmtKind::Expr(Some(e)) => {
                self.check_expr(e);
            }
            StmtKind::Compound(block) => self.analyze_compound(block),
            StmtKind::If { cond, then_stmt, else_stmt } => {
                self.check_scalar_condition(cond, "if");
                self.analyze_stmt(then_stmt);
                if let Some(e) = else_stmt {
                    self.analyze_stmt(e);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_scalar_condition(cond, "while");
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::DoWhile { body, cond } => {
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
                self.check_scalar_condition(cond, "do-while");
            }
            StmtKind::For { init, cond, step, body, scope_id } => {
                let id = self.symbols.enter_scope(ScopeKind::Block);
                *scope_id = Some(id);
                match init.as_deref_mut() {
                    Some(ForInit::Declaration(d)) => self.analyze_declaration(d),
                    Some(ForInit::Expr(e)) => {
                        self.check_expr(e);
                    }
                    None => {}
                }
                if let Some(c) = cond {
                    self.check_scalar_condition(c, "for");
                }
                if let Some(s) = step {
                    self.check_expr(s);
                }
                self.loop_depth += 1;
                self.analyze_stmt(body);
                self.loop_depth -= 1;
                self.symbols.exit_scope();
            }
            StmtKind::Switch { cond, body } => {
                if let Some(ty) = self.check_expr(cond) {
                    if !ty.is_integer() {
                        self.error(&loc, format!("switch condition has non-integer type '{}'", ty));
                    }
                }
                self.switch_depth += 1;
                self.analyze_stmt(body);
                self.switch_depth -= 1;
            }
            StmtKind::Case { value, body, folded, .. } => {
                if self.switch_depth == 0 {
                    self.error(&loc, "'case' label outside of switch");
                }
                match eval_const_expr(value, &self.symbols) {
                    Some(v) => *folded = Some(v),
                    None => self.error(&loc, "case label is not a constant expression"),
                }
                self.analyze_stmt(body);
            }
            StmtKind::Default { body, .. } => {
                if self.switch_depth == 0 {
                    self.error(&loc, "'default' label outside of switch");
                }
                self.analyze_stmt(body);
            }
            StmtKind::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.error(&loc, "'break' outside of loop or switch");
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(&loc, "'continue' outside of loop");
                }
            }
            StmtKind::Return(value) => {
                let ret_ty = self.symbols.current_return_type();
                match (value, ret_ty) {
                    (Some(expr), Some(ret)) => {
                        if ret.is_void() {
                            self.error(&loc, "void function returns a value");
                            self.check_expr(expr);
                        } else if let Some(ty) = self.check_expr(expr) {
                            if !can_implicitly_convert(&ty, &ret) {
                                self.error(
                                    &loc,
                                    format!("cannot return '{}' from function returning '{}'", ty, ret),
                                );
                            }
                        }
                    }
                    (None, Some(ret)) => {
                        if !ret.is_void() {
                            self.warning(&loc, "non-void function returns without a value");
                        }
                    }
                    _ => {}
                }
            }
            StmtKind::Goto(_) => {}
            StmtKind::Label { body, .. } => self.analyze_stmt(body),
        }
    }

    fn check_scalar_condition(&mut self, cond: &mut Expr, construct: &str) {
        let loc = cond.loc.clone();
        if let Some(ty) = self.check_expr(cond) {
            if !ty.is_scalar() && !ty.is_array() {
                self.error(
                    &loc,
                    format!("{} condition has non-scalar type '{}'", construct, ty),
                );
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Function parameters of array type decay to pointers; function-typed
/// parameters become function pointers.
pub(super) fn adjust_parameter_type(ty: TypeRef) -> TypeRef {
    match &*ty {
        Type::Array { elem, .. } => Type::pointer(Rc::clone(elem)),
        Type::Function { .. } => Type::pointer(ty.clone()),
        _ => ty,
    }
}

pub(super) fn align_up(value: i64, align: i64) -> i64 {
    let align = align.max(1);
    (value + align - 1) / align * align
}

/// Whether any statement in the block is a `return` (at any depth).
fn block_contains_return(block: &CompoundStmt) -> bool {
    block.items.iter().any(|item| match item {
        BlockItem::Statement(s) => stmt_contains_return(s),
        BlockItem::Declaration(_) => false,
    })
}

fn stmt_contains_return(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Compound(block) => block_contains_return(block),
        StmtKind::If { then_stmt, else_stmt, .. } => {
            stmt_contains_return(then_stmt)
                || else_stmt.as_deref().is_some_and(stmt_contains_return)
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::Switch { body, .. }
        | StmtKind::Case { body, .. }
        | StmtKind::Default { body, .. }
        | StmtKind::Label { body, .. } => stmt_contains_return(body),
        _ => false,
    }
}

/// Map a syntactic basic kind to its semantic type.
fn basic_to_semantic(kind: crate::frontend::parser::ast::BasicKind, unsigned: bool) -> TypeRef {
    use crate::frontend::parser::ast::BasicKind;
    match kind {
        BasicKind::Char => Type::integer(IntKind::Char, unsigned),
        BasicKind::Short => Type::integer(IntKind::Short, unsigned),
        BasicKind::Int => Type::integer(IntKind::Int, unsigned),
        BasicKind::Long => Type::integer(IntKind::Long, unsigned),
        BasicKind::LongLong => Type::integer(IntKind::LongLong, unsigned),
        BasicKind::Float => Type::float(FloatKind::Float),
        BasicKind::Double => Type::float(FloatKind::Double),
        BasicKind::LongDouble => Type::float(FloatKind::LongDouble),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    pub(crate) fn analyze_source(src: &str) -> (TranslationUnit, SemanticAnalyzer) {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let mut unit = parser.parse_translation_unit();
        assert!(!parser.has_errors(), "parse errors: {:?}", parser.errors());
        let mut sema = SemanticAnalyzer::new();
        sema.analyze(&mut unit);
        (unit, sema)
    }

    fn error_messages(sema: &SemanticAnalyzer) -> Vec<String> {
        sema.errors().iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn accepts_well_typed_program() {
        let (_, sema) = analyze_source(
            "int add(int a, int b) { return a + b; }\n\
             int main() { int x = add(1, 2); return x; }",
        );
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));
    }

    #[test]
    fn struct_offsets_are_monotone_and_padded() {
        let (_, sema) = analyze_source("struct S { char c; long l; char c2; int i; };");
        assert!(sema.errors().is_empty());
        let sym = sema.symbols.lookup_tag("S").expect("tag registered");
        let Type::Struct(rec) = &*sym.ty else { panic!("expected struct") };
        let rec = rec.borrow();
        assert!(rec.complete);
        let offsets: Vec<i64> = rec.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 20]);
        for pair in rec.members.windows(2) {
            assert!(pair[0].offset + pair[0].ty.size() <= pair[1].offset);
        }
        assert_eq!(sym.ty.size(), 24);
    }

    #[test]
    fn union_members_share_offset_zero() {
        let (_, sema) = analyze_source("union U { int i; double d; char c; };");
        let sym = sema.symbols.lookup_tag("U").expect("tag registered");
        let Type::Union(rec) = &*sym.ty else { panic!("expected union") };
        assert!(rec.borrow().members.iter().all(|m| m.offset == 0));
        assert_eq!(sym.ty.size(), 8);
    }

    #[test]
    fn anonymous_union_members_promote() {
        let (_, sema) = analyze_source("struct S { int tag; union { int i; double d; }; };");
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));
        let sym = sema.symbols.lookup_tag("S").unwrap();
        let m = sym.ty.find_member("d").expect("promoted member");
        assert_eq!(m.offset, 8);
    }

    #[test]
    fn break_continue_case_placement() {
        let (_, sema) = analyze_source("int main() { break; }");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source("int main() { continue; }");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source("int main() { switch (1) { case 1: continue; } return 0; }");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source("int main() { case 1: return 0; }");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source(
            "int main() { for (;;) { break; continue; } switch (1) { case 1: break; } return 0; }",
        );
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));
    }

    #[test]
    fn void_variable_rejected() {
        let (_, sema) = analyze_source("int main() { void v; return 0; }");
        assert!(!sema.errors().is_empty());
    }

    #[test]
    fn switch_condition_must_be_integer() {
        let (_, sema) = analyze_source("int main() { switch (1.5) { default: break; } return 0; }");
        assert!(!sema.errors().is_empty());
    }

    #[test]
    fn return_rules() {
        let (_, sema) = analyze_source("void f() { return 1; }");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source("int f() { return; }");
        assert!(sema.errors().is_empty());
        assert!(!sema.warnings().is_empty());
    }

    #[test]
    fn extern_redeclaration_rules() {
        let (_, sema) = analyze_source("int g; extern int g;");
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));

        let (_, sema) = analyze_source("extern int g; extern int g;");
        assert!(sema.errors().is_empty());

        let (_, sema) = analyze_source("int g; int g;");
        assert!(!sema.errors().is_empty());

        let (_, sema) = analyze_source("extern double g; int g;");
        assert!(!sema.errors().is_empty());
    }

    #[test]
    fn enum_constants_fold_and_register() {
        let (_, sema) = analyze_source("enum E { A, B = 5, C };\nint arr[C];");
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));
        let sym = sema.symbols.lookup("C").expect("enum constant");
        assert_eq!(sym.enum_value, 6);
    }

    #[test]
    fn incomplete_array_length_inferred_from_initializer() {
        let (_, sema) = analyze_source("int a[] = {1, 2, 3, 4};");
        assert!(sema.errors().is_empty());
        let sym = sema.symbols.lookup("a").unwrap();
        assert_eq!(sym.ty.to_string(), "int[4]");
    }

    #[test]
    fn undeclared_identifier_is_an_error() {
        let (_, sema) = analyze_source("int main() { return missing; }");
        assert!(!sema.errors().is_empty());
    }

    #[test]
    fn flat_tag_namespace_rejects_inner_redefinition() {
        let (_, sema) = analyze_source(
            "struct T { int a; };\nint main() { struct T { int b; } x; return sizeof x; }",
        );
        assert!(!sema.errors().is_empty());
    }

    #[test]
    fn forward_declared_struct_completes() {
        let (_, sema) = analyze_source(
            "struct Node;\nstruct Node { int value; struct Node *next; };\n\
             int main() { struct Node n; n.value = 1; return n.value; }",
        );
        assert!(sema.errors().is_empty(), "errors: {:?}", error_messages(&sema));
    }
}
