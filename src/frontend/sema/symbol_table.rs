//! Lexically scoped symbol table.
//!
//! Scopes live in an arena and receive stable integer ids; scope-creating
//! AST nodes store their id so later passes can rebind the current scope
//! and walk the same chain the analyzer built. Struct/union/enum tags
//! live in a single process-wide map on the table, not per scope.

use std::collections::HashMap;

use crate::common::source::SourceLocation;
use crate::frontend::parser::ast::StorageClass;
use super::types::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
    TypeDef,
    StructTag,
    UnionTag,
    EnumTag,
    EnumConstant,
    Label,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: TypeRef,
    pub storage: StorageClass,
    pub loc: SourceLocation,
    /// Negative rbp-relative offset for locals and parameters.
    pub stack_offset: Option<i64>,
    /// Assembly label for globals and functions.
    pub global_label: Option<String>,
    /// Whether a definition (not just a declaration) has been seen.
    pub is_defined: bool,
    /// Folded value for enum constants.
    pub enum_value: i64,
}

impl Symbol {
    pub fn new(name: String, kind: SymbolKind, ty: TypeRef, loc: SourceLocation) -> Self {
        Self {
            name,
            kind,
            ty,
            storage: StorageClass::None,
            loc,
            stack_offset: None,
            global_label: None,
            is_defined: false,
            enum_value: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    Struct,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<usize>,
    symbols: HashMap<String, Symbol>,
    /// Function scopes carry the enclosing function's identity.
    pub function_name: Option<String>,
    pub return_type: Option<TypeRef>,
    /// Bytes of locals allocated so far (positive accumulator).
    pub next_local_offset: i64,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            parent,
            symbols: HashMap::new(),
            function_name: None,
            return_type: None,
            next_local_offset: 0,
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: usize,
    tags: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global, None)],
            current: 0,
            tags: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) -> usize {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(kind, Some(self.current)));
        self.current = id;
        id
    }

    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    pub fn current_scope_id(&self) -> usize {
        self.current
    }

    pub fn is_global_scope(&self) -> bool {
        self.current == 0
    }

    /// Rebind the current scope to a previously created id, returning the
    /// old id so callers can restore it.
    pub fn set_current_scope(&mut self, id: usize) -> usize {
        std::mem::replace(&mut self.current, id)
    }

    pub fn scope(&self, id: usize) -> &Scope {
        &self.scopes[id]
    }

    /// Add a symbol to the current scope. Returns false on redefinition
    /// within the same scope.
    pub fn add_symbol(&mut self, sym: Symbol) -> bool {
        let scope = &mut self.scopes[self.current];
        if scope.symbols.contains_key(&sym.name) {
            return false;
        }
        scope.symbols.insert(sym.name.clone(), sym);
        true
    }

    /// Replace or insert a symbol in the current scope unconditionally.
    pub fn replace_symbol(&mut self, sym: Symbol) {
        self.scopes[self.current].symbols.insert(sym.name.clone(), sym);
    }

    /// Walk from the current scope to the root.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_with_scope(name).map(|(_, sym)| sym)
    }

    /// Walk to the root, also reporting the scope the hit came from.
    pub fn lookup_with_scope(&self, name: &str) -> Option<(usize, &Symbol)> {
        let mut id = Some(self.current);
        while let Some(i) = id {
            if let Some(sym) = self.scopes[i].symbols.get(name) {
                return Some((i, sym));
            }
            id = self.scopes[i].parent;
        }
        None
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current].symbols.get(name)
    }

    pub fn lookup_local_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes[self.current].symbols.get_mut(name)
    }

    pub fn lookup_in_scope(&self, scope_id: usize, name: &str) -> Option<&Symbol> {
        self.scopes[scope_id].symbols.get(name)
    }

    // ----- tag namespace (process-wide) -----

    pub fn lookup_tag(&self, name: &str) -> Option<&Symbol> {
        self.tags.get(name)
    }

    pub fn add_tag(&mut self, sym: Symbol) -> bool {
        if self.tags.contains_key(&sym.name) {
            return false;
        }
        self.tags.insert(sym.name.clone(), sym);
        true
    }

    // ----- function scope helpers -----

    /// Record the enclosing function's identity on the current scope.
    pub fn set_function_info(&mut self, name: &str, return_type: TypeRef) {
        let scope = &mut self.scopes[self.current];
        scope.function_name = Some(name.to_string());
        scope.return_type = Some(return_type);
    }

    /// Nearest enclosing function scope id, if any.
    fn enclosing_function_scope(&self) -> Option<usize> {
        let mut id = Some(self.current);
        while let Some(i) = id {
            if self.scopes[i].kind == ScopeKind::Function {
                return Some(i);
            }
            id = self.scopes[i].parent;
        }
        None
    }

    pub fn current_return_type(&self) -> Option<TypeRef> {
        self.enclosing_function_scope()
            .and_then(|i| self.scopes[i].return_type.clone())
    }

    /// Allocate stack space in the enclosing function for a local of the
    /// given size/alignment; returns the negative rbp-relative offset.
    pub fn allocate_local(&mut self, size: i64, alignment: i64) -> i64 {
        let Some(func) = self.enclosing_function_scope() else {
            return 0;
        };
        let align = alignment.max(1);
        let size = size.max(1);
        let scope = &mut self.scopes[func];
        let aligned = (scope.next_local_offset + align - 1) / align * align;
        scope.next_local_offset = aligned + size;
        -scope.next_local_offset
    }

    /// Total frame footprint of the enclosing function, rounded to 16.
    pub fn current_stack_size(&self) -> i64 {
        match self.enclosing_function_scope() {
            Some(i) => (self.scopes[i].next_local_offset + 15) / 16 * 16,
            None => 0,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::sema::types::Type;

    fn sym(name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(name.to_string(), kind, Type::int(), SourceLocation::unknown())
    }

    #[test]
    fn lookup_walks_to_root_and_shadows() {
        let mut table = SymbolTable::new();
        assert!(table.add_symbol(sym("x", SymbolKind::Variable)));

        table.enter_scope(ScopeKind::Function);
        assert!(table.lookup("x").is_some());
        assert!(table.add_symbol(sym("x", SymbolKind::Variable)));
        let (scope, _) = table.lookup_with_scope("x").unwrap();
        assert_ne!(scope, 0);

        table.exit_scope();
        let (scope, _) = table.lookup_with_scope("x").unwrap();
        assert_eq!(scope, 0);
    }

    #[test]
    fn duplicate_in_same_scope_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.add_symbol(sym("x", SymbolKind::Variable)));
        assert!(!table.add_symbol(sym("x", SymbolKind::Variable)));
    }

    #[test]
    fn scope_ids_are_stable_and_rebinding_works() {
        let mut table = SymbolTable::new();
        let func = table.enter_scope(ScopeKind::Function);
        let block = table.enter_scope(ScopeKind::Block);
        table.add_symbol(sym("inner", SymbolKind::Variable));
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.current_scope_id(), 0);

        let old = table.set_current_scope(block);
        assert_eq!(old, 0);
        assert!(table.lookup("inner").is_some());
        table.set_current_scope(old);
        assert!(table.lookup("inner").is_none());
        let _ = func;
    }

    #[test]
    fn tags_are_process_wide() {
        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Function);
        assert!(table.add_tag(sym("Point", SymbolKind::StructTag)));
        table.exit_scope();
        assert!(table.lookup_tag("Point").is_some());
        // Flat namespace: a second registration is a redefinition.
        assert!(!table.add_tag(sym("Point", SymbolKind::StructTag)));
    }

    #[test]
    fn local_allocation_aligns_and_accumulates() {
        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Function);
        assert_eq!(table.allocate_local(1, 1), -1);
        // 8-byte slot aligns up past the char.
        assert_eq!(table.allocate_local(8, 8), -16);
        assert_eq!(table.allocate_local(4, 4), -20);
        assert_eq!(table.current_stack_size(), 32);
    }
}
