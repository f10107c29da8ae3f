//! Runtime library registry.
//!
//! The emitted executable links against `libcdd.so`; its exported
//! functions are pre-registered in the global scope so a translation
//! unit can call them without writing prototypes. A user prototype for
//! one of these names is checked for compatibility like any other
//! redeclaration.

use crate::common::source::SourceLocation;
use super::symbol_table::{Symbol, SymbolKind, SymbolTable};
use super::types::{Type, TypeRef};

/// Declare every libcdd export in the (current, global) scope.
pub(super) fn register_runtime_functions(symbols: &mut SymbolTable) {
    for (name, ty) in runtime_signatures() {
        let mut sym = Symbol::new(
            name.to_string(),
            SymbolKind::Function,
            ty,
            SourceLocation::unknown(),
        );
        sym.global_label = Some(name.to_string());
        symbols.add_symbol(sym);
    }
}

/// True if `name` is one of the libcdd runtime exports.
pub fn is_runtime_function(name: &str) -> bool {
    runtime_signatures().iter().any(|(n, _)| *n == name)
}

fn runtime_signatures() -> Vec<(&'static str, TypeRef)> {
    let int = Type::int();
    let void = Type::void();
    let ulong = Type::ulong();
    let char_ptr = Type::pointer(Type::char_type());
    let void_ptr = Type::pointer(Type::void());

    vec![
        (
            "printf",
            Type::function(int.clone(), vec![char_ptr.clone()], true),
        ),
        (
            "scanf",
            Type::function(int.clone(), vec![char_ptr.clone()], true),
        ),
        ("putchar", Type::function(int.clone(), vec![int.clone()], false)),
        ("getchar", Type::function(int.clone(), vec![], false)),
        ("puts", Type::function(int.clone(), vec![char_ptr.clone()], false)),
        ("strlen", Type::function(ulong.clone(), vec![char_ptr.clone()], false)),
        (
            "strcpy",
            Type::function(char_ptr.clone(), vec![char_ptr.clone(), char_ptr.clone()], false),
        ),
        (
            "strcmp",
            Type::function(int.clone(), vec![char_ptr.clone(), char_ptr.clone()], false),
        ),
        (
            "strcat",
            Type::function(char_ptr.clone(), vec![char_ptr.clone(), char_ptr.clone()], false),
        ),
        (
            "memcpy",
            Type::function(
                void_ptr.clone(),
                vec![void_ptr.clone(), void_ptr.clone(), ulong.clone()],
                false,
            ),
        ),
        (
            "memset",
            Type::function(
                void_ptr.clone(),
                vec![void_ptr.clone(), int.clone(), ulong.clone()],
                false,
            ),
        ),
        ("malloc", Type::function(void_ptr.clone(), vec![ulong.clone()], false)),
        ("free", Type::function(void.clone(), vec![void_ptr.clone()], false)),
        ("exit", Type::function(void.clone(), vec![int.clone()], false)),
        ("abs", Type::function(int.clone(), vec![int.clone()], false)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_the_runtime_exports() {
        for name in [
            "printf", "scanf", "putchar", "getchar", "puts", "strlen", "strcpy", "strcmp",
            "strcat", "memcpy", "memset", "malloc", "free", "exit", "abs",
        ] {
            assert!(is_runtime_function(name), "{} missing from registry", name);
        }
        assert!(!is_runtime_function("fopen"));
    }

    #[test]
    fn registered_symbols_are_global_functions() {
        let mut table = SymbolTable::new();
        register_runtime_functions(&mut table);
        let sym = table.lookup("printf").expect("printf registered");
        assert_eq!(sym.kind, SymbolKind::Function);
        assert!(sym.ty.is_function());
        assert!(!sym.is_defined);
    }
}
