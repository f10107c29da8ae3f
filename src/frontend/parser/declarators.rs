//! Declarator parsing.
//!
//! A declarator is parsed into a `DeclChain` mirroring the grammar
//! (`*` prefixes wrap, `[...]`/`(...)` suffixes wrap the direct part),
//! then folded against the declaration's base type. The fold carries the
//! "hole" of the classic algorithm implicitly: each step wraps the
//! accumulated outer type and recurses toward the name, so constructs
//! like `int (*foo(int))(int, int)` and `int (*fp[10])(int)` come out
//! with the correct structure.

use crate::frontend::lexer::TokenKind;
use super::ast::{Expr, ParamDecl, TypeSpec};
use super::parser::{PResult, Parser};

/// Parse-tree shape of one declarator, before type construction.
#[derive(Debug)]
pub(super) enum DeclChain {
    /// The declared name; `None` for abstract declarators.
    Name(Option<String>),
    Pointer(Box<DeclChain>),
    Array(Box<DeclChain>, Option<Box<Expr>>),
    Function(Box<DeclChain>, Vec<ParamDecl>, bool),
}

/// Fold a declarator chain against the base type, producing the declared
/// name and its complete type.
pub(super) fn build_declarator(chain: DeclChain, base: TypeSpec) -> (Option<String>, TypeSpec) {
    match chain {
        DeclChain::Name(name) => (name, base),
        DeclChain::Pointer(inner) => build_declarator(*inner, TypeSpec::Pointer(Box::new(base))),
        DeclChain::Array(inner, len) => {
            build_declarator(*inner, TypeSpec::Array(Box::new(base), len))
        }
        DeclChain::Function(inner, params, variadic) => build_declarator(
            *inner,
            TypeSpec::Function { ret: Box::new(base), params, variadic },
        ),
    }
}

impl Parser {
    /// Parse a (possibly abstract) declarator.
    pub(super) fn parse_declarator(&mut self) -> PResult<DeclChain> {
        if self.eat(&TokenKind::Star) {
            // Pointer qualifiers bind to the pointer; accepted and dropped.
            while self.eat(&TokenKind::Const) || self.eat(&TokenKind::Volatile) {}
            let inner = self.parse_declarator()?;
            return Ok(DeclChain::Pointer(Box::new(inner)));
        }
        self.parse_direct_declarator()
    }

    fn parse_direct_declarator(&mut self) -> PResult<DeclChain> {
        let mut chain = match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                DeclChain::Name(Some(name))
            }
            TokenKind::LParen => {
                // `(` here is either a nested declarator or the parameter
                // list of an abstract function declarator like `int (int)`.
                let next = self.peek_kind();
                if self.kind_starts_type(&next) || matches!(next, TokenKind::RParen) {
                    DeclChain::Name(None)
                } else {
                    self.advance();
                    let inner = self.parse_declarator()?;
                    self.expect(&TokenKind::RParen, "to close declarator")?;
                    inner
                }
            }
            _ => DeclChain::Name(None),
        };

        loop {
            if self.eat(&TokenKind::LBracket) {
                let len = if self.at(&TokenKind::RBracket) {
                    None
                } else {
                    Some(Box::new(self.parse_assignment_expr()?))
                };
                self.expect(&TokenKind::RBracket, "to close array declarator")?;
                chain = DeclChain::Array(Box::new(chain), len);
            } else if self.at(&TokenKind::LParen) {
                self.advance();
                let (params, variadic) = self.parse_parameter_list()?;
                self.expect(&TokenKind::RParen, "to close parameter list")?;
                chain = DeclChain::Function(Box::new(chain), params, variadic);
            } else {
                break;
            }
        }
        Ok(chain)
    }

    /// Parse a parameter list after the opening parenthesis has been
    /// consumed; stops before the closing `)`.
    fn parse_parameter_list(&mut self) -> PResult<(Vec<ParamDecl>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;

        if self.at(&TokenKind::RParen) {
            return Ok((params, variadic));
        }

        // `(void)` declares an empty parameter list.
        if self.at(&TokenKind::Void) && matches!(self.peek_kind(), TokenKind::RParen) {
            self.advance();
            return Ok((params, variadic));
        }

        loop {
            if self.eat(&TokenKind::Ellipsis) {
                variadic = true;
                break;
            }
            let loc = self.loc();
            if !self.at_type_start() {
                return Err(self.error_here(format!(
                    "expected parameter type, got {}",
                    self.current().kind.name()
                )));
            }
            let specs = self.parse_declaration_specifiers()?;
            let chain = self.parse_declarator()?;
            let (name, ty) = build_declarator(chain, specs.base);
            params.push(ParamDecl { name, ty, loc });

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok((params, variadic))
    }

    /// Parse a type name: declaration specifiers plus an abstract
    /// declarator. Used by casts and `sizeof(type)`.
    pub(super) fn parse_type_name(&mut self) -> PResult<TypeSpec> {
        let specs = self.parse_declaration_specifiers()?;
        let chain = self.parse_declarator()?;
        let (name, ty) = build_declarator(chain, specs.base);
        if let Some(name) = name {
            let loc = self.loc();
            return Err(self.error_at(loc, format!("unexpected name '{}' in type name", name)));
        }
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::printer::type_to_string;

    fn parse_single_declarator(src: &str) -> (Option<String>, TypeSpec) {
        let lexer = Lexer::new(src, "test.cdd");
        let mut parser = Parser::new(lexer);
        let specs = parser.parse_declaration_specifiers().expect("specifiers");
        let chain = parser.parse_declarator().expect("declarator");
        assert!(!parser.has_errors(), "errors: {:?}", parser.errors());
        build_declarator(chain, specs.base)
    }

    #[test]
    fn simple_pointer_and_array() {
        let (name, ty) = parse_single_declarator("int *p");
        assert_eq!(name.as_deref(), Some("p"));
        assert_eq!(type_to_string(&ty), "int*");

        let (name, ty) = parse_single_declarator("int a[10]");
        assert_eq!(name.as_deref(), Some("a"));
        assert_eq!(type_to_string(&ty), "int[10]");
    }

    #[test]
    fn array_of_pointers_vs_pointer_to_array() {
        let (_, ty) = parse_single_declarator("int *a[4]");
        assert_eq!(type_to_string(&ty), "int*[4]");

        let (_, ty) = parse_single_declarator("int (*a)[4]");
        assert_eq!(type_to_string(&ty), "int[4]*");
    }

    #[test]
    fn function_returning_pointer_to_function() {
        let (name, ty) = parse_single_declarator("int (*foo(int))(int, int)");
        assert_eq!(name.as_deref(), Some("foo"));
        // foo: function(int) returning pointer to function(int,int) -> int
        assert_eq!(type_to_string(&ty), "int(int, int)*(int)");
    }

    #[test]
    fn array_of_function_pointers() {
        let (name, ty) = parse_single_declarator("int (*fp[10])(int)");
        assert_eq!(name.as_deref(), Some("fp"));
        assert_eq!(type_to_string(&ty), "int(int)*[10]");
    }

    #[test]
    fn multidimensional_array_order() {
        let (_, ty) = parse_single_declarator("int m[2][3]");
        assert_eq!(type_to_string(&ty), "int[3][2]");
    }
}
