//! Declaration parsing: declaration specifiers, struct/union/enum
//! definitions, init-declarator lists, typedef registration, and function
//! definition detection.

use crate::common::source::SourceLocation;
use crate::frontend::lexer::TokenKind;
use super::ast::{
    BasicKind, Declaration, EnumConstant, ExternalDecl, FieldDecl, FunctionDef, InitDeclarator,
    StorageClass, TypeSpec,
};
use super::declarators::build_declarator;
use super::parser::{PResult, Parser};

/// Result of parsing declaration specifiers: the assembled base type plus
/// storage class and qualifier flags.
pub(super) struct DeclSpecs {
    pub base: TypeSpec,
    pub storage: StorageClass,
    pub is_typedef: bool,
    pub is_const: bool,
    pub is_volatile: bool,
    pub loc: SourceLocation,
}

impl Parser {
    pub(super) fn parse_external_decl(&mut self) -> PResult<Option<ExternalDecl>> {
        // A stray semicolon at file scope is tolerated.
        if self.eat(&TokenKind::Semicolon) {
            return Ok(None);
        }
        if !self.at_type_start() && !matches!(
            self.current().kind,
            TokenKind::Typedef | TokenKind::Static | TokenKind::Extern
                | TokenKind::Register | TokenKind::Auto
        ) {
            let msg = format!(
                "expected declaration, got {}",
                self.current().kind.name()
            );
            return Err(self.error_here(msg));
        }

        let specs = self.parse_declaration_specifiers()?;

        // Tag-only declaration: `struct S { ... };` or `enum E { ... };`
        if self.at(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Some(ExternalDecl::Declaration(Declaration {
                base: specs.base,
                declarators: Vec::new(),
                storage: specs.storage,
                is_typedef: specs.is_typedef,
                is_const: specs.is_const,
                is_volatile: specs.is_volatile,
                loc: specs.loc,
            })));
        }

        let first_loc = self.loc();
        let chain = self.parse_declarator()?;
        let (name, ty) = build_declarator(chain, specs.base.clone());

        // Function definition: outermost declarator construct is a
        // function and the next token opens its body.
        if let TypeSpec::Function { ret, params, variadic } = &ty {
            if self.at(&TokenKind::LBrace) {
                let Some(name) = name else {
                    return Err(self.error_at(first_loc, "function definition requires a name"));
                };
                if specs.is_typedef {
                    return Err(self.error_at(first_loc, "typedef cannot define a function body"));
                }
                let body = self.parse_compound_stmt()?;
                return Ok(Some(ExternalDecl::Function(FunctionDef {
                    name,
                    return_type: (**ret).clone(),
                    params: params.clone(),
                    variadic: *variadic,
                    body,
                    storage: specs.storage,
                    scope_id: None,
                    loc: first_loc,
                })));
            }
        }

        let decl = self.finish_declaration(specs, name, ty, first_loc)?;
        Ok(Some(ExternalDecl::Declaration(decl)))
    }

    /// Parse a declaration inside a block (no function bodies).
    pub(super) fn parse_declaration(&mut self) -> PResult<Declaration> {
        let specs = self.parse_declaration_specifiers()?;
        if self.at(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Declaration {
                base: specs.base,
                declarators: Vec::new(),
                storage: specs.storage,
                is_typedef: specs.is_typedef,
                is_const: specs.is_const,
                is_volatile: specs.is_volatile,
                loc: specs.loc,
            });
        }
        let first_loc = self.loc();
        let chain = self.parse_declarator()?;
        let (name, ty) = build_declarator(chain, specs.base.clone());
        self.finish_declaration(specs, name, ty, first_loc)
    }

    /// Shared tail of a declaration: the first declarator is already
    /// parsed; handle its initializer, the rest of the comma list, the
    /// terminating semicolon, and typedef registration.
    fn finish_declaration(
        &mut self,
        specs: DeclSpecs,
        first_name: Option<String>,
        first_ty: TypeSpec,
        first_loc: SourceLocation,
    ) -> PResult<Declaration> {
        let mut declarators = Vec::new();

        let Some(first_name) = first_name else {
            return Err(self.error_at(first_loc, "declaration requires a name"));
        };
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        declarators.push(InitDeclarator { name: first_name, ty: first_ty, init, loc: first_loc });

        while self.eat(&TokenKind::Comma) {
            let loc = self.loc();
            let chain = self.parse_declarator()?;
            let (name, ty) = build_declarator(chain, specs.base.clone());
            let Some(name) = name else {
                return Err(self.error_at(loc, "declaration requires a name"));
            };
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            declarators.push(InitDeclarator { name, ty, init, loc });
        }

        self.expect(&TokenKind::Semicolon, "after declaration")?;

        if specs.is_typedef {
            for d in &declarators {
                self.typedef_names.insert(d.name.clone());
            }
        }

        Ok(Declaration {
            base: specs.base,
            declarators,
            storage: specs.storage,
            is_typedef: specs.is_typedef,
            is_const: specs.is_const,
            is_volatile: specs.is_volatile,
            loc: specs.loc,
        })
    }

    /// Parse declaration specifiers into a flag set, then assemble the
    /// composite base type.
    pub(super) fn parse_declaration_specifiers(&mut self) -> PResult<DeclSpecs> {
        let loc = self.loc();
        let mut storage = StorageClass::None;
        let mut is_typedef = false;
        let mut is_const = false;
        let mut is_volatile = false;

        let mut saw_void = false;
        let mut saw_char = false;
        let mut saw_short = false;
        let mut saw_int = false;
        let mut long_count = 0u32;
        let mut saw_float = false;
        let mut saw_double = false;
        let mut saw_signed = false;
        let mut saw_unsigned = false;
        let mut tagged: Option<TypeSpec> = None;

        loop {
            match self.current().kind.clone() {
                TokenKind::Typedef => {
                    is_typedef = true;
                    self.advance();
                }
                TokenKind::Static => {
                    storage = StorageClass::Static;
                    self.advance();
                }
                TokenKind::Extern => {
                    storage = StorageClass::Extern;
                    self.advance();
                }
                TokenKind::Register => {
                    storage = StorageClass::Register;
                    self.advance();
                }
                TokenKind::Auto => {
                    storage = StorageClass::Auto;
                    self.advance();
                }
                TokenKind::Const => {
                    is_const = true;
                    self.advance();
                }
                TokenKind::Volatile => {
                    is_volatile = true;
                    self.advance();
                }
                TokenKind::Void => {
                    saw_void = true;
                    self.advance();
                }
                TokenKind::Char => {
                    saw_char = true;
                    self.advance();
                }
                TokenKind::Short => {
                    saw_short = true;
                    self.advance();
                }
                TokenKind::Int => {
                    saw_int = true;
                    self.advance();
                }
                TokenKind::Long => {
                    long_count += 1;
                    self.advance();
                }
                TokenKind::Float => {
                    saw_float = true;
                    self.advance();
                }
                TokenKind::Double => {
                    saw_double = true;
                    self.advance();
                }
                TokenKind::Signed => {
                    saw_signed = true;
                    self.advance();
                }
                TokenKind::Unsigned => {
                    saw_unsigned = true;
                    self.advance();
                }
                TokenKind::Struct | TokenKind::Union => {
                    tagged = Some(self.parse_record_specifier()?);
                }
                TokenKind::Enum => {
                    tagged = Some(self.parse_enum_specifier()?);
                }
                TokenKind::Identifier(name) => {
                    // A typedef name acts as the type specifier, but only
                    // when no other specifier has claimed the slot.
                    let no_basic = !saw_void
                        && !saw_char
                        && !saw_short
                        && !saw_int
                        && long_count == 0
                        && !saw_float
                        && !saw_double
                        && !saw_signed
                        && !saw_unsigned
                        && tagged.is_none();
                    if no_basic && self.typedef_names.contains(&name) {
                        self.advance();
                        tagged = Some(TypeSpec::Named(name));
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        let base = if let Some(t) = tagged {
            t
        } else if saw_void {
            TypeSpec::Void
        } else if saw_float {
            TypeSpec::Basic { kind: BasicKind::Float, unsigned: false }
        } else if saw_double {
            let kind = if long_count > 0 { BasicKind::LongDouble } else { BasicKind::Double };
            TypeSpec::Basic { kind, unsigned: false }
        } else if saw_char {
            TypeSpec::Basic { kind: BasicKind::Char, unsigned: saw_unsigned }
        } else if saw_short {
            TypeSpec::Basic { kind: BasicKind::Short, unsigned: saw_unsigned }
        } else if long_count >= 2 {
            TypeSpec::Basic { kind: BasicKind::LongLong, unsigned: saw_unsigned }
        } else if long_count == 1 {
            TypeSpec::Basic { kind: BasicKind::Long, unsigned: saw_unsigned }
        } else if saw_int || saw_signed || saw_unsigned {
            TypeSpec::Basic { kind: BasicKind::Int, unsigned: saw_unsigned }
        } else {
            return Err(self.error_here(format!(
                "expected type specifier, got {}",
                self.current().kind.name()
            )));
        };

        Ok(DeclSpecs { base, storage, is_typedef, is_const, is_volatile, loc })
    }

    /// `struct`/`union` specifier: tag, optional field list, or both.
    fn parse_record_specifier(&mut self) -> PResult<TypeSpec> {
        let is_union = self.at(&TokenKind::Union);
        self.advance();

        let tag = match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let fields = if self.eat(&TokenKind::LBrace) {
            let mut fields = Vec::new();
            while !self.at(&TokenKind::RBrace) && !self.at_eof() {
                self.parse_field_declaration(&mut fields)?;
            }
            self.expect(&TokenKind::RBrace, "to close member list")?;
            Some(fields)
        } else {
            None
        };

        if tag.is_none() && fields.is_none() {
            return Err(self.error_here("struct/union specifier requires a tag or a member list"));
        }
        Ok(TypeSpec::Record { is_union, tag, fields })
    }

    /// One member declaration line inside a struct/union body.
    fn parse_field_declaration(&mut self, fields: &mut Vec<FieldDecl>) -> PResult<()> {
        let specs = self.parse_declaration_specifiers()?;

        // Anonymous struct/union member: its fields promote into the
        // enclosing record during layout.
        if self.at(&TokenKind::Semicolon) {
            let loc = specs.loc.clone();
            if matches!(specs.base, TypeSpec::Record { .. }) {
                fields.push(FieldDecl { name: None, ty: specs.base, loc });
                self.advance();
                return Ok(());
            }
            return Err(self.error_here("member declaration requires a name"));
        }

        loop {
            let loc = self.loc();
            let chain = self.parse_declarator()?;
            let (name, ty) = build_declarator(chain, specs.base.clone());
            let Some(name) = name else {
                return Err(self.error_at(loc, "member declaration requires a name"));
            };
            fields.push(FieldDecl { name: Some(name), ty, loc });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon, "after member declaration")?;
        Ok(())
    }

    /// `enum` specifier: tag, optional enumerator list, or both.
    fn parse_enum_specifier(&mut self) -> PResult<TypeSpec> {
        self.advance(); // enum

        let tag = match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let constants = if self.eat(&TokenKind::LBrace) {
            let mut constants = Vec::new();
            while !self.at(&TokenKind::RBrace) && !self.at_eof() {
                let (name, loc) = self.expect_identifier("in enumerator list")?;
                let value = if self.eat(&TokenKind::Assign) {
                    Some(self.parse_conditional_expr()?)
                } else {
                    None
                };
                constants.push(EnumConstant { name, value, loc });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBrace, "to close enumerator list")?;
            Some(constants)
        } else {
            None
        };

        if tag.is_none() && constants.is_none() {
            return Err(self.error_here("enum specifier requires a tag or an enumerator list"));
        }
        Ok(TypeSpec::Enum { tag, constants })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse_unit(src: &str) -> (crate::frontend::parser::ast::TranslationUnit, bool) {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let unit = parser.parse_translation_unit();
        (unit, parser.has_errors())
    }

    #[test]
    fn multiple_declarators_share_base() {
        let (unit, errors) = parse_unit("int a, *b, c[3];");
        assert!(!errors);
        let ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        assert_eq!(d.declarators.len(), 3);
        assert!(matches!(d.declarators[1].ty, TypeSpec::Pointer(_)));
        assert!(matches!(d.declarators[2].ty, TypeSpec::Array(_, _)));
    }

    #[test]
    fn struct_with_anonymous_union_member() {
        let (unit, errors) = parse_unit("struct S { int tag; union { int i; double d; }; };");
        assert!(!errors);
        let ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        let TypeSpec::Record { fields: Some(fields), is_union: false, .. } = &d.base else {
            panic!("expected struct type")
        };
        assert_eq!(fields.len(), 2);
        assert!(fields[1].name.is_none());
    }

    #[test]
    fn enum_with_explicit_values() {
        let (unit, errors) = parse_unit("enum Color { RED, GREEN = 5, BLUE };");
        assert!(!errors);
        let ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        let TypeSpec::Enum { constants: Some(cs), .. } = &d.base else {
            panic!("expected enum type")
        };
        assert_eq!(cs.len(), 3);
        assert!(cs[1].value.is_some());
    }

    #[test]
    fn prototype_is_a_declaration_not_a_definition() {
        let (unit, errors) = parse_unit("int add(int a, int b);");
        assert!(!errors);
        assert!(matches!(unit.decls[0], ExternalDecl::Declaration(_)));
    }

    #[test]
    fn unsigned_long_long_composite() {
        let (unit, errors) = parse_unit("unsigned long long x;");
        assert!(!errors);
        let ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        assert!(matches!(
            d.declarators[0].ty,
            TypeSpec::Basic { kind: BasicKind::LongLong, unsigned: true }
        ));
    }

    #[test]
    fn variadic_prototype() {
        let (unit, errors) = parse_unit("int printf(char *fmt, ...);");
        assert!(!errors);
        let ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        let TypeSpec::Function { variadic, params, .. } = &d.declarators[0].ty else {
            panic!("expected function type")
        };
        assert!(*variadic);
        assert_eq!(params.len(), 1);
    }
}
