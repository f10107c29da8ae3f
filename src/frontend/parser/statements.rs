//! Statement parsing: compound blocks, selection, iteration, jumps,
//! labels, and `case`/`default`.

use crate::frontend::lexer::TokenKind;
use super::ast::{BlockItem, CompoundStmt, ForInit, Stmt, StmtKind};
use super::parser::{PResult, Parser};

impl Parser {
    pub(super) fn parse_compound_stmt(&mut self) -> PResult<CompoundStmt> {
        let loc = self.loc();
        self.expect(&TokenKind::LBrace, "to open block")?;
        let mut items = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            if self.at_type_start()
                || matches!(
                    self.current().kind,
                    TokenKind::Typedef | TokenKind::Static | TokenKind::Extern
                        | TokenKind::Register | TokenKind::Auto
                )
            {
                match self.parse_declaration() {
                    Ok(decl) => items.push(BlockItem::Declaration(decl)),
                    Err(_) => self.synchronize(),
                }
            } else {
                match self.parse_statement() {
                    Ok(stmt) => items.push(BlockItem::Statement(stmt)),
                    Err(_) => self.synchronize(),
                }
            }
        }
        self.expect(&TokenKind::RBrace, "to close block")?;
        Ok(CompoundStmt { items, scope_id: None, loc })
    }

    pub(super) fn parse_statement(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        match self.current().kind.clone() {
            TokenKind::LBrace => {
                let block = self.parse_compound_stmt()?;
                Ok(Stmt::new(StmtKind::Compound(block), loc))
            }
            TokenKind::If => {
                self.advance();
                self.expect(&TokenKind::LParen, "after 'if'")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "after if condition")?;
                let then_stmt = Box::new(self.parse_statement()?);
                let else_stmt = if self.eat(&TokenKind::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::new(StmtKind::If { cond, then_stmt, else_stmt }, loc))
            }
            TokenKind::While => {
                self.advance();
                self.expect(&TokenKind::LParen, "after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "after while condition")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::While { cond, body }, loc))
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&TokenKind::While, "after do body")?;
                self.expect(&TokenKind::LParen, "after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "after do-while condition")?;
                self.expect(&TokenKind::Semicolon, "after do-while")?;
                Ok(Stmt::new(StmtKind::DoWhile { body, cond }, loc))
            }
            TokenKind::For => {
                self.advance();
                self.expect(&TokenKind::LParen, "after 'for'")?;

                let init = if self.eat(&TokenKind::Semicolon) {
                    None
                } else if self.at_type_start() {
                    let decl = self.parse_declaration()?;
                    Some(Box::new(ForInit::Declaration(decl)))
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::Semicolon, "after for initializer")?;
                    Some(Box::new(ForInit::Expr(expr)))
                };

                let cond = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon, "after for condition")?;

                let step = if self.at(&TokenKind::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::RParen, "after for clauses")?;

                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(
                    StmtKind::For { init, cond, step, body, scope_id: None },
                    loc,
                ))
            }
            TokenKind::Switch => {
                self.advance();
                self.expect(&TokenKind::LParen, "after 'switch'")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "after switch condition")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::Switch { cond, body }, loc))
            }
            TokenKind::Case => {
                self.advance();
                let value = self.parse_conditional_expr()?;
                self.expect(&TokenKind::Colon, "after case value")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(
                    StmtKind::Case { value, body, folded: None, label: None },
                    loc,
                ))
            }
            TokenKind::Default => {
                self.advance();
                self.expect(&TokenKind::Colon, "after 'default'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::new(StmtKind::Default { body, label: None }, loc))
            }
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "after 'break'")?;
                Ok(Stmt::new(StmtKind::Break, loc))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "after 'continue'")?;
                Ok(Stmt::new(StmtKind::Continue, loc))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon, "after return")?;
                Ok(Stmt::new(StmtKind::Return(value), loc))
            }
            TokenKind::Goto => {
                self.advance();
                let (name, _) = self.expect_identifier("after 'goto'")?;
                self.expect(&TokenKind::Semicolon, "after goto")?;
                Ok(Stmt::new(StmtKind::Goto(name), loc))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::new(StmtKind::Expr(None), loc))
            }
            TokenKind::Identifier(name) => {
                // A label needs the two-token window: identifier + ':'.
                if matches!(self.peek_kind(), TokenKind::Colon) {
                    self.advance();
                    self.advance();
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Stmt::new(StmtKind::Label { name, body }, loc));
                }
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "after expression")?;
                Ok(Stmt::new(StmtKind::Expr(Some(expr)), loc))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "after expression")?;
                Ok(Stmt::new(StmtKind::Expr(Some(expr)), loc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::ast::{ExternalDecl, TranslationUnit};

    fn parse_body(body: &str) -> (TranslationUnit, bool) {
        let src = format!("int main() {{ {} }}", body);
        let mut parser = Parser::new(Lexer::new(&src, "t.cdd"));
        let unit = parser.parse_translation_unit();
        (unit, parser.has_errors())
    }

    fn main_items(unit: &TranslationUnit) -> &[BlockItem] {
        let ExternalDecl::Function(f) = &unit.decls[0] else {
            panic!("expected function")
        };
        &f.body.items
    }

    #[test]
    fn for_with_declaration_init() {
        let (unit, errors) = parse_body("for (int i = 0; i < 5; i++) ;");
        assert!(!errors);
        let BlockItem::Statement(stmt) = &main_items(&unit)[0] else {
            panic!("expected statement")
        };
        let StmtKind::For { init: Some(init), cond: Some(_), step: Some(_), .. } = &stmt.kind
        else {
            panic!("expected for statement")
        };
        assert!(matches!(**init, ForInit::Declaration(_)));
    }

    #[test]
    fn switch_with_cases_and_default() {
        let (unit, errors) =
            parse_body("switch (x) { case 1: break; case 2: break; default: break; }");
        assert!(!errors);
        let BlockItem::Statement(stmt) = &main_items(&unit)[0] else {
            panic!("expected statement")
        };
        assert!(matches!(stmt.kind, StmtKind::Switch { .. }));
    }

    #[test]
    fn dangling_else_binds_to_inner_if() {
        let (unit, errors) = parse_body("if (a) if (b) x = 1; else x = 2;");
        assert!(!errors);
        let BlockItem::Statement(stmt) = &main_items(&unit)[0] else {
            panic!("expected statement")
        };
        let StmtKind::If { else_stmt, then_stmt, .. } = &stmt.kind else {
            panic!("expected if")
        };
        assert!(else_stmt.is_none());
        assert!(matches!(then_stmt.kind, StmtKind::If { else_stmt: Some(_), .. }));
    }

    #[test]
    fn goto_and_label() {
        let (unit, errors) = parse_body("again: x++; goto again;");
        assert!(!errors);
        let items = main_items(&unit);
        let BlockItem::Statement(first) = &items[0] else { panic!() };
        assert!(matches!(first.kind, StmtKind::Label { .. }));
        let BlockItem::Statement(second) = &items[1] else { panic!() };
        assert!(matches!(second.kind, StmtKind::Goto(_)));
    }

    #[test]
    fn do_while_requires_trailing_semicolon() {
        let (_, errors) = parse_body("do x++; while (x < 3)");
        assert!(errors);
    }
}
