//! Expression parsing: the precedence ladder, cast disambiguation,
//! initializers with designators, and argument lists.
//!
//! The ladder runs comma → assignment → conditional → logical-or →
//! logical-and → bit-or → bit-xor → bit-and → equality → relational →
//! shift → additive → multiplicative → cast → unary → postfix → primary.
//! `(` starts a cast exactly when the following token can start a type.

use crate::frontend::lexer::TokenKind;
use super::ast::{BinOp, Expr, ExprKind, UnaryOp};
use super::parser::{PResult, Parser};

impl Parser {
    /// Full expression: the comma operator level.
    pub(super) fn parse_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_assignment_expr()?;
        while self.at(&TokenKind::Comma) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_assignment_expr()?;
            lhs = Expr::new(
                ExprKind::Binary { op: BinOp::Comma, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                loc,
            );
        }
        Ok(lhs)
    }

    /// Assignment level, right-associative with ten compound variants.
    pub(super) fn parse_assignment_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_conditional_expr()?;
        let op = match self.current().kind {
            TokenKind::Assign => BinOp::Assign,
            TokenKind::PlusAssign => BinOp::AddAssign,
            TokenKind::MinusAssign => BinOp::SubAssign,
            TokenKind::StarAssign => BinOp::MulAssign,
            TokenKind::SlashAssign => BinOp::DivAssign,
            TokenKind::PercentAssign => BinOp::ModAssign,
            TokenKind::AmpAssign => BinOp::AndAssign,
            TokenKind::PipeAssign => BinOp::OrAssign,
            TokenKind::CaretAssign => BinOp::XorAssign,
            TokenKind::ShiftLeftAssign => BinOp::ShlAssign,
            TokenKind::ShiftRightAssign => BinOp::ShrAssign,
            _ => return Ok(lhs),
        };
        let loc = self.loc();
        self.advance();
        let rhs = self.parse_assignment_expr()?;
        Ok(Expr::new(
            ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            loc,
        ))
    }

    /// Conditional `?:`, right-associative.
    pub(super) fn parse_conditional_expr(&mut self) -> PResult<Expr> {
        let cond = self.parse_logical_or_expr()?;
        if !self.at(&TokenKind::Question) {
            return Ok(cond);
        }
        let loc = self.loc();
        self.advance();
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Colon, "in conditional expression")?;
        let else_expr = self.parse_conditional_expr()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            loc,
        ))
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Parser) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.at(tok) {
                    let loc = self.loc();
                    self.advance();
                    let rhs = next(self)?;
                    lhs = Expr::new(
                        ExprKind::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                        loc,
                    );
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_logical_or_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[(TokenKind::PipePipe, BinOp::LogicalOr)],
            Parser::parse_logical_and_expr,
        )
    }

    fn parse_logical_and_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[(TokenKind::AmpAmp, BinOp::LogicalAnd)],
            Parser::parse_bit_or_expr,
        )
    }

    fn parse_bit_or_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(TokenKind::Pipe, BinOp::BitOr)], Parser::parse_bit_xor_expr)
    }

    fn parse_bit_xor_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(TokenKind::Caret, BinOp::BitXor)], Parser::parse_bit_and_expr)
    }

    fn parse_bit_and_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(TokenKind::Amp, BinOp::BitAnd)], Parser::parse_equality_expr)
    }

    fn parse_equality_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::EqualEqual, BinOp::Eq),
                (TokenKind::BangEqual, BinOp::Ne),
            ],
            Parser::parse_relational_expr,
        )
    }

    fn parse_relational_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Less, BinOp::Lt),
                (TokenKind::Greater, BinOp::Gt),
                (TokenKind::LessEqual, BinOp::Le),
                (TokenKind::GreaterEqual, BinOp::Ge),
            ],
            Parser::parse_shift_expr,
        )
    }

    fn parse_shift_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::ShiftLeft, BinOp::Shl),
                (TokenKind::ShiftRight, BinOp::Shr),
            ],
            Parser::parse_additive_expr,
        )
    }

    fn parse_additive_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Plus, BinOp::Add),
                (TokenKind::Minus, BinOp::Sub),
            ],
            Parser::parse_multiplicative_expr,
        )
    }

    fn parse_multiplicative_expr(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
            Parser::parse_cast_expr,
        )
    }

    /// Cast level. `(` followed by a type-start token is a cast;
    /// otherwise the parenthesis belongs to a primary expression.
    fn parse_cast_expr(&mut self) -> PResult<Expr> {
        if self.at(&TokenKind::LParen) {
            let next = self.peek_kind();
            if self.kind_starts_type(&next) {
                let loc = self.loc();
                self.advance();
                let ty = self.parse_type_name()?;
                self.expect(&TokenKind::RParen, "to close cast")?;
                let operand = self.parse_cast_expr()?;
                return Ok(Expr::new(
                    ExprKind::Cast { ty, operand: Box::new(operand) },
                    loc,
                ));
            }
        }
        self.parse_unary_expr()
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let op = match self.current().kind {
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            TokenKind::Amp => Some(UnaryOp::AddrOf),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Bang => Some(UnaryOp::LogicalNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_cast_expr()?;
            return Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, loc));
        }

        if self.at(&TokenKind::Sizeof) {
            self.advance();
            // sizeof(type) vs sizeof expr: peek past a parenthesis for a
            // type-start token.
            if self.at(&TokenKind::LParen) {
                let next = self.peek_kind();
                if self.kind_starts_type(&next) {
                    self.advance();
                    let ty = self.parse_type_name()?;
                    self.expect(&TokenKind::RParen, "to close sizeof")?;
                    return Ok(Expr::new(ExprKind::SizeofType(ty), loc));
                }
            }
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::new(ExprKind::SizeofExpr(Box::new(operand)), loc));
        }

        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let loc = self.loc();
            match self.current().kind {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "to close subscript")?;
                    expr = Expr::new(
                        ExprKind::Subscript { base: Some(Box::new(expr)), index: Box::new(index) },
                        loc,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "to close call")?;
                    expr = Expr::new(ExprKind::Call { callee: Box::new(expr), args }, loc);
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.at(&TokenKind::Arrow);
                    self.advance();
                    let (member, _) = self.expect_identifier("after member operator")?;
                    expr = Expr::new(
                        ExprKind::Member { base: Some(Box::new(expr)), member, arrow },
                        loc,
                    );
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Unary { op: UnaryOp::PostInc, operand: Box::new(expr) },
                        loc,
                    );
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Unary { op: UnaryOp::PostDec, operand: Box::new(expr) },
                        loc,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        match self.current().kind.clone() {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLiteral(v), loc))
            }
            TokenKind::FloatLiteral(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLiteral(v), loc))
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(Expr::new(ExprKind::CharLiteral(c), loc))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                // Adjacent string literals concatenate.
                let mut value = s;
                while let TokenKind::StringLiteral(next) = &self.current().kind {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Expr::new(ExprKind::StringLiteral(value), loc))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Identifier(name), loc))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "to close parenthesized expression")?;
                Ok(expr)
            }
            other => Err(self.error_here(format!("expected expression, got {}", other.name()))),
        }
    }

    /// An initializer: a single assignment expression or a braced list.
    /// Designators become member/subscript nodes with a null base wrapped
    /// in an `=` binary, interpreted during lowering.
    pub(super) fn parse_initializer(&mut self) -> PResult<Expr> {
        if !self.at(&TokenKind::LBrace) {
            return self.parse_assignment_expr();
        }
        let loc = self.loc();
        self.advance();
        let mut items = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            let item_loc = self.loc();
            let item = if self.at(&TokenKind::Dot) {
                self.advance();
                let (member, _) = self.expect_identifier("in designator")?;
                let designator =
                    Expr::new(ExprKind::Member { base: None, member, arrow: false }, item_loc.clone());
                self.expect(&TokenKind::Assign, "after designator")?;
                let value = self.parse_initializer()?;
                Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Assign,
                        lhs: Box::new(designator),
                        rhs: Box::new(value),
                    },
                    item_loc,
                )
            } else if self.at(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_conditional_expr()?;
                self.expect(&TokenKind::RBracket, "to close designator")?;
                let designator = Expr::new(
                    ExprKind::Subscript { base: None, index: Box::new(index) },
                    item_loc.clone(),
                );
                self.expect(&TokenKind::Assign, "after designator")?;
                let value = self.parse_initializer()?;
                Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Assign,
                        lhs: Box::new(designator),
                        rhs: Box::new(value),
                    },
                    item_loc,
                )
            } else {
                self.parse_initializer()?
            };
            items.push(item);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close initializer list")?;
        Ok(Expr::new(ExprKind::InitList(items), loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse_expression(src: &str) -> Expr {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let expr = parser.parse_expr().expect("expression");
        assert!(!parser.has_errors(), "errors: {:?}", parser.errors());
        expr
    }

    fn binary_op(expr: &Expr) -> BinOp {
        match &expr.kind {
            ExprKind::Binary { op, .. } => *op,
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        let e = parse_expression("1 + 2 * 3");
        assert_eq!(binary_op(&e), BinOp::Add);
        let ExprKind::Binary { rhs, .. } = &e.kind else { unreachable!() };
        assert_eq!(binary_op(rhs), BinOp::Mul);
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = parse_expression("a = b = c");
        let ExprKind::Binary { op: BinOp::Assign, rhs, .. } = &e.kind else {
            panic!("expected assignment")
        };
        assert_eq!(binary_op(rhs), BinOp::Assign);
    }

    #[test]
    fn cast_versus_parenthesized_expression() {
        let e = parse_expression("(int)x");
        assert!(matches!(e.kind, ExprKind::Cast { .. }));
        let e = parse_expression("(x)");
        assert!(matches!(e.kind, ExprKind::Identifier(_)));
    }

    #[test]
    fn sizeof_type_and_expr_forms() {
        let e = parse_expression("sizeof(int)");
        assert!(matches!(e.kind, ExprKind::SizeofType(_)));
        let e = parse_expression("sizeof x");
        assert!(matches!(e.kind, ExprKind::SizeofExpr(_)));
        let e = parse_expression("sizeof(x)");
        assert!(matches!(e.kind, ExprKind::SizeofExpr(_)));
    }

    #[test]
    fn postfix_chains() {
        let e = parse_expression("a.b[1]->c(2)++");
        assert!(matches!(
            e.kind,
            ExprKind::Unary { op: UnaryOp::PostInc, .. }
        ));
    }

    #[test]
    fn conditional_is_right_associative() {
        let e = parse_expression("a ? 1 : b ? 2 : 3");
        let ExprKind::Conditional { else_expr, .. } = &e.kind else {
            panic!("expected conditional")
        };
        assert!(matches!(else_expr.kind, ExprKind::Conditional { .. }));
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let e = parse_expression("\"foo\" \"bar\"");
        assert!(matches!(&e.kind, ExprKind::StringLiteral(s) if s == "foobar"));
    }

    #[test]
    fn comma_operator_lowest() {
        let e = parse_expression("a = 1, b = 2");
        assert_eq!(binary_op(&e), BinOp::Comma);
    }
}
