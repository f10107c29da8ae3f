//! Compile-time constant expression evaluation.
//!
//! Used for enum initializers, array sizes, `case` labels, and static
//! initializers. Folds integer and character literals, named enum
//! constants, unary `+ - ~ !`, the arithmetic/bitwise/shift/comparison/
//! logical binaries, the ternary, and value-preserving casts. Arithmetic
//! wraps with two's-complement semantics; division by zero fails the
//! fold. Returns `None` on anything non-constant and lets the caller
//! decide whether that is fatal.

use crate::frontend::parser::ast::{BinOp, Expr, ExprKind, UnaryOp};
use super::symbol_table::{SymbolKind, SymbolTable};

pub fn eval_const_expr(expr: &Expr, symbols: &SymbolTable) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Some(*v),
        ExprKind::CharLiteral(c) => Some(*c as i64),
        ExprKind::Identifier(name) => {
            let sym = symbols.lookup(name)?;
            if sym.kind == SymbolKind::EnumConstant {
                Some(sym.enum_value)
            } else {
                None
            }
        }
        ExprKind::Unary { op, operand } => {
            let v = eval_const_expr(operand, symbols)?;
            match op {
                UnaryOp::Plus => Some(v),
                UnaryOp::Neg => Some(v.wrapping_neg()),
                UnaryOp::BitNot => Some(!v),
                UnaryOp::LogicalNot => Some((v == 0) as i64),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let a = eval_const_expr(lhs, symbols)?;
            let b = eval_const_expr(rhs, symbols)?;
            match op {
                BinOp::Add => Some(a.wrapping_add(b)),
                BinOp::Sub => Some(a.wrapping_sub(b)),
                BinOp::Mul => Some(a.wrapping_mul(b)),
                BinOp::Div => {
                    if b == 0 {
                        None
                    } else {
                        Some(a.wrapping_div(b))
                    }
                }
                BinOp::Mod => {
                    if b == 0 {
                        None
                    } else {
                        Some(a.wrapping_rem(b))
                    }
                }
                BinOp::BitAnd => Some(a & b),
                BinOp::BitOr => Some(a | b),
                BinOp::BitXor => Some(a ^ b),
                BinOp::Shl => Some(a.wrapping_shl(b as u32)),
                BinOp::Shr => Some(a.wrapping_shr(b as u32)),
                BinOp::Eq => Some((a == b) as i64),
                BinOp::Ne => Some((a != b) as i64),
                BinOp::Lt => Some((a < b) as i64),
                BinOp::Gt => Some((a > b) as i64),
                BinOp::Le => Some((a <= b) as i64),
                BinOp::Ge => Some((a >= b) as i64),
                BinOp::LogicalAnd => Some(((a != 0) && (b != 0)) as i64),
                BinOp::LogicalOr => Some(((a != 0) || (b != 0)) as i64),
                BinOp::Comma => Some(b),
                _ => None,
            }
        }
        ExprKind::Conditional { cond, then_expr, else_expr } => {
            let c = eval_const_expr(cond, symbols)?;
            if c != 0 {
                eval_const_expr(then_expr, symbols)
            } else {
                eval_const_expr(else_expr, symbols)
            }
        }
        ExprKind::Cast { operand, .. } => eval_const_expr(operand, symbols),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    fn eval(src: &str) -> Option<i64> {
        let mut parser = Parser::new(Lexer::new(&format!("int x = {};", src), "t.cdd"));
        let unit = parser.parse_translation_unit();
        assert!(!parser.has_errors(), "parse errors for {:?}: {:?}", src, parser.errors());
        let crate::frontend::parser::ast::ExternalDecl::Declaration(d) = &unit.decls[0] else {
            panic!("expected declaration")
        };
        let expr = d.declarators[0].init.clone().unwrap();
        let table = SymbolTable::new();
        eval_const_expr(&expr, &table)
    }

    #[test]
    fn folds_arithmetic_and_logic() {
        assert_eq!(eval("1 + 2 * 3"), Some(7));
        assert_eq!(eval("(1 << 4) | 3"), Some(19));
        assert_eq!(eval("10 % 3"), Some(1));
        assert_eq!(eval("1 < 2 ? 'A' : 'B'"), Some(65));
        assert_eq!(eval("!0 && 5 > 2"), Some(1));
        assert_eq!(eval("-7"), Some(-7));
        assert_eq!(eval("~0"), Some(-1));
    }

    #[test]
    fn division_by_zero_fails_the_fold() {
        assert_eq!(eval("1 / 0"), None);
        assert_eq!(eval("1 % 0"), None);
    }

    #[test]
    fn overflow_wraps_two_complement() {
        assert_eq!(
            eval("9223372036854775807 + 1"),
            Some(i64::MIN)
        );
    }

    #[test]
    fn non_constant_fails() {
        assert_eq!(eval("some_variable + 1"), None);
    }

    #[test]
    fn cast_is_value_preserving() {
        assert_eq!(eval("(long)42"), Some(42));
    }
}
