//! `#if`/`#elif` constant-expression evaluation.
//!
//! Pipeline: resolve `defined(X)` / `defined X` to 0/1, expand macros,
//! replace any remaining identifier with 0, then evaluate the text as a
//! signed integer expression. Operators, low to high precedence:
//! `||`, `&&`, `==`/`!=`, `<`/`<=`/`>`/`>=`, `+`/`-`, `*`/`/`, unary
//! `!`/`-`, parentheses, integer literals. Division by zero yields zero.

use super::preprocessor::Preprocessor;

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_ident_cont(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

impl Preprocessor {
    /// Evaluate a conditional expression to a boolean.
    pub(super) fn evaluate_condition(&self, expr: &str) -> Result<bool, String> {
        let resolved = self.resolve_defined(expr);
        let expanded = self.macros.expand(&resolved).map_err(|e| {
            format!("in #if expression '{}': {}", expr.trim(), e)
        })?;
        let zeroed = replace_identifiers_with_zero(&expanded);
        Ok(evaluate_expression(&zeroed) != 0)
    }

    /// Replace `defined(X)` and `defined X` with `1` or `0`.
    fn resolve_defined(&self, expr: &str) -> String {
        let bytes = expr.as_bytes();
        let mut result = String::with_capacity(expr.len());
        let mut i = 0;

        while i < bytes.len() {
            if !is_ident_start(bytes[i]) {
                result.push(bytes[i] as char);
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let ident = &expr[start..i];
            if ident != "defined" {
                result.push_str(ident);
                continue;
            }

            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            let has_paren = i < bytes.len() && bytes[i] == b'(';
            if has_paren {
                i += 1;
                while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                    i += 1;
                }
            }
            let name_start = i;
            while i < bytes.len() && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let name = &expr[name_start..i];
            if has_paren {
                while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b')' {
                    i += 1;
                }
            }
            result.push(if self.macros.is_defined(name) { '1' } else { '0' });
        }

        result
    }
}

/// After macro expansion, any surviving identifier evaluates as 0.
fn replace_identifiers_with_zero(expr: &str) -> String {
    let bytes = expr.as_bytes();
    let mut result = String::with_capacity(expr.len());
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            // Copy the whole number literal, including any 0x/0b prefix
            // and suffix letters, so `123ull` is not split.
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                result.push(bytes[i] as char);
                i += 1;
            }
        } else if is_ident_start(c) {
            while i < bytes.len() && is_ident_cont(bytes[i]) {
                i += 1;
            }
            result.push('0');
        } else {
            result.push(c as char);
            i += 1;
        }
    }

    result
}

/// Recursive-descent evaluation over the textual expression. Operators
/// are located right-to-left at paren depth zero so left-associativity
/// holds for the arithmetic levels.
fn evaluate_expression(expr: &str) -> i64 {
    let e = expr.trim();
    if e.is_empty() {
        return 0;
    }
    let bytes = e.as_bytes();

    // || and && (lowest levels)
    for (pat, or) in [("||", true), ("&&", false)] {
        let p = pat.as_bytes();
        let mut depth = 0i32;
        for i in (1..bytes.len()).rev() {
            match bytes[i] {
                b')' => depth += 1,
                b'(' => depth -= 1,
                _ => {
                    if depth == 0 && bytes[i] == p[1] && bytes[i - 1] == p[0] {
                        let lhs = evaluate_expression(&e[..i - 1]);
                        let rhs = evaluate_expression(&e[i + 1..]);
                        return if or {
                            ((lhs != 0) || (rhs != 0)) as i64
                        } else {
                            ((lhs != 0) && (rhs != 0)) as i64
                        };
                    }
                }
            }
        }
    }

    // == and !=
    {
        let mut depth = 0i32;
        for i in (1..bytes.len()).rev() {
            match bytes[i] {
                b')' => depth += 1,
                b'(' => depth -= 1,
                b'=' if depth == 0 => {
                    if bytes[i - 1] == b'=' {
                        let lhs = evaluate_expression(&e[..i - 1]);
                        let rhs = evaluate_expression(&e[i + 1..]);
                        return (lhs == rhs) as i64;
                    }
                    if bytes[i - 1] == b'!' {
                        let lhs = evaluate_expression(&e[..i - 1]);
                        let rhs = evaluate_expression(&e[i + 1..]);
                        return (lhs != rhs) as i64;
                    }
                }
                _ => {}
            }
        }
    }

    // Relational < <= > >=
    {
        let mut depth = 0i32;
        for i in (0..bytes.len()).rev() {
            match bytes[i] {
                b')' => depth += 1,
                b'(' => depth -= 1,
                b'=' if depth == 0 && i > 0 && (bytes[i - 1] == b'<' || bytes[i - 1] == b'>') => {
                    let lhs = evaluate_expression(&e[..i - 1]);
                    let rhs = evaluate_expression(&e[i + 1..]);
                    return if bytes[i - 1] == b'<' {
                        (lhs <= rhs) as i64
                    } else {
                        (lhs >= rhs) as i64
                    };
                }
                b'<' | b'>' if depth == 0 => {
                    // Skip the first char of a two-char operator handled above.
                    if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                        continue;
                    }
                    let lhs = evaluate_expression(&e[..i]);
                    let rhs = evaluate_expression(&e[i + 1..]);
                    return if bytes[i] == b'<' {
                        (lhs < rhs) as i64
                    } else {
                        (lhs > rhs) as i64
                    };
                }
                _ => {}
            }
        }
    }

    // Binary + and - (right-to-left scan keeps them left-associative).
    {
        let mut depth = 0i32;
        for i in (1..bytes.len()).rev() {
            match bytes[i] {
                b')' => depth += 1,
                b'(' => depth -= 1,
                b'+' | b'-' if depth == 0 => {
                    // A sign is unary when preceded by another operator.
                    let prev = bytes[..i]
                        .iter()
                        .rev()
                        .find(|b| !b.is_ascii_whitespace())
                        .copied();
                    let binary = matches!(prev,
                        Some(p) if p.is_ascii_alphanumeric() || p == b')' || p == b'_');
                    if binary {
                        let lhs = evaluate_expression(&e[..i]);
                        let rhs = evaluate_expression(&e[i + 1..]);
                        return if bytes[i] == b'+' {
                            lhs.wrapping_add(rhs)
                        } else {
                            lhs.wrapping_sub(rhs)
                        };
                    }
                }
                _ => {}
            }
        }
    }

    // * and /
    {
        let mut depth = 0i32;
        for i in (0..bytes.len()).rev() {
            match bytes[i] {
                b')' => depth += 1,
                b'(' => depth -= 1,
                b'*' | b'/' if depth == 0 && i > 0 => {
                    let lhs = evaluate_expression(&e[..i]);
                    let rhs = evaluate_expression(&e[i + 1..]);
                    return if bytes[i] == b'*' {
                        lhs.wrapping_mul(rhs)
                    } else if rhs == 0 {
                        0
                    } else {
                        lhs.wrapping_div(rhs)
                    };
                }
                _ => {}
            }
        }
    }

    // Unary operators, parentheses, literals.
    if let Some(rest) = e.strip_prefix('!') {
        return (evaluate_expression(rest) == 0) as i64;
    }
    if let Some(rest) = e.strip_prefix('-') {
        return evaluate_expression(rest).wrapping_neg();
    }
    if e.starts_with('(') && e.ends_with(')') {
        return evaluate_expression(&e[1..e.len() - 1]);
    }

    parse_int_literal(e)
}

/// Parse a decimal/hex/octal/binary literal, ignoring integer suffixes.
fn parse_int_literal(text: &str) -> i64 {
    let t = text.trim().trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).unwrap_or(0) as i64;
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2).unwrap_or(0) as i64;
    }
    if t.len() > 1 && t.starts_with('0') {
        return u64::from_str_radix(&t[1..], 8).unwrap_or(0) as i64;
    }
    t.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_chain() {
        assert_eq!(evaluate_expression("1 + 2 * 3"), 7);
        assert_eq!(evaluate_expression("(1 + 2) * 3"), 9);
        assert_eq!(evaluate_expression("10 - 3 - 2"), 5);
        assert_eq!(evaluate_expression("1 < 2 && 2 < 3"), 1);
        assert_eq!(evaluate_expression("1 == 1 || 0"), 1);
        assert_eq!(evaluate_expression("!0"), 1);
        assert_eq!(evaluate_expression("-3 + 5"), 2);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        assert_eq!(evaluate_expression("5 / 0"), 0);
    }

    #[test]
    fn literal_bases() {
        assert_eq!(parse_int_literal("0x10"), 16);
        assert_eq!(parse_int_literal("010"), 8);
        assert_eq!(parse_int_literal("0b110"), 6);
        assert_eq!(parse_int_literal("42L"), 42);
    }

    #[test]
    fn identifiers_become_zero() {
        assert_eq!(replace_identifiers_with_zero("FOO + 1"), "0 + 1");
        assert_eq!(replace_identifiers_with_zero("123ull"), "123ull");
    }
}
