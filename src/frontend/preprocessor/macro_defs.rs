//! Macro definitions and expansion for the preprocessor.
//!
//! Supports object-like macros, function-like macros with argument
//! pre-expansion, stringization (`#param`), and token pasting (`##`).
//! Expansion uses a hide set (the "forbidden" set) extended during rescan
//! so that direct self-recursion such as `#define A A` terminates.
//!
//! String and character literals are never scanned for macro names;
//! literal skipping is escape-aware.

use std::collections::{HashMap, HashSet};

/// A single macro definition. Object-like macros have an empty parameter
/// list and `is_function_like == false`.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub is_function_like: bool,
    pub params: Vec<String>,
    pub body: String,
}

/// Stores all macro definitions and drives expansion. Names are unique;
/// redefinition replaces and `#undef` removes.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_ident_cont(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Copy a quoted literal (string or char) verbatim, escape-aware.
/// `i` points at the opening quote; on return it points past the closing
/// quote (or at end of input for an unterminated literal).
fn copy_literal(bytes: &[u8], i: &mut usize, out: &mut String) {
    let quote = bytes[*i];
    out.push(quote as char);
    *i += 1;
    while *i < bytes.len() {
        let c = bytes[*i];
        out.push(c as char);
        *i += 1;
        if c == b'\\' && *i < bytes.len() {
            out.push(bytes[*i] as char);
            *i += 1;
        } else if c == quote {
            return;
        }
    }
}

impl MacroTable {
    pub fn new() -> Self {
        Self { macros: HashMap::new() }
    }

    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name.clone(), def);
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn clear(&mut self) {
        self.macros.clear();
    }

    /// Expand all macros in `input` with an empty hide set.
    pub fn expand(&self, input: &str) -> Result<String, String> {
        self.expand_with(input, &HashSet::new())
    }

    /// One scan over `input`. Identifiers naming a macro not in the hide
    /// set are expanded; the substituted text is rescanned with the hide
    /// set extended by the macro's own name.
    fn expand_with(&self, input: &str, forbidden: &HashSet<String>) -> Result<String, String> {
        if self.macros.is_empty() {
            return Ok(input.to_string());
        }

        let bytes = input.as_bytes();
        let mut result = String::with_capacity(input.len());
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i];

            // Literals are copied verbatim, never scanned.
            if c == b'"' || c == b'\'' {
                copy_literal(bytes, &mut i, &mut result);
                continue;
            }

            if !is_ident_start(c) {
                result.push(c as char);
                i += 1;
                continue;
            }

            let start = i;
            while i < bytes.len() && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let word = std::str::from_utf8(&bytes[start..i]).unwrap_or("");

            let def = match self.macros.get(word) {
                Some(def) if !forbidden.contains(word) => def,
                _ => {
                    result.push_str(word);
                    continue;
                }
            };

            let substitution = if def.is_function_like {
                // Function-like macros expand only when a '(' follows.
                let mut look = i;
                while look < bytes.len() && (bytes[look] == b' ' || bytes[look] == b'\t') {
                    look += 1;
                }
                if look >= bytes.len() || bytes[look] != b'(' {
                    result.push_str(word);
                    continue;
                }
                let (raw_args, after) = parse_macro_args(bytes, look)
                    .ok_or_else(|| format!("unterminated argument list for macro '{}'", word))?;
                i = after;
                if raw_args.len() != def.params.len()
                    && !(def.params.is_empty() && raw_args.len() == 1 && raw_args[0].is_empty())
                {
                    return Err(format!(
                        "macro '{}' expects {} argument(s), got {}",
                        word,
                        def.params.len(),
                        raw_args.len()
                    ));
                }
                // Pre-expand each raw argument with an empty hide set.
                let mut expanded_args = Vec::with_capacity(raw_args.len());
                for arg in &raw_args {
                    expanded_args.push(self.expand(arg)?);
                }
                substitute_params(&def.body, &def.params, &raw_args, &expanded_args)
            } else {
                def.body.clone()
            };

            // Rescan with this macro hidden so self-reference terminates.
            let mut next_forbidden = forbidden.clone();
            next_forbidden.insert(word.to_string());
            result.push_str(&self.expand_with(&substitution, &next_forbidden)?);
        }

        Ok(result)
    }
}

/// Parse a parenthesized argument list starting at the '(' at `open`.
/// Nested parentheses stay inside their argument; string/char literals are
/// skipped escape-aware. Returns the raw arguments and the index just past
/// the closing ')'.
fn parse_macro_args(bytes: &[u8], open: usize) -> Option<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = open + 1;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'"' | b'\'' => copy_literal(bytes, &mut i, &mut current),
            b'(' => {
                depth += 1;
                current.push('(');
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    args.push(current.trim().to_string());
                    return Some((args, i + 1));
                }
                depth -= 1;
                current.push(')');
                i += 1;
            }
            b',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                i += 1;
            }
            _ => {
                current.push(c as char);
                i += 1;
            }
        }
    }
    None
}

/// Substitute parameters into a function-like macro body, walking the body
/// character by character:
/// - `##` pastes the raw right-hand token against whatever is already at
///   the end of the growing result;
/// - `#param` stringizes the raw argument with `"` and `\` escaped;
/// - a plain parameter is replaced by its pre-expanded value.
fn substitute_params(
    body: &str,
    params: &[String],
    raw_args: &[String],
    expanded_args: &[String],
) -> String {
    let bytes = body.as_bytes();
    let mut result = String::with_capacity(body.len() * 2);
    let mut i = 0;

    let param_index = |name: &str| params.iter().position(|p| p == name);

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'"' || c == b'\'' {
            copy_literal(bytes, &mut i, &mut result);
            continue;
        }

        // Token paste: drop whitespace on both sides, substitute the raw
        // (unexpanded) argument for a parameter on the right.
        if c == b'#' && i + 1 < bytes.len() && bytes[i + 1] == b'#' {
            while result.ends_with(|ch: char| ch.is_ascii_whitespace()) {
                result.pop();
            }
            i += 2;
            while i < bytes.len() && (bytes[i] as char).is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && is_ident_start(bytes[i]) {
                let start = i;
                while i < bytes.len() && is_ident_cont(bytes[i]) {
                    i += 1;
                }
                let word = std::str::from_utf8(&bytes[start..i]).unwrap_or("");
                match param_index(word) {
                    Some(idx) => result.push_str(&raw_args[idx]),
                    None => result.push_str(word),
                }
            }
            continue;
        }

        // Stringize: `#param` becomes a quoted copy of the raw argument.
        if c == b'#' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && is_ident_start(bytes[j]) {
                let start = j;
                while j < bytes.len() && is_ident_cont(bytes[j]) {
                    j += 1;
                }
                let word = std::str::from_utf8(&bytes[start..j]).unwrap_or("");
                if let Some(idx) = param_index(word) {
                    result.push('"');
                    for ch in raw_args[idx].chars() {
                        if ch == '"' || ch == '\\' {
                            result.push('\\');
                        }
                        result.push(ch);
                    }
                    result.push('"');
                    i = j;
                    continue;
                }
            }
            result.push('#');
            i += 1;
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && is_ident_cont(bytes[i]) {
                i += 1;
            }
            let word = std::str::from_utf8(&bytes[start..i]).unwrap_or("");
            match param_index(word) {
                Some(idx) => result.push_str(&expanded_args[idx]),
                None => result.push_str(word),
            }
            continue;
        }

        result.push(c as char);
        i += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(defs: &[(&str, bool, &[&str], &str)]) -> MacroTable {
        let mut t = MacroTable::new();
        for &(name, func, params, body) in defs {
            t.define(MacroDef {
                name: name.to_string(),
                is_function_like: func,
                params: params.iter().map(|s| s.to_string()).collect(),
                body: body.to_string(),
            });
        }
        t
    }

    #[test]
    fn object_macro_substitutes() {
        let t = table(&[("N", false, &[], "10")]);
        assert_eq!(t.expand("int a[N];").unwrap(), "int a[10];");
    }

    #[test]
    fn self_reference_terminates() {
        let t = table(&[("A", false, &[], "A")]);
        assert_eq!(t.expand("A").unwrap(), "A");
    }

    #[test]
    fn mutual_reference_terminates() {
        let t = table(&[("A", false, &[], "B"), ("B", false, &[], "A")]);
        // A -> B -> A, where the final A is hidden and emitted verbatim.
        assert_eq!(t.expand("A").unwrap(), "A");
    }

    #[test]
    fn function_macro_parenthesization() {
        let t = table(&[("SQ", true, &["x"], "((x)*(x))")]);
        assert_eq!(t.expand("SQ(i+1)").unwrap(), "((i+1)*(i+1))");
    }

    #[test]
    fn function_macro_without_parens_is_untouched() {
        let t = table(&[("SQ", true, &["x"], "((x)*(x))")]);
        assert_eq!(t.expand("f = SQ;").unwrap(), "f = SQ;");
    }

    #[test]
    fn arguments_are_pre_expanded() {
        let t = table(&[
            ("TWO", false, &[], "2"),
            ("DBL", true, &["x"], "((x)+(x))"),
        ]);
        assert_eq!(t.expand("DBL(TWO)").unwrap(), "((2)+(2))");
    }

    #[test]
    fn nested_call_arguments_survive() {
        let t = table(&[("MAX", true, &["a", "b"], "((a)>(b)?(a):(b))")]);
        assert_eq!(
            t.expand("MAX(f(1,2), 3)").unwrap(),
            "((f(1,2))>(3)?(f(1,2)):(3))"
        );
    }

    #[test]
    fn stringize_uses_raw_argument() {
        let t = table(&[
            ("TWO", false, &[], "2"),
            ("STR", true, &["x"], "#x"),
        ]);
        assert_eq!(t.expand("STR(TWO)").unwrap(), "\"TWO\"");
        assert_eq!(t.expand("STR(a \"b\")").unwrap(), "\"a \\\"b\\\"\"");
    }

    #[test]
    fn token_paste_concatenates() {
        let t = table(&[("GLUE", true, &["a", "b"], "a ## b")]);
        assert_eq!(t.expand("GLUE(foo, bar)").unwrap(), "foobar");
    }

    #[test]
    fn literals_are_not_scanned() {
        let t = table(&[("N", false, &[], "10")]);
        assert_eq!(t.expand("puts(\"N\"); c = 'N';").unwrap(), "puts(\"N\"); c = 'N';");
    }

    #[test]
    fn unterminated_argument_list_is_an_error() {
        let t = table(&[("F", true, &["x"], "x")]);
        assert!(t.expand("F(1").is_err());
    }

    #[test]
    fn redefinition_replaces_and_undef_removes() {
        let mut t = table(&[("N", false, &[], "10")]);
        t.define(MacroDef {
            name: "N".to_string(),
            is_function_like: false,
            params: vec![],
            body: "20".to_string(),
        });
        assert_eq!(t.expand("N").unwrap(), "20");
        t.undefine("N");
        assert_eq!(t.expand("N").unwrap(), "N");
    }
}
