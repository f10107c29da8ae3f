//! The preprocessor driver: turns a root source file into one
//! preprocessed stream, resolving `#include`, `#define`, `#undef` and the
//! conditional directives, expanding macros in code lines, and emitting
//! human-readable provenance comments that the lexer later skips.
//!
//! Processing is line-based. A line ending in `\` is spliced with its
//! successor before anything else happens. A line whose first
//! non-whitespace character is `#` is a directive; conditional directives
//! are dispatched even inside inactive branches so nesting tracks
//! correctly, while all other directives and code lines are skipped when
//! the current branch is inactive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

use super::conditionals::CondFrame;
use super::includes::{absolute, build_include_paths};
use super::macro_defs::{MacroDef, MacroTable};

pub struct Preprocessor {
    pub(super) macros: MacroTable,
    pub(super) cond_stack: Vec<CondFrame>,
    pub(super) include_paths: Vec<PathBuf>,
    /// Interned absolute paths; a repeat inclusion is a silent no-op.
    loaded_files: HashSet<PathBuf>,
    /// Directory of the file currently being processed, for `"…"` lookup.
    pub(super) current_dir: PathBuf,
}

impl Preprocessor {
    pub fn new(user_include_paths: &[String]) -> Self {
        Self {
            macros: MacroTable::new(),
            cond_stack: Vec::new(),
            include_paths: build_include_paths(user_include_paths),
            loaded_files: HashSet::new(),
            current_dir: PathBuf::from("."),
        }
    }

    /// Define an object-like macro before processing starts (driver use).
    pub fn define_macro(&mut self, name: &str, value: &str) {
        self.macros.define(MacroDef {
            name: name.to_string(),
            is_function_like: false,
            params: Vec::new(),
            body: value.to_string(),
        });
    }

    /// Preprocess one translation unit rooted at `filename`.
    pub fn preprocess(&mut self, filename: &str) -> Result<String, String> {
        self.loaded_files.clear();
        self.macros.clear();
        self.cond_stack.clear();

        let root = Path::new(filename);
        self.current_dir = absolute(root)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut out = String::new();
        self.process_file(root, &mut out)?;

        if !self.cond_stack.is_empty() {
            return Err("unterminated conditional directive (#if/#ifdef without #endif)".to_string());
        }
        Ok(out)
    }

    fn process_file(&mut self, path: &Path, out: &mut String) -> Result<(), String> {
        let abs = absolute(path);
        if !self.loaded_files.insert(abs.clone()) {
            return Ok(());
        }
        debug!("preprocessing {}", abs.display());

        let saved_dir = std::mem::replace(
            &mut self.current_dir,
            abs.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")),
        );

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot open file '{}': {}", path.display(), e))?;

        let result = self.process_lines(&content, out);
        self.current_dir = saved_dir;
        result
    }

    fn process_lines(&mut self, content: &str, out: &mut String) -> Result<(), String> {
        let mut lines = content.lines();
        while let Some(first) = lines.next() {
            // Line splicing: a trailing backslash joins the next line
            // before any other processing.
            let mut line = first.trim_end_matches('\r').to_string();
            while line.ends_with('\\') {
                line.pop();
                match lines.next() {
                    Some(next) => line.push_str(next.trim_end_matches('\r')),
                    None => break,
                }
            }

            if self.handle_conditional(&line, out)? {
                continue;
            }
            if !self.branch_active() {
                continue;
            }

            if let Some((header, is_system)) = Self::parse_include(&line) {
                let resolved = self
                    .resolve_include(&header, is_system)
                    .ok_or_else(|| format!("cannot find header '{}'", header))?;
                out.push_str(&format!("// --- Begin include: {} ---\n", header));
                self.process_file(&resolved, out)?;
                out.push_str(&format!("\n// --- End include: {} ---\n", header));
                continue;
            }

            if self.parse_define(&line) {
                out.push_str(&format!("// [Defined]: {}\n", line));
                continue;
            }

            if self.parse_undef(&line) {
                out.push_str(&format!("// [Undefined]: {}\n", line));
                continue;
            }

            if line.trim_start().starts_with('#') {
                out.push_str(&format!("// [Ignored Preprocessor]: {}\n", line));
                continue;
            }

            let expanded = self.macros.expand(&line)?;
            out.push_str(&expanded);
            out.push('\n');
        }
        Ok(())
    }

    /// Handle `#define`. Returns true if the line was one.
    fn parse_define(&mut self, line: &str) -> bool {
        let rest = match line.trim_start().strip_prefix('#') {
            Some(r) => r.trim_start(),
            None => return false,
        };
        let rest = match rest.strip_prefix("define") {
            Some(r) => r,
            None => return false,
        };
        // Require a separator so identifiers like `defined` don't match.
        if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
            return false;
        }
        let rest = rest.trim_start();

        let name_end = rest
            .find(|c: char| c == '(' || c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty() || !name.chars().next().unwrap().is_ascii_alphabetic() && !name.starts_with('_') {
            return false;
        }

        let mut is_function_like = false;
        let mut params = Vec::new();
        let mut body_start = name_end;

        if rest[name_end..].starts_with('(') {
            is_function_like = true;
            let Some(close) = rest[name_end..].find(')') else {
                return false;
            };
            let params_str = &rest[name_end + 1..name_end + close];
            if !params_str.trim().is_empty() {
                params = params_str.split(',').map(|p| p.trim().to_string()).collect();
            }
            body_start = name_end + close + 1;
        }

        let body = strip_trailing_line_comment(rest[body_start..].trim());
        self.macros.define(MacroDef {
            name: name.to_string(),
            is_function_like,
            params,
            body,
        });
        true
    }

    /// Handle `#undef`. Returns true if the line was one.
    fn parse_undef(&mut self, line: &str) -> bool {
        let rest = match line.trim_start().strip_prefix('#') {
            Some(r) => r.trim_start(),
            None => return false,
        };
        let rest = match rest.strip_prefix("undef") {
            Some(r) => r,
            None => return false,
        };
        if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
            return false;
        }
        let name = rest.trim().split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return false;
        }
        self.macros.undefine(name);
        true
    }
}

/// Strip a trailing `//` comment from a macro body, ignoring `//` that
/// appears inside string or character literals.
fn strip_trailing_line_comment(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut in_literal: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match in_literal {
            Some(quote) => {
                if c == b'\\' {
                    i += 1;
                } else if c == quote {
                    in_literal = None;
                }
            }
            None => {
                if c == b'"' || c == b'\'' {
                    in_literal = Some(c);
                } else if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    return body[..i].trim_end().to_string();
                }
            }
        }
        i += 1;
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn run(source: &str) -> Result<String, String> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.cdd");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(source.as_bytes()).unwrap();
        let mut pp = Preprocessor::new(&[]);
        pp.preprocess(path.to_str().unwrap())
    }

    /// Keep only lines that are not provenance comments.
    fn code_lines(output: &str) -> Vec<&str> {
        output
            .lines()
            .filter(|l| !l.trim_start().starts_with("//"))
            .collect()
    }

    #[test]
    fn idempotent_on_plain_input() {
        let src = "int main() {\n    return 0;\n}\n";
        let out = run(src).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn object_macro_expands_in_code() {
        let out = run("#define N 5\nint a[N];\n").unwrap();
        assert_eq!(code_lines(&out), vec!["int a[5];"]);
    }

    #[test]
    fn self_recursive_macro_terminates() {
        let out = run("#define A A\nA\n").unwrap();
        assert_eq!(code_lines(&out), vec!["A"]);
    }

    #[test]
    fn function_macro_with_expression_argument() {
        let out = run("#define SQ(x) ((x)*(x))\nint y = SQ(i+1);\n").unwrap();
        assert_eq!(code_lines(&out), vec!["int y = ((i+1)*(i+1));"]);
    }

    #[test]
    fn line_splicing_joins_before_processing() {
        let out = run("#define LONG \\\n42\nint x = LONG;\n").unwrap();
        assert_eq!(code_lines(&out), vec!["int x = 42;"]);
    }

    #[test]
    fn ifdef_else_endif() {
        let src = "#define YES 1\n#ifdef YES\nint a;\n#else\nint b;\n#endif\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int a;"]);

        let src = "#ifdef NO\nint a;\n#else\nint b;\n#endif\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int b;"]);
    }

    #[test]
    fn elif_takes_first_matching_branch() {
        let src = "#define V 2\n#if V == 1\nint a;\n#elif V == 2\nint b;\n#elif V == 2\nint c;\n#else\nint d;\n#endif\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int b;"]);
    }

    #[test]
    fn nested_inactive_conditionals_track_depth() {
        let src = "#ifdef NO\n#ifdef ALSO_NO\nint a;\n#endif\nint b;\n#endif\nint c;\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int c;"]);
    }

    #[test]
    fn unterminated_conditional_is_fatal() {
        assert!(run("#ifdef X\nint a;\n").is_err());
    }

    #[test]
    fn missing_include_is_fatal() {
        assert!(run("#include \"no-such-header.h\"\n").is_err());
    }

    #[test]
    fn defined_operator_in_if() {
        let src = "#define X 1\n#if defined(X) && !defined Y\nint a;\n#endif\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int a;"]);
    }

    #[test]
    fn undef_removes_macro() {
        let src = "#define N 1\n#undef N\n#ifdef N\nint a;\n#endif\nint b;\n";
        let out = run(src).unwrap();
        assert_eq!(code_lines(&out), vec!["int b;"]);
    }

    #[test]
    fn trailing_comment_stripped_from_define() {
        let out = run("#define N 7 // seven\nint a = N;\n").unwrap();
        assert_eq!(code_lines(&out), vec!["int a = 7;"]);
    }

    #[test]
    fn include_is_interned_once() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("h.h");
        std::fs::write(&header, "int from_header;\n").unwrap();
        let main = dir.path().join("m.cdd");
        std::fs::write(&main, "#include \"h.h\"\n#include \"h.h\"\nint x;\n").unwrap();

        let mut pp = Preprocessor::new(&[]);
        let out = pp.preprocess(main.to_str().unwrap()).unwrap();
        let count = out.matches("int from_header;").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn include_searches_user_paths_in_order() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        std::fs::write(dir_a.path().join("pick.h"), "int a_version;\n").unwrap();
        std::fs::write(dir_b.path().join("pick.h"), "int b_version;\n").unwrap();

        let src_dir = tempfile::tempdir().unwrap();
        let main = src_dir.path().join("m.cdd");
        std::fs::write(&main, "#include <pick.h>\n").unwrap();

        let mut pp = Preprocessor::new(&[
            dir_a.path().to_string_lossy().into_owned(),
            dir_b.path().to_string_lossy().into_owned(),
        ]);
        let out = pp.preprocess(main.to_str().unwrap()).unwrap();
        assert!(out.contains("int a_version;"));
        assert!(!out.contains("int b_version;"));
    }
}
