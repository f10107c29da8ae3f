//! Conditional-compilation directive handling (`#if` family).
//!
//! Each `#if`/`#ifdef`/`#ifndef` pushes a frame; `#elif` and `#else`
//! rewrite the top frame; `#endif` pops. Conditional directives are
//! dispatched even inside inactive branches so nesting depth stays
//! correct. A non-empty stack at end of translation unit is fatal.

use super::preprocessor::Preprocessor;

/// One frame of the conditional-compilation stack.
#[derive(Debug, Clone, Copy)]
pub struct CondFrame {
    /// Whether lines in the current branch are emitted.
    pub active: bool,
    /// Whether any branch of this conditional has been taken yet.
    pub has_matched: bool,
    /// Whether the enclosing context was active when the frame was pushed.
    pub parent_active: bool,
}

impl Preprocessor {
    pub(super) fn branch_active(&self) -> bool {
        self.cond_stack.last().map_or(true, |frame| frame.active)
    }

    /// Dispatch a conditional directive. Returns `Ok(true)` if the line
    /// was one, `Ok(false)` otherwise.
    pub(super) fn handle_conditional(&mut self, line: &str, out: &mut String) -> Result<bool, String> {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix('#') else {
            return Ok(false);
        };
        let rest = rest.trim_start();
        let (directive, arg) = match rest.find(|c: char| c.is_ascii_whitespace()) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };

        match directive {
            "ifdef" | "ifndef" => {
                let parent_active = self.branch_active();
                let defined = self.macros.is_defined(arg);
                let wanted = if directive == "ifdef" { defined } else { !defined };
                let active = parent_active && wanted;
                self.cond_stack.push(CondFrame {
                    active,
                    has_matched: active,
                    parent_active,
                });
                out.push_str(&format!(
                    "// [Conditional]: #{} {} ({})\n",
                    directive,
                    arg,
                    if active { "active" } else { "inactive" }
                ));
                Ok(true)
            }
            "if" => {
                let parent_active = self.branch_active();
                let active = parent_active && self.evaluate_condition(arg)?;
                self.cond_stack.push(CondFrame {
                    active,
                    has_matched: active,
                    parent_active,
                });
                out.push_str(&format!(
                    "// [Conditional]: #if {} ({})\n",
                    arg,
                    if active { "active" } else { "inactive" }
                ));
                Ok(true)
            }
            "elif" => {
                if self.cond_stack.is_empty() {
                    return Err("#elif without #if".to_string());
                }
                // Evaluate before re-borrowing the frame mutably.
                let parent_active = self.cond_stack.last().unwrap().parent_active;
                let has_matched = self.cond_stack.last().unwrap().has_matched;
                let value = if has_matched {
                    false
                } else {
                    parent_active && self.evaluate_condition(arg)?
                };
                let frame = self.cond_stack.last_mut().unwrap();
                frame.active = value;
                if value {
                    frame.has_matched = true;
                }
                out.push_str(&format!(
                    "// [Conditional]: #elif {} ({})\n",
                    arg,
                    if value { "active" } else { "inactive" }
                ));
                Ok(true)
            }
            "else" => {
                let Some(frame) = self.cond_stack.last_mut() else {
                    return Err("#else without #if".to_string());
                };
                frame.active = frame.parent_active && !frame.has_matched;
                let active = frame.active;
                out.push_str(&format!(
                    "// [Conditional]: #else ({})\n",
                    if active { "active" } else { "inactive" }
                ));
                Ok(true)
            }
            "endif" => {
                if self.cond_stack.pop().is_none() {
                    return Err("#endif without #if".to_string());
                }
                out.push_str("// [Conditional]: #endif\n");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
