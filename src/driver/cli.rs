//! Command-line interface.

use clap::Parser;

/// CDD compiler: translates a C-subset source file into an x86-64 ELF
/// executable on Linux. Stop-point flags cut the pipeline short and
/// print the intermediate artifact instead.
#[derive(Parser, Debug)]
#[command(
    name = "cddc",
    version,
    about = "CDD compiler: C subset to x86-64 ELF",
    after_help = "Environment:\n  CDD_INCLUDE_PATH  colon-separated include path list\n  CDD_STDLIB_PATH   standard-library header directory\n\nSupported file extensions: .cdd, .c"
)]
pub struct Cli {
    /// Stop after preprocessing, print to stdout
    #[arg(short = 'p', long = "preprocess")]
    pub preprocess: bool,

    /// Stop after lexing, print one token per line
    #[arg(short = 'l', long = "lex")]
    pub lex: bool,

    /// Stop after parsing, print the AST
    #[arg(short = 'a', long = "ast")]
    pub ast: bool,

    /// Stop after semantic analysis, print a summary
    #[arg(short = 's', long = "semantic")]
    pub semantic: bool,

    /// Print the quadruple listing grouped by function
    #[arg(short = 'i', long = "ir")]
    pub ir: bool,

    /// Emit assembly to the output file
    #[arg(short = 'S', long = "asm")]
    pub asm: bool,

    /// Assemble and link into an executable
    #[arg(short = 'c', long = "compile")]
    pub compile: bool,

    /// Output filename
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// Add DIR to the include search path (before the defaults)
    #[arg(short = 'I', value_name = "DIR")]
    pub include_paths: Vec<String>,

    /// Input source file
    #[arg(value_name = "SOURCE")]
    pub input: String,
}

impl Cli {
    /// Default output name: the input with its extension replaced — the
    /// bare stem for executables, `.s` otherwise.
    pub fn output_path(&self) -> String {
        if let Some(out) = &self.output {
            return out.clone();
        }
        let base = match self.input.rfind('.') {
            Some(dot) => &self.input[..dot],
            None => &self.input,
        };
        if self.compile {
            base.to_string()
        } else {
            format!("{}.s", base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_flag_spellings_parse() {
        let cli = Cli::parse_from(["cddc", "-S", "-o", "out.s", "-I", "inc", "main.cdd"]);
        assert!(cli.asm);
        assert_eq!(cli.output.as_deref(), Some("out.s"));
        assert_eq!(cli.include_paths, vec!["inc".to_string()]);
        assert_eq!(cli.input, "main.cdd");

        let cli = Cli::parse_from(["cddc", "--preprocess", "x.c"]);
        assert!(cli.preprocess);

        let cli = Cli::parse_from(["cddc", "-c", "x.c"]);
        assert!(cli.compile);
    }

    #[test]
    fn lower_and_upper_s_are_distinct() {
        let cli = Cli::parse_from(["cddc", "-s", "x.c"]);
        assert!(cli.semantic && !cli.asm);
        let cli = Cli::parse_from(["cddc", "-S", "x.c"]);
        assert!(cli.asm && !cli.semantic);
    }

    #[test]
    fn default_output_names() {
        let cli = Cli::parse_from(["cddc", "-S", "dir/prog.cdd"]);
        assert_eq!(cli.output_path(), "dir/prog.s");
        let cli = Cli::parse_from(["cddc", "-c", "dir/prog.cdd"]);
        assert_eq!(cli.output_path(), "dir/prog");
    }

    #[test]
    fn repeated_include_dirs_keep_order() {
        let cli = Cli::parse_from(["cddc", "-I", "a", "-I", "b", "x.c"]);
        assert_eq!(cli.include_paths, vec!["a".to_string(), "b".to_string()]);
    }
}
