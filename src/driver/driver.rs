//! Phase orchestration: preprocess → lex → parse → semantic analysis →
//! IR generation → code emission → external assemble/link, honoring the
//! CLI stop points. Diagnostics are reported at each phase boundary; a
//! phase with errors stops the pipeline, except that the parser still
//! runs over a token stream with lexical errors so one invocation
//! reports as much as possible.

use anyhow::{bail, Result};
use log::debug;

use crate::backend::CodeGenerator;
use crate::common::error::report_all;
use crate::frontend::lexer::{Lexer, TokenKind};
use crate::frontend::parser::ast::ExternalDecl;
use crate::frontend::parser::{printer, Parser};
use crate::frontend::preprocessor::Preprocessor;
use crate::frontend::sema::SemanticAnalyzer;
use crate::ir::IrGenerator;
use super::cli::Cli;
use super::external_tools;

pub struct Driver {
    cli: Cli,
}

impl Driver {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub fn run(&mut self) -> Result<()> {
        let input = self.cli.input.clone();
        let output = self.cli.output_path();

        // Phase 1: preprocess.
        debug!("stage: preprocessing {}", input);
        let mut preprocessor = Preprocessor::new(&self.cli.include_paths);
        let preprocessed = preprocessor
            .preprocess(&input)
            .map_err(|msg| anyhow::anyhow!("preprocessor error: {}", msg))?;

        if self.cli.preprocess {
            println!("=== Preprocessed Code ===");
            print!("{}", preprocessed);
            return Ok(());
        }

        // Phase 2: lex (stop point only; the parser pulls its own tokens).
        if self.cli.lex {
            return self.run_lex_listing(&preprocessed, &input);
        }

        // Phase 3: parse.
        debug!("stage: parsing");
        let lexer = Lexer::new(&preprocessed, &input);
        let mut parser = Parser::new(lexer);
        let mut unit = parser.parse_translation_unit();

        let lex_errors = parser.lexer_errors().to_vec();
        let parse_errors = parser.errors().to_vec();
        report_all(&lex_errors);
        report_all(&parse_errors);
        if !lex_errors.is_empty() {
            bail!("lexical analysis failed");
        }
        if !parse_errors.is_empty() {
            bail!("parsing failed");
        }

        if self.cli.ast {
            println!("=== Abstract Syntax Tree ===");
            print!("{}", printer::print_translation_unit(&unit));
            return Ok(());
        }

        // Phase 4: semantic analysis.
        debug!("stage: semantic analysis");
        let mut sema = SemanticAnalyzer::new();
        let sema_ok = sema.analyze(&mut unit);
        report_all(sema.errors());
        report_all(sema.warnings());
        if !sema_ok {
            bail!("semantic analysis failed");
        }

        if self.cli.semantic && !self.cli.ir && !self.cli.asm && !self.cli.compile {
            self.print_semantic_summary(&unit, &sema);
            return Ok(());
        }

        // Phase 5: IR generation.
        debug!("stage: IR generation");
        let mut symbols = sema.into_symbol_table();
        let program = IrGenerator::new(&mut symbols).generate(&mut unit);

        if self.cli.ir && !self.cli.asm && !self.cli.compile {
            println!("\n=== Intermediate Representation (Quadruples) ===");
            print!("{}", program.listing());
            return Ok(());
        }

        // Phase 6: code emission.
        debug!("stage: code generation");
        let asm = CodeGenerator::new(&program).generate();

        if self.cli.compile {
            let asm_file = format!("{}.s", output);
            std::fs::write(&asm_file, &asm)
                .map_err(|e| anyhow::anyhow!("cannot write to {}: {}", asm_file, e))?;
            external_tools::assemble_and_link(&asm_file, &output)?;
            println!("Compiled successfully: {}", output);
            return Ok(());
        }

        if output == "-" {
            print!("{}", asm);
        } else {
            std::fs::write(&output, &asm)
                .map_err(|e| anyhow::anyhow!("cannot write to {}: {}", output, e))?;
            println!("Assembly written to {}", output);
        }
        Ok(())
    }

    /// The `-l` stop point: one `[line:col] Kind payload` line per token.
    fn run_lex_listing(&self, preprocessed: &str, filename: &str) -> Result<()> {
        debug!("stage: lexing");
        let mut lexer = Lexer::new(preprocessed, filename);
        let tokens = lexer.tokenize();
        println!("=== Tokens ===");
        for tok in &tokens {
            let mut line = format!("[{}:{}] {}", tok.loc.line, tok.loc.column, tok.kind.name());
            match &tok.kind {
                TokenKind::Identifier(name) => line.push_str(&format!(" '{}'", name)),
                TokenKind::IntLiteral(v) => line.push_str(&format!(" {}", v)),
                TokenKind::FloatLiteral(v) => line.push_str(&format!(" {}", v)),
                TokenKind::StringLiteral(s) => line.push_str(&format!(" {:?}", s)),
                TokenKind::CharLiteral(c) => line.push_str(&format!(" '{}'", c)),
                TokenKind::Invalid(msg) => line.push_str(&format!(" [error: {}]", msg)),
                _ => {}
            }
            println!("{}", line);
        }
        if lexer.has_errors() {
            report_all(lexer.errors());
            bail!("lexical analysis failed");
        }
        Ok(())
    }

    /// The `-s` stop point: status plus a coarse symbol census.
    fn print_semantic_summary(
        &self,
        unit: &crate::frontend::parser::ast::TranslationUnit,
        sema: &SemanticAnalyzer,
    ) {
        let mut functions = 0usize;
        let mut variables = 0usize;
        let mut types = 0usize;
        for decl in &unit.decls {
            match decl {
                ExternalDecl::Function(_) => functions += 1,
                ExternalDecl::Declaration(d) => {
                    if d.is_typedef || d.declarators.is_empty() {
                        types += 1;
                    } else {
                        variables += d.declarators.len();
                    }
                }
            }
        }
        println!("=== Semantic Analysis ===");
        println!("Status: Passed");
        println!("Declarations: {}", unit.decls.len());
        println!("Errors: {}", sema.errors().len());
        println!("Warnings: {}", sema.warnings().len());
        println!();
        println!("--- Symbol Summary ---");
        println!("Functions: {}", functions);
        println!("Global Variables: {}", variables);
        println!("Type Definitions: {}", types);
    }
}
