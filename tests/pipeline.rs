//! Whole-pipeline tests: preprocessed source text in, quadruple listings
//! and AT&T assembly text out. The external assembler and linker are not
//! invoked here; the end-to-end scenarios are checked at the assembly
//! level.

use std::io::Write as _;

use cddc::backend::CodeGenerator;
use cddc::frontend::lexer::Lexer;
use cddc::frontend::parser::{printer, Parser};
use cddc::frontend::preprocessor::Preprocessor;
use cddc::frontend::sema::SemanticAnalyzer;
use cddc::ir::{IrGenerator, IrProgram};

fn preprocess(src: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.cdd");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(src.as_bytes()).unwrap();
    let mut pp = Preprocessor::new(&[]);
    pp.preprocess(path.to_str().unwrap()).expect("preprocess")
}

fn lower(src: &str) -> IrProgram {
    let text = preprocess(src);
    let mut parser = Parser::new(Lexer::new(&text, "input.cdd"));
    let mut unit = parser.parse_translation_unit();
    assert!(!parser.has_errors(), "parse errors: {:?}", parser.errors());
    let mut sema = SemanticAnalyzer::new();
    assert!(sema.analyze(&mut unit), "sema errors: {:?}", sema.errors());
    let mut symbols = sema.into_symbol_table();
    IrGenerator::new(&mut symbols).generate(&mut unit)
}

fn compile(src: &str) -> String {
    let program = lower(src);
    CodeGenerator::new(&program).generate()
}

#[test]
fn hello_world_compiles_to_expected_shape() {
    let asm = compile(
        "int printf(char *fmt, ...);\n\
         int main() { printf(\"hello, world\\n\"); return 0; }\n",
    );
    assert!(asm.contains(".string \"hello, world\\n\""));
    assert!(asm.contains("call printf"));
    assert!(asm.contains(".globl main"));
    assert!(asm.contains(".note.GNU-stack"));
}

#[test]
fn recursive_factorial_compiles() {
    let asm = compile(
        "int printf(char *fmt, ...);\n\
         int fact(int n) { return n < 2 ? 1 : n * fact(n - 1); }\n\
         int main() { printf(\"%d\\n\", fact(10)); return 0; }\n",
    );
    assert!(asm.contains("call fact"), "recursive call present:\n{}", asm);
    assert!(asm.contains("imulq"));
}

#[test]
fn array_sum_loop_compiles() {
    let asm = compile(
        "int printf(char *fmt, ...);\n\
         int main() { int a[5] = {1, 2, 3, 4, 5}; int s = 0;\n\
         for (int i = 0; i < 5; i++) s += a[i];\n\
         printf(\"%d\\n\", s); return 0; }\n",
    );
    assert!(asm.contains("imulq $4"), "index scaling by element size:\n{}", asm);
    assert!(asm.contains("call printf"));
}

#[test]
fn struct_field_arithmetic_compiles() {
    let asm = compile(
        "int printf(char *fmt, ...);\n\
         struct P { int x, y; };\n\
         int main() { struct P p = {3, 4};\n\
         printf(\"%d\\n\", p.x * p.x + p.y * p.y); return 0; }\n",
    );
    assert!(asm.contains("addq $4"), "field y addressed at offset 4:\n{}", asm);
}

#[test]
fn float_comparison_chain_compiles() {
    let asm = compile(
        "int printf(char *fmt, ...);\n\
         int main() { double d = 0.1 + 0.2;\n\
         printf(\"%s\\n\", d > 0.29 && d < 0.31 ? \"ok\" : \"bad\"); return 0; }\n",
    );
    assert!(asm.contains("addsd"));
    assert!(asm.contains("ucomisd"));
    assert!(asm.contains(".string \"ok\""));
    assert!(asm.contains(".string \"bad\""));
}

#[test]
fn function_like_macro_parenthesization() {
    let program = lower(
        "#define SQ(x) ((x)*(x))\n\
         int main() { int i = 3; return SQ(i+1); }\n",
    );
    // ((i+1)*(i+1)) lowers to two adds and one multiply.
    let main = &program.functions[0];
    let listing = program.listing();
    let adds = main
        .code
        .iter()
        .filter(|q| q.opcode == cddc::ir::Opcode::Add)
        .count();
    let muls = main
        .code
        .iter()
        .filter(|q| q.opcode == cddc::ir::Opcode::Mul)
        .count();
    assert_eq!(adds, 2, "listing:\n{}", listing);
    assert_eq!(muls, 1, "listing:\n{}", listing);
}

#[test]
fn preprocessor_is_idempotent_without_directives() {
    let src = "int main() {\n    return 42;\n}\n";
    assert_eq!(preprocess(src), src);
}

#[test]
fn ast_print_is_stable_across_parses() {
    let src = "struct Node { int value; struct Node *next; };\n\
               int sum(struct Node *head) {\n\
                   int total = 0;\n\
                   while (head) { total += head->value; head = head->next; }\n\
                   return total;\n\
               }\n";
    let parse_once = |s: &str| {
        let mut parser = Parser::new(Lexer::new(s, "t.cdd"));
        let unit = parser.parse_translation_unit();
        assert!(!parser.has_errors());
        printer::print_translation_unit(&unit)
    };
    assert_eq!(parse_once(src), parse_once(src));
}

#[test]
fn switch_dispatch_reaches_exactly_one_case() {
    let program = lower(
        "int main() { int x = 2; int r = 0;\n\
         switch (x) { case 1: r = 10; break; case 2: r = 20; break; default: r = 30; }\n\
         return r; }\n",
    );
    let main = &program.functions[0];
    // Dispatch: one Eq + JumpTrue pair per case, plus the default jump.
    let eqs = main
        .code
        .iter()
        .filter(|q| q.opcode == cddc::ir::Opcode::Eq)
        .count();
    assert_eq!(eqs, 2);
    let jump_trues = main
        .code
        .iter()
        .filter(|q| q.opcode == cddc::ir::Opcode::JumpTrue)
        .count();
    assert_eq!(jump_trues, 2);
}

#[test]
fn nine_parameter_abi_sum() {
    let asm = compile(
        "int sum9(int a, int b, int c, int d, int e, int f, int g, int h, int i) {\n\
             return a + b + c + d + e + f + g + h + i;\n\
         }\n\
         int main() { return sum9(1, 2, 3, 4, 5, 6, 7, 8, 9) == 45 ? 0 : 1; }\n",
    );
    // Callee: six register spills and stack reads at rbp+16/24/32.
    for line in ["movq %rdi, ", "movq %r9, ", "movq 16(%rbp)", "movq 24(%rbp)", "movq 32(%rbp)"] {
        assert!(asm.contains(line), "missing {:?}:\n{}", line, asm);
    }
}

#[test]
fn include_and_conditional_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("defs.h");
    std::fs::write(&header, "#define ANSWER 42\n").unwrap();
    let main_file = dir.path().join("main.cdd");
    std::fs::write(
        &main_file,
        "#include \"defs.h\"\n\
         #ifdef ANSWER\n\
         int main() { return ANSWER; }\n\
         #else\n\
         int main() { return 0; }\n\
         #endif\n",
    )
    .unwrap();

    let mut pp = Preprocessor::new(&[]);
    let text = pp.preprocess(main_file.to_str().unwrap()).unwrap();
    assert!(text.contains("return 42;"));
    assert!(!text.contains("return 0;"));
}

#[test]
fn global_initializers_reach_data_section() {
    let asm = compile(
        "int answer = 42;\n\
         double ratio = 0.5;\n\
         char tag[4] = \"ab\";\n\
         char *msg = \"hi\";\n\
         int main() { return answer; }\n",
    );
    assert!(asm.contains(".long 42"));
    assert!(asm.contains(&format!(".quad {}", 0.5f64.to_bits())));
    assert!(asm.contains(".quad .LC"), "char* references its label:\n{}", asm);
    assert!(asm.contains(".byte 97"), "char array expands bytes:\n{}", asm);
}

#[test]
fn char_array_string_and_subscript() {
    let asm = compile(
        "int putchar(int c);\n\
         int main() { char s[] = \"ok\"; putchar(s[0]); putchar(s[1]); return 0; }\n",
    );
    assert!(asm.contains("call putchar"));
}

#[test]
fn typedef_and_enum_pipeline() {
    let program = lower(
        "typedef unsigned long size;\n\
         enum Mode { OFF, ON = 7 };\n\
         int main() { size n = sizeof(int); return n + ON; }\n",
    );
    let main = &program.functions[0];
    let has_seven = main.code.iter().any(|q| {
        matches!(&q.arg1, cddc::ir::Operand::IntConst { value: 7, .. })
            || matches!(&q.arg2, cddc::ir::Operand::IntConst { value: 7, .. })
    });
    assert!(has_seven, "enum constant folded:\n{}", program.listing());
}

#[test]
fn pointer_walk_compiles() {
    let asm = compile(
        "int strlen_(char *s) { int n = 0; while (*s++) n++; return n; }\n\
         int main() { return strlen_(\"four\"); }\n",
    );
    assert!(asm.contains("call strlen_"));
}

#[test]
fn do_while_and_goto_compile() {
    let asm = compile(
        "int main() {\n\
             int i = 0;\n\
             do { i++; } while (i < 3);\n\
             if (i == 3) goto done;\n\
             i = -1;\n\
         done:\n\
             return i;\n\
         }\n",
    );
    assert!(asm.contains(".main_lbl_done:"), "user label emitted:\n{}", asm);
}

#[test]
fn function_pointer_call_is_indirect() {
    let asm = compile(
        "int add(int a, int b) { return a + b; }\n\
         int main() { int (*op)(int, int) = add; return op(2, 3); }\n",
    );
    assert!(asm.contains("call *"), "indirect call through register:\n{}", asm);
}
