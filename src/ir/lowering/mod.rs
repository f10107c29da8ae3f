//! AST → quadruple lowering.
//!
//! The generator re-walks the decorated AST, replaying the scope ids the
//! analyzer recorded so identifier lookups resolve exactly as they did
//! during analysis. Temporaries are named `t0, t1, …`; labels are
//! `<prefix>N` with a semantic prefix; locals get a uniquified `name_N`
//! so shadowing is explicit in the IR.

mod expr;
mod globals;
mod stmt;

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::frontend::parser::ast::{
    BlockItem, CompoundStmt, ExternalDecl, FunctionDef, TranslationUnit,
};
use crate::frontend::sema::symbol_table::{SymbolKind, SymbolTable};
use crate::frontend::sema::types::{Type, TypeRef};
use super::ir::{FunctionIr, IrProgram, Opcode, Operand, Quadruple};

/// Per-switch lowering state: the dispatch cascade is emitted from the
/// recorded (value, label) pairs once the body has been walked.
pub(super) struct SwitchFrame {
    pub cond: Operand,
    pub default_label: Option<String>,
    pub end_label: String,
    pub cases: Vec<(i64, String)>,
}

pub struct IrGenerator<'a> {
    pub(super) symbols: &'a mut SymbolTable,
    pub(super) program: IrProgram,
    pub(super) current: Option<FunctionIr>,
    temp_counter: u32,
    label_counter: u32,
    string_counter: u32,
    var_counter: u32,
    /// (declaring scope id, source name) → uniquified IR name.
    pub(super) var_names: HashMap<(usize, String), String>,
    pub(super) break_targets: Vec<String>,
    pub(super) continue_targets: Vec<String>,
    pub(super) switch_stack: Vec<SwitchFrame>,
}

impl<'a> IrGenerator<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self {
            symbols,
            program: IrProgram::new(),
            current: None,
            temp_counter: 0,
            label_counter: 0,
            string_counter: 0,
            var_counter: 0,
            var_names: HashMap::new(),
            break_targets: Vec::new(),
            continue_targets: Vec::new(),
            switch_stack: Vec::new(),
        }
    }

    /// Lower the whole translation unit. Case-label slots in the AST are
    /// filled as switches are lowered.
    pub fn generate(mut self, unit: &mut TranslationUnit) -> IrProgram {
        for decl in &mut unit.decls {
            match decl {
                ExternalDecl::Function(func) => self.gen_function(func),
                ExternalDecl::Declaration(d) => self.gen_global_declaration(d),
            }
        }
        debug!(
            "IR generation produced {} function(s), {} global(s), {} string literal(s)",
            self.program.functions.len(),
            self.program.globals.len(),
            self.program.string_literals.len()
        );
        self.program
    }

    // ----- emission helpers -----

    pub(super) fn emit(&mut self, opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) {
        if let Some(func) = &mut self.current {
            func.code.push(Quadruple::new(opcode, result, arg1, arg2));
        }
    }

    pub(super) fn emit_label(&mut self, label: &str) {
        self.emit(
            Opcode::Label,
            Operand::label(label.to_string()),
            Operand::none(),
            Operand::none(),
        );
    }

    pub(super) fn emit_jump(&mut self, label: &str) {
        self.emit(
            Opcode::Jump,
            Operand::label(label.to_string()),
            Operand::none(),
            Operand::none(),
        );
    }

    pub(super) fn emit_jump_true(&mut self, cond: Operand, label: &str) {
        self.emit(
            Opcode::JumpTrue,
            Operand::label(label.to_string()),
            cond,
            Operand::none(),
        );
    }

    pub(super) fn emit_jump_false(&mut self, cond: Operand, label: &str) {
        self.emit(
            Opcode::JumpFalse,
            Operand::label(label.to_string()),
            cond,
            Operand::none(),
        );
    }

    pub(super) fn emit_comment(&mut self, text: &str) {
        self.emit(
            Opcode::Comment,
            Operand::none(),
            Operand::label(text.to_string()),
            Operand::none(),
        );
    }

    pub(super) fn new_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    pub(super) fn new_label(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.label_counter);
        self.label_counter += 1;
        name
    }

    /// Intern a string literal, returning its `.LC` label.
    pub(super) fn add_string_literal(&mut self, value: &str) -> String {
        let label = format!(".LC{}", self.string_counter);
        self.string_counter += 1;
        self.program
            .string_literals
            .push((label.clone(), value.to_string()));
        label
    }

    /// Uniquify a local's IR name and remember the mapping for lookups.
    pub(super) fn register_local(&mut self, scope_id: usize, name: &str) -> String {
        let ir_name = format!("{}_{}", name, self.var_counter);
        self.var_counter += 1;
        self.var_names
            .insert((scope_id, name.to_string()), ir_name.clone());
        ir_name
    }

    /// Look up the uniquified name for a symbol found in `scope_id`.
    pub(super) fn ir_name(&self, scope_id: usize, name: &str) -> String {
        self.var_names
            .get(&(scope_id, name.to_string()))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    // ----- functions -----

    fn gen_function(&mut self, func: &mut FunctionDef) {
        let Some(scope_id) = func.scope_id else {
            return;
        };
        let old_scope = self.symbols.set_current_scope(scope_id);

        // Parameter types were adjusted by the analyzer (array decay,
        // function-to-pointer); read them back from the symbols.
        let mut params = Vec::with_capacity(func.params.len());
        for p in &func.params {
            let Some(name) = &p.name else { continue };
            let ty = self
                .symbols
                .lookup_in_scope(scope_id, name)
                .map(|s| Rc::clone(&s.ty))
                .unwrap_or_else(Type::int);
            let ir_name = self.register_local(scope_id, name);
            params.push((ir_name, ty));
        }

        let return_type = self
            .symbols
            .lookup_in_scope(0, &func.name)
            .and_then(|s| s.ty.return_type())
            .unwrap_or_else(Type::int);

        self.current = Some(FunctionIr {
            name: func.name.clone(),
            return_type,
            params,
            code: Vec::new(),
            is_variadic: func.variadic,
        });

        self.gen_block_items(&mut func.body);

        // The emitter appends the exit label unconditionally; guarantee
        // the body ends in a return or an unconditional jump.
        let needs_return = match self.current.as_ref().and_then(|f| f.code.last()) {
            Some(q) => !matches!(q.opcode, Opcode::Return | Opcode::Jump),
            None => true,
        };
        if needs_return {
            self.emit(Opcode::Return, Operand::none(), Operand::none(), Operand::none());
        }

        let func_ir = self.current.take().unwrap();
        self.program.functions.push(func_ir);
        self.symbols.set_current_scope(old_scope);
    }

    /// Walk a compound statement's items inside its recorded scope.
    pub(super) fn gen_compound(&mut self, block: &mut CompoundStmt) {
        let Some(scope_id) = block.scope_id else {
            self.gen_block_items(block);
            return;
        };
        let old = self.symbols.set_current_scope(scope_id);
        self.gen_block_items(block);
        self.symbols.set_current_scope(old);
    }

    fn gen_block_items(&mut self, block: &mut CompoundStmt) {
        for item in &mut block.items {
            match item {
                BlockItem::Declaration(decl) => self.gen_local_declaration(decl),
                BlockItem::Statement(stmt) => self.gen_stmt(stmt),
            }
        }
    }

    /// The operand for a named symbol: enum constants fold, functions
    /// become labels, globals and statics address by name, and locals use
    /// their uniquified names.
    pub(super) fn symbol_operand(&self, name: &str) -> Operand {
        let Some((scope_id, sym)) = self.symbols.lookup_with_scope(name) else {
            return Operand::none();
        };
        match sym.kind {
            SymbolKind::EnumConstant => Operand::int_const_typed(sym.enum_value, Type::int()),
            SymbolKind::Function => Operand::label(name.to_string()),
            _ => {
                if scope_id == 0
                    || sym.storage == crate::frontend::parser::ast::StorageClass::Extern
                {
                    Operand::global(name.to_string(), Rc::clone(&sym.ty))
                } else {
                    Operand::variable(self.ir_name(scope_id, name), Rc::clone(&sym.ty))
                }
            }
        }
    }

    pub(super) fn symbol_type(&self, name: &str) -> Option<TypeRef> {
        self.symbols.lookup(name).map(|s| Rc::clone(&s.ty))
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::frontend::sema::SemanticAnalyzer;
    use crate::ir::ir::{GlobalInit, IrProgram, Opcode, Operand};
    use super::IrGenerator;

    pub(crate) fn lower(src: &str) -> IrProgram {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let mut unit = parser.parse_translation_unit();
        assert!(!parser.has_errors(), "parse errors: {:?}", parser.errors());
        let mut sema = SemanticAnalyzer::new();
        let ok = sema.analyze(&mut unit);
        assert!(ok, "sema errors: {:?}", sema.errors());
        let mut symbols = sema.into_symbol_table();
        IrGenerator::new(&mut symbols).generate(&mut unit)
    }

    fn func<'a>(program: &'a IrProgram, name: &str) -> &'a crate::ir::ir::FunctionIr {
        program
            .functions
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no function {}", name))
    }

    #[test]
    fn function_ends_with_return() {
        let program = lower("void f() { int x = 1; }");
        let f = func(&program, "f");
        assert_eq!(f.code.last().unwrap().opcode, Opcode::Return);
    }

    #[test]
    fn params_are_emitted_reversed() {
        let program = lower("int g(int a, int b, int c); int main() { return g(1, 2, 3); }");
        let main = func(&program, "main");
        let params: Vec<i64> = main
            .code
            .iter()
            .filter(|q| q.opcode == Opcode::Param)
            .map(|q| match &q.arg1 {
                Operand::IntConst { value, .. } => *value,
                other => panic!("unexpected param {:?}", other),
            })
            .collect();
        assert_eq!(params, vec![3, 2, 1]);
    }

    #[test]
    fn call_carries_argument_count() {
        let program = lower("int g(int a); int main() { return g(7); }");
        let main = func(&program, "main");
        let call = main
            .code
            .iter()
            .find(|q| q.opcode == Opcode::Call)
            .expect("call quad");
        assert!(matches!(&call.arg1, Operand::Label { name } if name == "g"));
        assert!(matches!(&call.arg2, Operand::IntConst { value: 1, .. }));
    }

    #[test]
    fn short_circuit_and_skips_second_operand() {
        let program = lower(
            "int side(void); int main() { return side() && side(); }",
        );
        let main = func(&program, "main");
        let first_call = main
            .code
            .iter()
            .position(|q| q.opcode == Opcode::Call)
            .unwrap();
        let second_call = main
            .code
            .iter()
            .rposition(|q| q.opcode == Opcode::Call)
            .unwrap();
        assert_ne!(first_call, second_call);
        // A conditional jump must sit between the two calls.
        assert!(main.code[first_call..second_call]
            .iter()
            .any(|q| q.opcode == Opcode::JumpFalse));
    }

    #[test]
    fn switch_lowers_to_dispatch_cascade() {
        let program = lower(
            "int main() { int x = 2; switch (x) { case 1: return 10; case 2: return 20; default: return 0; } }",
        );
        let main = func(&program, "main");
        let eq_count = main.code.iter().filter(|q| q.opcode == Opcode::Eq).count();
        assert_eq!(eq_count, 2, "one Eq per case label");
        // The dispatch block follows the body: the first Eq appears
        // after the last case label.
        let first_eq = main.code.iter().position(|q| q.opcode == Opcode::Eq).unwrap();
        let last_label = main
            .code
            .iter()
            .rposition(|q| {
                q.opcode == Opcode::Label
                    && matches!(&q.result, Operand::Label { name } if name.starts_with("case"))
            })
            .unwrap();
        assert!(first_eq > last_label);
    }

    #[test]
    fn pointer_addition_scales_by_element_size() {
        let program = lower("int main() { int a[5]; int *p = a; p = p + 2; return 0; }");
        let main = func(&program, "main");
        let scaled = main.code.iter().any(|q| {
            q.opcode == Opcode::Add
                && matches!(&q.arg2, Operand::IntConst { value: 8, .. })
        });
        assert!(scaled, "expected p + 2 to scale to 8 bytes:\n{}", program.listing());
    }

    #[test]
    fn pointer_difference_divides_by_element_size() {
        let program = lower("int main() { int a[5]; int *p = a; int *q = a; return p - q; }");
        let main = func(&program, "main");
        let divides = main.code.iter().any(|q| {
            q.opcode == Opcode::Div
                && matches!(&q.arg2, Operand::IntConst { value: 4, .. })
        });
        assert!(divides, "expected byte delta / 4:\n{}", program.listing());
    }

    #[test]
    fn subscript_goes_through_index_addr_and_load() {
        let program = lower("int main() { int a[3]; return a[1]; }");
        let main = func(&program, "main");
        let idx = main.code.iter().position(|q| q.opcode == Opcode::IndexAddr);
        assert!(idx.is_some());
        assert!(main.code[idx.unwrap()..]
            .iter()
            .any(|q| q.opcode == Opcode::Load));
    }

    #[test]
    fn member_access_uses_constant_offsets() {
        let program = lower(
            "struct P { int x; int y; }; int main() { struct P p; p.y = 3; return p.y; }",
        );
        let main = func(&program, "main");
        let offset4 = main.code.iter().any(|q| {
            q.opcode == Opcode::MemberAddr
                && matches!(&q.arg2, Operand::IntConst { value: 4, .. })
        });
        assert!(offset4, "expected member y at offset 4:\n{}", program.listing());
    }

    #[test]
    fn float_arithmetic_selects_float_opcodes() {
        let program = lower("int main() { double d = 0.1 + 0.2; return d > 0.2; }");
        let main = func(&program, "main");
        assert!(main.code.iter().any(|q| q.opcode == Opcode::FAdd));
        assert!(main.code.iter().any(|q| q.opcode == Opcode::FGt));
    }

    #[test]
    fn mixed_int_float_comparison_promotes() {
        let program = lower("int main() { double d = 1.5; return d > 1; }");
        let main = func(&program, "main");
        assert!(main.code.iter().any(|q| q.opcode == Opcode::FGt));
    }

    #[test]
    fn locals_are_uniquified_per_declaration() {
        let program = lower(
            "int main() { int x = 1; { int x = 2; } return x; }",
        );
        let main = func(&program, "main");
        let mut names: Vec<String> = main
            .code
            .iter()
            .filter(|q| q.opcode == Opcode::Assign)
            .filter_map(|q| match &q.result {
                Operand::Variable { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        names.dedup();
        assert_eq!(names.len(), 2, "shadowed locals must get distinct IR names");
    }

    #[test]
    fn enum_constant_folds_to_int_const() {
        let program = lower("enum E { A = 41 }; int main() { return A + 1; }");
        let main = func(&program, "main");
        assert!(main.code.iter().any(|q| {
            q.opcode == Opcode::Add
                && matches!(&q.arg1, Operand::IntConst { value: 41, .. })
        }));
    }

    #[test]
    fn string_literals_get_lc_labels() {
        let program = lower(
            "int puts(char *s); int main() { puts(\"hello\"); return 0; }",
        );
        assert_eq!(program.string_literals.len(), 1);
        assert!(program.string_literals[0].0.starts_with(".LC"));
        assert_eq!(program.string_literals[0].1, "hello");
    }

    #[test]
    fn global_scalar_initializer_flattens() {
        let program = lower("int g = 42;");
        let global = &program.globals[0];
        assert!(global.has_initializer);
        assert_eq!(
            global.init_values,
            vec![GlobalInit::Integer { value: 42, size: 4 }]
        );
    }

    #[test]
    fn global_char_array_from_string_expands_bytes() {
        let program = lower("char s[6] = \"hi\";");
        let global = &program.globals[0];
        assert_eq!(
            global.init_values,
            vec![
                GlobalInit::Integer { value: 'h' as i64, size: 1 },
                GlobalInit::Integer { value: 'i' as i64, size: 1 },
                GlobalInit::Zero { size: 4 },
            ]
        );
    }

    #[test]
    fn global_char_pointer_references_string_label() {
        let program = lower("char *s = \"hi\";");
        let global = &program.globals[0];
        assert_eq!(global.init_values.len(), 1);
        assert!(matches!(&global.init_values[0], GlobalInit::StringLabel(l) if l == ".LC0"));
    }

    #[test]
    fn global_struct_initializer_pads_interior_and_tail() {
        let program = lower("struct S { char c; int i; char t; }; struct S g = {1, 2, 3};");
        let global = &program.globals[0];
        assert_eq!(
            global.init_values,
            vec![
                GlobalInit::Integer { value: 1, size: 1 },
                GlobalInit::Zero { size: 3 },
                GlobalInit::Integer { value: 2, size: 4 },
                GlobalInit::Integer { value: 3, size: 1 },
                GlobalInit::Zero { size: 3 },
            ]
        );
    }

    #[test]
    fn global_address_initializer() {
        let program = lower("int x; int *p = &x;");
        let p = program.globals.iter().find(|g| g.name == "p").unwrap();
        assert_eq!(p.init_values, vec![GlobalInit::Address("x".to_string())]);
    }

    #[test]
    fn extern_global_emits_no_definition() {
        let program = lower("extern int shared;");
        let g = &program.globals[0];
        assert!(g.is_extern);
    }

    #[test]
    fn labels_unique_within_function() {
        let program = lower(
            "int main() { int i; for (i = 0; i < 3; i++) { if (i) continue; else break; } while (i) i--; return 0; }",
        );
        let main = func(&program, "main");
        let mut labels: Vec<String> = main
            .code
            .iter()
            .filter(|q| q.opcode == Opcode::Label)
            .map(|q| match &q.result {
                Operand::Label { name } => name.clone(),
                _ => unreachable!(),
            })
            .collect();
        let total = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(total, labels.len(), "duplicate labels in function IR");
    }

    #[test]
    fn jumps_reference_emitted_labels() {
        let program = lower(
            "int main() { int s = 0; for (int i = 0; i < 5; i++) s += i; return s; }",
        );
        let main = func(&program, "main");
        let defined: Vec<String> = main
            .code
            .iter()
            .filter(|q| q.opcode == Opcode::Label)
            .map(|q| q.result.to_string())
            .collect();
        for quad in &main.code {
            if matches!(quad.opcode, Opcode::Jump | Opcode::JumpTrue | Opcode::JumpFalse) {
                let target = quad.result.to_string();
                assert!(
                    defined.contains(&target),
                    "jump to undefined label {}",
                    target
                );
            }
        }
    }
}
