//! x86-64 AT&T emitter: translates the quadruple program into assembly
//! text organized as `.rodata` / `.data` / `.bss` / `.text` /
//! `.note.GNU-stack`.
//!
//! Values live in stack slots between quadruples; each translation loads
//! its operands into registers, operates, stores the result, and
//! releases what it allocated. Slots are 8-byte cells assigned lazily,
//! growing downward from rbp−40 (below the five saved callee-saved
//! registers). The prologue reserves a fixed 1024 bytes; see
//! `STACK_RESERVE`.

use std::collections::HashMap;

use log::debug;

use crate::ir::ir::{IrProgram, Opcode, Operand, Quadruple};
use super::regalloc::{Register, RegisterAllocator, XmmAllocator, XmmRegister};

/// Fixed per-function stack reservation. The emitter assigns slots as it
/// discovers operands, so the prologue cannot know the final frame size;
/// the reservation is sized generously instead.
pub const STACK_RESERVE: i64 = 1024;

/// Bytes occupied by the saved callee-saved registers below rbp.
const SAVED_REGS_BYTES: i64 = 40;

pub struct CodeGenerator<'a> {
    program: &'a IrProgram,
    pub(super) regs: RegisterAllocator,
    pub(super) xmms: XmmAllocator,
    pub(super) rodata: String,
    pub(super) data: String,
    pub(super) bss: String,
    pub(super) text: String,
    pub(super) current_function: String,
    local_offset: i64,
    locations: HashMap<String, i64>,
    pub(super) call_params: Vec<Operand>,
    float_labels: HashMap<u64, String>,
    float_order: Vec<(String, u64)>,
    float_counter: u32,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(program: &'a IrProgram) -> Self {
        Self {
            program,
            regs: RegisterAllocator::new(),
            xmms: XmmAllocator::new(),
            rodata: String::new(),
            data: String::new(),
            bss: String::new(),
            text: String::new(),
            current_function: String::new(),
            local_offset: -SAVED_REGS_BYTES,
            locations: HashMap::new(),
            call_params: Vec::new(),
            float_labels: HashMap::new(),
            float_order: Vec::new(),
            float_counter: 0,
        }
    }

    /// Produce the complete assembly text.
    pub fn generate(mut self) -> String {
        self.emit_string_literals();
        self.emit_global_data();

        let program = self.program;
        for func in &program.functions {
            self.emit_function(func);
        }

        // The float pool is only known after all functions ran.
        self.emit_float_pool();

        let mut out = String::new();
        out.push_str("# Generated by cddc\n");
        out.push_str("    .file \"output.s\"\n\n");
        if !self.rodata.is_empty() {
            out.push_str("    .section .rodata\n");
            out.push_str(&self.rodata);
            out.push('\n');
        }
        if !self.data.is_empty() {
            out.push_str("    .data\n");
            out.push_str(&self.data);
            out.push('\n');
        }
        if !self.bss.is_empty() {
            out.push_str("    .bss\n");
            out.push_str(&self.bss);
            out.push('\n');
        }
        out.push_str("    .text\n");
        out.push_str(&self.text);
        out.push_str("\n    .section .note.GNU-stack,\"\",@progbits\n");
        debug!("emitted {} bytes of assembly", out.len());
        out
    }

    /// The program reference with its full lifetime, detached from the
    /// borrow of `self` so section buffers can be written while walking.
    pub(super) fn program(&self) -> &'a IrProgram {
        self.program
    }

    /// Snapshot of the interned float pool in mint order.
    pub(super) fn float_pool_entries(&self) -> Vec<(String, u64)> {
        self.float_order.clone()
    }

    // ----- text emission helpers -----

    pub(super) fn emit(&mut self, line: &str) {
        self.text.push_str("    ");
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub(super) fn emit_raw_label(&mut self, label: &str) {
        self.text.push_str(label);
        self.text.push_str(":\n");
    }

    pub(super) fn emit_directive(&mut self, directive: &str) {
        self.text.push_str("    ");
        self.text.push_str(directive);
        self.text.push('\n');
    }

    pub(super) fn emit_comment(&mut self, comment: &str) {
        self.text.push_str("    # ");
        self.text.push_str(comment);
        self.text.push('\n');
    }

    /// Function-local label: prefixed with the function name so labels
    /// never collide across functions.
    fn local_label(&self, name: &str) -> String {
        format!(".{}_lbl_{}", self.current_function, name)
    }

    fn exit_label(&self) -> String {
        format!(".{}_exit", self.current_function)
    }

    // ----- stack slots -----

    fn allocate_stack(&mut self, size: i64, align: i64) -> i64 {
        self.local_offset -= size.max(1);
        let align = align.max(1);
        self.local_offset = -((-self.local_offset + align - 1) / align * align);
        self.local_offset
    }

    /// Lazily assigned 8-byte-aligned slot for a named value; aggregates
    /// get their full size.
    pub(super) fn slot_for(&mut self, name: &str, size: i64) -> i64 {
        if let Some(&off) = self.locations.get(name) {
            return off;
        }
        let off = self.allocate_stack(size.max(8), 8);
        self.locations.insert(name.to_string(), off);
        off
    }

    /// Pin a name to a fixed rbp-relative offset (stack parameters).
    pub(super) fn bind_slot(&mut self, name: &str, offset: i64) {
        self.locations.insert(name.to_string(), offset);
    }

    pub(super) fn operand_slot(&mut self, op: &Operand) -> i64 {
        match op {
            Operand::Temp { name, ty } | Operand::Variable { name, ty } => {
                let size = ty.size().max(8);
                self.slot_for(&name.clone(), size)
            }
            _ => 0,
        }
    }

    pub(super) fn operand_size(op: &Operand) -> i64 {
        op.ty().map(|t| t.size()).filter(|&s| s > 0).unwrap_or(8)
    }

    pub(super) fn size_suffix(size: i64) -> &'static str {
        match size {
            1 => "b",
            2 => "w",
            4 => "l",
            _ => "q",
        }
    }

    // ----- registers -----

    pub(super) fn alloc_gpr(&mut self) -> Register {
        self.regs.allocate().unwrap_or(Register::Rax)
    }

    pub(super) fn alloc_xmm(&mut self) -> XmmRegister {
        self.xmms.allocate().unwrap_or(XmmRegister::Xmm0)
    }

    /// Load any operand into a general-purpose register. Array-typed
    /// operands decay to their address; globals load with the width of
    /// their type.
    pub(super) fn load_to_register(&mut self, op: &Operand) -> Register {
        let reg = self.alloc_gpr();
        match op {
            Operand::IntConst { value, .. } => self.move_imm(*value, reg),
            Operand::FloatConst { value, .. } => {
                let label = self.float_label(*value);
                self.emit(&format!("movq {}(%rip), {}", label, reg.name(8)));
            }
            Operand::StringConst { label } => {
                let label = label.clone();
                self.emit(&format!("leaq {}(%rip), {}", label, reg.name(8)));
            }
            Operand::Label { name } => {
                let name = name.clone();
                self.emit(&format!("leaq {}(%rip), {}", name, reg.name(8)));
            }
            Operand::Global { name, ty } => {
                let name = name.clone();
                if ty.is_array() {
                    self.emit(&format!("leaq {}(%rip), {}", name, reg.name(8)));
                } else {
                    match ty.size() {
                        1 => self.emit(&format!("movzbl {}(%rip), {}", name, reg.name(4))),
                        2 => self.emit(&format!("movzwl {}(%rip), {}", name, reg.name(4))),
                        4 => self.emit(&format!("movslq {}(%rip), {}", name, reg.name(8))),
                        _ => self.emit(&format!("movq {}(%rip), {}", name, reg.name(8))),
                    }
                }
            }
            Operand::Temp { ty, .. } | Operand::Variable { ty, .. } => {
                let is_addr = ty.is_array();
                let slot = self.operand_slot(op);
                if is_addr {
                    self.emit(&format!("leaq {}(%rbp), {}", slot, reg.name(8)));
                } else {
                    self.emit(&format!("movq {}(%rbp), {}", slot, reg.name(8)));
                }
            }
            Operand::None => {
                self.emit(&format!("xorq {0}, {0}", reg.name(8)));
            }
        }
        reg
    }

    fn move_imm(&mut self, value: i64, reg: Register) {
        if value > i32::MAX as i64 || value < i32::MIN as i64 {
            self.emit(&format!("movabsq ${}, {}", value, reg.name(8)));
        } else {
            self.emit(&format!("movq ${}, {}", value, reg.name(8)));
        }
    }

    /// Store a register into the destination operand's home.
    pub(super) fn store_to_operand(&mut self, reg: Register, dest: &Operand) {
        match dest {
            Operand::Global { name, ty } => {
                let name = name.clone();
                let size = ty.size().max(1).min(8);
                self.emit(&format!(
                    "mov{} {}, {}(%rip)",
                    Self::size_suffix(size),
                    reg.name(size),
                    name
                ));
            }
            Operand::Temp { .. } | Operand::Variable { .. } => {
                let slot = self.operand_slot(dest);
                self.emit(&format!("movq {}, {}(%rbp)", reg.name(8), slot));
            }
            _ => {}
        }
    }

    // ----- float helpers -----

    /// Intern a float constant by bit pattern, minting an `.LF` label on
    /// first sight.
    pub(super) fn float_label(&mut self, value: f64) -> String {
        let bits = value.to_bits();
        if let Some(label) = self.float_labels.get(&bits) {
            return label.clone();
        }
        let label = format!(".LF{}", self.float_counter);
        self.float_counter += 1;
        self.float_labels.insert(bits, label.clone());
        self.float_order.push((label.clone(), bits));
        label
    }

    pub(super) fn load_to_xmm(&mut self, op: &Operand) -> XmmRegister {
        let xmm = self.alloc_xmm();
        match op {
            Operand::FloatConst { value, .. } => {
                let label = self.float_label(*value);
                self.emit(&format!("movsd {}(%rip), {}", label, xmm.name()));
            }
            Operand::IntConst { value, .. } => {
                let label = self.float_label(*value as f64);
                self.emit(&format!("movsd {}(%rip), {}", label, xmm.name()));
            }
            Operand::Global { name, .. } => {
                let name = name.clone();
                self.emit(&format!("movsd {}(%rip), {}", name, xmm.name()));
            }
            Operand::Temp { .. } | Operand::Variable { .. } => {
                let slot = self.operand_slot(op);
                self.emit(&format!("movsd {}(%rbp), {}", slot, xmm.name()));
            }
            _ => {
                self.emit(&format!("pxor {0}, {0}", xmm.name()));
            }
        }
        xmm
    }

    pub(super) fn store_from_xmm(&mut self, xmm: XmmRegister, dest: &Operand) {
        match dest {
            Operand::Global { name, .. } => {
                let name = name.clone();
                self.emit(&format!("movsd {}, {}(%rip)", xmm.name(), name));
            }
            _ => {
                let slot = self.operand_slot(dest);
                self.emit(&format!("movsd {}, {}(%rbp)", xmm.name(), slot));
            }
        }
    }

    // ----- function emission -----

    fn emit_function(&mut self, func: &crate::ir::ir::FunctionIr) {
        self.current_function = func.name.clone();
        self.locations.clear();
        self.local_offset = -SAVED_REGS_BYTES;
        self.regs = RegisterAllocator::new();
        self.xmms = XmmAllocator::new();

        self.emit_directive(&format!(".globl {}", func.name));
        self.emit_directive(&format!(".type {}, @function", func.name));
        self.emit_raw_label(&func.name);

        // Prologue: frame pointer, callee-saved set, fixed reservation.
        self.emit("pushq %rbp");
        self.emit("movq %rsp, %rbp");
        self.emit("pushq %rbx");
        self.emit("pushq %r12");
        self.emit("pushq %r13");
        self.emit("pushq %r14");
        self.emit("pushq %r15");
        self.emit(&format!("subq ${}, %rsp", STACK_RESERVE));

        self.spill_parameters(func);

        for quad in &func.code {
            self.translate_quad(quad);
        }

        let exit = self.exit_label();
        self.emit_raw_label(&exit);
        self.emit("leaq -40(%rbp), %rsp");
        self.emit("popq %r15");
        self.emit("popq %r14");
        self.emit("popq %r13");
        self.emit("popq %r12");
        self.emit("popq %rbx");
        self.emit("popq %rbp");
        self.emit("ret");
        self.emit_directive(&format!(".size {}, .-{}", func.name, func.name));
    }

    // ----- quad dispatch -----

    fn translate_quad(&mut self, quad: &Quadruple) {
        match quad.opcode {
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                self.translate_arithmetic(quad)
            }
            Opcode::Neg => self.translate_neg(quad),
            Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv => {
                self.translate_float_arithmetic(quad)
            }
            Opcode::FNeg => self.translate_float_neg(quad),
            Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor | Opcode::Shl | Opcode::Shr => {
                self.translate_bitwise(quad)
            }
            Opcode::BitNot => self.translate_bitnot(quad),
            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                self.translate_comparison(quad)
            }
            Opcode::FEq | Opcode::FNe | Opcode::FLt | Opcode::FLe | Opcode::FGt | Opcode::FGe => {
                self.translate_float_comparison(quad)
            }
            Opcode::LogicalAnd | Opcode::LogicalOr => self.translate_logical(quad),
            Opcode::LogicalNot => self.translate_logical_not(quad),
            Opcode::Assign => self.translate_assign(quad),
            Opcode::Load => self.translate_load(quad),
            Opcode::Store => self.translate_store(quad),
            Opcode::LoadAddr => self.translate_load_addr(quad),
            Opcode::IndexAddr => self.translate_index_addr(quad),
            Opcode::MemberAddr => self.translate_member_addr(quad),
            Opcode::Label => {
                let label = self.local_label(&operand_name(&quad.result));
                self.emit_raw_label(&label);
            }
            Opcode::Jump => {
                let label = self.local_label(&operand_name(&quad.result));
                self.emit(&format!("jmp {}", label));
            }
            Opcode::JumpTrue | Opcode::JumpFalse => self.translate_cond_jump(quad),
            Opcode::Param => self.call_params.push(quad.arg1.clone()),
            Opcode::Call => self.translate_call(quad),
            Opcode::Return => self.translate_return(quad),
            Opcode::IntToFloat => {
                let reg = self.load_to_register(&quad.arg1);
                let xmm = self.alloc_xmm();
                self.emit(&format!("cvtsi2sdq {}, {}", reg.name(8), xmm.name()));
                self.store_from_xmm(xmm, &quad.result);
                self.regs.release(reg);
                self.xmms.release(xmm);
            }
            Opcode::FloatToInt => {
                let xmm = self.load_to_xmm(&quad.arg1);
                let reg = self.alloc_gpr();
                self.emit(&format!("cvttsd2siq {}, {}", xmm.name(), reg.name(8)));
                self.store_to_operand(reg, &quad.result);
                self.xmms.release(xmm);
                self.regs.release(reg);
            }
            Opcode::IntExtend => {
                let src_size = Self::operand_size(&quad.arg1);
                let reg = self.load_to_register(&quad.arg1);
                match src_size {
                    1 => self.emit(&format!("movsbq {}, {}", reg.name(1), reg.name(8))),
                    2 => self.emit(&format!("movswq {}, {}", reg.name(2), reg.name(8))),
                    4 => self.emit(&format!("movslq {}, {}", reg.name(4), reg.name(8))),
                    _ => {}
                }
                self.store_to_operand(reg, &quad.result);
                self.regs.release(reg);
            }
            Opcode::IntTrunc => {
                // Normalize the 8-byte cell to the narrower width by
                // re-extending from the target size.
                let dst_size = Self::operand_size(&quad.result);
                let reg = self.load_to_register(&quad.arg1);
                match dst_size {
                    1 => self.emit(&format!("movsbq {}, {}", reg.name(1), reg.name(8))),
                    2 => self.emit(&format!("movswq {}, {}", reg.name(2), reg.name(8))),
                    4 => self.emit(&format!("movslq {}, {}", reg.name(4), reg.name(8))),
                    _ => {}
                }
                self.store_to_operand(reg, &quad.result);
                self.regs.release(reg);
            }
            Opcode::PtrToInt | Opcode::IntToPtr => {
                let reg = self.load_to_register(&quad.arg1);
                self.store_to_operand(reg, &quad.result);
                self.regs.release(reg);
            }
            Opcode::Nop => self.emit("nop"),
            Opcode::Comment => {
                let text = operand_name(&quad.arg1);
                self.emit_comment(&text);
            }
        }
    }

    // ----- integer arithmetic -----

    fn translate_arithmetic(&mut self, quad: &Quadruple) {
        let left = self.load_to_register(&quad.arg1);
        let right = self.load_to_register(&quad.arg2);
        match quad.opcode {
            Opcode::Add => self.emit(&format!("addq {}, {}", right.name(8), left.name(8))),
            Opcode::Sub => self.emit(&format!("subq {}, {}", right.name(8), left.name(8))),
            Opcode::Mul => self.emit(&format!("imulq {}, {}", right.name(8), left.name(8))),
            Opcode::Div | Opcode::Mod => {
                self.emit(&format!("movq {}, %rax", left.name(8)));
                self.emit("cqto");
                self.emit(&format!("idivq {}", right.name(8)));
                let src = if quad.opcode == Opcode::Div { "%rax" } else { "%rdx" };
                self.emit(&format!("movq {}, {}", src, left.name(8)));
            }
            _ => {}
        }
        self.store_to_operand(left, &quad.result);
        self.regs.release(left);
        self.regs.release(right);
    }

    fn translate_neg(&mut self, quad: &Quadruple) {
        let reg = self.load_to_register(&quad.arg1);
        self.emit(&format!("negq {}", reg.name(8)));
        self.store_to_operand(reg, &quad.result);
        self.regs.release(reg);
    }

    fn translate_bitwise(&mut self, quad: &Quadruple) {
        let left = self.load_to_register(&quad.arg1);
        if matches!(quad.opcode, Opcode::Shl | Opcode::Shr) {
            // The count must sit in %cl; shuffle the value away if the
            // allocator handed us RCX for it.
            let left = if left == Register::Rcx {
                let other = self.alloc_gpr();
                self.emit(&format!("movq %rcx, {}", other.name(8)));
                self.regs.release(Register::Rcx);
                other
            } else {
                left
            };
            let count = self.load_to_register(&quad.arg2);
            if count != Register::Rcx {
                self.emit(&format!("movq {}, %rcx", count.name(8)));
            }
            let mnem = if quad.opcode == Opcode::Shl { "salq" } else { "sarq" };
            self.emit(&format!("{} %cl, {}", mnem, left.name(8)));
            self.regs.release(count);
            self.store_to_operand(left, &quad.result);
            self.regs.release(left);
            return;
        }

        let right = self.load_to_register(&quad.arg2);
        let mnem = match quad.opcode {
            Opcode::BitAnd => "andq",
            Opcode::BitOr => "orq",
            _ => "xorq",
        };
        self.emit(&format!("{} {}, {}", mnem, right.name(8), left.name(8)));
        self.store_to_operand(left, &quad.result);
        self.regs.release(left);
        self.regs.release(right);
    }

    fn translate_bitnot(&mut self, quad: &Quadruple) {
        let reg = self.load_to_register(&quad.arg1);
        self.emit(&format!("notq {}", reg.name(8)));
        self.store_to_operand(reg, &quad.result);
        self.regs.release(reg);
    }

    // ----- comparisons and logic -----

    fn translate_comparison(&mut self, quad: &Quadruple) {
        let left = self.load_to_register(&quad.arg1);
        let right = self.load_to_register(&quad.arg2);
        self.emit(&format!("cmpq {}, {}", right.name(8), left.name(8)));
        let setcc = match quad.opcode {
            Opcode::Lt => "setl",
            Opcode::Gt => "setg",
            Opcode::Le => "setle",
            Opcode::Ge => "setge",
            Opcode::Eq => "sete",
            _ => "setne",
        };
        self.emit(&format!("{} {}", setcc, left.name(1)));
        self.emit(&format!("movzbl {}, {}", left.name(1), left.name(4)));
        self.store_to_operand(left, &quad.result);
        self.regs.release(left);
        self.regs.release(right);
    }

    fn translate_float_comparison(&mut self, quad: &Quadruple) {
        let left = self.load_to_xmm(&quad.arg1);
        let right = self.load_to_xmm(&quad.arg2);
        let dest = self.alloc_gpr();
        // Clear first: setcc writes only the low byte. NaN is treated as
        // unordered-false; the parity flag is not consulted.
        self.emit(&format!("xorl {0}, {0}", dest.name(4)));
        self.emit(&format!("ucomisd {}, {}", right.name(), left.name()));
        let setcc = match quad.opcode {
            Opcode::FGt => "seta",
            Opcode::FGe => "setae",
            Opcode::FLt => "setb",
            Opcode::FLe => "setbe",
            Opcode::FEq => "sete",
            _ => "setne",
        };
        self.emit(&format!("{} {}", setcc, dest.name(1)));
        self.store_to_operand(dest, &quad.result);
        self.xmms.release(left);
        self.xmms.release(right);
        self.regs.release(dest);
    }

    fn translate_logical(&mut self, quad: &Quadruple) {
        let left = self.load_to_register(&quad.arg1);
        let right = self.load_to_register(&quad.arg2);
        self.emit(&format!("testq {0}, {0}", left.name(8)));
        self.emit(&format!("setne {}", left.name(1)));
        self.emit(&format!("testq {0}, {0}", right.name(8)));
        self.emit(&format!("setne {}", right.name(1)));
        let mnem = if quad.opcode == Opcode::LogicalAnd { "andb" } else { "orb" };
        self.emit(&format!("{} {}, {}", mnem, right.name(1), left.name(1)));
        self.emit(&format!("movzbq {}, {}", left.name(1), left.name(8)));
        self.store_to_operand(left, &quad.result);
        self.regs.release(left);
        self.regs.release(right);
    }

    fn translate_logical_not(&mut self, quad: &Quadruple) {
        let reg = self.load_to_register(&quad.arg1);
        self.emit(&format!("testq {0}, {0}", reg.name(8)));
        self.emit(&format!("sete {}", reg.name(1)));
        self.emit(&format!("movzbq {}, {}", reg.name(1), reg.name(8)));
        self.store_to_operand(reg, &quad.result);
        self.regs.release(reg);
    }

    // ----- data movement -----

    fn translate_assign(&mut self, quad: &Quadruple) {
        let size = Self::operand_size(&quad.arg1).max(Self::operand_size(&quad.result));
        if size > 8 {
            // Aggregate copy, slot to slot through R10.
            let src = self.operand_slot(&quad.arg1);
            let dst = self.operand_slot(&quad.result);
            self.copy_slots(src, dst, size);
            return;
        }
        if quad.arg1.is_float() || quad.result.ty().is_some_and(|t| t.is_float()) {
            let xmm = self.load_to_xmm(&quad.arg1);
            self.store_from_xmm(xmm, &quad.result);
            self.xmms.release(xmm);
            return;
        }
        let reg = self.load_to_register(&quad.arg1);
        self.store_to_operand(reg, &quad.result);
        self.regs.release(reg);
    }

    fn translate_load(&mut self, quad: &Quadruple) {
        let size = Self::operand_size(&quad.result);
        if size > 8 {
            // Aggregate load: address to R11, copy through R10.
            let addr = self.load_to_register(&quad.arg1);
            self.emit(&format!("movq {}, %r11", addr.name(8)));
            self.regs.release(addr);
            let dst = self.operand_slot(&quad.result);
            self.copy_from_pointer(dst, size);
            return;
        }
        if quad.result.ty().is_some_and(|t| t.is_float()) && size == 8 {
            let addr = self.load_to_register(&quad.arg1);
            let xmm = self.alloc_xmm();
            self.emit(&format!("movsd ({}), {}", addr.name(8), xmm.name()));
            self.store_from_xmm(xmm, &quad.result);
            self.regs.release(addr);
            self.xmms.release(xmm);
            return;
        }
        let addr = self.load_to_register(&quad.arg1);
        match size {
            1 => self.emit(&format!("movzbl ({}), {}", addr.name(8), addr.name(4))),
            2 => self.emit(&format!("movzwl ({}), {}", addr.name(8), addr.name(4))),
            4 => self.emit(&format!("movslq ({}), {}", addr.name(8), addr.name(8))),
            _ => self.emit(&format!("movq ({}), {}", addr.name(8), addr.name(8))),
        }
        self.store_to_operand(addr, &quad.result);
        self.regs.release(addr);
    }

    fn translate_store(&mut self, quad: &Quadruple) {
        // The stored width follows the pointee of the address operand.
        let size = quad
            .result
            .ty()
            .and_then(|t| t.pointee())
            .map(|t| t.size())
            .filter(|&s| s > 0)
            .unwrap_or_else(|| Self::operand_size(&quad.arg1));

        if size > 8 {
            let addr = self.load_to_register(&quad.result);
            self.emit(&format!("movq {}, %r11", addr.name(8)));
            self.regs.release(addr);
            let src = self.operand_slot(&quad.arg1);
            self.copy_to_pointer(src, size);
            return;
        }

        if quad.arg1.is_float() && size == 8 {
            let xmm = self.load_to_xmm(&quad.arg1);
            let addr = self.load_to_register(&quad.result);
            self.emit(&format!("movsd {}, ({})", xmm.name(), addr.name(8)));
            self.xmms.release(xmm);
            self.regs.release(addr);
            return;
        }

        let val = self.load_to_register(&quad.arg1);
        let addr = self.load_to_register(&quad.result);
        self.emit(&format!(
            "mov{} {}, ({})",
            Self::size_suffix(size),
            val.name(size),
            addr.name(8)
        ));
        self.regs.release(val);
        self.regs.release(addr);
    }

    fn translate_load_addr(&mut self, quad: &Quadruple) {
        let reg = self.alloc_gpr();
        match &quad.arg1 {
            Operand::Global { name, .. } => {
                let name = name.clone();
                self.emit(&format!("leaq {}(%rip), {}", name, reg.name(8)));
            }
            Operand::StringConst { label } => {
                let label = label.clone();
                self.emit(&format!("leaq {}(%rip), {}", label, reg.name(8)));
            }
            Operand::Label { name } => {
                let name = name.clone();
                self.emit(&format!("leaq {}(%rip), {}", name, reg.name(8)));
            }
            _ => {
                let slot = self.operand_slot(&quad.arg1);
                self.emit(&format!("leaq {}(%rbp), {}", slot, reg.name(8)));
            }
        }
        self.store_to_operand(reg, &quad.result);
        self.regs.release(reg);
    }

    fn translate_index_addr(&mut self, quad: &Quadruple) {
        let base = self.load_to_register(&quad.arg1);
        let index = self.load_to_register(&quad.arg2);
        let elem_size = quad
            .result
            .ty()
            .and_then(|t| t.pointee())
            .map(|t| t.size())
            .filter(|&s| s > 0)
            .unwrap_or(8);
        if elem_size != 1 {
            self.emit(&format!("imulq ${}, {}", elem_size, index.name(8)));
        }
        self.emit(&format!("addq {}, {}", index.name(8), base.name(8)));
        self.store_to_operand(base, &quad.result);
        self.regs.release(base);
        self.regs.release(index);
    }

    fn translate_member_addr(&mut self, quad: &Quadruple) {
        let base = self.load_to_register(&quad.arg1);
        if let Operand::IntConst { value, .. } = &quad.arg2 {
            if *value != 0 {
                self.emit(&format!("addq ${}, {}", value, base.name(8)));
            }
        }
        self.store_to_operand(base, &quad.result);
        self.regs.release(base);
    }

    // ----- float arithmetic -----

    fn translate_float_arithmetic(&mut self, quad: &Quadruple) {
        let left = self.load_to_xmm(&quad.arg1);
        let right = self.load_to_xmm(&quad.arg2);
        let mnem = match quad.opcode {
            Opcode::FAdd => "addsd",
            Opcode::FSub => "subsd",
            Opcode::FMul => "mulsd",
            _ => "divsd",
        };
        self.emit(&format!("{} {}, {}", mnem, right.name(), left.name()));
        self.store_from_xmm(left, &quad.result);
        self.xmms.release(left);
        self.xmms.release(right);
    }

    fn translate_float_neg(&mut self, quad: &Quadruple) {
        let val = self.load_to_xmm(&quad.arg1);
        // Flip the sign bit with the -0.0 mask from the float pool.
        let mask_label = self.float_label(-0.0);
        let mask = self.alloc_xmm();
        self.emit(&format!("movsd {}(%rip), {}", mask_label, mask.name()));
        self.emit(&format!("xorpd {}, {}", mask.name(), val.name()));
        self.store_from_xmm(val, &quad.result);
        self.xmms.release(val);
        self.xmms.release(mask);
    }

    // ----- control flow -----

    fn translate_cond_jump(&mut self, quad: &Quadruple) {
        let reg = self.load_to_register(&quad.arg1);
        self.emit(&format!("testq {0}, {0}", reg.name(8)));
        let label = self.local_label(&operand_name(&quad.result));
        let mnem = if quad.opcode == Opcode::JumpTrue { "jnz" } else { "jz" };
        self.emit(&format!("{} {}", mnem, label));
        self.regs.release(reg);
    }

    // ----- block copies (aggregates) -----

    /// Copy `size` bytes between two rbp-relative slots through R10.
    pub(super) fn copy_slots(&mut self, src: i64, dst: i64, size: i64) {
        let mut offset = 0;
        while offset < size {
            let chunk = size - offset;
            if chunk >= 8 {
                self.emit(&format!("movq {}(%rbp), %r10", src + offset));
                self.emit(&format!("movq %r10, {}(%rbp)", dst + offset));
                offset += 8;
            } else if chunk >= 4 {
                self.emit(&format!("movl {}(%rbp), %r10d", src + offset));
                self.emit(&format!("movl %r10d, {}(%rbp)", dst + offset));
                offset += 4;
            } else {
                self.emit(&format!("movb {}(%rbp), %r10b", src + offset));
                self.emit(&format!("movb %r10b, {}(%rbp)", dst + offset));
                offset += 1;
            }
        }
    }

    /// Copy `size` bytes from the address in R11 into a slot.
    fn copy_from_pointer(&mut self, dst: i64, size: i64) {
        let mut offset = 0;
        while offset < size {
            let chunk = size - offset;
            if chunk >= 8 {
                self.emit(&format!("movq {}(%r11), %r10", offset));
                self.emit(&format!("movq %r10, {}(%rbp)", dst + offset));
                offset += 8;
            } else if chunk >= 4 {
                self.emit(&format!("movl {}(%r11), %r10d", offset));
                self.emit(&format!("movl %r10d, {}(%rbp)", dst + offset));
                offset += 4;
            } else {
                self.emit(&format!("movb {}(%r11), %r10b", offset));
                self.emit(&format!("movb %r10b, {}(%rbp)", dst + offset));
                offset += 1;
            }
        }
    }

    /// Copy `size` bytes from a slot out through the address in R11.
    fn copy_to_pointer(&mut self, src: i64, size: i64) {
        let mut offset = 0;
        while offset < size {
            let chunk = size - offset;
            if chunk >= 8 {
                self.emit(&format!("movq {}(%rbp), %r10", src + offset));
                self.emit(&format!("movq %r10, {}(%r11)", offset));
                offset += 8;
            } else if chunk >= 4 {
                self.emit(&format!("movl {}(%rbp), %r10d", src + offset));
                self.emit(&format!("movl %r10d, {}(%r11)", offset));
                offset += 4;
            } else {
                self.emit(&format!("movb {}(%rbp), %r10b", src + offset));
                self.emit(&format!("movb %r10b, {}(%r11)", offset));
                offset += 1;
            }
        }
    }
}

/// Text payload of label/name operands.
fn operand_name(op: &Operand) -> String {
    match op {
        Operand::Label { name } | Operand::Global { name, .. } => name.clone(),
        Operand::Temp { name, .. } | Operand::Variable { name, .. } => name.clone(),
        Operand::StringConst { label } => label.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::frontend::sema::SemanticAnalyzer;
    use crate::ir::IrGenerator;
    use super::CodeGenerator;

    pub(crate) fn compile(src: &str) -> String {
        let mut parser = Parser::new(Lexer::new(src, "t.cdd"));
        let mut unit = parser.parse_translation_unit();
        assert!(!parser.has_errors(), "parse errors: {:?}", parser.errors());
        let mut sema = SemanticAnalyzer::new();
        assert!(sema.analyze(&mut unit), "sema errors: {:?}", sema.errors());
        let mut symbols = sema.into_symbol_table();
        let program = IrGenerator::new(&mut symbols).generate(&mut unit);
        CodeGenerator::new(&program).generate()
    }

    #[test]
    fn prologue_and_epilogue_shape() {
        let asm = compile("int main() { return 0; }");
        for line in [
            "pushq %rbp",
            "movq %rsp, %rbp",
            "pushq %rbx",
            "pushq %r12",
            "pushq %r13",
            "pushq %r14",
            "pushq %r15",
            "subq $1024, %rsp",
            "leaq -40(%rbp), %rsp",
            "popq %r15",
            "popq %rbx",
            "popq %rbp",
            "ret",
        ] {
            assert!(asm.contains(line), "missing {:?} in:\n{}", line, asm);
        }
        assert!(asm.contains(".main_exit:"));
        assert!(asm.contains(".globl main"));
        assert!(asm.contains(".type main, @function"));
        assert!(asm.contains(".size main, .-main"));
    }

    #[test]
    fn section_order_is_stable() {
        let asm = compile(
            "int g = 1; int u; int main() { return g + u; }",
        );
        let data = asm.find("    .data").expect(".data section");
        let bss = asm.find("    .bss").expect(".bss section");
        let text = asm.find("    .text").expect(".text section");
        let note = asm.find(".note.GNU-stack").expect("GNU-stack note");
        assert!(data < bss && bss < text && text < note);
    }

    #[test]
    fn string_literal_in_rodata_with_escapes() {
        let asm = compile(
            "int puts(char *s); int main() { puts(\"hi\\n\"); return 0; }",
        );
        assert!(asm.contains(".section .rodata"));
        assert!(asm.contains(".LC0:"));
        assert!(asm.contains(".string \"hi\\n\""));
        assert!(asm.contains("leaq .LC0(%rip), %rdi"));
    }

    #[test]
    fn variadic_call_sets_al_to_xmm_count() {
        let asm = compile(
            "int printf(char *fmt, ...); int main() { printf(\"%f\", 1.5); return 0; }",
        );
        assert!(asm.contains("movl $1, %eax"), "AL must count XMM args:\n{}", asm);
        assert!(asm.contains("movsd .LF"), "float arg loads from the pool:\n{}", asm);
        assert!(asm.contains("call printf"));
    }

    #[test]
    fn int_only_call_clears_al() {
        let asm = compile(
            "int printf(char *fmt, ...); int main() { printf(\"%d\", 7); return 0; }",
        );
        assert!(asm.contains("xorl %eax, %eax"));
    }

    #[test]
    fn first_six_int_args_use_abi_registers() {
        let asm = compile(
            "int f(int a, int b, int c, int d, int e, int g); \
             int main() { return f(1, 2, 3, 4, 5, 6); }",
        );
        for reg in ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"] {
            assert!(
                asm.contains(&format!("movq $")) && asm.contains(reg),
                "missing ABI register {} in:\n{}",
                reg,
                asm
            );
        }
    }

    #[test]
    fn nine_arg_call_pushes_stack_args_and_realigns() {
        let asm = compile(
            "int sum9(int a, int b, int c, int d, int e, int f, int g, int h, int i); \
             int main() { return sum9(1, 2, 3, 4, 5, 6, 7, 8, 9); }",
        );
        // Three stack args: odd count forces an 8-byte realignment and
        // a 32-byte cleanup.
        assert!(asm.contains("subq $8, %rsp"), "odd stack args realign:\n{}", asm);
        assert!(asm.contains("pushq"), "stack args are pushed:\n{}", asm);
        assert!(asm.contains("addq $32, %rsp"), "cleanup after call:\n{}", asm);
    }

    #[test]
    fn callee_spills_parameters_to_slots() {
        let asm = compile("int id(int x) { return x; }");
        assert!(asm.contains("movq %rdi, "), "first int param spills:\n{}", asm);
    }

    #[test]
    fn stack_parameters_read_from_positive_offsets() {
        let asm = compile(
            "int pick(int a, int b, int c, int d, int e, int f, int g) { return g; } \
             int main() { return pick(0, 0, 0, 0, 0, 0, 9); }",
        );
        assert!(asm.contains("movq 16(%rbp)"), "7th param at rbp+16:\n{}", asm);
    }

    #[test]
    fn float_params_arrive_in_xmm_and_spill() {
        let asm = compile("double id(double d) { return d; }");
        assert!(asm.contains("movsd %xmm0, "), "float param spills:\n{}", asm);
    }

    #[test]
    fn float_return_goes_through_xmm0() {
        let asm = compile("double half(void) { return 0.5; }");
        assert!(asm.contains("%xmm0"), "float return uses XMM0:\n{}", asm);
        assert!(asm.contains(".LF0:"), "0.5 interned in the float pool:\n{}", asm);
    }

    #[test]
    fn four_byte_call_result_sign_extends() {
        let asm = compile("int f(void); int main() { return f(); }");
        assert!(asm.contains("cltq"), "4-byte return sign-extends:\n{}", asm);
    }

    #[test]
    fn float_compare_uses_ucomisd_without_parity() {
        let asm = compile(
            "int main() { double d = 0.3; return d > 0.29 ? 1 : 0; }",
        );
        assert!(asm.contains("ucomisd"));
        assert!(asm.contains("seta"));
        assert!(!asm.contains("jp "), "no parity check by design choice:\n{}", asm);
    }

    #[test]
    fn float_negation_xors_sign_mask() {
        let asm = compile("double neg(double d) { return -d; }");
        assert!(asm.contains("xorpd"), "sign flip via xorpd:\n{}", asm);
        // -0.0 lives in the pool: bit pattern 1 << 63.
        assert!(asm.contains(&format!(".quad {}", (-0.0f64).to_bits())));
    }

    #[test]
    fn division_uses_cqto_idivq() {
        let asm = compile("int main() { int a = 7; int b = 2; return a / b % b; }");
        assert!(asm.contains("cqto"));
        assert!(asm.contains("idivq"));
    }

    #[test]
    fn shifts_go_through_cl() {
        let asm = compile("int main() { int a = 1; int b = 3; return a << b; }");
        assert!(asm.contains("salq %cl,"));
    }

    #[test]
    fn comparisons_setcc_and_zero_extend() {
        let asm = compile("int main() { int a = 1; return a < 2; }");
        assert!(asm.contains("cmpq"));
        assert!(asm.contains("setl"));
        assert!(asm.contains("movzbl"));
    }

    #[test]
    fn conversions_emit_expected_instructions() {
        let asm = compile(
            "int main() { int i = 3; double d = i; int j = d; return j; }",
        );
        assert!(asm.contains("cvtsi2sdq"));
        assert!(asm.contains("cvttsd2siq"));
    }

    #[test]
    fn labels_are_function_prefixed() {
        let asm = compile(
            "int f(int x) { if (x) return 1; return 0; } \
             int main() { if (f(1)) return 1; return 0; }",
        );
        assert!(asm.contains(".f_lbl_"));
        assert!(asm.contains(".main_lbl_"));
    }

    #[test]
    fn initialized_global_lands_in_data_with_value() {
        let asm = compile("int g = 42; int main() { return g; }");
        assert!(asm.contains("    .data"));
        assert!(asm.contains("g:"));
        assert!(asm.contains(".long 42"));
    }

    #[test]
    fn uninitialized_global_lands_in_bss() {
        let asm = compile("int u; int main() { return u; }");
        assert!(asm.contains("    .bss"));
        assert!(asm.contains(".zero 4"));
    }

    #[test]
    fn extern_global_emits_no_definition() {
        let asm = compile("extern int shared; int main() { return shared; }");
        assert!(!asm.contains("shared:"));
        assert!(asm.contains("shared(%rip)"));
    }

    #[test]
    fn aggregate_assignment_copies_blockwise() {
        let asm = compile(
            "struct Big { long a; long b; long c; }; \
             int main() { struct Big x; struct Big y; x.a = 1; y = x; return (int)y.a; }",
        );
        assert!(asm.contains("%r10"), "aggregate copy uses R10:\n{}", asm);
    }

    #[test]
    fn small_aggregate_returns_in_rax_rdx() {
        let asm = compile(
            "struct Pair { long a; long b; }; \
             struct Pair make(void) { struct Pair p; p.a = 1; p.b = 2; return p; } \
             int main() { struct Pair p = make(); return (int)p.b; }",
        );
        assert!(asm.contains("%rdx"), "high half through RDX:\n{}", asm);
    }
}
