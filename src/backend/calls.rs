//! System V AMD64 call sequence and parameter marshalling.
//!
//! Entry: the first six non-float parameters arrive in RDI, RSI, RDX,
//! RCX, R8, R9 and the first eight float parameters in XMM0–XMM7; the
//! prologue spills each into a local slot so the body treats every
//! parameter as a stack local. Excess parameters sit at rbp+16 upward.
//!
//! Call: accumulated `Param` operands are reversed to source order,
//! classified into integer and XMM slots, stack arguments are pushed
//! right-to-left with an 8-byte realignment when their count is odd, AL
//! receives the XMM slot count for variadic callees, and the return
//! value is collected from XMM0 / RAX (with cltq for 4-byte integers) /
//! RAX:RDX for 9–16 byte aggregates.

use crate::ir::ir::{FunctionIr, Operand, Quadruple};
use super::codegen::CodeGenerator;
use super::regalloc::{Register, XmmRegister};

const INT_ARG_REGS: [Register; 6] = [
    Register::Rdi,
    Register::Rsi,
    Register::Rdx,
    Register::Rcx,
    Register::R8,
    Register::R9,
];

impl CodeGenerator<'_> {
    /// Spill register parameters into local slots at function entry.
    pub(super) fn spill_parameters(&mut self, func: &FunctionIr) {
        let mut int_slot = 0usize;
        let mut float_slot = 0usize;
        let mut stack_offset = 16i64;

        for (name, ty) in &func.params {
            let size = ty.size().max(8);
            let is_float = ty.is_float();
            if is_float && float_slot < 8 {
                let slot = self.slot_for(name, size);
                let xmm = XmmRegister::arg_registers()[float_slot];
                self.emit(&format!("movsd {}, {}(%rbp)", xmm.name(), slot));
                float_slot += 1;
            } else if !is_float && int_slot < 6 {
                let slot = self.slot_for(name, size);
                let reg = INT_ARG_REGS[int_slot];
                self.emit(&format!("movq {}, {}(%rbp)", reg.name(8), slot));
                int_slot += 1;
            } else {
                // Stack parameter: use the caller's slot directly.
                self.bind_slot(name, stack_offset);
                stack_offset += 8;
            }
        }
    }

    pub(super) fn translate_call(&mut self, quad: &Quadruple) {
        // 1. The lowering pushed Params in reverse source order.
        let mut args = std::mem::take(&mut self.call_params);
        args.reverse();

        // 2. Classify into integer and XMM slots; the rest spill to the
        // stack.
        let mut int_args: Vec<&Operand> = Vec::new();
        let mut float_args: Vec<&Operand> = Vec::new();
        let mut stack_args: Vec<&Operand> = Vec::new();
        for arg in &args {
            if arg.is_float() {
                if float_args.len() < 8 {
                    float_args.push(arg);
                } else {
                    stack_args.push(arg);
                }
            } else if int_args.len() < 6 {
                int_args.push(arg);
            } else {
                stack_args.push(arg);
            }
        }

        // 3. Keep RSP 16-byte aligned at the call: the call pushes 8, so
        // an odd number of stack arguments needs one filler slot.
        let misaligned = stack_args.len() % 2 != 0;
        if misaligned {
            self.emit("subq $8, %rsp");
        }

        // 4. Push stack arguments right-to-left.
        for arg in stack_args.iter().rev() {
            let reg = self.load_to_register(arg);
            self.emit(&format!("pushq {}", reg.name(8)));
            self.regs.release(reg);
        }

        // 5. Load register arguments into their ABI slots.
        for (i, arg) in int_args.iter().enumerate() {
            self.load_into_arg_register(arg, INT_ARG_REGS[i]);
        }
        for (i, arg) in float_args.iter().enumerate() {
            self.load_into_xmm_arg(arg, XmmRegister::arg_registers()[i]);
        }

        // 6. AL carries the XMM slot count for variadic callees.
        if float_args.is_empty() {
            self.emit("xorl %eax, %eax");
        } else {
            self.emit(&format!("movl ${}, %eax", float_args.len()));
        }

        // 7. Direct or indirect call.
        match &quad.arg1 {
            Operand::Label { name } => {
                let name = name.clone();
                self.emit(&format!("call {}", name));
            }
            other => {
                let reg = self.load_to_register(other);
                self.emit(&format!("call *{}", reg.name(8)));
                self.regs.release(reg);
            }
        }

        // 8. Drop the stack arguments (and the alignment filler).
        let mut cleanup = stack_args.len() as i64 * 8;
        if misaligned {
            cleanup += 8;
        }
        if cleanup > 0 {
            self.emit(&format!("addq ${}, %rsp", cleanup));
        }

        self.regs.release_all_caller_saved();
        self.xmms.release_all_caller_saved();

        // 9. Collect the return value.
        if !quad.result.is_none() {
            let ret_ty = quad.result.ty();
            let size = Self::operand_size(&quad.result);
            if ret_ty.as_ref().is_some_and(|t| t.is_float()) {
                let slot = self.operand_slot(&quad.result);
                self.emit(&format!("movsd %xmm0, {}(%rbp)", slot));
            } else if size > 8 && size <= 16 {
                // Aggregate return: low half in RAX, high half in RDX.
                let slot = self.operand_slot(&quad.result);
                self.emit(&format!("movq %rax, {}(%rbp)", slot));
                self.emit(&format!("movq %rdx, {}(%rbp)", slot + 8));
            } else if size == 4 {
                self.emit("cltq");
                self.store_to_operand(Register::Rax, &quad.result);
            } else {
                self.store_to_operand(Register::Rax, &quad.result);
            }
        }
    }

    pub(super) fn translate_return(&mut self, quad: &Quadruple) {
        if !quad.arg1.is_none() {
            let size = Self::operand_size(&quad.arg1);
            if quad.arg1.is_float() {
                let xmm = self.load_to_xmm(&quad.arg1);
                if xmm != XmmRegister::Xmm0 {
                    self.emit(&format!("movsd {}, %xmm0", xmm.name()));
                }
                self.xmms.release(xmm);
            } else if size > 8 && size <= 16 {
                let slot = self.operand_slot(&quad.arg1);
                self.emit(&format!("movq {}(%rbp), %rax", slot));
                self.emit(&format!("movq {}(%rbp), %rdx", slot + 8));
            } else {
                let reg = self.load_to_register(&quad.arg1);
                if reg != Register::Rax {
                    self.emit(&format!("movq {}, %rax", reg.name(8)));
                }
                self.regs.release(reg);
            }
        }
        let exit = format!(".{}_exit", self.current_function);
        self.emit(&format!("jmp {}", exit));
    }

    /// Load an argument straight into its ABI register, without going
    /// through the allocator. Arrays decay via lea; labels and string
    /// constants load their address.
    fn load_into_arg_register(&mut self, arg: &Operand, dest: Register) {
        match arg {
            Operand::IntConst { value, .. } => {
                if *value > i32::MAX as i64 || *value < i32::MIN as i64 {
                    self.emit(&format!("movabsq ${}, {}", value, dest.name(8)));
                } else {
                    self.emit(&format!("movq ${}, {}", value, dest.name(8)));
                }
            }
            Operand::FloatConst { value, .. } => {
                let label = self.float_label(*value);
                self.emit(&format!("movq {}(%rip), {}", label, dest.name(8)));
            }
            Operand::StringConst { label } => {
                let label = label.clone();
                self.emit(&format!("leaq {}(%rip), {}", label, dest.name(8)));
            }
            Operand::Label { name } => {
                let name = name.clone();
                self.emit(&format!("leaq {}(%rip), {}", name, dest.name(8)));
            }
            Operand::Global { name, ty } => {
                let name = name.clone();
                if ty.is_array() {
                    self.emit(&format!("leaq {}(%rip), {}", name, dest.name(8)));
                } else {
                    self.emit(&format!("movq {}(%rip), {}", name, dest.name(8)));
                }
            }
            Operand::Temp { ty, .. } | Operand::Variable { ty, .. } => {
                let decay = ty.is_array();
                let slot = self.operand_slot(arg);
                if decay {
                    self.emit(&format!("leaq {}(%rbp), {}", slot, dest.name(8)));
                } else {
                    self.emit(&format!("movq {}(%rbp), {}", slot, dest.name(8)));
                }
            }
            Operand::None => self.emit(&format!("xorq {0}, {0}", dest.name(8))),
        }
    }

    fn load_into_xmm_arg(&mut self, arg: &Operand, dest: XmmRegister) {
        match arg {
            Operand::FloatConst { value, .. } => {
                let label = self.float_label(*value);
                self.emit(&format!("movsd {}(%rip), {}", label, dest.name()));
            }
            Operand::Global { name, .. } => {
                let name = name.clone();
                self.emit(&format!("movsd {}(%rip), {}", name, dest.name()));
            }
            Operand::Temp { .. } | Operand::Variable { .. } => {
                let slot = self.operand_slot(arg);
                self.emit(&format!("movsd {}(%rbp), {}", slot, dest.name()));
            }
            _ => self.emit(&format!("pxor {0}, {0}", dest.name())),
        }
    }
}
