//! Data-section emission: string literals and the float pool in
//! `.rodata`, initialized globals in `.data`, uninitialized globals in
//! `.bss`.

use crate::ir::ir::GlobalInit;
use super::codegen::CodeGenerator;

impl CodeGenerator<'_> {
    /// String literals become `.string` entries with octal escapes for
    /// non-printable bytes.
    pub(super) fn emit_string_literals(&mut self) {
        let program = self.program();
        for (label, value) in &program.string_literals {
            self.rodata.push_str(&format!("{}:\n", label));
            self.rodata.push_str("    .string \"");
            for b in value.bytes() {
                match b {
                    b'\n' => self.rodata.push_str("\\n"),
                    b'\t' => self.rodata.push_str("\\t"),
                    b'\r' => self.rodata.push_str("\\r"),
                    b'\\' => self.rodata.push_str("\\\\"),
                    b'"' => self.rodata.push_str("\\\""),
                    0 => self.rodata.push_str("\\0"),
                    32..=126 => self.rodata.push(b as char),
                    other => self.rodata.push_str(&format!("\\{:o}", other)),
                }
            }
            self.rodata.push_str("\"\n");
        }
    }

    /// Initialized globals flatten into `.data`; the rest reserve zeroed
    /// space in `.bss`. Extern declarations emit nothing.
    pub(super) fn emit_global_data(&mut self) {
        let program = self.program();
        for global in &program.globals {
            if global.is_extern {
                continue;
            }
            let size = global.ty.size().max(1);
            let align = global.ty.alignment().max(1);

            if global.has_initializer && !global.init_values.is_empty() {
                self.data.push_str(&format!("    .globl {}\n", global.name));
                self.data.push_str(&format!("    .align {}\n", align));
                self.data.push_str(&format!("{}:\n", global.name));
                for init in &global.init_values {
                    match init {
                        GlobalInit::Integer { value, size } => {
                            let directive = match size {
                                1 => ".byte",
                                2 => ".word",
                                4 => ".long",
                                _ => ".quad",
                            };
                            self.data.push_str(&format!("    {} {}\n", directive, value));
                        }
                        GlobalInit::Float { value, size } => {
                            if *size == 4 {
                                self.data.push_str(&format!(
                                    "    .long {}\n",
                                    (*value as f32).to_bits()
                                ));
                            } else {
                                self.data
                                    .push_str(&format!("    .quad {}\n", value.to_bits()));
                            }
                        }
                        GlobalInit::StringLabel(label) => {
                            self.data.push_str(&format!("    .quad {}\n", label));
                        }
                        GlobalInit::Address(name) => {
                            self.data.push_str(&format!("    .quad {}\n", name));
                        }
                        GlobalInit::Zero { size } => {
                            self.data.push_str(&format!("    .zero {}\n", size));
                        }
                    }
                }
            } else {
                self.bss.push_str(&format!("    .globl {}\n", global.name));
                self.bss.push_str(&format!("    .align {}\n", align));
                self.bss.push_str(&format!("{}:\n", global.name));
                self.bss.push_str(&format!("    .zero {}\n", size));
            }
        }
    }

    /// Dump interned float constants, collected while the functions were
    /// translated.
    pub(super) fn emit_float_pool(&mut self) {
        for (label, bits) in self.float_pool_entries() {
            self.rodata.push_str("    .align 8\n");
            self.rodata.push_str(&format!("{}:\n", label));
            self.rodata.push_str(&format!("    .quad {}\n", bits));
        }
    }
}
