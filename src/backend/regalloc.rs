//! Register model and linear allocators for the x86-64 emitter.
//!
//! The general-purpose allocator manages RBX, RCX, RDX, RSI, RDI and
//! R8–R15 with a preference order that spends caller-saved scratch
//! registers first, leaving the callee-saved set free when possible. RAX
//! is never in the pool: it is the always-available fallback when
//! allocation fails, and is clobbered freely by division, calls, and
//! returns. The XMM allocator manages XMM2–XMM15, preferring XMM8–XMM15
//! (outside the argument-passing set), with XMM0 as the fallback.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

const NAMES_64: [&str; 16] = [
    "%rax", "%rbx", "%rcx", "%rdx", "%rsi", "%rdi", "%rbp", "%rsp", "%r8", "%r9", "%r10", "%r11",
    "%r12", "%r13", "%r14", "%r15",
];
const NAMES_32: [&str; 16] = [
    "%eax", "%ebx", "%ecx", "%edx", "%esi", "%edi", "%ebp", "%esp", "%r8d", "%r9d", "%r10d",
    "%r11d", "%r12d", "%r13d", "%r14d", "%r15d",
];
const NAMES_16: [&str; 16] = [
    "%ax", "%bx", "%cx", "%dx", "%si", "%di", "%bp", "%sp", "%r8w", "%r9w", "%r10w", "%r11w",
    "%r12w", "%r13w", "%r14w", "%r15w",
];
const NAMES_8: [&str; 16] = [
    "%al", "%bl", "%cl", "%dl", "%sil", "%dil", "%bpl", "%spl", "%r8b", "%r9b", "%r10b", "%r11b",
    "%r12b", "%r13b", "%r14b", "%r15b",
];

impl Register {
    fn index(self) -> usize {
        match self {
            Register::Rax => 0,
            Register::Rbx => 1,
            Register::Rcx => 2,
            Register::Rdx => 3,
            Register::Rsi => 4,
            Register::Rdi => 5,
            Register::Rbp => 6,
            Register::Rsp => 7,
            Register::R8 => 8,
            Register::R9 => 9,
            Register::R10 => 10,
            Register::R11 => 11,
            Register::R12 => 12,
            Register::R13 => 13,
            Register::R14 => 14,
            Register::R15 => 15,
        }
    }

    /// AT&T name for the register at the given operand size in bytes.
    pub fn name(self, size: i64) -> &'static str {
        let idx = self.index();
        match size {
            1 => NAMES_8[idx],
            2 => NAMES_16[idx],
            4 => NAMES_32[idx],
            _ => NAMES_64[idx],
        }
    }
}

/// Pool members, and the order the allocator prefers them in: scratch
/// registers first so callee-saved ones stay untouched when pressure is
/// low.
const POOL: [Register; 13] = [
    Register::Rbx,
    Register::Rcx,
    Register::Rdx,
    Register::Rsi,
    Register::Rdi,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
    Register::R15,
];

const PREFERRED: [Register; 8] = [
    Register::R10,
    Register::R11,
    Register::Rcx,
    Register::Rdx,
    Register::Rsi,
    Register::Rdi,
    Register::R8,
    Register::R9,
];

const CALLER_SAVED: [Register; 9] = [
    Register::Rax,
    Register::Rcx,
    Register::Rdx,
    Register::Rsi,
    Register::Rdi,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
];

#[derive(Debug)]
pub struct RegisterAllocator {
    available: HashSet<Register>,
    used: HashSet<Register>,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self {
            available: POOL.iter().copied().collect(),
            used: HashSet::new(),
        }
    }

    /// Allocate a register, preferring the scratch set. Returns `None`
    /// when the pool is exhausted; the caller falls back to RAX.
    pub fn allocate(&mut self) -> Option<Register> {
        for reg in PREFERRED {
            if self.available.remove(&reg) {
                self.used.insert(reg);
                return Some(reg);
            }
        }
        for reg in POOL {
            if self.available.remove(&reg) {
                self.used.insert(reg);
                return Some(reg);
            }
        }
        None
    }

    pub fn release(&mut self, reg: Register) {
        if matches!(reg, Register::Rax | Register::Rbp | Register::Rsp) {
            return;
        }
        if self.used.remove(&reg) {
            self.available.insert(reg);
        }
    }

    pub fn is_available(&self, reg: Register) -> bool {
        self.available.contains(&reg)
    }

    /// Return every caller-saved register to the pool; used around calls.
    pub fn release_all_caller_saved(&mut self) {
        for reg in CALLER_SAVED {
            if self.used.remove(&reg) {
                self.available.insert(reg);
            }
        }
    }
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmmRegister {
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

const XMM_NAMES: [&str; 16] = [
    "%xmm0", "%xmm1", "%xmm2", "%xmm3", "%xmm4", "%xmm5", "%xmm6", "%xmm7", "%xmm8", "%xmm9",
    "%xmm10", "%xmm11", "%xmm12", "%xmm13", "%xmm14", "%xmm15",
];

impl XmmRegister {
    fn index(self) -> usize {
        match self {
            XmmRegister::Xmm0 => 0,
            XmmRegister::Xmm1 => 1,
            XmmRegister::Xmm2 => 2,
            XmmRegister::Xmm3 => 3,
            XmmRegister::Xmm4 => 4,
            XmmRegister::Xmm5 => 5,
            XmmRegister::Xmm6 => 6,
            XmmRegister::Xmm7 => 7,
            XmmRegister::Xmm8 => 8,
            XmmRegister::Xmm9 => 9,
            XmmRegister::Xmm10 => 10,
            XmmRegister::Xmm11 => 11,
            XmmRegister::Xmm12 => 12,
            XmmRegister::Xmm13 => 13,
            XmmRegister::Xmm14 => 14,
            XmmRegister::Xmm15 => 15,
        }
    }

    pub fn name(self) -> &'static str {
        XMM_NAMES[self.index()]
    }

    /// The ABI argument registers, in slot order.
    pub fn arg_registers() -> [XmmRegister; 8] {
        [
            XmmRegister::Xmm0,
            XmmRegister::Xmm1,
            XmmRegister::Xmm2,
            XmmRegister::Xmm3,
            XmmRegister::Xmm4,
            XmmRegister::Xmm5,
            XmmRegister::Xmm6,
            XmmRegister::Xmm7,
        ]
    }
}

/// XMM8–XMM15 first (never used for argument passing), then the tail of
/// the argument set.
const XMM_POOL: [XmmRegister; 14] = [
    XmmRegister::Xmm8,
    XmmRegister::Xmm9,
    XmmRegister::Xmm10,
    XmmRegister::Xmm11,
    XmmRegister::Xmm12,
    XmmRegister::Xmm13,
    XmmRegister::Xmm14,
    XmmRegister::Xmm15,
    XmmRegister::Xmm2,
    XmmRegister::Xmm3,
    XmmRegister::Xmm4,
    XmmRegister::Xmm5,
    XmmRegister::Xmm6,
    XmmRegister::Xmm7,
];

#[derive(Debug)]
pub struct XmmAllocator {
    available: HashSet<XmmRegister>,
    used: HashSet<XmmRegister>,
}

impl XmmAllocator {
    pub fn new() -> Self {
        Self {
            available: XMM_POOL.iter().copied().collect(),
            used: HashSet::new(),
        }
    }

    /// Allocate an XMM register; `None` means fall back to XMM0.
    pub fn allocate(&mut self) -> Option<XmmRegister> {
        for reg in XMM_POOL {
            if self.available.remove(&reg) {
                self.used.insert(reg);
                return Some(reg);
            }
        }
        None
    }

    pub fn release(&mut self, reg: XmmRegister) {
        if reg == XmmRegister::Xmm0 || reg == XmmRegister::Xmm1 {
            return;
        }
        if self.used.remove(&reg) {
            self.available.insert(reg);
        }
    }

    /// All XMM registers are caller-saved; everything returns to the pool.
    pub fn release_all_caller_saved(&mut self) {
        for reg in XMM_POOL {
            if self.used.remove(&reg) {
                self.available.insert(reg);
            }
        }
    }
}

impl Default for XmmAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order_spends_scratch_first() {
        let mut alloc = RegisterAllocator::new();
        assert_eq!(alloc.allocate(), Some(Register::R10));
        assert_eq!(alloc.allocate(), Some(Register::R11));
        assert_eq!(alloc.allocate(), Some(Register::Rcx));
        assert_eq!(alloc.allocate(), Some(Register::Rdx));
    }

    #[test]
    fn exhaustion_returns_none_for_rax_fallback() {
        let mut alloc = RegisterAllocator::new();
        for _ in 0..13 {
            assert!(alloc.allocate().is_some());
        }
        assert_eq!(alloc.allocate(), None);
    }

    #[test]
    fn release_returns_register_to_pool() {
        let mut alloc = RegisterAllocator::new();
        let reg = alloc.allocate().unwrap();
        assert!(!alloc.is_available(reg));
        alloc.release(reg);
        assert!(alloc.is_available(reg));
    }

    #[test]
    fn caller_saved_release_keeps_callee_saved_busy() {
        let mut alloc = RegisterAllocator::new();
        let mut grabbed = Vec::new();
        for _ in 0..13 {
            grabbed.push(alloc.allocate().unwrap());
        }
        alloc.release_all_caller_saved();
        assert!(alloc.is_available(Register::R10));
        assert!(!alloc.is_available(Register::Rbx));
        assert!(!alloc.is_available(Register::R12));
    }

    #[test]
    fn register_names_by_size() {
        assert_eq!(Register::Rax.name(8), "%rax");
        assert_eq!(Register::Rax.name(4), "%eax");
        assert_eq!(Register::Rax.name(1), "%al");
        assert_eq!(Register::R10.name(4), "%r10d");
        assert_eq!(Register::R10.name(1), "%r10b");
    }

    #[test]
    fn xmm_prefers_high_registers() {
        let mut alloc = XmmAllocator::new();
        assert_eq!(alloc.allocate(), Some(XmmRegister::Xmm8));
        assert_eq!(alloc.allocate(), Some(XmmRegister::Xmm9));
    }
}
