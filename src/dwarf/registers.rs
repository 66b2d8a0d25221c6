//! Register name tables, indexed by DWARF call-frame register numbers.
//!
//! CFI encodes registers as architecture-specific numeric indices, so the
//! right table must be selected before parsing. An empty name means the
//! register has no symbol-file representation and rules for it are dropped.

use crate::module::Architecture;

const I386: &[&str] = &[
    "$eax", "$ecx", "$edx", "$ebx", "$esp", "$ebp", "$esi", "$edi", "$eip", "$eflags", "",
    "$st0", "$st1", "$st2", "$st3", "$st4", "$st5", "$st6", "$st7", "", "",
    "$xmm0", "$xmm1", "$xmm2", "$xmm3", "$xmm4", "$xmm5", "$xmm6", "$xmm7",
    "$mm0", "$mm1", "$mm2", "$mm3", "$mm4", "$mm5", "$mm6", "$mm7",
    "$fcw", "$fsw", "$mxcsr",
    "$es", "$cs", "$ss", "$ds", "$fs", "$gs", "", "",
    "$tr", "$ldtr",
];

const X86_64: &[&str] = &[
    "$rax", "$rdx", "$rcx", "$rbx", "$rsi", "$rdi", "$rbp", "$rsp",
    "$r8", "$r9", "$r10", "$r11", "$r12", "$r13", "$r14", "$r15", "$rip",
    "$xmm0", "$xmm1", "$xmm2", "$xmm3", "$xmm4", "$xmm5", "$xmm6", "$xmm7",
    "$xmm8", "$xmm9", "$xmm10", "$xmm11", "$xmm12", "$xmm13", "$xmm14", "$xmm15",
    "$st0", "$st1", "$st2", "$st3", "$st4", "$st5", "$st6", "$st7",
    "$mm0", "$mm1", "$mm2", "$mm3", "$mm4", "$mm5", "$mm6", "$mm7",
    "$rflags",
    "$es", "$cs", "$ss", "$ds", "$fs", "$gs", "", "",
    "$fs.base", "$gs.base", "", "",
    "$tr", "$ldtr", "$mxcsr", "$fcw", "$fsw",
];

const ARM: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7",
    "r8", "r9", "r10", "r11", "r12", "sp", "lr", "pc",
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7",
    "fps", "cpsr",
];

const MIPS: &[&str] = &[
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3",
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7",
    "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
    "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

/// The name table for `architecture`, or None when call-frame information
/// cannot be converted for it.
pub fn register_names(architecture: Architecture) -> Option<&'static [&'static str]> {
    match architecture {
        Architecture::X86 => Some(I386),
        Architecture::X86_64 => Some(X86_64),
        Architecture::Arm => Some(ARM),
        Architecture::Mips => Some(MIPS),
        _ => None,
    }
}
