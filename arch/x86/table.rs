//! Compiled-in instruction definition table.
//!
//! Each mnemonic maps to an ordered slice of candidate definitions. The order
//! is load-bearing: the operand matcher commits to the first definition that
//! fits, so cheaper forms (accumulator forms, sign-extended imm8 forms) are
//! listed before their general counterparts, and legacy definitions come
//! before 3DNOW, XOP, VEX, EVEX and MVEX ones.

use encoder_core::error::Error;

use crate::insn::{Encoding, Mnemonic};

/// Opcode map selecting the escape bytes (or their VEX/XOP/EVEX equivalent).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Map {
    None,
    M0f,
    M0f38,
    M0f3a,
    Xop8,
    Xop9,
}

impl Map {
    /// Escape byte sequence for legacy encodings.
    pub(crate) fn escape(&self) -> &'static [u8] {
        match self {
            Self::None => &[],
            Self::M0f => &[0x0f],
            Self::M0f38 => &[0x0f, 0x38],
            Self::M0f3a => &[0x0f, 0x3a],
            Self::Xop8 | Self::Xop9 => &[],
        }
    }

    /// Map selector as packed into VEX.mmmmm / XOP.mmmmm / EVEX.mmm.
    pub(crate) fn selector(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::M0f => 1,
            Self::M0f38 => 2,
            Self::M0f3a => 3,
            Self::Xop8 => 8,
            Self::Xop9 => 9,
        }
    }
}

/// Mandatory prefix as packed into VEX/EVEX `pp` (or emitted as a byte for
/// legacy encodings).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Pp {
    None,
    P66,
    Pf3,
    Pf2,
}

impl Pp {
    pub(crate) fn bits(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::P66 => 1,
            Self::Pf3 => 2,
            Self::Pf2 => 3,
        }
    }

    pub(crate) fn byte(&self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::P66 => Some(0x66),
            Self::Pf3 => Some(0xf3),
            Self::Pf2 => Some(0xf2),
        }
    }
}

/// REX.W / VEX.W derivation policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum WPolicy {
    /// W is always zero (also used for W-ignored definitions).
    W0,
    /// W follows the effective operand size (1 for 64-bit).
    Wsize,
}

/// How the ModRM byte (or the low opcode bits) select registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ModrmKind {
    None,
    /// ModRM present, reg field selected by an operand (`/r`).
    Reg,
    /// ModRM present, reg field is a fixed opcode extension (`/digit`).
    Ext(u8),
}

/// Operand size class of a definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum OpSize {
    /// Size-less (no GPR/memory width semantics).
    None,
    /// Fixed 8-bit form.
    Byte,
    /// 16/32/64-bit form selected by operands, hints and mode.
    V,
}

/// Vector length policy of a definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Vl {
    None,
    /// XMM only (legacy SSE and 128-bit-only forms).
    L128,
    /// Fixed 512-bit form (MVEX).
    L512,
    /// XMM or YMM, selected by the vector operands.
    Vex,
    /// XMM, YMM or ZMM, selected by the vector operands.
    Evex,
}

/// Immediate width/signedness class.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ImmKind {
    /// 8-bit; sign-extended to the operand size for non-byte forms.
    B,
    /// 16/32-bit by operand size (32-bit sign-extended for 64-bit forms).
    Z,
    /// Full operand-size width (16/32/64).
    V,
    /// Fixed 16-bit.
    W,
}

/// Relative branch displacement class.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RelKind {
    Short,
    Near,
}

/// Register slot an operand is packed into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    ModrmReg,
    ModrmRm,
    Vvvv,
    Is4,
    /// Register number added to the opcode byte.
    OpcodeReg,
}

/// Declared shape of one operand position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Shape {
    /// Implicit accumulator (AL/AX/EAX/RAX) of the effective operand size.
    RegA,
    /// GPR of the effective operand size.
    Reg(Slot),
    /// GPR or memory, ModRM r/m slot.
    RegMem,
    /// Memory of any size (LEA-style address generation).
    MemAny,
    /// MMX register.
    Mmx(Slot),
    /// MMX register or 64-bit memory, ModRM r/m slot.
    MmxMem,
    /// Vector register of the definition's vector-length class.
    Vec(Slot),
    /// Vector register or memory, ModRM r/m slot.
    VecMem,
    /// Opmask register K1..K7 packed into EVEX/MVEX `aaa`.
    Mask,
    Imm(ImmKind),
    Rel(RelKind),
    /// Far pointer immediate (segment:offset).
    Ptr,
}

// Definition flags.
pub(crate) const F_LOCK: u32 = 1 << 0;
pub(crate) const F_REP: u32 = 1 << 1;
pub(crate) const F_REPE: u32 = 1 << 2;
pub(crate) const F_REPNE: u32 = 1 << 3;
pub(crate) const F_BND: u32 = 1 << 4;
pub(crate) const F_NOTRACK: u32 = 1 << 5;
/// XACQUIRE/XRELEASE legal (with LOCK).
pub(crate) const F_HLE: u32 = 1 << 6;
/// Branch hint prefixes legal.
pub(crate) const F_HINTS: u32 = 1 << 7;
/// Invalid in 64-bit mode.
pub(crate) const F_I64: u32 = 1 << 8;
/// Defaults to 64-bit operand size in long mode; no 32-bit form there.
pub(crate) const F_D64: u32 = 1 << 9;
pub(crate) const F_BCST: u32 = 1 << 10;
/// Embedded rounding legal.
pub(crate) const F_ER: u32 = 1 << 11;
pub(crate) const F_SAE: u32 = 1 << 12;
/// Zeroing-mask legal.
pub(crate) const F_MASKZ: u32 = 1 << 13;
/// MVEX swizzle/conversion/eviction-hint legal.
pub(crate) const F_MVEX_MOD: u32 = 1 << 14;

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Definition {
    pub encoding: Encoding,
    pub map: Map,
    /// Primary opcode byte. For 3DNOW this is the trailing opcode suffix.
    pub opcode: u8,
    pub pp: Pp,
    pub w: WPolicy,
    pub modrm: ModrmKind,
    pub opsize: OpSize,
    pub vl: Vl,
    /// Vector element size in bytes (broadcast and compressed displacement).
    pub element: u16,
    pub operands: &'static [Shape],
    pub flags: u32,
}

impl Definition {
    const fn new(encoding: Encoding, map: Map, opcode: u8, operands: &'static [Shape]) -> Self {
        Self {
            encoding,
            map,
            opcode,
            pp: Pp::None,
            w: WPolicy::W0,
            modrm: ModrmKind::None,
            opsize: OpSize::None,
            vl: Vl::None,
            element: 0,
            operands,
            flags: 0,
        }
    }

    const fn pp(mut self, pp: Pp) -> Self {
        self.pp = pp;
        self
    }

    const fn modrm(mut self) -> Self {
        self.modrm = ModrmKind::Reg;
        self
    }

    const fn ext(mut self, digit: u8) -> Self {
        self.modrm = ModrmKind::Ext(digit);
        self
    }

    const fn byte(mut self) -> Self {
        self.opsize = OpSize::Byte;
        self
    }

    const fn vsize(mut self) -> Self {
        self.opsize = OpSize::V;
        self.w = WPolicy::Wsize;
        self
    }

    const fn vl(mut self, vl: Vl) -> Self {
        self.vl = vl;
        self
    }

    const fn element(mut self, bytes: u16) -> Self {
        self.element = bytes;
        self
    }

    const fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub(crate) fn has_rel(&self) -> Option<RelKind> {
        self.operands.iter().find_map(|s| match s {
            Shape::Rel(kind) => Some(*kind),
            _ => None,
        })
    }

    pub(crate) fn has_ptr(&self) -> bool {
        self.operands.iter().any(|s| matches!(s, Shape::Ptr))
    }
}

const fn legacy(opcode: u8, operands: &'static [Shape]) -> Definition {
    Definition::new(Encoding::Legacy, Map::None, opcode, operands)
}

const fn legacy_0f(opcode: u8, operands: &'static [Shape]) -> Definition {
    Definition::new(Encoding::Legacy, Map::M0f, opcode, operands)
}

const fn vex(map: Map, opcode: u8, operands: &'static [Shape]) -> Definition {
    Definition::new(Encoding::Vex, map, opcode, operands).vl(Vl::Vex)
}

const fn evex(map: Map, opcode: u8, operands: &'static [Shape]) -> Definition {
    Definition::new(Encoding::Evex, map, opcode, operands).vl(Vl::Evex)
}

const fn mvex(map: Map, opcode: u8, operands: &'static [Shape]) -> Definition {
    Definition::new(Encoding::Mvex, map, opcode, operands).vl(Vl::L512)
}

use ImmKind::{B, V, W, Z};
use Shape::{Imm, Mask, MemAny, Mmx, MmxMem, Ptr, Reg, RegA, RegMem, Rel, Vec, VecMem};
use Slot::{Is4, ModrmReg, OpcodeReg, Vvvv};

// Operand shape lists shared between definitions.
const RM_R: &[Shape] = &[RegMem, Reg(ModrmReg)];
const R_RM: &[Shape] = &[Reg(ModrmReg), RegMem];
const RM_I: &[Shape] = &[RegMem, Imm(Z)];
const RM_I8: &[Shape] = &[RegMem, Imm(B)];
const A_I: &[Shape] = &[RegA, Imm(Z)];
const A_I8: &[Shape] = &[RegA, Imm(B)];
const VVM: &[Shape] = &[Vec(ModrmReg), Vec(Vvvv), VecMem];
const VKVM: &[Shape] = &[Vec(ModrmReg), Mask, Vec(Vvvv), VecMem];
const VM: &[Shape] = &[Vec(ModrmReg), VecMem];

macro_rules! alu {
    ($name:ident, $base:expr, $digit:expr, $flags:expr) => {
        static $name: &[Definition] = &[
            legacy($base, RM_R).modrm().byte().flags($flags),
            legacy($base + 0x01, RM_R).modrm().vsize().flags($flags),
            legacy($base + 0x02, R_RM).modrm().byte(),
            legacy($base + 0x03, R_RM).modrm().vsize(),
            legacy(0x83, RM_I8).ext($digit).vsize().flags($flags),
            legacy($base + 0x04, A_I8).byte(),
            legacy($base + 0x05, A_I).vsize(),
            legacy(0x80, RM_I8).ext($digit).byte().flags($flags),
            legacy(0x81, RM_I).ext($digit).vsize().flags($flags),
        ];
    };
}

alu!(ADD, 0x00, 0, F_LOCK);
alu!(SUB, 0x28, 5, F_LOCK);
alu!(CMP, 0x38, 7, 0);

static MOV: &[Definition] = &[
    legacy(0x88, RM_R).modrm().byte(),
    legacy(0x89, RM_R).modrm().vsize(),
    legacy(0x8a, R_RM).modrm().byte(),
    legacy(0x8b, R_RM).modrm().vsize(),
    legacy(0xb0, &[Reg(OpcodeReg), Imm(B)]).byte(),
    legacy(0xb8, &[Reg(OpcodeReg), Imm(V)]).vsize(),
    legacy(0xc6, RM_I8).ext(0).byte(),
    legacy(0xc7, RM_I).ext(0).vsize(),
];

static LEA: &[Definition] = &[legacy(0x8d, &[Reg(ModrmReg), MemAny]).modrm().vsize()];

static PUSH: &[Definition] = &[
    legacy(0x50, &[Reg(OpcodeReg)]).vsize().flags(F_D64),
    legacy(0x6a, &[Imm(B)]).vsize().flags(F_D64),
    legacy(0x68, &[Imm(Z)]).vsize().flags(F_D64),
    legacy(0xff, &[RegMem]).ext(6).vsize().flags(F_D64),
];

static POP: &[Definition] = &[
    legacy(0x58, &[Reg(OpcodeReg)]).vsize().flags(F_D64),
    legacy(0x8f, &[RegMem]).ext(0).vsize().flags(F_D64),
];

static NOP: &[Definition] = &[legacy(0x90, &[])];

static RET: &[Definition] = &[
    legacy(0xc3, &[]),
    legacy(0xc2, &[Imm(W)]),
];

static XCHG: &[Definition] = &[
    legacy(0x86, RM_R).modrm().byte().flags(F_LOCK | F_HLE),
    legacy(0x87, RM_R).modrm().vsize().flags(F_LOCK | F_HLE),
    legacy(0x86, R_RM).modrm().byte().flags(F_LOCK | F_HLE),
    legacy(0x87, R_RM).modrm().vsize().flags(F_LOCK | F_HLE),
];

static CMPXCHG: &[Definition] = &[
    legacy_0f(0xb0, RM_R).modrm().byte().flags(F_LOCK | F_HLE),
    legacy_0f(0xb1, RM_R).modrm().vsize().flags(F_LOCK | F_HLE),
];

static MOVSB: &[Definition] = &[legacy(0xa4, &[]).byte().flags(F_REP)];
static STOSB: &[Definition] = &[legacy(0xaa, &[]).byte().flags(F_REP)];
static SCASB: &[Definition] = &[legacy(0xae, &[]).byte().flags(F_REPE | F_REPNE)];

static CALL: &[Definition] = &[
    legacy(0xe8, &[Rel(RelKind::Near)]).vsize().flags(F_D64 | F_BND),
    legacy(0xff, &[RegMem])
        .ext(2)
        .vsize()
        .flags(F_D64 | F_BND | F_NOTRACK),
    legacy(0x9a, &[Ptr]).vsize().flags(F_I64),
];

static JMP: &[Definition] = &[
    legacy(0xeb, &[Rel(RelKind::Short)]).vsize().flags(F_D64 | F_BND),
    legacy(0xe9, &[Rel(RelKind::Near)]).vsize().flags(F_D64 | F_BND),
    legacy(0xff, &[RegMem])
        .ext(4)
        .vsize()
        .flags(F_D64 | F_BND | F_NOTRACK),
    legacy(0xea, &[Ptr]).vsize().flags(F_I64),
];

static JZ: &[Definition] = &[
    legacy(0x74, &[Rel(RelKind::Short)])
        .vsize()
        .flags(F_D64 | F_BND | F_HINTS),
    legacy_0f(0x84, &[Rel(RelKind::Near)])
        .vsize()
        .flags(F_D64 | F_BND | F_HINTS),
];

// 3DNOW uses 0F 0F /r with the opcode in a trailing suffix byte.
static PFADD: &[Definition] = &[Definition::new(
    Encoding::D3now,
    Map::M0f,
    0x9e,
    &[Mmx(ModrmReg), MmxMem],
)
.modrm()];

static ADDPS: &[Definition] = &[legacy_0f(0x58, VM).modrm().vl(Vl::L128).element(4)];

// Scalar forms read a single element from memory.
static ADDSS: &[Definition] = &[legacy_0f(0x58, VM)
    .modrm()
    .pp(Pp::Pf3)
    .vl(Vl::L128)
    .element(4)];

static ADDSD: &[Definition] = &[legacy_0f(0x58, VM)
    .modrm()
    .pp(Pp::Pf2)
    .vl(Vl::L128)
    .element(8)];

static PSHUFB: &[Definition] = &[Definition::new(Encoding::Legacy, Map::M0f38, 0x00, VM)
    .modrm()
    .pp(Pp::P66)
    .vl(Vl::L128)];

static PADDD: &[Definition] = &[legacy_0f(0xfe, VM)
    .modrm()
    .pp(Pp::P66)
    .vl(Vl::L128)
    .element(4)];

static VADDPS: &[Definition] = &[
    vex(Map::M0f, 0x58, VVM).modrm().element(4),
    evex(Map::M0f, 0x58, VVM)
        .modrm()
        .element(4)
        .flags(F_BCST | F_ER | F_SAE),
    evex(Map::M0f, 0x58, VKVM)
        .modrm()
        .element(4)
        .flags(F_BCST | F_ER | F_SAE | F_MASKZ),
    mvex(Map::M0f, 0x58, VVM)
        .modrm()
        .element(4)
        .flags(F_BCST | F_ER | F_SAE | F_MVEX_MOD),
    mvex(Map::M0f, 0x58, VKVM)
        .modrm()
        .element(4)
        .flags(F_BCST | F_ER | F_SAE | F_MVEX_MOD),
];

static VPADDD: &[Definition] = &[
    vex(Map::M0f, 0xfe, VVM).modrm().pp(Pp::P66).element(4),
    evex(Map::M0f, 0xfe, VVM)
        .modrm()
        .pp(Pp::P66)
        .element(4)
        .flags(F_BCST),
    evex(Map::M0f, 0xfe, VKVM)
        .modrm()
        .pp(Pp::P66)
        .element(4)
        .flags(F_BCST | F_MASKZ),
];

static VBLENDVPS: &[Definition] = &[vex(Map::M0f3a, 0x4a, &[
    Vec(ModrmReg),
    Vec(Vvvv),
    VecMem,
    Vec(Is4),
])
.modrm()
.pp(Pp::P66)
.element(4)];

static VPCOMB: &[Definition] = &[Definition::new(Encoding::Xop, Map::Xop8, 0xcc, &[
    Vec(ModrmReg),
    Vec(Vvvv),
    VecMem,
    Imm(B),
])
.modrm()
.vl(Vl::L128)];

static VFRCZPS: &[Definition] =
    &[Definition::new(Encoding::Xop, Map::Xop9, 0x80, VM).modrm().vl(Vl::Vex).element(4)];

static VZEROUPPER: &[Definition] = &[vex(Map::M0f, 0x77, &[])];

/// Candidate definitions for `mnemonic`, in fixed table order.
pub(crate) fn lookup(mnemonic: Mnemonic) -> Result<&'static [Definition], Error> {
    let defs = match mnemonic {
        Mnemonic::Invalid => return Err(Error::UnknownMnemonic),
        Mnemonic::Add => ADD,
        Mnemonic::Addps => ADDPS,
        Mnemonic::Addsd => ADDSD,
        Mnemonic::Addss => ADDSS,
        Mnemonic::Call => CALL,
        Mnemonic::Cmp => CMP,
        Mnemonic::Cmpxchg => CMPXCHG,
        Mnemonic::Jmp => JMP,
        Mnemonic::Jz => JZ,
        Mnemonic::Lea => LEA,
        Mnemonic::Mov => MOV,
        Mnemonic::Movsb => MOVSB,
        Mnemonic::Nop => NOP,
        Mnemonic::Paddd => PADDD,
        Mnemonic::Pfadd => PFADD,
        Mnemonic::Pop => POP,
        Mnemonic::Pshufb => PSHUFB,
        Mnemonic::Push => PUSH,
        Mnemonic::Ret => RET,
        Mnemonic::Scasb => SCASB,
        Mnemonic::Stosb => STOSB,
        Mnemonic::Sub => SUB,
        Mnemonic::Vaddps => VADDPS,
        Mnemonic::Vblendvps => VBLENDVPS,
        Mnemonic::Vfrczps => VFRCZPS,
        Mnemonic::Vpaddd => VPADDD,
        Mnemonic::Vpcomb => VPCOMB,
        Mnemonic::Vzeroupper => VZEROUPPER,
        Mnemonic::Xchg => XCHG,
    };
    Ok(defs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_order_is_monotonic() {
        // Table order is the tie-break rule; encoding classes must appear in
        // legacy, 3DNOW, XOP, VEX, EVEX, MVEX order for every mnemonic.
        fn rank(e: Encoding) -> u32 {
            match e {
                Encoding::Legacy => 0,
                Encoding::D3now => 1,
                Encoding::Xop => 2,
                Encoding::Vex => 3,
                Encoding::Evex => 4,
                Encoding::Mvex => 5,
            }
        }
        let all = [
            Mnemonic::Add,
            Mnemonic::Addps,
            Mnemonic::Addsd,
            Mnemonic::Addss,
            Mnemonic::Call,
            Mnemonic::Cmp,
            Mnemonic::Cmpxchg,
            Mnemonic::Jmp,
            Mnemonic::Jz,
            Mnemonic::Lea,
            Mnemonic::Mov,
            Mnemonic::Movsb,
            Mnemonic::Nop,
            Mnemonic::Paddd,
            Mnemonic::Pfadd,
            Mnemonic::Pop,
            Mnemonic::Pshufb,
            Mnemonic::Push,
            Mnemonic::Ret,
            Mnemonic::Scasb,
            Mnemonic::Stosb,
            Mnemonic::Sub,
            Mnemonic::Vaddps,
            Mnemonic::Vblendvps,
            Mnemonic::Vfrczps,
            Mnemonic::Vpaddd,
            Mnemonic::Vpcomb,
            Mnemonic::Vzeroupper,
            Mnemonic::Xchg,
        ];
        for mnemonic in all {
            let defs = lookup(mnemonic).unwrap();
            assert!(!defs.is_empty());
            for pair in defs.windows(2) {
                assert!(
                    rank(pair[0].encoding) <= rank(pair[1].encoding),
                    "{mnemonic:?}"
                );
            }
        }
    }

    #[test]
    fn unknown_mnemonic() {
        assert_eq!(lookup(Mnemonic::Invalid), Err(Error::UnknownMnemonic));
    }
}
