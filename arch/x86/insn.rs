use encoder_core::{error::Error, MAX_OPERANDS};

use crate::regs::{Reg, RegClass};

/// CPU operating mode an instruction is encoded for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MachineMode {
    /// 64-bit long mode.
    Long64,
    /// 32-bit protected/compatibility mode.
    Legacy32,
    /// 16-bit real/protected mode.
    Legacy16,
}

impl Default for MachineMode {
    fn default() -> Self {
        Self::Long64
    }
}

impl MachineMode {
    pub const fn is_long(&self) -> bool {
        matches!(*self, Self::Long64)
    }

    pub(crate) const fn default_address_bits(&self) -> u16 {
        match self {
            Self::Long64 => 64,
            Self::Legacy32 => 32,
            Self::Legacy16 => 16,
        }
    }

    pub(crate) const fn default_operand_bits(&self) -> u16 {
        match self {
            Self::Long64 | Self::Legacy32 => 32,
            Self::Legacy16 => 16,
        }
    }
}

/// One of the x86 binary encoding schemes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    Legacy,
    D3now,
    Xop,
    Vex,
    Evex,
    Mvex,
}

/// Set of encoding classes the encoder is allowed to choose from.
///
/// The empty set means "no restriction".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodingSet(u32);

impl EncodingSet {
    pub const LEGACY: u32 = 1 << 0;
    pub const D3NOW: u32 = 1 << 1;
    pub const XOP: u32 = 1 << 2;
    pub const VEX: u32 = 1 << 3;
    pub const EVEX: u32 = 1 << 4;
    pub const MVEX: u32 = 1 << 5;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn set(&mut self, bits: u32) -> &mut Self {
        self.0 |= bits;
        self
    }

    const fn bit(encoding: Encoding) -> u32 {
        match encoding {
            Encoding::Legacy => Self::LEGACY,
            Encoding::D3now => Self::D3NOW,
            Encoding::Xop => Self::XOP,
            Encoding::Vex => Self::VEX,
            Encoding::Evex => Self::EVEX,
            Encoding::Mvex => Self::MVEX,
        }
    }

    pub const fn only(encoding: Encoding) -> Self {
        Self(Self::bit(encoding))
    }

    pub const fn accepts(&self, encoding: Encoding) -> bool {
        self.0 == 0 || self.0 & Self::bit(encoding) != 0
    }
}

/// Requested optional prefixes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Prefixes(u32);

impl Prefixes {
    pub const LOCK: u32 = 1 << 0;
    pub const REP: u32 = 1 << 1;
    pub const REPE: u32 = 1 << 2;
    pub const REPNE: u32 = 1 << 3;
    pub const BND: u32 = 1 << 4;
    pub const XACQUIRE: u32 = 1 << 5;
    pub const XRELEASE: u32 = 1 << 6;
    pub const BRANCH_NOT_TAKEN: u32 = 1 << 7;
    pub const BRANCH_TAKEN: u32 = 1 << 8;
    pub const NOTRACK: u32 = 1 << 9;
    pub const SEGMENT_CS: u32 = 1 << 10;
    pub const SEGMENT_SS: u32 = 1 << 11;
    pub const SEGMENT_DS: u32 = 1 << 12;
    pub const SEGMENT_ES: u32 = 1 << 13;
    pub const SEGMENT_FS: u32 = 1 << 14;
    pub const SEGMENT_GS: u32 = 1 << 15;

    pub const SEGMENT_MASK: u32 = Self::SEGMENT_CS
        | Self::SEGMENT_SS
        | Self::SEGMENT_DS
        | Self::SEGMENT_ES
        | Self::SEGMENT_FS
        | Self::SEGMENT_GS;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn set(&mut self, bits: u32) -> &mut Self {
        self.0 |= bits;
        self
    }

    pub const fn any(&self, bits: u32) -> bool {
        self.0 & bits != 0
    }

    /// The segment-override prefix byte, if exactly one segment bit is set.
    pub(crate) const fn segment_byte(&self) -> Option<u8> {
        match self.0 & Self::SEGMENT_MASK {
            0 => None,
            x if x == Self::SEGMENT_CS => Some(0x2e),
            x if x == Self::SEGMENT_SS => Some(0x36),
            x if x == Self::SEGMENT_DS => Some(0x3e),
            x if x == Self::SEGMENT_ES => Some(0x26),
            x if x == Self::SEGMENT_FS => Some(0x64),
            x if x == Self::SEGMENT_GS => Some(0x65),
            _ => None,
        }
    }

    pub(crate) const fn segment_bits(&self) -> u32 {
        self.0 & Self::SEGMENT_MASK
    }
}

/// Target encoding for branching instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchType {
    None,
    Short,
    Near16,
    Near32,
    Near64,
    Far16,
    Far32,
    Far64,
}

impl Default for BranchType {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressSizeHint {
    None,
    A16,
    A32,
    A64,
}

impl Default for AddressSizeHint {
    fn default() -> Self {
        Self::None
    }
}

impl AddressSizeHint {
    pub(crate) const fn bits(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::A16 => 16,
            Self::A32 => 32,
            Self::A64 => 64,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandSizeHint {
    None,
    O8,
    O16,
    O32,
    O64,
}

impl Default for OperandSizeHint {
    fn default() -> Self {
        Self::None
    }
}

impl OperandSizeHint {
    pub(crate) const fn bits(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::O8 => 8,
            Self::O16 => 16,
            Self::O32 => 32,
            Self::O64 => 64,
        }
    }
}

/// EVEX/MVEX broadcast mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Broadcast {
    None,
    B1to2,
    B1to4,
    B1to8,
    B1to16,
    B4to16,
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::None
    }
}

impl Broadcast {
    /// Element replication factor, 0 for `None`.
    pub(crate) const fn factor(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::B1to2 => 2,
            Self::B1to4 => 4,
            Self::B1to8 => 8,
            Self::B1to16 => 16,
            Self::B4to16 => 4,
        }
    }
}

/// Embedded rounding control.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rounding {
    None,
    /// Round to nearest even.
    Nearest,
    /// Round towards negative infinity.
    Down,
    /// Round towards positive infinity.
    Up,
    /// Round towards zero.
    Zero,
}

impl Default for Rounding {
    fn default() -> Self {
        Self::None
    }
}

impl Rounding {
    pub(crate) const fn rc(&self) -> u8 {
        match self {
            Self::None | Self::Nearest => 0,
            Self::Down => 1,
            Self::Up => 2,
            Self::Zero => 3,
        }
    }
}

/// MVEX memory up/down-conversion mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conversion {
    None,
    Float16,
    Uint8,
    Sint8,
    Uint16,
    Sint16,
}

impl Default for Conversion {
    fn default() -> Self {
        Self::None
    }
}

impl Conversion {
    pub(crate) const fn sss(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Float16 => 3,
            Self::Uint8 => 4,
            Self::Sint8 => 5,
            Self::Uint16 => 6,
            Self::Sint16 => 7,
        }
    }

    /// Memory footprint divisor relative to the full 64-byte operand.
    pub(crate) const fn mem_bytes(&self) -> u16 {
        match self {
            Self::None => 64,
            Self::Float16 => 32,
            Self::Uint8 | Self::Sint8 => 16,
            Self::Uint16 | Self::Sint16 => 32,
        }
    }
}

/// MVEX register swizzle mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Swizzle {
    /// Identity permutation.
    None,
    Cdab,
    Badc,
    Dacb,
    Aaaa,
    Bbbb,
    Cccc,
    Dddd,
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::None
    }
}

impl Swizzle {
    pub(crate) const fn sss(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Cdab => 1,
            Self::Badc => 2,
            Self::Dacb => 3,
            Self::Aaaa => 4,
            Self::Bbbb => 5,
            Self::Cccc => 6,
            Self::Dddd => 7,
        }
    }
}

/// EVEX execution-modifier features. Consulted only when the selected
/// definition is EVEX-encoded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EvexFeatures {
    pub broadcast: Broadcast,
    pub rounding: Rounding,
    pub sae: bool,
    pub zeroing: bool,
}

impl EvexFeatures {
    pub(crate) fn any(&self) -> bool {
        *self != Self::default()
    }
}

/// MVEX execution-modifier features. Consulted only when the selected
/// definition is MVEX-encoded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MvexFeatures {
    pub broadcast: Broadcast,
    pub conversion: Conversion,
    pub rounding: Rounding,
    pub swizzle: Swizzle,
    pub sae: bool,
    pub eviction_hint: bool,
}

impl MvexFeatures {
    pub(crate) fn any(&self) -> bool {
        *self != Self::default()
    }
}

/// Memory operand description.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Mem {
    pub base: Option<Reg>,
    pub index: Option<Reg>,
    /// Index scale factor 1/2/4/8. Meaningful only when `index` is set.
    pub scale: u8,
    pub disp: i64,
    /// Operand size in bytes, 0 for "inherit from the matched definition".
    pub size: u16,
}

impl Mem {
    pub const fn base(base: Reg) -> Self {
        Self {
            base: Some(base),
            index: None,
            scale: 0,
            disp: 0,
            size: 0,
        }
    }

    pub const fn absolute(disp: i64) -> Self {
        Self {
            base: None,
            index: None,
            scale: 0,
            disp,
            size: 0,
        }
    }

    pub const fn index(mut self, index: Reg, scale: u8) -> Self {
        self.index = Some(index);
        self.scale = scale;
        self
    }

    pub const fn disp(mut self, disp: i64) -> Self {
        self.disp = disp;
        self
    }

    pub const fn size(mut self, bytes: u16) -> Self {
        self.size = bytes;
        self
    }
}

/// A single instruction operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg { reg: Reg, is4: bool },
    Mem(Mem),
    Ptr { segment: u16, offset: u32 },
    Imm(u64),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Self::Reg { reg, is4: false }
    }
}

impl From<Mem> for Operand {
    fn from(mem: Mem) -> Self {
        Self::Mem(mem)
    }
}

/// Symbolic instruction name; the key into the definition table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mnemonic {
    Invalid,
    Add,
    Addps,
    Addsd,
    Addss,
    Call,
    Cmp,
    Cmpxchg,
    Jmp,
    Jz,
    Lea,
    Mov,
    Movsb,
    Nop,
    Paddd,
    Pfadd,
    Pop,
    Pshufb,
    Push,
    Ret,
    Scasb,
    Stosb,
    Sub,
    Vaddps,
    Vblendvps,
    Vfrczps,
    Vpaddd,
    Vpcomb,
    Vzeroupper,
    Xchg,
}

impl Default for Mnemonic {
    fn default() -> Self {
        Self::Invalid
    }
}

/// A machine-independent description of one instruction to encode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeRequest {
    pub mode: MachineMode,
    pub allowed_encodings: EncodingSet,
    pub mnemonic: Mnemonic,
    pub prefixes: Prefixes,
    pub branch_type: BranchType,
    pub address_size_hint: AddressSizeHint,
    pub operand_size_hint: OperandSizeHint,
    pub evex: EvexFeatures,
    pub mvex: MvexFeatures,
    operands: [Operand; MAX_OPERANDS],
    operand_count: u8,
}

impl EncodeRequest {
    pub fn new(mode: MachineMode, mnemonic: Mnemonic) -> Self {
        Self {
            mode,
            mnemonic,
            ..Self::default()
        }
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.operand_count as usize]
    }

    pub fn push_operand<T>(&mut self, operand: T) -> &mut Self
    where
        T: Into<Operand>,
    {
        let i = self.operand_count as usize;
        assert!(i < MAX_OPERANDS, "too many operands");
        self.operands[i] = operand.into();
        self.operand_count += 1;
        self
    }

    pub fn push_reg(&mut self, reg: Reg) -> &mut Self {
        self.push_operand(Operand::Reg { reg, is4: false })
    }

    /// Push a register carrying the VEX/XOP fourth-operand bit.
    pub fn push_reg4(&mut self, reg: Reg) -> &mut Self {
        self.push_operand(Operand::Reg { reg, is4: true })
    }

    pub fn push_mem(&mut self, mem: Mem) -> &mut Self {
        self.push_operand(Operand::Mem(mem))
    }

    pub fn push_imm(&mut self, value: u64) -> &mut Self {
        self.push_operand(Operand::Imm(value))
    }

    pub fn push_simm(&mut self, value: i64) -> &mut Self {
        self.push_operand(Operand::Imm(value as u64))
    }

    pub fn push_ptr(&mut self, segment: u16, offset: u32) -> &mut Self {
        self.push_operand(Operand::Ptr { segment, offset })
    }

    /// Structural request validation performed before table lookup.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let seg = self.prefixes.segment_bits();
        if seg.count_ones() > 1 {
            return Err(Error::IllegalPrefix);
        }
        if self.prefixes.any(Prefixes::REP) && self.prefixes.any(Prefixes::REPNE) {
            return Err(Error::IllegalPrefix);
        }
        if self.prefixes.any(Prefixes::REPE) && self.prefixes.any(Prefixes::REPNE) {
            return Err(Error::IllegalPrefix);
        }
        if self.prefixes.any(Prefixes::XACQUIRE) && self.prefixes.any(Prefixes::XRELEASE) {
            return Err(Error::IllegalPrefix);
        }
        if self.prefixes.any(Prefixes::BRANCH_TAKEN) && self.prefixes.any(Prefixes::BRANCH_NOT_TAKEN)
        {
            return Err(Error::IllegalPrefix);
        }
        for op in self.operands() {
            if let Operand::Mem(mem) = op {
                if mem.index.is_some() && !matches!(mem.scale, 1 | 2 | 4 | 8) {
                    return Err(Error::OperandMismatch);
                }
                if let Some(base) = mem.base {
                    let ok = base.class().is_gpr() || base.class() == RegClass::IP;
                    if !ok {
                        return Err(Error::OperandMismatch);
                    }
                }
                if let Some(index) = mem.index {
                    if !index.class().is_gpr() {
                        return Err(Error::OperandMismatch);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Operand {
    fn default() -> Self {
        Self::Imm(0)
    }
}
