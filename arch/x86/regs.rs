use core::fmt;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct RegClass(u8);

impl RegClass {
    /// 8-bit GPRs with uniform numbering (AL..DIL, R8B..R15B). Indices 4..=7
    /// (SPL..DIL) are only addressable when a REX prefix is present.
    pub const GPR8: Self = Self(0);
    /// Legacy high-byte registers AH..BH. Unencodable together with REX.
    pub const GPR8HI: Self = Self(1);
    pub const GPR16: Self = Self(2);
    pub const GPR32: Self = Self(3);
    pub const GPR64: Self = Self(4);
    pub const MMX: Self = Self(5);
    pub const XMM: Self = Self(6);
    pub const YMM: Self = Self(7);
    pub const ZMM: Self = Self(8);
    pub const MASK: Self = Self(9);
    pub const SEGMENT: Self = Self(10);
    pub const IP: Self = Self(11);

    pub const fn is_gpr(&self) -> bool {
        self.0 <= Self::GPR64.0
    }

    pub const fn is_vector(&self) -> bool {
        matches!(*self, Self::XMM | Self::YMM | Self::ZMM)
    }

    /// Operand width in bits for GPR classes, 0 otherwise.
    pub const fn gpr_bits(&self) -> u16 {
        match *self {
            Self::GPR8 | Self::GPR8HI => 8,
            Self::GPR16 => 16,
            Self::GPR32 => 32,
            Self::GPR64 => 64,
            _ => 0,
        }
    }

    /// Register width in bits for vector classes, 0 otherwise.
    pub const fn vec_bits(&self) -> u16 {
        match *self {
            Self::XMM => 128,
            Self::YMM => 256,
            Self::ZMM => 512,
            _ => 0,
        }
    }
}

impl fmt::Display for RegClass {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Self::GPR8 => "gpr8",
            Self::GPR8HI => "gpr8hi",
            Self::GPR16 => "gpr16",
            Self::GPR32 => "gpr32",
            Self::GPR64 => "gpr64",
            Self::MMX => "mmx",
            Self::XMM => "xmm",
            Self::YMM => "ymm",
            Self::ZMM => "zmm",
            Self::MASK => "mask",
            Self::SEGMENT => "segment",
            Self::IP => "ip",
            _ => return write!(fmt, "invalid({})", self.0),
        };
        fmt.write_str(s)
    }
}

impl fmt::Debug for RegClass {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, fmt)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Reg {
    class: RegClass,
    index: u8,
}

impl Reg {
    pub const fn new(class: RegClass, index: u8) -> Self {
        Self { class, index }
    }

    pub const fn xmm(index: u8) -> Self {
        Self::new(RegClass::XMM, index)
    }

    pub const fn ymm(index: u8) -> Self {
        Self::new(RegClass::YMM, index)
    }

    pub const fn zmm(index: u8) -> Self {
        Self::new(RegClass::ZMM, index)
    }

    pub const fn class(&self) -> RegClass {
        self.class
    }

    pub const fn index(&self) -> u8 {
        self.index
    }

    /// REX.B/R/X extension bit (register number 8..=15).
    pub(crate) const fn ext_bit(&self) -> bool {
        self.index & 8 != 0
    }

    /// EVEX/MVEX high extension bit (register number 16..=31).
    pub(crate) const fn ext_bit2(&self) -> bool {
        self.index & 16 != 0
    }

    /// SPL/BPL/SIL/DIL need a REX prefix to be distinguishable from AH..BH.
    pub(crate) const fn forces_rex(&self) -> bool {
        matches!(self.class, RegClass::GPR8) && self.index >= 4 && self.index < 8
    }

    pub(crate) const fn forbids_rex(&self) -> bool {
        matches!(self.class, RegClass::GPR8HI)
    }

    /// Address width contributed by this register as a base/index, 0 if it
    /// cannot address memory.
    pub(crate) const fn addr_bits(&self) -> u16 {
        match self.class {
            RegClass::GPR16 => 16,
            RegClass::GPR32 => 32,
            RegClass::GPR64 | RegClass::IP => 64,
            _ => 0,
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "<{}:{}>", self.class, self.index)
    }
}

macro_rules! define_regs {
    ($($class:ident { $($name:ident = $index:expr),+ $(,)? })+) => {
        $($(pub const $name: Reg = Reg::new(RegClass::$class, $index);)+)+
    };
}

/// Named register values.
pub mod reg {
    use super::{Reg, RegClass};

    define_regs! {
        GPR8 {
            AL = 0, CL = 1, DL = 2, BL = 3, SPL = 4, BPL = 5, SIL = 6, DIL = 7,
            R8B = 8, R9B = 9, R10B = 10, R11B = 11,
            R12B = 12, R13B = 13, R14B = 14, R15B = 15,
        }
        GPR8HI { AH = 4, CH = 5, DH = 6, BH = 7 }
        GPR16 {
            AX = 0, CX = 1, DX = 2, BX = 3, SP = 4, BP = 5, SI = 6, DI = 7,
            R8W = 8, R9W = 9, R10W = 10, R11W = 11,
            R12W = 12, R13W = 13, R14W = 14, R15W = 15,
        }
        GPR32 {
            EAX = 0, ECX = 1, EDX = 2, EBX = 3, ESP = 4, EBP = 5, ESI = 6, EDI = 7,
            R8D = 8, R9D = 9, R10D = 10, R11D = 11,
            R12D = 12, R13D = 13, R14D = 14, R15D = 15,
        }
        GPR64 {
            RAX = 0, RCX = 1, RDX = 2, RBX = 3, RSP = 4, RBP = 5, RSI = 6, RDI = 7,
            R8 = 8, R9 = 9, R10 = 10, R11 = 11,
            R12 = 12, R13 = 13, R14 = 14, R15 = 15,
        }
        MMX { MM0 = 0, MM1 = 1, MM2 = 2, MM3 = 3, MM4 = 4, MM5 = 5, MM6 = 6, MM7 = 7 }
        XMM {
            XMM0 = 0, XMM1 = 1, XMM2 = 2, XMM3 = 3, XMM4 = 4, XMM5 = 5,
            XMM6 = 6, XMM7 = 7, XMM8 = 8, XMM9 = 9, XMM10 = 10, XMM11 = 11,
            XMM12 = 12, XMM13 = 13, XMM14 = 14, XMM15 = 15,
        }
        YMM {
            YMM0 = 0, YMM1 = 1, YMM2 = 2, YMM3 = 3, YMM4 = 4, YMM5 = 5,
            YMM6 = 6, YMM7 = 7, YMM8 = 8, YMM9 = 9, YMM10 = 10, YMM11 = 11,
            YMM12 = 12, YMM13 = 13, YMM14 = 14, YMM15 = 15,
        }
        ZMM {
            ZMM0 = 0, ZMM1 = 1, ZMM2 = 2, ZMM3 = 3, ZMM4 = 4, ZMM5 = 5,
            ZMM6 = 6, ZMM7 = 7, ZMM8 = 8, ZMM9 = 9, ZMM10 = 10, ZMM11 = 11,
            ZMM12 = 12, ZMM13 = 13, ZMM14 = 14, ZMM15 = 15,
        }
        MASK { K0 = 0, K1 = 1, K2 = 2, K3 = 3, K4 = 4, K5 = 5, K6 = 6, K7 = 7 }
        SEGMENT { ES = 0, CS = 1, SS = 2, DS = 3, FS = 4, GS = 5 }
        IP { RIP = 0 }
    }
}
