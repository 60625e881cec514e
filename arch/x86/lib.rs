//! x86/x86-64 instruction encoder.
//!
//! Builds machine code from an [`EncodeRequest`]: an abstract description of
//! one instruction (mnemonic, operands, prefixes, size hints). The encoder
//! picks the first matching definition from a compiled-in table, resolves
//! effective sizes and prefixes for the requested machine mode, encodes the
//! operands and assembles the final byte sequence.
//!
//! ```
//! use encoder_x86::{encode, reg, EncodeRequest, MachineMode, Mnemonic};
//!
//! let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
//! req.push_reg(reg::EAX).push_imm(1);
//! let mut buf = [0; 15];
//! let len = encode(&req, &mut buf).unwrap();
//! assert_eq!(&buf[..len], &[0x83, 0xc0, 0x01]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

mod convert;
mod emit;
mod insn;
mod matcher;
mod regs;
mod resolver;
mod table;

pub use self::convert::{DecodedInsn, DecodedOperand, DecodedOperandKind, OperandVisibility};
pub use self::insn::{
    AddressSizeHint, BranchType, Broadcast, Conversion, EncodeRequest, Encoding, EncodingSet,
    EvexFeatures, MachineMode, Mem, Mnemonic, MvexFeatures, Operand, OperandSizeHint, Prefixes,
    Rounding, Swizzle,
};
pub use self::regs::{reg, Reg, RegClass};
pub use encoder_core::error::Error;
pub use encoder_core::{MAX_INSN_LEN, MAX_OPERANDS};

use encoder_core::buffer::InsnBuffer;

use self::matcher::Selected;
use self::table::Definition;

// Legacy prefix group bytes.
pub(crate) const PREFIX_LOCK: u8 = 0xf0;
pub(crate) const PREFIX_REPNE: u8 = 0xf2;
pub(crate) const PREFIX_REP: u8 = 0xf3;
pub(crate) const PREFIX_OPERAND_SIZE: u8 = 0x66;
pub(crate) const PREFIX_ADDRESS_SIZE: u8 = 0x67;
/// CS segment override, reused as the branch-not-taken hint.
pub(crate) const PREFIX_CS: u8 = 0x2e;
/// DS segment override, reused as the branch-taken hint and NOTRACK.
pub(crate) const PREFIX_DS: u8 = 0x3e;

/// Working state for a single instruction encode. Filled in stages by the
/// resolver and the operand encoder, then flushed by the assembler.
pub(crate) struct Encoder<'a> {
    pub(crate) req: &'a EncodeRequest,
    pub(crate) def: &'static Definition,
    /// Effective operand size in bits.
    pub(crate) opsize: u16,
    /// Effective address size in bits.
    pub(crate) addrsize: u16,
    /// Effective vector length in bits.
    pub(crate) vl: u16,
    pub(crate) osz66: bool,
    pub(crate) asz67: bool,
    pub(crate) rex_w: bool,
    /// A REX byte must be present even if all of its bits are clear.
    pub(crate) rex_required: bool,
    /// AH..BH in use; any REX byte changes their meaning.
    pub(crate) rex_forbidden: bool,
    /// ModRM.reg extension (REX.R).
    pub(crate) rr: bool,
    /// SIB.index extension (REX.X).
    pub(crate) rx: bool,
    /// ModRM.rm / SIB.base / opcode register extension (REX.B).
    pub(crate) rb: bool,
    /// EVEX/MVEX R' extension.
    pub(crate) r2: bool,
    pub(crate) vvvv: u8,
    /// EVEX/MVEX V' extension.
    pub(crate) v2: bool,
    /// Opmask register number.
    pub(crate) aaa: u8,
    /// Zeroing-mask bit.
    pub(crate) z: bool,
    /// EVEX broadcast/rounding/SAE bit.
    pub(crate) evex_b: bool,
    /// EVEX L'L field.
    pub(crate) ll: u8,
    /// MVEX eviction-hint / non-temporal bit.
    pub(crate) mvex_e: bool,
    /// MVEX swizzle/conversion/rounding selector.
    pub(crate) sss: u8,
    pub(crate) has_modrm: bool,
    pub(crate) modrm_mod: u8,
    pub(crate) modrm_reg: u8,
    pub(crate) modrm_rm: u8,
    pub(crate) sib: Option<u8>,
    pub(crate) disp: i64,
    pub(crate) disp_bits: u8,
    pub(crate) imm: u64,
    pub(crate) imm_bits: u8,
    /// Trailing immediate (far-pointer segment or VEX is4 byte).
    pub(crate) imm2: u64,
    pub(crate) imm2_bits: u8,
    /// Register number folded into the opcode byte.
    pub(crate) opcode_add: u8,
}

impl<'a> Encoder<'a> {
    fn new(req: &'a EncodeRequest, sel: Selected) -> Self {
        Self {
            req,
            def: sel.def,
            opsize: sel.opsize,
            addrsize: 0,
            vl: sel.vl,
            osz66: false,
            asz67: false,
            rex_w: false,
            rex_required: false,
            rex_forbidden: false,
            rr: false,
            rx: false,
            rb: false,
            r2: false,
            vvvv: 0,
            v2: false,
            aaa: 0,
            z: false,
            evex_b: false,
            ll: 0,
            mvex_e: false,
            sss: 0,
            has_modrm: false,
            modrm_mod: 0,
            modrm_reg: 0,
            modrm_rm: 0,
            sib: None,
            disp: 0,
            disp_bits: 0,
            imm: 0,
            imm_bits: 0,
            imm2: 0,
            imm2_bits: 0,
            opcode_add: 0,
        }
    }
}

/// Encode one instruction into `out` and return the number of bytes written.
///
/// Nothing is written to `out` on failure.
pub fn encode(req: &EncodeRequest, out: &mut [u8]) -> Result<usize, Error> {
    req.validate()?;
    let defs = table::lookup(req.mnemonic)?;
    let sel = matcher::select(req, defs)?;
    let mut enc = Encoder::new(req, sel);
    enc.resolve()?;
    enc.encode_operands()?;
    let mut buf = InsnBuffer::new();
    enc.assemble(&mut buf)?;
    buf.copy_to(out)
}
