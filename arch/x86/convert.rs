//! Re-encoding support: turns the salient fields of a previously decoded
//! instruction back into an [`EncodeRequest`].

use encoder_core::error::Error;
use encoder_core::MAX_OPERANDS;

use crate::insn::{
    AddressSizeHint, BranchType, EncodeRequest, Encoding, EncodingSet, EvexFeatures, MachineMode,
    Mem, Mnemonic, MvexFeatures, OperandSizeHint, Prefixes,
};
use crate::regs::Reg;

/// How a decoder reported one operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandVisibility {
    /// Spelled out in assembly.
    Explicit,
    /// Implied by the mnemonic but still part of the operand list.
    Implicit,
    /// Internal bookkeeping (flags, stack pointer updates); never encoded.
    Hidden,
}

#[derive(Copy, Clone, Debug)]
pub enum DecodedOperandKind {
    Reg(Reg),
    Mem(Mem),
    Ptr { segment: u16, offset: u32 },
    Imm(u64),
}

#[derive(Copy, Clone, Debug)]
pub struct DecodedOperand {
    pub kind: DecodedOperandKind,
    pub visibility: OperandVisibility,
}

/// The subset of a decoded instruction the encoder needs to reproduce it.
#[derive(Clone, Debug)]
pub struct DecodedInsn<'a> {
    pub mode: MachineMode,
    pub mnemonic: Mnemonic,
    pub encoding: Encoding,
    pub prefixes: Prefixes,
    pub branch_type: BranchType,
    /// Effective operand size in bits, 0 if not meaningful.
    pub operand_width: u16,
    /// Effective address size in bits, 0 if not meaningful.
    pub address_width: u16,
    pub evex: EvexFeatures,
    pub mvex: MvexFeatures,
    pub operands: &'a [DecodedOperand],
}

impl EncodeRequest {
    /// Build a request that re-encodes `decoded`.
    ///
    /// The conversion is deliberately lossy: hidden operands are dropped and
    /// the original encoding class is pinned through the allowed-encodings
    /// mask, so the result round-trips to the same instruction bytes rather
    /// than to a shorter alias.
    pub fn from_decoded(decoded: &DecodedInsn) -> Result<Self, Error> {
        let mut req = Self::new(decoded.mode, decoded.mnemonic);
        req.allowed_encodings = EncodingSet::only(decoded.encoding);
        req.prefixes = decoded.prefixes;
        req.branch_type = decoded.branch_type;
        req.evex = decoded.evex;
        req.mvex = decoded.mvex;
        req.operand_size_hint = match decoded.operand_width {
            8 => OperandSizeHint::O8,
            16 => OperandSizeHint::O16,
            32 => OperandSizeHint::O32,
            64 => OperandSizeHint::O64,
            _ => OperandSizeHint::None,
        };
        req.address_size_hint = match decoded.address_width {
            16 => AddressSizeHint::A16,
            32 => AddressSizeHint::A32,
            64 => AddressSizeHint::A64,
            _ => AddressSizeHint::None,
        };
        let visible = decoded
            .operands
            .iter()
            .filter(|op| op.visibility != OperandVisibility::Hidden);
        for op in visible {
            if req.operands().len() >= MAX_OPERANDS {
                return Err(Error::OperandMismatch);
            }
            match op.kind {
                DecodedOperandKind::Reg(reg) => req.push_reg(reg),
                DecodedOperandKind::Mem(mem) => req.push_mem(mem),
                DecodedOperandKind::Ptr { segment, offset } => req.push_ptr(segment, offset),
                DecodedOperandKind::Imm(value) => req.push_imm(value),
            };
        }
        Ok(req)
    }
}
