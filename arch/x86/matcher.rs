//! Operand matching: picks the first table definition the request fits.

use encoder_core::error::Error;
use encoder_core::utils::{fits_signed, fits_unsigned};

use crate::insn::{BranchType, EncodeRequest, Encoding, Operand};
use crate::regs::RegClass;
use crate::table::{
    Definition, ImmKind, OpSize, RelKind, Shape, Slot, Vl, F_D64, F_I64,
};

/// The committed candidate plus the sizes the match was made under.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Selected {
    pub def: &'static Definition,
    /// Effective operand size in bits, 0 for size-less definitions.
    pub opsize: u16,
    /// Effective vector length in bits, 0 for non-vector definitions.
    pub vl: u16,
}

/// Candidate errors are ranked so that the reported failure is the most
/// specific one seen across the table slice. A definition skipped by the
/// allowed-encodings mask never overrides an operand-level diagnosis.
fn rank(err: Error) -> u32 {
    match err {
        Error::NoApplicableEncoding => 0,
        Error::OperandMismatch => 1,
        Error::InvalidOperandForMode => 2,
        Error::ImmediateOverflow | Error::DisplacementOverflow => 3,
        _ => 4,
    }
}

pub(crate) fn select(req: &EncodeRequest, defs: &'static [Definition]) -> Result<Selected, Error> {
    let mut best = Error::NoApplicableEncoding;
    for def in defs {
        match try_match(req, def) {
            Ok(sel) => return Ok(sel),
            Err(err) => {
                if rank(err) > rank(best) {
                    best = err;
                }
            }
        }
    }
    Err(best)
}

fn try_match(req: &EncodeRequest, def: &'static Definition) -> Result<Selected, Error> {
    if !req.allowed_encodings.accepts(def.encoding) {
        return Err(Error::NoApplicableEncoding);
    }
    // Execution-modifier features commit the request to one encoding class.
    if req.evex.any() && def.encoding != Encoding::Evex {
        return Err(Error::NoApplicableEncoding);
    }
    if req.mvex.any() && def.encoding != Encoding::Mvex {
        return Err(Error::NoApplicableEncoding);
    }
    if def.has_flag(F_I64) && req.mode.is_long() {
        return Err(Error::InvalidOperandForMode);
    }
    check_branch_type(req, def)?;
    if req.operands().len() != def.operands.len() {
        return Err(Error::OperandMismatch);
    }
    let opsize = derive_opsize(req, def)?;
    let vl = derive_vl(req, def)?;
    for (shape, op) in def.operands.iter().zip(req.operands()) {
        match_operand(req, def, *shape, op, opsize, vl)?;
    }
    Ok(Selected { def, opsize, vl })
}

fn check_branch_type(req: &EncodeRequest, def: &Definition) -> Result<(), Error> {
    let ok = match req.branch_type {
        BranchType::None => true,
        BranchType::Short => def.has_rel() == Some(RelKind::Short),
        BranchType::Near16 | BranchType::Near32 | BranchType::Near64 => {
            def.has_rel() == Some(RelKind::Near)
        }
        BranchType::Far16 | BranchType::Far32 => def.has_ptr(),
        // There is no 64-bit far branch encoding.
        BranchType::Far64 => return Err(Error::InvalidOperandForMode),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::OperandMismatch)
    }
}

/// Effective operand size of the request under `def`, derived from the
/// width-bearing operands, the operand-size hint, the branch type and the
/// mode defaults. All sources must agree.
fn derive_opsize(req: &EncodeRequest, def: &Definition) -> Result<u16, Error> {
    match def.opsize {
        OpSize::None => Ok(0),
        OpSize::Byte => {
            let hint = req.operand_size_hint.bits();
            if hint != 0 && hint != 8 {
                return Err(Error::OperandMismatch);
            }
            for (shape, op) in def.operands.iter().zip(req.operands()) {
                if let Some(w) = operand_width(*shape, op) {
                    if w != 8 {
                        return Err(Error::OperandMismatch);
                    }
                }
            }
            Ok(8)
        }
        OpSize::V => {
            let mut width = branch_width(req, def);
            for (shape, op) in def.operands.iter().zip(req.operands()) {
                if let Some(w) = operand_width(*shape, op) {
                    if width != 0 && width != w {
                        return Err(Error::OperandMismatch);
                    }
                    width = w;
                }
            }
            let hint = req.operand_size_hint.bits();
            if hint != 0 {
                if width != 0 && width != hint {
                    return Err(Error::OperandMismatch);
                }
                width = hint;
            }
            if width == 8 {
                return Err(Error::OperandMismatch);
            }
            if width == 0 {
                width = if req.mode.is_long() && def.has_flag(F_D64) {
                    64
                } else {
                    req.mode.default_operand_bits()
                };
            }
            if width == 64 && !req.mode.is_long() {
                return Err(Error::InvalidOperandForMode);
            }
            if def.has_flag(F_D64) && req.mode.is_long() && width == 32 {
                return Err(Error::InvalidOperandForMode);
            }
            // Near branches in long mode always operate on the full IP.
            if def.has_rel().is_some() && req.mode.is_long() && width != 64 {
                return Err(Error::InvalidOperandForMode);
            }
            Ok(width)
        }
    }
}

/// Width in bits contributed by one operand, if it carries one.
fn operand_width(shape: Shape, op: &Operand) -> Option<u16> {
    match (shape, op) {
        (Shape::RegA | Shape::Reg(_) | Shape::RegMem, Operand::Reg { reg, .. }) => {
            Some(reg.class().gpr_bits()).filter(|w| *w != 0)
        }
        (Shape::RegMem | Shape::MemAny, Operand::Mem(mem)) => {
            Some(mem.size * 8).filter(|w| *w != 0)
        }
        _ => None,
    }
}

/// Width imposed by an explicit branch-type request, 0 when unconstrained.
fn branch_width(req: &EncodeRequest, def: &Definition) -> u16 {
    if def.has_rel() == Some(RelKind::Near) {
        match req.branch_type {
            BranchType::Near16 => 16,
            BranchType::Near32 => 32,
            BranchType::Near64 => 64,
            _ => 0,
        }
    } else if def.has_ptr() {
        match req.branch_type {
            BranchType::Far16 => 16,
            BranchType::Far32 => 32,
            _ => 0,
        }
    } else {
        0
    }
}

/// Effective vector length, derived from the vector register operands and
/// checked against the definition's length policy.
fn derive_vl(req: &EncodeRequest, def: &Definition) -> Result<u16, Error> {
    let mut class: Option<RegClass> = None;
    for (shape, op) in def.operands.iter().zip(req.operands()) {
        if !matches!(shape, Shape::Vec(_) | Shape::VecMem) {
            continue;
        }
        if let Operand::Reg { reg, .. } = op {
            if !reg.class().is_vector() {
                return Err(Error::OperandMismatch);
            }
            match class {
                Some(c) if c != reg.class() => return Err(Error::OperandMismatch),
                _ => class = Some(reg.class()),
            }
        }
    }
    if let Some(c) = class {
        let ok = match def.vl {
            Vl::None => false,
            Vl::L128 => c == RegClass::XMM,
            Vl::L512 => c == RegClass::ZMM,
            Vl::Vex => matches!(c, RegClass::XMM | RegClass::YMM),
            Vl::Evex => true,
        };
        if !ok {
            return Err(Error::OperandMismatch);
        }
    }
    let bits = match def.vl {
        Vl::None => 0,
        Vl::L128 => 128,
        Vl::L512 => 512,
        Vl::Vex | Vl::Evex => class.map(|c| c.vec_bits()).unwrap_or(128),
    };
    Ok(bits)
}

fn match_operand(
    req: &EncodeRequest,
    def: &Definition,
    shape: Shape,
    op: &Operand,
    opsize: u16,
    vl: u16,
) -> Result<(), Error> {
    match (shape, op) {
        (Shape::RegA, Operand::Reg { reg, is4: false }) => {
            check_reg_mode(req, reg)?;
            if reg.index() != 0 || reg.class().gpr_bits() != opsize {
                return Err(Error::OperandMismatch);
            }
            Ok(())
        }
        (Shape::Reg(_), Operand::Reg { reg, is4: false })
        | (Shape::RegMem, Operand::Reg { reg, is4: false }) => {
            check_reg_mode(req, reg)?;
            if reg.class().gpr_bits() != opsize {
                return Err(Error::OperandMismatch);
            }
            Ok(())
        }
        (Shape::RegMem, Operand::Mem(mem)) => check_mem_size(mem.size, opsize / 8),
        (Shape::MemAny, Operand::Mem(_)) => Ok(()),
        (Shape::Mmx(_), Operand::Reg { reg, is4: false }) => {
            if reg.class() != RegClass::MMX {
                return Err(Error::OperandMismatch);
            }
            Ok(())
        }
        (Shape::MmxMem, Operand::Reg { reg, is4: false }) => {
            if reg.class() != RegClass::MMX {
                return Err(Error::OperandMismatch);
            }
            Ok(())
        }
        (Shape::MmxMem, Operand::Mem(mem)) => check_mem_size(mem.size, 8),
        (Shape::Vec(slot), Operand::Reg { reg, is4 }) => {
            if !reg.class().is_vector() {
                return Err(Error::OperandMismatch);
            }
            if *is4 && slot != Slot::Is4 {
                return Err(Error::OperandMismatch);
            }
            check_vec_reg(req, def, reg)
        }
        (Shape::VecMem, Operand::Reg { reg, is4: false }) => {
            if !reg.class().is_vector() {
                return Err(Error::OperandMismatch);
            }
            check_vec_reg(req, def, reg)
        }
        (Shape::VecMem, Operand::Mem(mem)) => {
            // Broadcasts and MVEX conversions read less than a full vector;
            // the exact footprint is validated after feature resolution.
            if mem.size == 0 || mem.size == vl / 8 || mem.size == def.element {
                Ok(())
            } else {
                Err(Error::OperandMismatch)
            }
        }
        (Shape::Mask, Operand::Reg { reg, is4: false }) => {
            // K0 cannot be a write mask.
            if reg.class() != RegClass::MASK || reg.index() == 0 || reg.index() > 7 {
                return Err(Error::OperandMismatch);
            }
            Ok(())
        }
        (Shape::Imm(kind), Operand::Imm(value)) => check_imm(kind, *value, opsize),
        (Shape::Rel(kind), Operand::Imm(value)) => check_rel(kind, *value as i64, opsize),
        (Shape::Ptr, Operand::Ptr { offset, .. }) => {
            if opsize == 16 && !fits_unsigned(u64::from(*offset), 16) {
                return Err(Error::ImmediateOverflow);
            }
            Ok(())
        }
        _ => Err(Error::OperandMismatch),
    }
}

/// Registers that need REX or EVEX encoding space do not exist outside
/// long mode.
fn check_reg_mode(req: &EncodeRequest, reg: &crate::regs::Reg) -> Result<(), Error> {
    if !req.mode.is_long() && (reg.ext_bit() || reg.ext_bit2() || reg.forces_rex()) {
        return Err(Error::InvalidOperandForMode);
    }
    Ok(())
}

/// Vector registers 16..=31 (and the upper halves selected by EVEX bits)
/// are only reachable through EVEX/MVEX definitions, and registers 8..=31
/// do not exist outside long mode.
fn check_vec_reg(req: &EncodeRequest, def: &Definition, reg: &crate::regs::Reg) -> Result<(), Error> {
    if !req.mode.is_long() && (reg.ext_bit() || reg.ext_bit2()) {
        return Err(Error::InvalidOperandForMode);
    }
    let wide = matches!(def.encoding, Encoding::Evex | Encoding::Mvex);
    if reg.ext_bit2() && !wide {
        return Err(Error::OperandMismatch);
    }
    Ok(())
}

fn check_mem_size(size: u16, expect: u16) -> Result<(), Error> {
    if size == 0 || size == expect {
        Ok(())
    } else {
        Err(Error::OperandMismatch)
    }
}

/// Immediate width fit is part of matching so that a wider definition later
/// in the table can pick up a value the narrow form cannot hold.
fn check_imm(kind: ImmKind, value: u64, opsize: u16) -> Result<(), Error> {
    let fits_either = |bits: u32| fits_signed(value as i64, bits) || fits_unsigned(value, bits);
    let ok = match kind {
        ImmKind::B => {
            if opsize > 8 {
                fits_signed(value as i64, 8)
            } else {
                fits_either(8)
            }
        }
        ImmKind::Z => {
            if opsize == 64 {
                fits_signed(value as i64, 32)
            } else {
                fits_either(u32::from(opsize))
            }
        }
        ImmKind::V => fits_either(u32::from(opsize)),
        ImmKind::W => fits_either(16),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::ImmediateOverflow)
    }
}

fn check_rel(kind: RelKind, value: i64, opsize: u16) -> Result<(), Error> {
    let bits = match kind {
        RelKind::Short => 8,
        // Near branches in long mode use a 32-bit displacement.
        RelKind::Near => {
            if opsize == 64 {
                32
            } else {
                u32::from(opsize)
            }
        }
    };
    if fits_signed(value, bits) {
        Ok(())
    } else {
        Err(Error::DisplacementOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::{EncodeRequest, MachineMode, Mem, Mnemonic, OperandSizeHint};
    use crate::regs::reg;
    use crate::table;

    fn select_for(req: &EncodeRequest) -> Result<Selected, Error> {
        select(req, table::lookup(req.mnemonic).unwrap())
    }

    #[test]
    fn imm_width_fit_walks_the_table() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
        req.push_reg(reg::ECX).push_imm(1);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.opcode, 0x83);

        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
        req.push_reg(reg::ECX).push_imm(0x1234_5678);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.opcode, 0x81);
    }

    #[test]
    fn accumulator_form_wins() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
        req.push_reg(reg::EAX).push_imm(0x1234_5678);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.opcode, 0x05);
    }

    #[test]
    fn width_conflict() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
        req.push_reg(reg::EAX).push_reg(reg::RBX);
        assert_eq!(select_for(&req).unwrap_err(), Error::OperandMismatch);
    }

    #[test]
    fn mode_rejects_64bit_operands() {
        let mut req = EncodeRequest::new(MachineMode::Legacy32, Mnemonic::Add);
        req.push_reg(reg::RAX).push_imm(1);
        assert_eq!(select_for(&req).unwrap_err(), Error::InvalidOperandForMode);
    }

    #[test]
    fn byte_immediate_overflow_is_reported() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Add);
        req.push_reg(reg::BL).push_imm(0x1ff);
        assert_eq!(select_for(&req).unwrap_err(), Error::ImmediateOverflow);
    }

    #[test]
    fn hint_sizes_a_bare_memory_operand() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Push);
        req.operand_size_hint = OperandSizeHint::O16;
        req.push_mem(Mem::base(reg::RAX));
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.opsize, 16);
    }

    #[test]
    fn zmm_selects_evex() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Vaddps);
        req.push_reg(reg::ZMM1).push_reg(reg::ZMM2).push_reg(reg::ZMM3);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.encoding, Encoding::Evex);
        assert_eq!(sel.vl, 512);
    }

    #[test]
    fn ymm_selects_vex() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Vaddps);
        req.push_reg(reg::YMM1).push_reg(reg::YMM2).push_reg(reg::YMM3);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.encoding, Encoding::Vex);
        assert_eq!(sel.vl, 256);
    }

    #[test]
    fn masked_form_needs_nonzero_mask() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Vaddps);
        req.push_reg(reg::ZMM1)
            .push_reg(reg::K0)
            .push_reg(reg::ZMM2)
            .push_reg(reg::ZMM3);
        assert!(select_for(&req).is_err());
    }

    #[test]
    fn short_branch_falls_through_to_near() {
        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Jmp);
        req.push_simm(0x1000);
        let sel = select_for(&req).unwrap();
        assert_eq!(sel.def.opcode, 0xe9);

        let mut req = EncodeRequest::new(MachineMode::Long64, Mnemonic::Jmp);
        req.branch_type = BranchType::Short;
        req.push_simm(0x1000);
        assert_eq!(select_for(&req).unwrap_err(), Error::DisplacementOverflow);
    }

    #[test]
    fn far64_is_never_encodable() {
        let mut req = EncodeRequest::new(MachineMode::Legacy32, Mnemonic::Jmp);
        req.branch_type = BranchType::Far64;
        req.push_ptr(0x10, 0x1000);
        assert_eq!(select_for(&req).unwrap_err(), Error::InvalidOperandForMode);
    }
}
