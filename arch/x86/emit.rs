//! Operand encoding (ModRM, SIB, displacement, immediates) and final byte
//! assembly.

use encoder_core::buffer::InsnBuffer;
use encoder_core::error::Error;
use encoder_core::utils::{fits_signed, fits_unsigned};

use crate::insn::{Broadcast, Encoding, Mem, Operand, Prefixes};
use crate::regs::{Reg, RegClass};
use crate::table::{ImmKind, Map, ModrmKind, RelKind, Shape, Slot, WPolicy};
use crate::{
    Encoder, PREFIX_ADDRESS_SIZE, PREFIX_CS, PREFIX_DS, PREFIX_LOCK, PREFIX_OPERAND_SIZE,
    PREFIX_REP, PREFIX_REPNE,
};

impl Encoder<'_> {
    pub(crate) fn encode_operands(&mut self) -> Result<(), Error> {
        match self.def.modrm {
            ModrmKind::None => {}
            ModrmKind::Reg => self.has_modrm = true,
            ModrmKind::Ext(digit) => {
                self.has_modrm = true;
                self.modrm_reg = digit;
            }
        }
        let operands: &[Operand] = self.req.operands();
        for (shape, op) in self.def.operands.iter().zip(operands) {
            match (*shape, op) {
                (Shape::RegA, _) => {}
                (Shape::Reg(slot), Operand::Reg { reg, .. })
                | (Shape::Mmx(slot), Operand::Reg { reg, .. })
                | (Shape::Vec(slot), Operand::Reg { reg, .. }) => self.put_reg(slot, *reg),
                (Shape::RegMem, Operand::Reg { reg, .. })
                | (Shape::MmxMem, Operand::Reg { reg, .. })
                | (Shape::VecMem, Operand::Reg { reg, .. }) => self.put_reg(Slot::ModrmRm, *reg),
                (Shape::RegMem, Operand::Mem(mem))
                | (Shape::MmxMem, Operand::Mem(mem))
                | (Shape::VecMem, Operand::Mem(mem))
                | (Shape::MemAny, Operand::Mem(mem)) => self.encode_mem(*mem)?,
                (Shape::Mask, Operand::Reg { reg, .. }) => self.aaa = reg.index(),
                (Shape::Imm(kind), Operand::Imm(value)) => {
                    self.imm = *value;
                    self.imm_bits = self.imm_width(kind);
                }
                (Shape::Rel(kind), Operand::Imm(value)) => {
                    self.imm = *value;
                    self.imm_bits = match kind {
                        RelKind::Short => 8,
                        RelKind::Near if self.opsize == 64 => 32,
                        RelKind::Near => self.opsize as u8,
                    };
                }
                (Shape::Ptr, Operand::Ptr { segment, offset }) => {
                    self.imm = u64::from(*offset);
                    self.imm_bits = self.opsize as u8;
                    self.imm2 = u64::from(*segment);
                    self.imm2_bits = 16;
                }
                // The matcher only commits shape-compatible operands.
                _ => return Err(Error::OperandMismatch),
            }
        }
        Ok(())
    }

    fn imm_width(&self, kind: ImmKind) -> u8 {
        match kind {
            ImmKind::B => 8,
            ImmKind::Z if self.opsize == 64 => 32,
            ImmKind::Z | ImmKind::V => self.opsize as u8,
            ImmKind::W => 16,
        }
    }

    fn put_reg(&mut self, slot: Slot, reg: Reg) {
        let index = reg.index();
        match slot {
            Slot::ModrmReg => {
                self.modrm_reg = index & 7;
                self.rr = reg.ext_bit();
                self.r2 = reg.ext_bit2();
            }
            Slot::ModrmRm => {
                self.modrm_mod = 0b11;
                self.modrm_rm = index & 7;
                self.rb = reg.ext_bit();
                // EVEX reuses X to extend a register in the r/m slot.
                self.rx = reg.ext_bit2();
            }
            Slot::Vvvv => {
                self.vvvv = index & 0xf;
                self.v2 = reg.ext_bit2();
            }
            Slot::Is4 => {
                self.imm2 = u64::from(index) << 4;
                self.imm2_bits = 8;
            }
            Slot::OpcodeReg => {
                self.opcode_add = index & 7;
                self.rb = reg.ext_bit();
            }
        }
    }

    fn encode_mem(&mut self, mem: Mem) -> Result<(), Error> {
        if let Some(base) = mem.base {
            if base.class() == RegClass::IP {
                return self.encode_rip_relative(mem);
            }
        }
        if self.addrsize == 16 {
            return self.encode_mem16(mem);
        }
        let n = i64::from(self.disp8_scale());
        let index = match mem.index {
            Some(index) => {
                // The 0b100 index encoding means "none"; ESP/RSP cannot be
                // scaled.
                if index.index() == 4 {
                    return Err(Error::OperandMismatch);
                }
                self.rx = index.ext_bit();
                Some(index)
            }
            None => None,
        };
        let scale_bits = match mem.scale {
            2 => 0b01,
            4 => 0b10,
            8 => 0b11,
            _ => 0b00,
        };
        match mem.base {
            None => {
                // Absolute addressing.
                if !fits_signed(mem.disp, 32) && !fits_unsigned(mem.disp as u64, 32) {
                    return Err(Error::DisplacementOverflow);
                }
                self.disp = mem.disp;
                self.disp_bits = 32;
                self.modrm_mod = 0b00;
                if self.req.mode.is_long() || index.is_some() {
                    // Long mode reserves the bare disp32 form for
                    // RIP-relative addressing; go through a SIB byte.
                    self.modrm_rm = 0b100;
                    let idx = index.map(|r| r.index() & 7).unwrap_or(0b100);
                    self.sib = Some(scale_bits << 6 | idx << 3 | 0b101);
                } else {
                    self.modrm_rm = 0b101;
                }
            }
            Some(base) => {
                self.rb = base.ext_bit();
                let base_low = base.index() & 7;
                let need_sib = index.is_some() || base_low == 0b100;
                if mem.disp == 0 && base_low != 0b101 {
                    self.modrm_mod = 0b00;
                } else if mem.disp % n == 0 && fits_signed(mem.disp / n, 8) {
                    self.modrm_mod = 0b01;
                    self.disp = mem.disp / n;
                    self.disp_bits = 8;
                } else if fits_signed(mem.disp, 32) {
                    self.modrm_mod = 0b10;
                    self.disp = mem.disp;
                    self.disp_bits = 32;
                } else {
                    return Err(Error::DisplacementOverflow);
                }
                if need_sib {
                    self.modrm_rm = 0b100;
                    let idx = index.map(|r| r.index() & 7).unwrap_or(0b100);
                    self.sib = Some(scale_bits << 6 | idx << 3 | base_low);
                } else {
                    self.modrm_rm = base_low;
                }
            }
        }
        Ok(())
    }

    fn encode_rip_relative(&mut self, mem: Mem) -> Result<(), Error> {
        if !self.req.mode.is_long() || mem.index.is_some() {
            return Err(Error::InvalidOperandForMode);
        }
        if !fits_signed(mem.disp, 32) {
            return Err(Error::DisplacementOverflow);
        }
        self.modrm_mod = 0b00;
        self.modrm_rm = 0b101;
        self.disp = mem.disp;
        self.disp_bits = 32;
        Ok(())
    }

    /// Classic 16-bit addressing has a fixed base/index menu and no SIB.
    fn encode_mem16(&mut self, mem: Mem) -> Result<(), Error> {
        if mem.index.is_some() && mem.scale > 1 {
            return Err(Error::OperandMismatch);
        }
        let pair = (
            mem.base.map(|r| r.index()),
            mem.index.map(|r| r.index()),
        );
        // BX = 3, BP = 5, SI = 6, DI = 7.
        let rm = match pair {
            (Some(3), Some(6)) => 0b000,
            (Some(3), Some(7)) => 0b001,
            (Some(5), Some(6)) => 0b010,
            (Some(5), Some(7)) => 0b011,
            (Some(6), None) => 0b100,
            (Some(7), None) => 0b101,
            (Some(5), None) => 0b110,
            (Some(3), None) => 0b111,
            (None, None) => {
                if !fits_signed(mem.disp, 16) && !fits_unsigned(mem.disp as u64, 16) {
                    return Err(Error::DisplacementOverflow);
                }
                self.modrm_mod = 0b00;
                self.modrm_rm = 0b110;
                self.disp = mem.disp;
                self.disp_bits = 16;
                return Ok(());
            }
            _ => return Err(Error::OperandMismatch),
        };
        self.modrm_rm = rm;
        // rm = 110 with mod = 00 is the absolute form, so [bp] needs a
        // zero disp8.
        if mem.disp == 0 && rm != 0b110 {
            self.modrm_mod = 0b00;
        } else if fits_signed(mem.disp, 8) {
            self.modrm_mod = 0b01;
            self.disp = mem.disp;
            self.disp_bits = 8;
        } else if fits_signed(mem.disp, 16) {
            self.modrm_mod = 0b10;
            self.disp = mem.disp;
            self.disp_bits = 16;
        } else {
            return Err(Error::DisplacementOverflow);
        }
        Ok(())
    }

    /// EVEX/MVEX compressed displacement granularity; 1 for everything else.
    fn disp8_scale(&self) -> u16 {
        match self.def.encoding {
            Encoding::Evex => {
                if self.req.evex.broadcast != Broadcast::None {
                    self.def.element
                } else {
                    self.vl / 8
                }
            }
            Encoding::Mvex => {
                let features = self.req.mvex;
                let div = match features.broadcast {
                    Broadcast::B1to16 => 16,
                    Broadcast::B4to16 => 4,
                    _ => 1,
                };
                features.conversion.mem_bytes() / div
            }
            _ => 1,
        }
    }

    pub(crate) fn assemble(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        self.emit_prefixes(buf)?;
        match self.def.encoding {
            Encoding::Legacy | Encoding::D3now => {
                if let Some(byte) = self.def.pp.byte() {
                    buf.push(byte)?;
                }
                self.emit_rex(buf)?;
                for byte in self.def.map.escape() {
                    buf.push(*byte)?;
                }
                if self.def.encoding == Encoding::D3now {
                    // 0F 0F /r imm8-style opcode suffix.
                    buf.push(0x0f)?;
                } else {
                    buf.push(self.def.opcode.wrapping_add(self.opcode_add))?;
                }
            }
            Encoding::Vex | Encoding::Xop => self.emit_vex(buf)?,
            Encoding::Evex => self.emit_evex(buf)?,
            Encoding::Mvex => self.emit_mvex(buf)?,
        }
        if self.has_modrm {
            buf.push(self.modrm_mod << 6 | self.modrm_reg << 3 | self.modrm_rm)?;
        }
        if let Some(sib) = self.sib {
            buf.push(sib)?;
        }
        if self.disp_bits != 0 {
            buf.push_int(self.disp as u64, u32::from(self.disp_bits))?;
        }
        if self.imm_bits != 0 {
            buf.push_int(self.imm, u32::from(self.imm_bits))?;
        }
        if self.imm2_bits != 0 {
            buf.push_int(self.imm2, u32::from(self.imm2_bits))?;
        }
        if self.def.encoding == Encoding::D3now {
            buf.push(self.def.opcode)?;
        }
        Ok(())
    }

    fn emit_prefixes(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        let p = &self.req.prefixes;
        let legacy = matches!(self.def.encoding, Encoding::Legacy | Encoding::D3now);
        if legacy {
            if p.any(Prefixes::XACQUIRE) {
                buf.push(PREFIX_REPNE)?;
            }
            if p.any(Prefixes::XRELEASE) {
                buf.push(PREFIX_REP)?;
            }
            if p.any(Prefixes::LOCK) {
                buf.push(PREFIX_LOCK)?;
            }
            if p.any(Prefixes::REP | Prefixes::REPE) {
                buf.push(PREFIX_REP)?;
            }
            if p.any(Prefixes::REPNE) {
                buf.push(PREFIX_REPNE)?;
            }
            if p.any(Prefixes::BND) {
                buf.push(PREFIX_REPNE)?;
            }
            if p.any(Prefixes::NOTRACK) {
                buf.push(PREFIX_DS)?;
            }
            if p.any(Prefixes::BRANCH_TAKEN) {
                buf.push(PREFIX_DS)?;
            }
            if p.any(Prefixes::BRANCH_NOT_TAKEN) {
                buf.push(PREFIX_CS)?;
            }
        }
        if let Some(byte) = p.segment_byte() {
            buf.push(byte)?;
        }
        if self.asz67 {
            buf.push(PREFIX_ADDRESS_SIZE)?;
        }
        if legacy && self.osz66 {
            buf.push(PREFIX_OPERAND_SIZE)?;
        }
        Ok(())
    }

    fn emit_rex(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        let needed =
            self.rex_w || self.rr || self.rx || self.rb || self.rex_required;
        if !needed {
            return Ok(());
        }
        if self.rex_forbidden {
            return Err(Error::InvalidOperandForMode);
        }
        let byte = 0x40
            | u8::from(self.rex_w) << 3
            | u8::from(self.rr) << 2
            | u8::from(self.rx) << 1
            | u8::from(self.rb);
        buf.push(byte)
    }

    fn w_bit(&self) -> u8 {
        match self.def.w {
            WPolicy::W0 => 0,
            WPolicy::Wsize => u8::from(self.opsize == 64),
        }
    }

    fn emit_vex(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        let l = u8::from(self.vl >= 256);
        let w = self.w_bit();
        let two_byte = self.def.encoding == Encoding::Vex
            && self.def.map == Map::M0f
            && w == 0
            && !self.rx
            && !self.rb;
        if two_byte {
            buf.push(0xc5)?;
            buf.push(
                u8::from(!self.rr) << 7 | (!self.vvvv & 0xf) << 3 | l << 2 | self.def.pp.bits(),
            )?;
        } else {
            buf.push(if self.def.encoding == Encoding::Xop {
                0x8f
            } else {
                0xc4
            })?;
            buf.push(
                u8::from(!self.rr) << 7
                    | u8::from(!self.rx) << 6
                    | u8::from(!self.rb) << 5
                    | self.def.map.selector(),
            )?;
            buf.push(w << 7 | (!self.vvvv & 0xf) << 3 | l << 2 | self.def.pp.bits())?;
        }
        buf.push(self.def.opcode)
    }

    fn emit_evex(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        buf.push(0x62)?;
        buf.push(
            u8::from(!self.rr) << 7
                | u8::from(!self.rx) << 6
                | u8::from(!self.rb) << 5
                | u8::from(!self.r2) << 4
                | self.def.map.selector(),
        )?;
        buf.push(
            self.w_bit() << 7 | (!self.vvvv & 0xf) << 3 | 1 << 2 | self.def.pp.bits(),
        )?;
        buf.push(
            u8::from(self.z) << 7
                | self.ll << 5
                | u8::from(self.evex_b) << 4
                | u8::from(!self.v2) << 3
                | self.aaa,
        )?;
        buf.push(self.def.opcode)
    }

    fn emit_mvex(&self, buf: &mut InsnBuffer) -> Result<(), Error> {
        buf.push(0x62)?;
        buf.push(
            u8::from(!self.rr) << 7
                | u8::from(!self.rx) << 6
                | u8::from(!self.rb) << 5
                | u8::from(!self.r2) << 4
                | self.def.map.selector(),
        )?;
        // Bit 2 is fixed to zero and distinguishes MVEX from EVEX.
        buf.push(self.w_bit() << 7 | (!self.vvvv & 0xf) << 3 | self.def.pp.bits())?;
        buf.push(
            u8::from(self.mvex_e) << 7
                | self.sss << 4
                | u8::from(!self.v2) << 3
                | self.aaa,
        )?;
        buf.push(self.def.opcode)
    }
}
