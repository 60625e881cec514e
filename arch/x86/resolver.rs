//! Post-match resolution: effective address size, legacy prefix legality and
//! EVEX/MVEX execution-modifier validation.

use encoder_core::error::Error;

use crate::insn::{Broadcast, Conversion, Encoding, Operand, Prefixes, Rounding, Swizzle};
use crate::table::{
    F_BCST, F_BND, F_ER, F_HINTS, F_HLE, F_LOCK, F_MASKZ, F_MVEX_MOD, F_NOTRACK, F_REP, F_REPE,
    F_REPNE, F_SAE,
};
use crate::Encoder;

impl Encoder<'_> {
    pub(crate) fn resolve(&mut self) -> Result<(), Error> {
        self.resolve_address_size()?;
        self.resolve_operand_size()?;
        self.check_prefixes()?;
        match self.def.encoding {
            Encoding::Evex => self.resolve_evex_features()?,
            Encoding::Mvex => self.resolve_mvex_features()?,
            _ => {
                if self.req.evex.any() || self.req.mvex.any() {
                    return Err(Error::UnsupportedFeature);
                }
            }
        }
        Ok(())
    }

    fn resolve_address_size(&mut self) -> Result<(), Error> {
        let mut addr = 0;
        for op in self.req.operands() {
            let mem = match op {
                Operand::Mem(mem) => mem,
                _ => continue,
            };
            for reg in [mem.base, mem.index].into_iter().flatten() {
                let w = reg.addr_bits();
                if w == 0 {
                    return Err(Error::OperandMismatch);
                }
                if addr != 0 && addr != w {
                    return Err(Error::OperandMismatch);
                }
                addr = w;
            }
        }
        let hint = self.req.address_size_hint.bits();
        if hint != 0 {
            if addr != 0 && addr != hint {
                return Err(Error::OperandMismatch);
            }
            addr = hint;
        }
        if addr == 0 {
            addr = self.req.mode.default_address_bits();
        }
        let legal = match addr {
            16 | 32 => !(self.req.mode.is_long() && addr == 16),
            64 => self.req.mode.is_long(),
            _ => false,
        };
        if !legal {
            return Err(Error::InvalidOperandForMode);
        }
        self.addrsize = addr;
        self.asz67 = addr != self.req.mode.default_address_bits();
        Ok(())
    }

    fn resolve_operand_size(&mut self) -> Result<(), Error> {
        let default = self.req.mode.default_operand_bits();
        match self.opsize {
            16 => self.osz66 = default == 32,
            32 => self.osz66 = default == 16,
            64 => {
                // Instructions that default to 64-bit in long mode do not
                // need REX.W for it.
                let implied = self.req.mode.is_long() && self.def.has_flag(crate::table::F_D64);
                self.rex_w = !implied;
            }
            _ => {}
        }
        // REX interactions of the byte registers.
        for op in self.req.operands() {
            if let Operand::Reg { reg, .. } = op {
                if reg.forces_rex() {
                    self.rex_required = true;
                }
                if reg.forbids_rex() {
                    self.rex_forbidden = true;
                }
            }
        }
        Ok(())
    }

    fn check_prefixes(&self) -> Result<(), Error> {
        let p = &self.req.prefixes;
        let def = self.def;
        let has_mem = self
            .req
            .operands()
            .iter()
            .any(|op| matches!(op, Operand::Mem(_)));
        let is_string = def.has_flag(F_REP | F_REPE | F_REPNE);
        if p.any(Prefixes::LOCK) && !(def.has_flag(F_LOCK) && has_mem) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::XACQUIRE | Prefixes::XRELEASE)
            && !(def.has_flag(F_HLE) && p.any(Prefixes::LOCK) && has_mem)
        {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::REP) && !def.has_flag(F_REP) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::REPE) && !def.has_flag(F_REPE) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::REPNE) && !def.has_flag(F_REPNE) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::BND) && !def.has_flag(F_BND) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::NOTRACK) && !def.has_flag(F_NOTRACK) {
            return Err(Error::IllegalPrefix);
        }
        if p.any(Prefixes::BRANCH_TAKEN | Prefixes::BRANCH_NOT_TAKEN) && !def.has_flag(F_HINTS) {
            return Err(Error::IllegalPrefix);
        }
        // Segment overrides need something to override: an addressable
        // memory operand or the implicit pointer of a string instruction.
        if p.segment_bits() != 0 && !has_mem && !is_string {
            return Err(Error::IllegalPrefix);
        }
        Ok(())
    }

    fn has_mem_operand(&self) -> bool {
        self.req
            .operands()
            .iter()
            .any(|op| matches!(op, Operand::Mem(_)))
    }

    fn resolve_evex_features(&mut self) -> Result<(), Error> {
        let features = self.req.evex;
        let has_mem = self.has_mem_operand();
        self.ll = vl_code(self.vl);
        if features.broadcast != Broadcast::None {
            if !self.def.has_flag(F_BCST) || !has_mem {
                return Err(Error::UnsupportedFeature);
            }
            // The replication factor must fill the vector exactly.
            if u32::from(features.broadcast.factor())
                != u32::from(self.vl) / 8 / u32::from(self.def.element)
            {
                return Err(Error::UnsupportedFeature);
            }
            self.evex_b = true;
        }
        if features.rounding != Rounding::None {
            if !self.def.has_flag(F_ER) || has_mem || self.vl != 512 {
                return Err(Error::UnsupportedFeature);
            }
            self.evex_b = true;
            self.ll = features.rounding.rc();
        } else if features.sae {
            if !self.def.has_flag(F_SAE) || has_mem || self.vl != 512 {
                return Err(Error::UnsupportedFeature);
            }
            self.evex_b = true;
        }
        if features.zeroing {
            if !self.def.has_flag(F_MASKZ) {
                return Err(Error::UnsupportedFeature);
            }
            self.z = true;
        }
        Ok(())
    }

    fn resolve_mvex_features(&mut self) -> Result<(), Error> {
        let features = self.req.mvex;
        let has_mem = self.has_mem_operand();
        if features.any() && !self.def.has_flag(F_MVEX_MOD) {
            return Err(Error::UnsupportedFeature);
        }
        if has_mem {
            if features.swizzle != Swizzle::None
                || features.rounding != Rounding::None
                || features.sae
            {
                return Err(Error::UnsupportedFeature);
            }
            // The SSS field holds either a broadcast or a conversion.
            self.sss = match (features.broadcast, features.conversion) {
                (Broadcast::None, conv) => conv.sss(),
                (Broadcast::B1to16, Conversion::None) => 1,
                (Broadcast::B4to16, Conversion::None) => 2,
                _ => return Err(Error::UnsupportedFeature),
            };
            self.mvex_e = features.eviction_hint;
        } else {
            if features.broadcast != Broadcast::None
                || features.conversion != Conversion::None
                || features.eviction_hint
            {
                return Err(Error::UnsupportedFeature);
            }
            if features.rounding != Rounding::None || features.sae {
                if features.swizzle != Swizzle::None {
                    return Err(Error::UnsupportedFeature);
                }
                self.mvex_e = true;
                self.sss = features.rounding.rc() | if features.sae { 4 } else { 0 };
            } else {
                self.sss = features.swizzle.sss();
            }
        }
        Ok(())
    }
}

fn vl_code(vl: u16) -> u8 {
    match vl {
        256 => 1,
        512 => 2,
        _ => 0,
    }
}
