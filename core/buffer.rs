use crate::{error::Error, MAX_INSN_LEN};

/// Staging buffer for a single instruction.
///
/// All fragments are collected here first so that a failing encode never
/// commits partial output to the caller's buffer.
#[derive(Copy, Clone)]
pub struct InsnBuffer {
    bytes: [u8; MAX_INSN_LEN],
    len: usize,
}

impl Default for InsnBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InsnBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_INSN_LEN],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        if self.len >= MAX_INSN_LEN {
            return Err(Error::InstructionTooLong);
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Append the low `bits` of `value`, little-endian. `bits` must be a
    /// multiple of 8.
    pub fn push_int(&mut self, value: u64, bits: u32) -> Result<(), Error> {
        debug_assert!(bits % 8 == 0 && bits <= 64);
        let mut value = value;
        for _ in 0..bits / 8 {
            self.push(value as u8)?;
            value >>= 8;
        }
        Ok(())
    }

    /// Copy the staged instruction into `out` and return its length.
    pub fn copy_to(&self, out: &mut [u8]) -> Result<usize, Error> {
        if out.len() < self.len {
            return Err(Error::BufferTooSmall);
        }
        out[..self.len].copy_from_slice(&self.bytes[..self.len]);
        Ok(self.len)
    }
}
