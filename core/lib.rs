#![cfg_attr(not(feature = "std"), no_std)]

pub mod buffer;
pub mod error;
pub mod utils;

/// Architectural limit for the total length of a single instruction.
pub const MAX_INSN_LEN: usize = 15;

/// Maximum number of explicit operands an encode request may carry.
pub const MAX_OPERANDS: usize = 5;
