/// Does `value` fit into `bits` as a two's complement signed integer?
pub const fn fits_signed(value: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    let min = -(1_i64 << (bits - 1));
    let max = (1_i64 << (bits - 1)) - 1;
    value >= min && value <= max
}

/// Does `value` fit into `bits` as an unsigned integer?
pub const fn fits_unsigned(value: u64, bits: u32) -> bool {
    bits >= 64 || value < (1_u64 << bits)
}
