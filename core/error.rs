use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The mnemonic has no table entry.
    UnknownMnemonic,
    /// The allowed-encodings mask excludes every definition of the mnemonic.
    NoApplicableEncoding,
    /// No candidate definition matches the supplied operands.
    OperandMismatch,
    /// An operand or encoding form is illegal in the requested machine mode.
    InvalidOperandForMode,
    /// A requested prefix is not legal for the selected definition.
    IllegalPrefix,
    /// A requested EVEX/MVEX feature is not supported by the selected definition.
    UnsupportedFeature,
    /// A displacement does not fit the selected field width.
    DisplacementOverflow,
    /// An immediate does not fit the selected field width.
    ImmediateOverflow,
    /// The assembled instruction exceeds the architectural length limit.
    InstructionTooLong,
    /// The caller buffer is too small for the encoded instruction.
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::UnknownMnemonic => "unknown mnemonic",
            Self::NoApplicableEncoding => "no applicable encoding",
            Self::OperandMismatch => "operands do not match any encoding",
            Self::InvalidOperandForMode => "operand is invalid for machine mode",
            Self::IllegalPrefix => "illegal prefix",
            Self::UnsupportedFeature => "unsupported feature",
            Self::DisplacementOverflow => "displacement does not fit",
            Self::ImmediateOverflow => "immediate does not fit",
            Self::InstructionTooLong => "instruction is too long",
            Self::BufferTooSmall => "output buffer is too small",
        };
        fmt.write_str(s)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
