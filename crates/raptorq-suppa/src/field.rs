//! Names of every value the framing layer can re-encode.

use std::fmt;

/// A re-encodable header or OTI field.
///
/// Used to label strategy entries and to name the offending value in errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Source block number of an encoding packet.
    Sbn,
    /// Encoding symbol ID of an encoding packet.
    Esi,
    /// Per-packet integrity check.
    Ecc,
    /// OTI transfer length.
    TransferLength,
    /// OTI FEC encoding ID.
    FecEncodingId,
    /// OTI symbol size.
    SymbolSize,
    /// OTI number of source blocks.
    NumSourceBlocks,
    /// OTI number of sub-blocks.
    NumSubBlocks,
    /// OTI symbol alignment.
    SymbolAlignment,
    /// Length prefix written in front of the payload.
    TransferLengthTrim,
}

impl Field {
    /// OTI fields in wire order.
    pub const OTI: [Self; 6] = [
        Self::TransferLength,
        Self::FecEncodingId,
        Self::SymbolSize,
        Self::NumSourceBlocks,
        Self::NumSubBlocks,
        Self::SymbolAlignment,
    ];

    /// Width of the field in the native `RaptorQ` framing.
    #[must_use]
    pub const fn native_bits(self) -> u32 {
        match self {
            Self::Sbn | Self::FecEncodingId | Self::NumSourceBlocks | Self::SymbolAlignment => 8,
            Self::SymbolSize | Self::NumSubBlocks => 16,
            Self::Esi => 24,
            Self::Ecc => 32,
            Self::TransferLength | Self::TransferLengthTrim => 40,
        }
    }

    /// Dotted path of the field in a strategy.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Sbn => "encoding_packet.sbn",
            Self::Esi => "encoding_packet.esi",
            Self::Ecc => "encoding_packet.ecc",
            Self::TransferLength => "oti.transfer_length",
            Self::FecEncodingId => "oti.fec_encoding_id",
            Self::SymbolSize => "oti.symbol_size",
            Self::NumSourceBlocks => "oti.num_source_blocks",
            Self::NumSubBlocks => "oti.num_sub_blocks",
            Self::SymbolAlignment => "oti.symbol_alignment",
            Self::TransferLengthTrim => "payload.transfer_length_trim",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
