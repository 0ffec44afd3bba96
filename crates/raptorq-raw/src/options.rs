//! Encode options and decode output format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RawError;
use crate::{
    MAX_ENCODING_SYMBOLS_PER_BLOCK, MAX_SOURCE_SYMBOLS_PER_BLOCK, MAX_TRANSFER_LENGTH,
    PAYLOAD_ID_LEN,
};

/// `RaptorQ` encode options.
///
/// Every field is optional when deserialized; missing fields take the defaults
/// below.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Symbol size in bytes.
    ///
    /// Default: 1400
    pub symbol_size: u16,

    /// Repair symbols generated per source block.
    ///
    /// Default: 15
    pub num_repair_symbols: u32,

    /// Number of source blocks.
    ///
    /// Default: 1
    pub num_source_blocks: u8,

    /// Number of sub-blocks per source block.
    ///
    /// Default: 1
    pub num_sub_blocks: u16,

    /// Symbol alignment in bytes. Must divide `symbol_size`.
    ///
    /// Default: 8
    pub symbol_alignment: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            symbol_size: 1400,
            num_repair_symbols: 15,
            num_source_blocks: 1,
            num_sub_blocks: 1,
            symbol_alignment: 8,
        }
    }
}

impl EncodeOptions {
    /// Check the options against the codec's parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns `RawError::InvalidOptions` naming the first offending field.
    pub fn validate(&self) -> Result<(), RawError> {
        if self.symbol_size == 0 {
            return Err(invalid("symbol_size", "must be non-zero uint16"));
        }
        if self.num_source_blocks == 0 {
            return Err(invalid("num_source_blocks", "must be non-zero uint8"));
        }
        if self.num_sub_blocks == 0 {
            return Err(invalid("num_sub_blocks", "must be non-zero uint16"));
        }
        if self.symbol_alignment == 0 {
            return Err(invalid("symbol_alignment", "must be non-zero uint8"));
        }
        if self.symbol_size % u16::from(self.symbol_alignment) != 0 {
            return Err(invalid(
                "symbol_size",
                format!(
                    "{} is not a multiple of symbol_alignment {}",
                    self.symbol_size, self.symbol_alignment
                ),
            ));
        }
        let sub_symbol_units = self.symbol_size / u16::from(self.symbol_alignment);
        if self.num_sub_blocks > sub_symbol_units {
            return Err(invalid(
                "num_sub_blocks",
                format!(
                    "{} exceeds symbol_size / symbol_alignment = {sub_symbol_units}",
                    self.num_sub_blocks
                ),
            ));
        }
        Ok(())
    }

    /// Check that a payload of `payload_len` bytes fits these options.
    ///
    /// # Errors
    ///
    /// Returns `RawError` if the payload is empty, too large, spread over more
    /// blocks than it has symbols, packs too many symbols into one block, or
    /// asks for more repair symbols than the ESI can number.
    pub fn validate_payload(&self, payload_len: u64) -> Result<(), RawError> {
        if payload_len == 0 {
            return Err(RawError::EmptyPayload);
        }
        if payload_len > MAX_TRANSFER_LENGTH {
            return Err(RawError::TransferLengthTooLarge {
                length: payload_len,
                max: MAX_TRANSFER_LENGTH,
            });
        }
        let source_symbols = self.source_symbols(payload_len);
        if source_symbols < u64::from(self.num_source_blocks) {
            return Err(invalid(
                "num_source_blocks",
                format!(
                    "{} blocks requested for only {source_symbols} source symbols",
                    self.num_source_blocks
                ),
            ));
        }
        let per_block = self.symbols_per_block(payload_len);
        if per_block > MAX_SOURCE_SYMBOLS_PER_BLOCK {
            return Err(RawError::TooManySymbolsPerBlock {
                symbols: per_block,
                max: MAX_SOURCE_SYMBOLS_PER_BLOCK,
            });
        }
        // Repair ESIs continue after the block's source symbols.
        let encoding_symbols = per_block + u64::from(self.num_repair_symbols);
        if encoding_symbols > MAX_ENCODING_SYMBOLS_PER_BLOCK {
            return Err(invalid(
                "num_repair_symbols",
                format!(
                    "{} repair symbols after {per_block} source symbols exceed \
                     {MAX_ENCODING_SYMBOLS_PER_BLOCK} encoding symbols per block",
                    self.num_repair_symbols
                ),
            ));
        }
        Ok(())
    }

    /// Native packet length: payload ID plus one symbol.
    #[must_use]
    pub const fn packet_len(&self) -> usize {
        PAYLOAD_ID_LEN + self.symbol_size as usize
    }

    /// Source symbols (K) needed for a payload.
    #[must_use]
    pub fn source_symbols(&self, payload_len: u64) -> u64 {
        payload_len.div_ceil(u64::from(self.symbol_size))
    }

    /// Largest number of source symbols in any one block.
    #[must_use]
    pub fn symbols_per_block(&self, payload_len: u64) -> u64 {
        payload_len.div_ceil(u64::from(self.symbol_size) * u64::from(self.num_source_blocks))
    }

    /// Total packets (source and repair, all blocks) produced for a payload.
    #[must_use]
    pub fn total_packets(&self, payload_len: u64) -> u64 {
        self.source_symbols(payload_len)
            + u64::from(self.num_repair_symbols) * u64::from(self.num_source_blocks)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> RawError {
    RawError::InvalidOptions {
        field,
        reason: reason.into(),
    }
}

/// Shape of the decoded output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The whole object as one buffer.
    #[default]
    Combined,
    /// Each source block as it completes.
    Blocks,
}

impl OutputFormat {
    /// Literal used on the configuration surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Blocks => "blocks",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined" => Ok(Self::Combined),
            "blocks" => Ok(Self::Blocks),
            other => Err(RawError::InvalidOutputFormat(other.to_string())),
        }
    }
}
