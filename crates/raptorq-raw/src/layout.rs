//! Source block partitioning (RFC 6330 §4.4.1.2).

/// Per-block sizes for one object.
///
/// The first `long_blocks` blocks carry `long_symbols` source symbols, the rest
/// carry `short_symbols`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    transfer_length: u64,
    symbol_size: u64,
    long_symbols: u64,
    short_symbols: u64,
    long_blocks: u64,
    short_blocks: u64,
}

impl BlockLayout {
    /// Partition `transfer_length` bytes into `num_source_blocks` blocks.
    ///
    /// `symbol_size` and `num_source_blocks` must be non-zero.
    #[must_use]
    pub fn new(transfer_length: u64, symbol_size: u16, num_source_blocks: u8) -> Self {
        let symbol_size = u64::from(symbol_size);
        let total_symbols = transfer_length.div_ceil(symbol_size);
        let (long_symbols, short_symbols, long_blocks, short_blocks) =
            partition(total_symbols, u64::from(num_source_blocks));

        Self {
            transfer_length,
            symbol_size,
            long_symbols,
            short_symbols,
            long_blocks,
            short_blocks,
        }
    }

    /// Number of source blocks.
    #[must_use]
    pub const fn block_count(&self) -> u64 {
        self.long_blocks + self.short_blocks
    }

    /// Source symbols in block `sbn`.
    #[must_use]
    pub const fn symbols_in(&self, sbn: u8) -> u64 {
        if (sbn as u64) < self.long_blocks {
            self.long_symbols
        } else {
            self.short_symbols
        }
    }

    /// Padded block length in bytes, as reconstructed by the codec.
    #[must_use]
    pub const fn padded_len(&self, sbn: u8) -> u64 {
        self.symbols_in(sbn) * self.symbol_size
    }

    /// Byte offset of block `sbn` within the object.
    #[must_use]
    pub const fn offset(&self, sbn: u8) -> u64 {
        let sbn = sbn as u64;
        if sbn <= self.long_blocks {
            sbn * self.long_symbols * self.symbol_size
        } else {
            (self.long_blocks * self.long_symbols + (sbn - self.long_blocks) * self.short_symbols)
                * self.symbol_size
        }
    }

    /// Bytes of block `sbn` that belong to the object (the last block drops padding).
    #[must_use]
    pub fn data_len(&self, sbn: u8) -> u64 {
        let remaining = self.transfer_length.saturating_sub(self.offset(sbn));
        remaining.min(self.padded_len(sbn))
    }
}

/// `Partition[I, J]`: split `i` items into `j` nearly equal parts.
///
/// Returns `(il, is, jl, js)`: `jl` parts of size `il` followed by `js` parts of
/// size `is`.
const fn partition(i: u64, j: u64) -> (u64, u64, u64, u64) {
    let il = i.div_ceil(j);
    let is = i / j;
    let jl = i - is * j;
    let js = j - jl;
    (il, is, jl, js)
}
