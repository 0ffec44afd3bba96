//! Encoding-packet header codec.
//!
//! Custom packets carry `[OTI prefix][SBN bits][ESI bits][ECC bits][payload]`,
//! with the three bit fields packed MSB-first and zero-padded to a byte
//! boundary. Native packets carry `[SBN:1][ESI:3, big-endian][payload]`.

use raptorq_raw::PAYLOAD_ID_LEN;
use tracing::{trace, warn};

use crate::bits::BitVector;
use crate::ecc::Ecc;
use crate::error::FrameError;
use crate::remap::SafeRemap;

/// Rewrites packet headers between native and custom framing.
#[derive(Clone, Debug)]
pub struct PacketHeaderCodec {
    sbn: SafeRemap,
    esi: SafeRemap,
    ecc: Option<Ecc>,
}

impl PacketHeaderCodec {
    /// Codec over the given SBN and ESI remaps and optional check.
    #[must_use]
    pub const fn new(sbn: SafeRemap, esi: SafeRemap, ecc: Option<Ecc>) -> Self {
        Self { sbn, esi, ecc }
    }

    fn id_bits(&self) -> usize {
        self.sbn.external_bits() + self.esi.external_bits()
    }

    /// Packed header length in bits.
    #[must_use]
    pub fn header_bits(&self) -> usize {
        self.id_bits() + self.ecc.as_ref().map_or(0, Ecc::bits)
    }

    /// Packed header length in bytes.
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.header_bits().div_ceil(8)
    }

    /// Reframe a native packet, prepending `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TooShort` for a packet without a payload ID, or
    /// `FrameError::Field` if SBN or ESI cannot cross its remap.
    pub fn encode_packet(&self, prefix: &[u8], native: &[u8]) -> Result<Vec<u8>, FrameError> {
        if native.len() < PAYLOAD_ID_LEN {
            return Err(FrameError::TooShort {
                len: native.len(),
                needed: PAYLOAD_ID_LEN,
            });
        }
        let (id, payload) = native.split_at(PAYLOAD_ID_LEN);
        let sbn = u64::from(id[0]);
        let esi = u64::from_be_bytes([0, 0, 0, 0, 0, id[1], id[2], id[3]]);

        let mut header = BitVector::zeros(self.header_bits());
        header.set_bits_at(0, &self.sbn.encode(sbn)?);
        header.set_bits_at(self.sbn.external_bits(), &self.esi.encode(esi)?);

        if let Some(ecc) = &self.ecc {
            let id_bits = self.id_bits();
            let check = ecc.compute(&header.slice(0, id_bits).to_packed_bytes(), payload);
            header.set_bits_at(id_bits, &BitVector::from_value(check, ecc.bits()));
        }

        let mut packet = Vec::with_capacity(prefix.len() + self.header_len() + payload.len());
        packet.extend_from_slice(prefix);
        packet.extend_from_slice(header.as_bytes());
        packet.extend_from_slice(payload);

        trace!(sbn, esi, len = packet.len(), "packet framed");
        Ok(packet)
    }

    /// Restore a native packet from a custom packet with its OTI prefix
    /// already removed.
    ///
    /// Returns `None` for a packet whose check value does not match.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TooShort` if the packet cannot hold the header,
    /// or `FrameError::Field` if SBN or ESI cannot cross its remap.
    pub fn decode_packet(&self, packet: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        let header_len = self.header_len();
        if packet.len() < header_len {
            return Err(FrameError::TooShort {
                len: packet.len(),
                needed: header_len,
            });
        }
        let (head, payload) = packet.split_at(header_len);
        let header = BitVector::from_packed_bytes(head, self.header_bits());

        let sbn_end = self.sbn.external_bits();
        let esi_end = self.id_bits();

        if let Some(ecc) = &self.ecc {
            let carried = header.slice(esi_end, esi_end + ecc.bits()).to_u64();
            let computed = ecc.compute(&header.slice(0, esi_end).to_packed_bytes(), payload);
            if carried != computed {
                warn!(carried, computed, "ECC mismatch, dropping packet");
                return Ok(None);
            }
        }

        let sbn = self.sbn.decode(&header.slice(0, sbn_end))?;
        let esi = self.esi.decode(&header.slice(sbn_end, esi_end))?;

        // The remap ceilings hold SBN to 8 bits and ESI to 24.
        let sbn_bytes = sbn.to_be_bytes();
        let esi_bytes = esi.to_be_bytes();

        let mut native = Vec::with_capacity(PAYLOAD_ID_LEN + payload.len());
        native.push(sbn_bytes[7]);
        native.extend_from_slice(&esi_bytes[5..]);
        native.extend_from_slice(payload);

        trace!(sbn, esi, "packet restored");
        Ok(Some(native))
    }
}
