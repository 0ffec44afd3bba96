//! Payload transfer-length trim.
//!
//! When the OTI's transfer length is narrowed or hardcoded, the decoder only
//! learns a rounded length. The trim writes the exact plaintext length in
//! front of the plaintext, pads the result to the pumped length, and strips
//! both again after decoding.

use std::fmt;
use std::sync::Arc;

use raptorq_raw::{MAX_TRANSFER_LENGTH, RawError};
use tracing::debug;

use crate::bits::BitVector;
use crate::error::{FrameError, SuppaError};
use crate::remap::SafeRemap;

/// Rounds a length up (e.g. to a symbol-size multiple).
pub type Pump = Arc<dyn Fn(u64) -> u64 + Send + Sync>;

/// A pump rounding up to a multiple of `granularity`.
///
/// # Panics
///
/// Panics if `granularity` is zero.
#[must_use]
pub fn round_up_to(granularity: u64) -> Pump {
    assert!(granularity > 0, "granularity must be non-zero");
    Arc::new(move |len: u64| len.div_ceil(granularity) * granularity)
}

/// Length prefix codec with its pump.
#[derive(Clone)]
pub struct LengthTrim {
    remap: SafeRemap,
    pump: Pump,
}

impl LengthTrim {
    /// Trim over a length remap and pump.
    #[must_use]
    pub fn new(remap: SafeRemap, pump: Pump) -> Self {
        Self { remap, pump }
    }

    /// Bytes the length prefix occupies.
    #[must_use]
    pub fn prefix_len(&self) -> usize {
        self.remap.external_bits().div_ceil(8)
    }

    /// Transfer length of the wrapped payload: prefix plus data, pumped.
    ///
    /// Nothing is allocated, so the result can be checked against the encode
    /// options first.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PumpShrank` if the pump rounds down, or
    /// `RawError::TransferLengthTooLarge` if it rounds past the codec ceiling.
    pub fn wrapped_len(&self, data_len: usize) -> Result<u64, SuppaError> {
        let total = (self.prefix_len() + data_len) as u64;
        let pumped = (self.pump)(total);

        if pumped < total {
            return Err(FrameError::PumpShrank {
                input: total,
                output: pumped,
            }
            .into());
        }
        if pumped > MAX_TRANSFER_LENGTH {
            return Err(RawError::TransferLengthTooLarge {
                length: pumped,
                max: MAX_TRANSFER_LENGTH,
            }
            .into());
        }
        Ok(pumped)
    }

    /// `[length prefix][data][zero padding]`, padded to `transfer_length`
    /// as returned by [`LengthTrim::wrapped_len`].
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PumpShrank` if `transfer_length` cannot hold the
    /// prefix and data, `RawError::TransferLengthTooLarge` if it does not fit
    /// in memory, or `FrameError::Field` if the length cannot cross its remap.
    pub fn wrap(&self, data: &[u8], transfer_length: u64) -> Result<Vec<u8>, SuppaError> {
        let prefix_len = self.prefix_len();
        let needed = prefix_len + data.len();
        let padded_len =
            usize::try_from(transfer_length).map_err(|_| RawError::TransferLengthTooLarge {
                length: transfer_length,
                max: MAX_TRANSFER_LENGTH,
            })?;
        if padded_len < needed {
            return Err(FrameError::PumpShrank {
                input: needed as u64,
                output: transfer_length,
            }
            .into());
        }

        let prefix = self.remap.encode_in(data.len() as u64, transfer_length)?;
        let mut wrapped = Vec::with_capacity(padded_len);
        wrapped.extend_from_slice(prefix.as_bytes());
        wrapped.extend_from_slice(data);
        wrapped.resize(padded_len, 0);

        debug!(
            len = data.len(),
            prefix_len,
            transfer_length,
            "payload wrapped with length prefix"
        );
        Ok(wrapped)
    }

    /// Strip the prefix and padding from a decoded object of
    /// `transfer_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TooShort` if the object cannot hold the prefix,
    /// `FrameError::TrimOverrun` if the prefix declares more bytes than follow
    /// it, or `FrameError::Field` if the prefix cannot cross its remap.
    pub fn strip(&self, mut decoded: Vec<u8>, transfer_length: u64) -> Result<Vec<u8>, FrameError> {
        let prefix_len = self.prefix_len();
        if decoded.len() < prefix_len {
            return Err(FrameError::TooShort {
                len: decoded.len(),
                needed: prefix_len,
            });
        }

        let prefix = BitVector::from_packed_bytes(&decoded, self.remap.external_bits());
        let declared = self.remap.decode_in(&prefix, transfer_length)?;
        let available = decoded.len() - prefix_len;

        match usize::try_from(declared) {
            Ok(len) if len <= available => {
                decoded.drain(..prefix_len);
                decoded.truncate(len);
                Ok(decoded)
            }
            _ => Err(FrameError::TrimOverrun {
                declared,
                available: available as u64,
            }),
        }
    }
}

impl fmt::Debug for LengthTrim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LengthTrim")
            .field("remap", &self.remap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::field::Field;
    use crate::remap::{FnRemap, Identity, LengthRemap, RemapRejected};

    fn wrap_all(trim: &LengthTrim, data: &[u8]) -> Result<Vec<u8>, SuppaError> {
        let transfer_length = trim.wrapped_len(data.len())?;
        trim.wrap(data, transfer_length)
    }

    fn identity_trim(bits: usize, pump: Pump) -> LengthTrim {
        LengthTrim::new(
            SafeRemap::for_length(Field::TransferLengthTrim, Arc::new(Identity), bits, 40),
            pump,
        )
    }

    #[test]
    fn wrap_pads_to_pumped_length() {
        let trim = identity_trim(16, round_up_to(64));
        let wrapped = wrap_all(&trim, b"hello").unwrap();
        assert_eq!(wrapped.len(), 64);
        assert_eq!(&wrapped[..2], &[0, 5]);
        assert_eq!(&wrapped[2..7], b"hello");
        assert!(wrapped[7..].iter().all(|&b| b == 0));

        assert_eq!(trim.strip(wrapped, 64).unwrap(), b"hello");
    }

    #[test]
    fn sub_byte_prefix_rounds_to_whole_bytes() {
        let trim = identity_trim(12, Arc::new(|len: u64| len));
        assert_eq!(trim.prefix_len(), 2);
        let wrapped = wrap_all(&trim, &[7; 300]).unwrap();
        assert_eq!(wrapped.len(), 302);
        assert_eq!(trim.strip(wrapped, 302).unwrap(), vec![7; 300]);
    }

    #[test]
    fn shrinking_pump_rejected() {
        let trim = identity_trim(8, Arc::new(|len: u64| len - 1));
        assert_eq!(
            trim.wrapped_len(3),
            Err(SuppaError::Frame(FrameError::PumpShrank {
                input: 4,
                output: 3
            }))
        );
    }

    #[test]
    fn oversized_pump_is_measured_before_allocating() {
        let trim = identity_trim(40, Arc::new(|_len: u64| 200_000_000_000));
        assert_eq!(trim.wrapped_len(10), Ok(200_000_000_000));

        let trim = identity_trim(40, Arc::new(|_len: u64| u64::MAX));
        assert_eq!(
            trim.wrapped_len(10),
            Err(SuppaError::Raw(RawError::TransferLengthTooLarge {
                length: u64::MAX,
                max: MAX_TRANSFER_LENGTH
            }))
        );
    }

    #[test]
    fn wrap_refuses_a_length_shorter_than_its_content() {
        let trim = identity_trim(8, Arc::new(|len: u64| len));
        assert_eq!(
            trim.wrap(b"abc", 3),
            Err(SuppaError::Frame(FrameError::PumpShrank {
                input: 4,
                output: 3
            }))
        );
    }

    #[test]
    fn length_too_wide_for_prefix() {
        let trim = identity_trim(8, Arc::new(|len: u64| len));
        assert!(matches!(
            wrap_all(&trim, &[0; 256]),
            Err(SuppaError::Frame(FrameError::Field(FieldError::OutOfRange {
                value: 256,
                ..
            })))
        ));
    }

    #[test]
    fn overrunning_prefix_rejected() {
        let trim = identity_trim(8, Arc::new(|len: u64| len));
        assert_eq!(
            trim.strip(vec![10, 1, 2, 3], 4),
            Err(FrameError::TrimOverrun {
                declared: 10,
                available: 3
            })
        );
    }

    #[test]
    fn hardcoded_length_comes_from_transfer_length() {
        // No prefix: the payload fills the object minus a fixed 3-byte tail.
        let tail: Arc<dyn LengthRemap> = Arc::new(FnRemap::new(
            |_external: Option<u64>, transfer_length: u64| -> Result<u64, RemapRejected> {
                transfer_length
                    .checked_sub(3)
                    .ok_or_else(|| RemapRejected("object shorter than tail".into()))
            },
            |_internal: u64, _transfer_length: u64| -> Option<u64> { None },
        ));
        let trim = LengthTrim::new(
            SafeRemap::for_length(Field::TransferLengthTrim, tail, 0, 40),
            Arc::new(|len: u64| len + 3),
        );

        let wrapped = wrap_all(&trim, b"data").unwrap();
        assert_eq!(wrapped, b"data\0\0\0");
        assert_eq!(trim.strip(wrapped, 7).unwrap(), b"data");
    }
}
