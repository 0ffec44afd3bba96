//! Where the custom OTI travels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{FrameError, StrategyError};

/// OTI placement mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Sent once, out of band; the decoder is handed it directly.
    #[default]
    Negotiated,
    /// Prefixed to every packet; the decoder reads it from the first packet.
    Embedded,
}

impl Placement {
    /// Literal used on the configuration surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negotiated => "negotiated",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "negotiated" => Ok(Self::Negotiated),
            "embedded" => Ok(Self::Embedded),
            other => Err(StrategyError::InvalidPlacement(other.to_string())),
        }
    }
}

/// Splits the embedded OTI prefix off each packet of one decode call.
///
/// The first packet's prefix is sent on the signal channel exactly once;
/// every later prefix must match it byte for byte.
#[derive(Debug)]
pub(crate) struct EmbeddedOti {
    prefix_len: usize,
    first: Option<Vec<u8>>,
    signal: Option<oneshot::Sender<Vec<u8>>>,
    next_index: u64,
}

impl EmbeddedOti {
    pub(crate) const fn new(prefix_len: usize, signal: oneshot::Sender<Vec<u8>>) -> Self {
        Self {
            prefix_len,
            first: None,
            signal: Some(signal),
            next_index: 0,
        }
    }

    /// Strip and check the prefix, returning the rest of the packet.
    pub(crate) fn split<'p>(&mut self, packet: &'p [u8]) -> Result<&'p [u8], FrameError> {
        let index = self.next_index;
        self.next_index += 1;

        if packet.len() < self.prefix_len {
            return Err(FrameError::TooShort {
                len: packet.len(),
                needed: self.prefix_len,
            });
        }
        let (prefix, rest) = packet.split_at(self.prefix_len);

        match &self.first {
            None => {
                debug!(len = prefix.len(), "embedded OTI extracted");
                self.first = Some(prefix.to_vec());
                if let Some(signal) = self.signal.take() {
                    // The receiver is gone only if the decode call was abandoned.
                    let _ = signal.send(prefix.to_vec());
                }
            }
            Some(first) if first.as_slice() != prefix => {
                warn!(packet_index = index, "embedded OTI mismatch");
                return Err(FrameError::OtiMismatch {
                    packet_index: index,
                    expected: first.clone(),
                    got: prefix.to_vec(),
                });
            }
            Some(_) => {}
        }
        Ok(rest)
    }
}
