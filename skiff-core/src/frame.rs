//! Logical frames
//!
//! A [`Frame`] is an opcode plus a complete payload. It never travels on the
//! wire itself: on the way out it is chunked into [`Fragment`]s according to a
//! [`ChunkingMode`], on the way in a [`FrameAssembler`] collects fragments
//! until the final one arrives and glues their payloads back together.

use crate::{error::ProtocolError, fragment::Fragment, protocol::Opcode};
use bytes::{Bytes, BytesMut};

/// How outgoing payloads are split into fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkingMode {
    /// Never split; the 64-bit length form is used whenever needed
    AlwaysExtendedLength,
    /// Split into fragments of at most 65535 bytes
    #[default]
    LimitTo16Bit,
    /// Split into fragments of at most 125 bytes
    NeverUseExtendedLength,
}

impl ChunkingMode {
    /// Largest payload a single outgoing fragment carries
    pub fn max_fragment_size(self) -> usize {
        match self {
            ChunkingMode::AlwaysExtendedLength => i32::MAX as usize,
            ChunkingMode::LimitTo16Bit => u16::MAX as usize,
            ChunkingMode::NeverUseExtendedLength => 125,
        }
    }
}

/// A complete logical frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opcode of the first fragment
    pub opcode: Opcode,
    /// Reassembled payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Split into masked client fragments.
    ///
    /// Payloads shorter than the mode's limit become a single final fragment.
    /// Longer ones are sliced; the first slice keeps the frame's opcode, the
    /// rest are continuations and only the last carries FIN.
    pub fn to_fragments(&self, mode: ChunkingMode) -> Vec<Fragment> {
        let max = mode.max_fragment_size();
        let len = self.payload.len();

        if len < max {
            return vec![Fragment::new(true, self.opcode, self.payload.clone(), true)];
        }

        let count = len.div_ceil(max);
        (0..count)
            .map(|i| {
                let start = i * max;
                let end = (start + max).min(len);
                let opcode = if i == 0 {
                    self.opcode
                } else {
                    Opcode::Continuation
                };
                Fragment::new(i + 1 == count, opcode, self.payload.slice(start..end), true)
            })
            .collect()
    }

    /// Concatenate the payloads of `fragments`, taking the opcode of the
    /// first one. `None` for an empty slice.
    pub fn from_fragments(fragments: &[Fragment]) -> Option<Self> {
        let first = fragments.first()?;
        if fragments.len() == 1 {
            return Some(Self::new(first.opcode, first.payload.clone()));
        }

        let total = fragments.iter().map(Fragment::payload_len).sum();
        let mut payload = BytesMut::with_capacity(total);
        for fragment in fragments {
            payload.extend_from_slice(&fragment.payload);
        }

        Some(Self::new(first.opcode, payload.freeze()))
    }
}

/// Reassembles incoming fragments into frames
#[derive(Debug, Default)]
pub struct FrameAssembler {
    partial: Vec<Fragment>,
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment.
    ///
    /// Returns the completed frame once the final fragment of a message has
    /// been seen. Control fragments may arrive between the pieces of a
    /// fragmented data message and are returned immediately.
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<Frame>, ProtocolError> {
        if fragment.has_reserved_bits() {
            return Err(ProtocolError::ReservedBitsSet);
        }

        if fragment.opcode == Opcode::Continuation {
            if self.partial.is_empty() {
                return Err(ProtocolError::UnexpectedContinuation);
            }

            let fin = fragment.fin;
            self.partial.push(fragment);
            if !fin {
                return Ok(None);
            }

            let frame = Frame::from_fragments(&self.partial);
            self.partial.clear();
            return Ok(frame);
        }

        if !fragment.opcode.is_control() && !self.partial.is_empty() {
            return Err(ProtocolError::InterleavedDataFrame);
        }

        if fragment.fin {
            return Ok(Some(Frame::new(fragment.opcode, fragment.payload)));
        }

        if fragment.opcode.is_control() {
            return Err(ProtocolError::FragmentedControlFrame(fragment.opcode));
        }

        self.partial.push(fragment);
        Ok(None)
    }

    /// Whether a fragmented message is in progress
    pub fn is_assembling(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Bytes held for the message in progress
    pub fn buffered_bytes(&self) -> usize {
        self.partial.iter().map(Fragment::payload_len).sum()
    }

    /// Drop any partial message
    pub fn clear(&mut self) {
        self.partial.clear();
    }
}
