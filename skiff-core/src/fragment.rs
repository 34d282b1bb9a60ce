//! Wire fragment codec
//!
//! A [`Fragment`] is one unit on the wire: a two byte header, an optional
//! extended length, an optional masking key and the payload. Decoding reads
//! straight from an [`AsyncRead`] and always hands back an unmasked payload.
//! Encoding picks the smallest length form that fits and applies the mask
//! while serializing, so the payload held by a fragment is always plain data.

use crate::{
    error::{ProtocolError, Result},
    protocol::{constants::MAX_PAYLOAD_LEN, frame::*, Opcode},
};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A single WebSocket fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Last fragment of its frame
    pub fin: bool,
    /// RSV1, RSV2, RSV3
    pub rsv: [bool; 3],
    /// Fragment opcode
    pub opcode: Opcode,
    /// Whether the mask is applied when the fragment is written
    pub masked: bool,
    /// Masking key, all zero when `masked` is false
    pub mask: [u8; 4],
    /// Unmasked payload
    pub payload: Bytes,
}

impl Fragment {
    /// Create a fragment. With `mask` set a fresh random key is drawn.
    pub fn new(fin: bool, opcode: Opcode, payload: impl Into<Bytes>, mask: bool) -> Self {
        let key = if mask { rand::random::<[u8; 4]>() } else { [0; 4] };
        Self {
            fin,
            rsv: [false; 3],
            opcode,
            masked: mask,
            mask: key,
            payload: payload.into(),
        }
    }

    /// Whether any reserved bit is set
    pub fn has_reserved_bits(&self) -> bool {
        self.rsv.iter().any(|bit| *bit)
    }

    /// Payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Number of bytes [`write_to`](Self::write_to) produces
    pub fn encoded_len(&self) -> usize {
        let len = self.payload.len();
        let ext = if len <= MAX_SHORT_PAYLOAD_LEN as usize {
            0
        } else if len <= u16::MAX as usize {
            2
        } else {
            8
        };
        let key = if self.masked { MASKING_KEY_LEN } else { 0 };
        2 + ext + key + len
    }

    /// Read one fragment from `reader`.
    ///
    /// A short read at any point surfaces as an I/O error of kind
    /// `UnexpectedEof`. A 64-bit length with the top bit set, or a length
    /// above the 2 GiB ceiling, is a protocol violation.
    pub async fn read<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).await?;

        let fin = head[0] & FIN_BIT != 0;
        let rsv = [
            head[0] & RSV1_BIT != 0,
            head[0] & RSV2_BIT != 0,
            head[0] & RSV3_BIT != 0,
        ];
        let opcode = Opcode::from(head[0]);
        let masked = head[1] & MASK_BIT != 0;

        let len = match head[1] & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => u64::from(reader.read_u16().await?),
            PAYLOAD_LEN_64 => {
                let len = reader.read_u64().await?;
                if len & (1 << 63) != 0 {
                    return Err(ProtocolError::InvalidPayloadLength.into());
                }
                len
            }
            short => u64::from(short),
        };

        if len > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD_LEN,
            }
            .into());
        }

        let mut mask = [0u8; MASKING_KEY_LEN];
        if masked {
            reader.read_exact(&mut mask).await?;
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await?;

        if masked {
            apply_mask(&mut payload, mask);
        }

        tracing::trace!(?opcode, fin, len, masked, "read fragment");

        Ok(Self {
            fin,
            rsv,
            opcode,
            masked: false,
            mask: [0; 4],
            payload: Bytes::from(payload),
        })
    }

    /// Serialize the fragment into `buf`
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());

        let first_byte = (if self.fin { FIN_BIT } else { 0 })
            | (if self.rsv[0] { RSV1_BIT } else { 0 })
            | (if self.rsv[1] { RSV2_BIT } else { 0 })
            | (if self.rsv[2] { RSV3_BIT } else { 0 })
            | self.opcode.value();
        buf.put_u8(first_byte);

        let mask_bit = if self.masked { MASK_BIT } else { 0 };
        let len = self.payload.len();
        if len <= MAX_SHORT_PAYLOAD_LEN as usize {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(len as u64);
        }

        if self.masked {
            buf.put_slice(&self.mask);
            let start = buf.len();
            buf.put_slice(&self.payload);
            apply_mask(&mut buf[start..], self.mask);
        } else {
            buf.put_slice(&self.payload);
        }
    }

    /// Serialize the fragment into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Serialize and write the fragment to `writer`. Does not flush.
    pub async fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.to_bytes()).await?;
        tracing::trace!(opcode = ?self.opcode, fin = self.fin, len = self.payload.len(), "wrote fragment");
        Ok(())
    }
}

/// XOR `buf` with `mask`, cycling through the four key bytes
pub fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
