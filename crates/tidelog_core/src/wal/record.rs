//! Journal record framing.
//!
//! Every record is framed as
//!
//! ```text
//! | type (1) | txn id (8) | length (2) | payload (length) | backlink (2) |
//! ```
//!
//! with all integers big-endian. The backlink repeats `length + 11`, so a
//! reader positioned just past a record can find where it started.

use crate::error::{JournalError, JournalResult};
use crate::lsn::Lsn;
use crate::types::{EntryType, TransactionId};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed record header: type (1) + txn id (8) + length (2).
pub const HEADER_SIZE: usize = 11;

/// Size of the trailing backlink.
pub const BACKLINK_SIZE: usize = 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + BACKLINK_SIZE;

/// Largest payload whose backlink still fits in 16 bits.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - HEADER_SIZE;

/// Decoded fixed header of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Record type tag.
    pub entry_type: EntryType,
    /// Owning transaction.
    pub txn_id: TransactionId,
    /// Payload length.
    pub payload_len: usize,
}

impl FrameHeader {
    /// Parses the header from the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if `src` is shorter than a header.
    pub fn parse(src: &[u8]) -> JournalResult<Self> {
        if src.len() < HEADER_SIZE {
            return Err(JournalError::corruption(format!(
                "record header needs {HEADER_SIZE} bytes, got {}",
                src.len()
            )));
        }
        let mut buf = &src[..HEADER_SIZE];
        let entry_type = EntryType::new(buf.get_u8());
        let txn_id = TransactionId::new(buf.get_u64());
        let payload_len = usize::from(buf.get_u16());
        Ok(Self {
            entry_type,
            txn_id,
            payload_len,
        })
    }

    /// Total size of the frame described by this header.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload_len
    }

    /// Backlink value a well-formed frame carries.
    #[must_use]
    pub const fn expected_backlink(&self) -> usize {
        HEADER_SIZE + self.payload_len
    }
}

/// One journal record.
///
/// The LSN is not part of the encoded bytes; the journal sets it when the
/// record is appended and the reader sets it from the record's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Record type tag.
    pub entry_type: EntryType,
    /// Owning transaction.
    pub txn_id: TransactionId,
    /// Opaque payload.
    pub payload: Bytes,
    /// Position assigned at append time.
    pub lsn: Lsn,
}

impl LogRecord {
    /// Creates a record with no LSN assigned yet.
    pub fn new(entry_type: EntryType, txn_id: TransactionId, payload: impl Into<Bytes>) -> Self {
        Self {
            entry_type,
            txn_id,
            payload: payload.into(),
            lsn: Lsn::INVALID,
        }
    }

    /// Creates a checkpoint record.
    #[must_use]
    pub fn checkpoint(txn_id: TransactionId, info: CheckpointInfo) -> Self {
        Self::new(EntryType::CHECKPOINT, txn_id, info.encode())
    }

    /// Returns true for checkpoint records.
    #[must_use]
    pub fn is_checkpoint(&self) -> bool {
        self.entry_type.is_checkpoint()
    }

    /// Number of bytes the encoded record occupies.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    fn check_payload(&self) -> JournalResult<u16> {
        u16::try_from(self.payload.len())
            .ok()
            .filter(|len| usize::from(*len) <= MAX_PAYLOAD_SIZE)
            .ok_or(JournalError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            })
    }

    /// Encodes the record into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&self) -> JournalResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf, usize::MAX)?;
        Ok(buf.freeze())
    }

    /// Appends the encoded record to `dst` unless that would grow `dst`
    /// beyond `capacity` bytes.
    ///
    /// `dst` is left untouched on error.
    ///
    /// # Errors
    ///
    /// - [`JournalError::PayloadTooLarge`] if the payload exceeds [`MAX_PAYLOAD_SIZE`]
    /// - [`JournalError::EncodingOverflow`] if the record does not fit
    pub fn encode_into(&self, dst: &mut BytesMut, capacity: usize) -> JournalResult<()> {
        let len = self.check_payload()?;
        let needed = self.encoded_len();
        let available = capacity.saturating_sub(dst.len());
        if needed > available {
            return Err(JournalError::EncodingOverflow { needed, available });
        }

        dst.put_u8(self.entry_type.as_byte());
        dst.put_u64(self.txn_id.as_u64());
        dst.put_u16(len);
        dst.put_slice(&self.payload);
        // Bounded by MAX_PAYLOAD_SIZE above.
        dst.put_u16(len + HEADER_SIZE as u16);
        Ok(())
    }

    /// Decodes one record from the start of `src`.
    ///
    /// Returns the record (with an invalid LSN) and the number of bytes it
    /// occupied.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if `src` holds less than a whole frame or
    /// the backlink does not match the header.
    pub fn decode(src: &[u8]) -> JournalResult<(Self, usize)> {
        let header = FrameHeader::parse(src)?;
        let frame_len = header.frame_len();
        if src.len() < frame_len {
            return Err(JournalError::corruption(format!(
                "record needs {frame_len} bytes, got {}",
                src.len()
            )));
        }

        let payload = Bytes::copy_from_slice(&src[HEADER_SIZE..HEADER_SIZE + header.payload_len]);
        let mut trailer = &src[frame_len - BACKLINK_SIZE..frame_len];
        let backlink = usize::from(trailer.get_u16());
        if backlink != header.expected_backlink() {
            return Err(JournalError::corruption(format!(
                "backlink {backlink} does not match header length {}",
                header.expected_backlink()
            )));
        }

        Ok((
            Self {
                entry_type: header.entry_type,
                txn_id: header.txn_id,
                payload,
                lsn: Lsn::INVALID,
            },
            frame_len,
        ))
    }
}

/// Payload of a checkpoint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// LSN of the record appended just before the checkpoint.
    pub previous_lsn: Lsn,
    /// Wall-clock time of the checkpoint in unix milliseconds.
    pub timestamp_ms: u64,
}

impl CheckpointInfo {
    /// Encoded size of the payload.
    pub const ENCODED_LEN: usize = 16;

    /// Encodes the payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        buf.put_u64(self.previous_lsn.as_u64());
        buf.put_u64(self.timestamp_ms);
        buf.freeze()
    }

    /// Decodes a checkpoint payload.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload has the wrong length.
    pub fn decode(mut payload: &[u8]) -> JournalResult<Self> {
        if payload.len() != Self::ENCODED_LEN {
            return Err(JournalError::corruption(format!(
                "checkpoint payload must be {} bytes, got {}",
                Self::ENCODED_LEN,
                payload.len()
            )));
        }
        Ok(Self {
            previous_lsn: Lsn::from_raw(payload.get_u64()),
            timestamp_ms: payload.get_u64(),
        })
    }
}
