//! Log sequence numbers.
//!
//! An LSN packs a journal file number and a 1-based byte offset within that
//! file into one `u64`:
//!
//! ```text
//! | file number (32 bits) | offset (32 bits) |
//! ```
//!
//! Comparing two LSNs as integers therefore compares file numbers first and
//! offsets second. Offset 0 never names a record, so `0` serves as the
//! invalid sentinel and sorts below every real LSN.

use crate::error::{JournalError, JournalResult};
use std::fmt;

/// Number of low bits holding the in-file offset.
pub const OFFSET_BITS: u32 = 32;

const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Largest offset an LSN can carry.
pub const MAX_OFFSET: u64 = OFFSET_MASK;

/// A totally ordered position in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(u64);

impl Lsn {
    /// The invalid LSN.
    pub const INVALID: Self = Self(0);

    /// Packs a file number and 1-based offset into an LSN.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::LsnOverflow`] if `offset` needs more than
    /// [`OFFSET_BITS`] bits.
    pub fn pack(file_number: u32, offset: u64) -> JournalResult<Self> {
        if offset > MAX_OFFSET {
            return Err(JournalError::LsnOverflow {
                file_number,
                offset,
            });
        }
        Ok(Self((u64::from(file_number) << OFFSET_BITS) | offset))
    }

    /// Reinterprets a raw value, e.g. one read back from a checkpoint record.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw packed value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the file number.
    #[must_use]
    pub const fn file_number(self) -> u32 {
        (self.0 >> OFFSET_BITS) as u32
    }

    /// Returns the 1-based offset within the file.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0 & OFFSET_MASK
    }

    /// Returns true unless the offset is zero.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.offset() != 0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:x}:{}", self.file_number(), self.offset())
        } else {
            f.write_str("invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn invalid_is_smallest() {
        assert!(!Lsn::INVALID.is_valid());
        assert!(Lsn::INVALID < Lsn::pack(0, 1).unwrap());
    }

    #[test]
    fn pack_unpack() {
        let lsn = Lsn::pack(7, 1234).unwrap();
        assert_eq!(lsn.file_number(), 7);
        assert_eq!(lsn.offset(), 1234);
        assert!(lsn.is_valid());
        assert_eq!(Lsn::from_raw(lsn.as_u64()), lsn);
    }

    #[test]
    fn pack_rejects_wide_offset() {
        assert!(matches!(
            Lsn::pack(1, MAX_OFFSET + 1),
            Err(JournalError::LsnOverflow { file_number: 1, .. })
        ));
        assert!(Lsn::pack(u32::MAX, MAX_OFFSET).is_ok());
    }

    #[test]
    fn later_file_sorts_after_larger_offset() {
        let a = Lsn::pack(1, MAX_OFFSET).unwrap();
        let b = Lsn::pack(2, 1).unwrap();
        assert!(a < b);
    }

    #[test]
    fn display() {
        assert_eq!(Lsn::pack(0x1f, 12).unwrap().to_string(), "1f:12");
        assert_eq!(Lsn::INVALID.to_string(), "invalid");
    }

    proptest! {
        #[test]
        fn ordering_matches_pairs(f1 in any::<u32>(), o1 in 1..=MAX_OFFSET, f2 in any::<u32>(), o2 in 1..=MAX_OFFSET) {
            let a = Lsn::pack(f1, o1).unwrap();
            let b = Lsn::pack(f2, o2).unwrap();
            prop_assert_eq!(a.cmp(&b), (f1, o1).cmp(&(f2, o2)));
            prop_assert!(Lsn::INVALID < a);
        }
    }
}
