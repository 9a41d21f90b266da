//! Core type definitions for tidelog.

use std::fmt;

/// Identifier of the transaction that owns a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Marks records that belong to no transaction.
    pub const NONE: Self = Self(u64::MAX);

    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for [`TransactionId::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("txn:none")
        } else {
            write!(f, "txn:{}", self.0)
        }
    }
}

/// One-byte tag naming what kind of operation a record logs.
///
/// The journal does not interpret tags other than [`EntryType::CHECKPOINT`],
/// which it writes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryType(pub u8);

impl EntryType {
    /// Reserved tag of checkpoint records.
    pub const CHECKPOINT: Self = Self(0x03);

    /// Creates an entry type from its tag.
    #[must_use]
    pub const fn new(tag: u8) -> Self {
        Self(tag)
    }

    /// Returns the raw tag.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Returns true for the checkpoint tag.
    #[must_use]
    pub const fn is_checkpoint(self) -> bool {
        self.0 == Self::CHECKPOINT.0
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_checkpoint() {
            f.write_str("CHECKPOINT")
        } else {
            write!(f, "type:{:#04x}", self.0)
        }
    }
}
