//! The raw records of the usym file format.
//!
//! All integers are stored little-endian and the structures are packed without any padding. The
//! file consists of a [`Header`], followed by `line_count` [`LineRecord`]s sorted by address,
//! followed by a table of NUL-terminated strings that fills the rest of the file.

use scroll::{Pread, SizeWith};

/// Magic number identifying a usym file, `b"sym-"` read as a little-endian `u32`.
pub const USYM_MAGIC: u32 = u32::from_le_bytes(*b"sym-");

/// The `line` value of a record that does not map to a source location.
pub const NO_LINE: u32 = u32::MAX;

/// The `parent` value of a record that was not inlined into another record.
pub const NO_PARENT: u32 = u32::MAX;

/// The size of the [`Header`] in bytes.
pub const HEADER_SIZE: usize = 24;

/// The size of a single [`LineRecord`] in bytes.
pub const LINE_RECORD_SIZE: usize = 24;

/// The header of the usym file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pread, SizeWith)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    /// Magic number identifying the file, see [`USYM_MAGIC`].
    pub magic: u32,
    /// Version of the usym file format.
    pub version: u32,
    /// Number of [`LineRecord`] entries following the header.
    pub line_count: u32,
    /// Executable's id, as an offset into the string table.
    ///
    /// This is a hex-formatted UUID.
    pub id: u32,
    /// Executable's operating system, as an offset into the string table.
    pub os: u32,
    /// Executable's architecture, as an offset into the string table.
    pub arch: u32,
}

/// A record mapping a native instruction address to a managed source line.
///
/// Records of inlined methods point to the record of the call site they were inlined into via
/// `parent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pread, SizeWith)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineRecord {
    /// Instruction address, relative to the image base of the executable.
    pub address: u64,
    /// Opaque identifier of the managed method.
    pub method_index: u32,
    /// Managed source file name, as an offset into the string table.
    pub filename: u32,
    /// Managed line number, or [`NO_LINE`].
    pub line: u32,
    /// Index of the record this one was inlined into, or [`NO_PARENT`].
    pub parent: u32,
}

impl LineRecord {
    /// Returns `true` if this record maps to a source line.
    pub fn has_line(&self) -> bool {
        self.line != NO_LINE
    }

    /// The index of the record this one was inlined into.
    pub fn parent_index(&self) -> Option<usize> {
        match self.parent {
            NO_PARENT => None,
            parent => usize::try_from(parent).ok(),
        }
    }
}
