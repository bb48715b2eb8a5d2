//! Parsing of usym files into an immutable, owned symbol table.

use std::borrow::Cow;
use std::iter::FusedIterator;
use std::path::Path;
use std::slice;
use std::str::FromStr;

use scroll::{Pread, LE};

use symbolic_common::{ByteSource, ByteView, DebugId};

use crate::error::{UsymError, UsymErrorKind};
use crate::frames::{self, Frames};
use crate::lookup;
use crate::raw::{Header, LineRecord, HEADER_SIZE, LINE_RECORD_SIZE, USYM_MAGIC};
use crate::symbol::ResolvedSymbol;

/// A usym file mapping native instruction addresses generated by il2cpp back to their managed
/// (C#) source locations.
///
/// The line records and the string table are copied out of the source when parsing, so the
/// symbols do not borrow from the file they were read from. After parsing the symbols are
/// immutable and can be shared freely between threads.
///
/// # Example
///
/// ```
/// use symbolic_testutils::UsymBuilder;
/// use symbolic_usym::UsymSymbols;
///
/// let data = UsymBuilder::new()
///     .record(0x100, 1, Some("Program.cs"), 10, None)
///     .build();
///
/// let symbols = UsymSymbols::parse(&data).unwrap();
/// let record = symbols.find(0x104).unwrap();
/// assert_eq!(symbols.resolve_record(&record).to_string(), "Program.cs:10");
/// ```
#[derive(Clone, Debug)]
pub struct UsymSymbols {
    header: Header,
    /// Line records, sorted by address.
    records: Vec<LineRecord>,
    /// The raw string table.
    ///
    /// A slice of bytes with NUL-terminated strings. The header and records refer to strings by
    /// byte offsets into this table.
    strings: Vec<u8>,
}

impl UsymSymbols {
    /// Opens and parses the usym file at the given path.
    ///
    /// Fails with [`UsymErrorKind::NotFound`] if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UsymError> {
        let view =
            ByteView::open(path).map_err(|e| UsymError::new(UsymErrorKind::NotFound, e))?;
        Self::from_source(&view)
    }

    /// Parses a usym file from an in-memory buffer.
    pub fn parse(buf: &[u8]) -> Result<Self, UsymError> {
        Self::from_source(buf)
    }

    /// Parses a usym file from a [`ByteSource`].
    ///
    /// Reads the header, copies all line records and the string table. Either the entire file is
    /// accepted or an error is returned.
    #[tracing::instrument(level = "trace", name = "UsymSymbols::parse", skip_all)]
    pub fn from_source<S>(source: &S) -> Result<Self, UsymError>
    where
        S: ByteSource + ?Sized,
    {
        let total_length = source.total_length();
        if total_length < HEADER_SIZE as u64 {
            return Err(UsymErrorKind::BadHeader.into());
        }

        let header_bytes = source
            .read(0, HEADER_SIZE)
            .map_err(|e| UsymError::new(UsymErrorKind::BadRead, e))?;
        let header: Header = header_bytes
            .pread_with(0, LE)
            .map_err(|e| UsymError::new(UsymErrorKind::BadHeader, e))?;

        if header.magic != USYM_MAGIC {
            return Err(UsymErrorKind::BadMagic.into());
        }
        if header.line_count == 0 {
            return Err(UsymErrorKind::NoRecords.into());
        }

        let records_offset = HEADER_SIZE as u64;
        let records_size = u64::from(header.line_count) * LINE_RECORD_SIZE as u64;
        let strings_offset = records_offset + records_size;
        if strings_offset > total_length {
            return Err(UsymErrorKind::BufferSmallerThanAdvertised.into());
        }

        let records_size = usize::try_from(records_size)
            .map_err(|e| UsymError::new(UsymErrorKind::BufferSmallerThanAdvertised, e))?;
        let records_bytes = source
            .read(records_offset, records_size)
            .map_err(|e| UsymError::new(UsymErrorKind::BadRead, e))?;

        let offset = &mut 0;
        let mut records = Vec::with_capacity(header.line_count as usize);
        for _ in 0..header.line_count {
            let record: LineRecord = records_bytes
                .gread_with(offset, LE)
                .map_err(|e| UsymError::new(UsymErrorKind::BufferSmallerThanAdvertised, e))?;
            records.push(record);
        }

        let strings_size = usize::try_from(total_length - strings_offset)
            .map_err(|e| UsymError::new(UsymErrorKind::BadRead, e))?;
        let strings = source
            .read(strings_offset, strings_size)
            .map_err(|e| UsymError::new(UsymErrorKind::BadRead, e))?
            .into_owned();

        tracing::debug!(
            version = header.version,
            records = header.line_count,
            strings = strings.len() as u64,
            "parsed usym file"
        );

        Ok(Self {
            header,
            records,
            strings,
        })
    }

    /// Returns the header of the usym file.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Returns the version of the usym file these symbols were read from.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Returns the number of line records, including records without a source line.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns a string from the string table at the given offset.
    ///
    /// Returns `None` if the offset lies outside of the string table. The string ends at the next
    /// NUL byte or at the end of the table. Invalid UTF-8 is replaced with
    /// [`U+FFFD REPLACEMENT CHARACTER`](std::char::REPLACEMENT_CHARACTER).
    pub fn string_at(&self, offset: u32) -> Option<Cow<'_, str>> {
        let offset = usize::try_from(offset).ok()?;
        let bytes = self.strings.get(offset..).filter(|b| !b.is_empty())?;
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..len]))
    }

    /// The executable's id as it is written in the file.
    pub fn id_str(&self) -> Option<Cow<'_, str>> {
        self.string_at(self.header.id)
    }

    /// The executable's id.
    ///
    /// This should match the id of the executable's debug symbols.
    pub fn id(&self) -> Result<DebugId, UsymError> {
        let id = self
            .id_str()
            .ok_or_else(|| UsymError::from(UsymErrorKind::BadId))?;
        DebugId::from_str(&id).map_err(|e| UsymError::new(UsymErrorKind::BadId, e))
    }

    /// The executable's operating system name.
    pub fn os(&self) -> Option<Cow<'_, str>> {
        self.string_at(self.header.os)
    }

    /// The executable's architecture name.
    pub fn arch(&self) -> Option<Cow<'_, str>> {
        self.string_at(self.header.arch)
    }

    /// All line records, sorted by address.
    pub fn records(&self) -> &[LineRecord] {
        &self.records
    }

    /// Returns the line record at the given index.
    pub fn get_record(&self, index: usize) -> Option<LineRecord> {
        self.records.get(index).copied()
    }

    /// Looks up the line record for an address relative to the image base.
    ///
    /// This returns a record for every address; check [`LineRecord::has_line`] to see whether it
    /// actually maps to source. See [`locate_index`](crate::locate_index) for how the record is
    /// chosen.
    pub fn find(&self, address: u64) -> Option<LineRecord> {
        lookup::locate(&self.records, address).copied()
    }

    /// Looks up the index of the line record for an address relative to the image base.
    pub fn find_index(&self, address: u64) -> Option<usize> {
        lookup::locate_index(&self.records, address)
    }

    /// Fills in the file name of a [`LineRecord`] from the string table.
    ///
    /// Offsets outside of the string table and empty strings yield no file name.
    pub fn resolve_record(&self, record: &LineRecord) -> ResolvedSymbol {
        let file_name = self
            .string_at(record.filename)
            .filter(|name| !name.is_empty())
            .map(Cow::into_owned);

        ResolvedSymbol {
            address: record.address,
            file_name,
            line: record.line,
            method_index: record.method_index,
            parent_index: record.parent_index().map(|_| record.parent),
        }
    }

    /// Reconstructs the chain of inlined frames ending in `leaf`.
    ///
    /// The frames are ordered from the outermost caller to `leaf`. If the parent links of the
    /// records form a cycle, the chain is cut off and [`Frames::is_truncated`] is set.
    pub fn reconstruct(&self, leaf: &LineRecord) -> Frames {
        let chain = frames::parent_chain(&self.records, leaf);
        Frames {
            frames: chain
                .records
                .iter()
                .map(|record| self.resolve_record(record))
                .collect(),
            truncated: chain.truncated,
        }
    }

    /// An iterator over all records that map to a source line, in address order.
    ///
    /// The iterator holds no state in the symbols; calling this again, or cloning the iterator,
    /// starts a fresh iteration.
    pub fn all_records(&self) -> AllRecords<'_> {
        AllRecords {
            symbols: self,
            records: self.records.iter(),
        }
    }
}

/// Iterator returned by [`UsymSymbols::all_records`]; see documentation there.
#[derive(Clone, Debug)]
pub struct AllRecords<'a> {
    symbols: &'a UsymSymbols,
    records: slice::Iter<'a, LineRecord>,
}

impl Iterator for AllRecords<'_> {
    type Item = ResolvedSymbol;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.find(|r| r.has_line())?;
        Some(self.symbols.resolve_record(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

impl FusedIterator for AllRecords<'_> {}
