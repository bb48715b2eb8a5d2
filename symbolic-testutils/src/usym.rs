//! An in-memory writer for usym files, used to build test inputs.

/// Marks a record that does not map to a source line.
const NO_LINE: u32 = u32::MAX;

/// Marks a record without an inline parent.
const NO_PARENT: u32 = u32::MAX;

/// Builds the bytes of a usym file.
///
/// Strings are de-duplicated and the string table always starts with an entry for the empty
/// string, so offset `0` refers to `""`. Records are written in the order they were added; it is
/// up to the test to add them sorted by address (or deliberately not).
///
/// # Example
///
/// ```
/// use symbolic_testutils::UsymBuilder;
///
/// let data = UsymBuilder::new()
///     .record(0x100, 1, Some("Program.cs"), 10, None)
///     .record(0x200, 2, Some("Program.cs"), 20, Some(0))
///     .build();
///
/// assert_eq!(&data[..4], b"sym-");
/// ```
#[derive(Clone, Debug)]
pub struct UsymBuilder {
    magic: u32,
    version: u32,
    id: u32,
    os: u32,
    arch: u32,
    records: Vec<[u8; 24]>,
    strings: Vec<u8>,
    string_offsets: Vec<(String, u32)>,
}

impl UsymBuilder {
    /// Creates a builder for a version 2 file with default id, os and arch strings.
    pub fn new() -> Self {
        let mut builder = Self {
            magic: u32::from_le_bytes(*b"sym-"),
            version: 2,
            id: 0,
            os: 0,
            arch: 0,
            records: Vec::new(),
            strings: Vec::new(),
            string_offsets: Vec::new(),
        };

        builder.push_string("");
        builder
            .id("153d10d10db033d6aacda4e1948da97b")
            .os("mac")
            .arch("arm64")
    }

    /// Appends a string to the string table, returning its offset.
    pub fn push_string(&mut self, s: &str) -> u32 {
        if let Some((_, offset)) = self.string_offsets.iter().find(|(i, _)| i == s) {
            return *offset;
        }

        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.string_offsets.push((s.to_owned(), offset));
        offset
    }

    /// Appends raw bytes to the string table without a terminating NUL, returning their offset.
    pub fn push_raw_string(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(bytes);
        offset
    }

    /// Overrides the magic number.
    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Sets the file format version.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the executable's identifier.
    pub fn id(mut self, id: &str) -> Self {
        self.id = self.push_string(id);
        self
    }

    /// Sets the operating system name.
    pub fn os(mut self, os: &str) -> Self {
        self.os = self.push_string(os);
        self
    }

    /// Sets the architecture name.
    pub fn arch(mut self, arch: &str) -> Self {
        self.arch = self.push_string(arch);
        self
    }

    /// Adds a line record.
    ///
    /// `file` is interned into the string table; `None` stores offset `0` (the empty string).
    /// `parent` is the index of the record this one was inlined into.
    pub fn record(
        mut self,
        address: u64,
        method: u32,
        file: Option<&str>,
        line: u32,
        parent: Option<u32>,
    ) -> Self {
        let filename = file.map(|f| self.push_string(f)).unwrap_or(0);
        self.raw_record(address, method, filename, line, parent.unwrap_or(NO_PARENT))
    }

    /// Adds a record that does not map to a source line.
    pub fn no_line_record(self, address: u64) -> Self {
        self.raw_record(address, 0, 0, NO_LINE, NO_PARENT)
    }

    /// Adds a line record with all fields written verbatim.
    pub fn raw_record(
        mut self,
        address: u64,
        method: u32,
        filename: u32,
        line: u32,
        parent: u32,
    ) -> Self {
        let mut raw = [0u8; 24];
        raw[0..8].copy_from_slice(&address.to_le_bytes());
        raw[8..12].copy_from_slice(&method.to_le_bytes());
        raw[12..16].copy_from_slice(&filename.to_le_bytes());
        raw[16..20].copy_from_slice(&line.to_le_bytes());
        raw[20..24].copy_from_slice(&parent.to_le_bytes());
        self.records.push(raw);
        self
    }

    /// The current size of the string table in bytes.
    pub fn strings_len(&self) -> usize {
        self.strings.len()
    }

    /// Writes the header, the records and the string table.
    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(24 + self.records.len() * 24 + self.strings.len());

        data.extend_from_slice(&self.magic.to_le_bytes());
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.id.to_le_bytes());
        data.extend_from_slice(&self.os.to_le_bytes());
        data.extend_from_slice(&self.arch.to_le_bytes());

        for record in &self.records {
            data.extend_from_slice(record);
        }

        data.extend_from_slice(&self.strings);
        data
    }
}

impl Default for UsymBuilder {
    fn default() -> Self {
        Self::new()
    }
}
