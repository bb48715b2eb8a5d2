//! Random access reads over binary data of known length.

use std::borrow::Cow;
use std::io;

use crate::ByteView;

/// A source of bytes with a known total length that supports random access reads.
///
/// Parsers use this to pull individual sections out of a file. A read either returns exactly
/// `length` bytes starting at `offset`, or fails with an [`io::Error`] if the requested range is
/// not fully contained in the source.
///
/// Implementations backed by memory (including memory mapped files, see [`ByteView`]) hand out
/// borrowed slices. Callers that need the data beyond the lifetime of the source must copy it.
///
/// # Example
///
/// ```
/// use symbolic_common::ByteSource;
///
/// let data: &[u8] = b"sym-\x02\x00\x00\x00";
/// assert_eq!(data.total_length(), 8);
/// assert_eq!(&*data.read(4, 4).unwrap(), b"\x02\x00\x00\x00");
/// assert!(data.read(6, 4).is_err());
/// ```
pub trait ByteSource {
    /// The total number of bytes in this source.
    fn total_length(&self) -> u64;

    /// Reads `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>>;
}

fn read_range(data: &[u8], offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>> {
    let range = usize::try_from(offset)
        .ok()
        .and_then(|start| Some(start..start.checked_add(length)?));

    match range.and_then(|range| data.get(range)) {
        Some(slice) => Ok(Cow::Borrowed(slice)),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "cannot read {length} bytes at offset {offset} from a source of {} bytes",
                data.len()
            ),
        )),
    }
}

impl ByteSource for [u8] {
    fn total_length(&self) -> u64 {
        self.len() as u64
    }

    fn read(&self, offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>> {
        read_range(self, offset, length)
    }
}

impl ByteSource for Vec<u8> {
    fn total_length(&self) -> u64 {
        self.len() as u64
    }

    fn read(&self, offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>> {
        read_range(self, offset, length)
    }
}

impl ByteSource for ByteView<'_> {
    fn total_length(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read(&self, offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>> {
        read_range(self.as_slice(), offset, length)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn total_length(&self) -> u64 {
        (**self).total_length()
    }

    fn read(&self, offset: u64, length: usize) -> io::Result<Cow<'_, [u8]>> {
        (**self).read(offset, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_in_bounds() {
        let data = b"0123456789".to_vec();
        assert_eq!(data.total_length(), 10);
        assert_eq!(&*data.read(0, 4).unwrap(), b"0123");
        assert_eq!(&*data.read(6, 4).unwrap(), b"6789");
        assert_eq!(&*data.read(10, 0).unwrap(), b"");
    }

    #[test]
    fn test_short_read() {
        let data: &[u8] = b"0123456789";
        let err = data.read(8, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        assert!(data.read(11, 0).is_err());
        assert!(data.read(u64::MAX, 1).is_err());
        assert!(data.read(1, usize::MAX).is_err());
    }

    #[test]
    fn test_read_byteview() {
        let view = ByteView::from_slice(b"sym-\x02\x00\x00\x00");
        assert_eq!(view.total_length(), 8);
        assert_eq!(&*view.read(0, 4).unwrap(), b"sym-");

        let view = ByteView::from_vec(b"0123".to_vec());
        assert_eq!(&*view.read(2, 2).unwrap(), b"23");
        assert_eq!(
            view.read(2, 4).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_read_mapped_file() -> Result<(), io::Error> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"sym-\x02\x00\x00\x00")?;

        let view = ByteView::open(tmp.path())?;
        assert_eq!(view.total_length(), 8);
        assert_eq!(&*view.read(4, 4)?, b"\x02\x00\x00\x00");

        Ok(())
    }
}
