use std::error::Error;
use std::fmt;

use thiserror::Error;

/// The error type for [`UsymError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum UsymErrorKind {
    /// The usym file does not exist or cannot be opened.
    NotFound,
    /// The underlying byte source failed to provide a requested range.
    BadRead,
    /// The header to the usym file is missing or undersized.
    BadHeader,
    /// The magic number in the header is missing or malformed.
    BadMagic,
    /// The header claims the file contains no line records.
    NoRecords,
    /// The size of the usym file is smaller than the amount of data it is supposed to hold
    /// according to its header.
    BufferSmallerThanAdvertised,
    /// The address is smaller than the image base it should be made relative to.
    AddressUnderflow,
    /// An address string is not a hexadecimal number.
    BadAddress,
    /// The parent links of a line record form a cycle.
    CorruptChain,
    /// The executable's id is missing or can't be read.
    BadId,
}

impl UsymErrorKind {
    /// Returns `true` if this kind describes a malformed file or an address that cannot be made
    /// relative to the image base.
    pub fn is_format_error(self) -> bool {
        matches!(
            self,
            Self::BadHeader
                | Self::BadMagic
                | Self::NoRecords
                | Self::BufferSmallerThanAdvertised
                | Self::AddressUnderflow
        )
    }
}

impl fmt::Display for UsymErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsymErrorKind::NotFound => write!(f, "usym file not found"),
            UsymErrorKind::BadRead => write!(f, "failed to read from usym file"),
            UsymErrorKind::BadHeader => write!(f, "missing or undersized header"),
            UsymErrorKind::BadMagic => write!(f, "missing or wrong usym magic bytes"),
            UsymErrorKind::NoRecords => write!(f, "usym file contains no line records"),
            UsymErrorKind::BufferSmallerThanAdvertised => {
                write!(f, "buffer does not contain all data header claims it has")
            }
            UsymErrorKind::AddressUnderflow => write!(f, "address is below the image base"),
            UsymErrorKind::BadAddress => write!(f, "invalid hexadecimal address"),
            UsymErrorKind::CorruptChain => write!(f, "inline parent chain contains a cycle"),
            UsymErrorKind::BadId => write!(f, "executable id is missing or unreadable"),
        }
    }
}

/// An error when dealing with [`UsymSymbols`](crate::UsymSymbols).
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct UsymError {
    kind: UsymErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl UsymError {
    /// Creates a new [`UsymError`] from a [`UsymErrorKind`] and an arbitrary source error payload.
    pub(crate) fn new<E>(kind: UsymErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`UsymErrorKind`] for this error.
    pub fn kind(&self) -> UsymErrorKind {
        self.kind
    }
}

impl From<UsymErrorKind> for UsymError {
    fn from(kind: UsymErrorKind) -> Self {
        Self { kind, source: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors() {
        assert!(UsymErrorKind::BadMagic.is_format_error());
        assert!(UsymErrorKind::AddressUnderflow.is_format_error());
        assert!(!UsymErrorKind::BadAddress.is_format_error());
        assert!(!UsymErrorKind::NotFound.is_format_error());
    }

    #[test]
    fn test_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = UsymError::new(UsymErrorKind::NotFound, io);
        assert_eq!(err.kind(), UsymErrorKind::NotFound);
        assert_eq!(err.to_string(), "usym file not found");
        assert!(err.source().is_some());
    }
}
