//! Common functionality for `symbolic`.
//!
//! This crate exposes a set of key types:
//!
//!  - [`ByteView`]: Gives access to binary data in-memory or on the file system.
//!  - [`ByteSource`]: Random access reads over a byte buffer of known length, used by parsers
//!    that copy the sections they need out of a file instead of borrowing from it.
//!
//! This module is part of the `symbolic` crate.
//!
//! [`ByteView`]: struct.ByteView.html
//! [`ByteSource`]: trait.ByteSource.html

#![warn(missing_docs)]

mod byteview;
mod source;

pub use crate::byteview::*;
pub use crate::source::*;

pub use debugid::*;
