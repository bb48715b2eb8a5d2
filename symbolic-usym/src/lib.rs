//! Parsing of usym files and resolution of il2cpp instruction addresses.
//!
//! A usym file maps the native instruction addresses that Unity's il2cpp generates for managed
//! code back to the original C# source files and line numbers. Methods that were inlined by the
//! native compiler are described by chains of line records, each pointing to the record of the
//! call site it was inlined into.
//!
//! The main types are:
//!
//!  - [`UsymSymbols`]: The parsed symbol file, with lookups of single line records.
//!  - [`AddressResolver`]: Resolves runtime addresses, optionally relative to an image base, into
//!    the full list of inlined frames.
//!  - [`ResolvedSymbol`]: A single frame with its file name read from the string table.
//!
//! # Example
//!
//! ```no_run
//! use symbolic_usym::{AddressResolver, UsymSymbols};
//!
//! # fn main() -> Result<(), symbolic_usym::UsymError> {
//! let symbols = UsymSymbols::open("UnityFramework.usym")?;
//! let resolver = AddressResolver::new(&symbols).with_image_base(0x1_0000_0000);
//!
//! if let Some(resolved) = resolver.resolve_str("0x1007df0c8")? {
//!     for frame in resolved.inlinees() {
//!         println!("{frame}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `serde` (optional): Implements `serde::Serialize` for the header, line records and
//!   resolution results.

#![warn(missing_docs)]

mod error;
mod frames;
mod lookup;
mod raw;
mod resolver;
mod symbol;
mod symbols;

pub use crate::error::{UsymError, UsymErrorKind};
pub use crate::frames::Frames;
pub use crate::lookup::{locate, locate_index, MAX_LOOKUP_DISTANCE};
pub use crate::raw::{
    Header, LineRecord, HEADER_SIZE, LINE_RECORD_SIZE, NO_LINE, NO_PARENT, USYM_MAGIC,
};
pub use crate::resolver::{parse_address, AddressResolution, AddressResolver};
pub use crate::symbol::ResolvedSymbol;
pub use crate::symbols::{AllRecords, UsymSymbols};
