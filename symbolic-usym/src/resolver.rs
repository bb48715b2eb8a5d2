//! Resolving runtime instruction addresses to managed source locations.

use crate::error::{UsymError, UsymErrorKind};
use crate::symbol::ResolvedSymbol;
use crate::symbols::UsymSymbols;

/// Parses a hexadecimal address, with or without a `0x` or `0X` prefix.
///
/// Leading and trailing whitespace is ignored. Anything else, including decimal notation, fails
/// with [`UsymErrorKind::BadAddress`].
///
/// # Example
///
/// ```
/// use symbolic_usym::parse_address;
///
/// assert_eq!(parse_address("0x7df0b4").unwrap(), 0x7df0b4);
/// assert_eq!(parse_address("7DF0B4").unwrap(), 0x7df0b4);
/// assert!(parse_address("0x").is_err());
/// ```
pub fn parse_address(s: &str) -> Result<u64, UsymError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    // from_str_radix accepts a leading `+`
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(UsymErrorKind::BadAddress.into());
    }

    u64::from_str_radix(digits, 16).map_err(|e| UsymError::new(UsymErrorKind::BadAddress, e))
}

/// The result of resolving a single address with an [`AddressResolver`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AddressResolution {
    original_address: u64,
    relative_address: u64,
    image_base: u64,
    symbol: ResolvedSymbol,
    frames: Vec<ResolvedSymbol>,
    truncated: bool,
}

impl AddressResolution {
    /// The address as it was passed to the resolver.
    pub fn original_address(&self) -> u64 {
        self.original_address
    }

    /// The address relative to the image base, as it was looked up in the symbols.
    pub fn relative_address(&self) -> u64 {
        self.relative_address
    }

    /// The image base that was subtracted from the original address, `0` if none.
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// The innermost frame the address maps to.
    pub fn symbol(&self) -> &ResolvedSymbol {
        &self.symbol
    }

    /// All frames the address maps to, from the outermost caller to the innermost inlined method.
    pub fn frames(&self) -> &[ResolvedSymbol] {
        &self.frames
    }

    /// Iterates the frames from the innermost inlined method to the outermost caller.
    ///
    /// This is the order in which the frames appear in a stack trace.
    pub fn inlinees(&self) -> impl Iterator<Item = &ResolvedSymbol> + '_ {
        self.frames.iter().rev()
    }

    /// Returns `true` if the inline parent chain was cyclic and outer frames were cut off.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Resolves instruction addresses against [`UsymSymbols`].
///
/// Addresses are made relative by subtracting the image base before they are looked up. An
/// image base of `0` means the addresses are already relative.
///
/// # Example
///
/// ```
/// use symbolic_testutils::UsymBuilder;
/// use symbolic_usym::{AddressResolver, UsymSymbols};
///
/// let data = UsymBuilder::new()
///     .record(0x100, 1, Some("Program.cs"), 10, None)
///     .build();
/// let symbols = UsymSymbols::parse(&data).unwrap();
///
/// let resolver = AddressResolver::new(&symbols).with_image_base(0x10000);
/// let resolved = resolver.resolve(0x10100).unwrap().unwrap();
/// assert_eq!(resolved.relative_address(), 0x100);
/// assert_eq!(resolved.symbol().to_string(), "Program.cs:10");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct AddressResolver<'a> {
    symbols: &'a UsymSymbols,
    image_base: u64,
}

impl<'a> AddressResolver<'a> {
    /// Creates a resolver for module relative addresses.
    pub fn new(symbols: &'a UsymSymbols) -> Self {
        Self {
            symbols,
            image_base: 0,
        }
    }

    /// Sets the image base to subtract from every address.
    pub fn with_image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    /// The image base subtracted from every address.
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// The symbols this resolver looks up addresses in.
    pub fn symbols(&self) -> &'a UsymSymbols {
        self.symbols
    }

    /// Converts an absolute address into one relative to the image base.
    ///
    /// Fails with [`UsymErrorKind::AddressUnderflow`] if the address is below the image base.
    pub fn relative_address(&self, address: u64) -> Result<u64, UsymError> {
        address
            .checked_sub(self.image_base)
            .ok_or_else(|| UsymErrorKind::AddressUnderflow.into())
    }

    /// Resolves an address to its managed source location, including inlined frames.
    ///
    /// Returns `Ok(None)` if the address does not map to any source line.
    ///
    /// If several records document the same instruction, the innermost inlined one becomes the
    /// leaf of the returned frames.
    #[tracing::instrument(level = "trace", name = "AddressResolver::resolve", skip(self))]
    pub fn resolve(&self, address: u64) -> Result<Option<AddressResolution>, UsymError> {
        let relative_address = self.relative_address(address)?;
        let records = self.symbols.records();

        let index = match self.symbols.find_index(relative_address) {
            Some(index) if records[index].has_line() => index,
            _ => {
                tracing::trace!(relative_address, "no line record for address");
                return Ok(None);
            }
        };

        // Inlinees documenting the same instruction follow their call site in the table.
        let leaf = records[index..]
            .iter()
            .take_while(|r| r.address == records[index].address)
            .filter(|r| r.has_line())
            .last()
            .unwrap_or(&records[index]);

        let frames = self.symbols.reconstruct(leaf);
        let truncated = frames.is_truncated();
        let frames = frames.into_vec();
        let symbol = self.symbols.resolve_record(leaf);

        Ok(Some(AddressResolution {
            original_address: address,
            relative_address,
            image_base: self.image_base,
            symbol,
            frames,
            truncated,
        }))
    }

    /// Parses and resolves a hexadecimal address string.
    ///
    /// Fails with [`UsymErrorKind::BadAddress`] if the string is not a hexadecimal address;
    /// returns `Ok(None)` if the address does not map to any source line.
    pub fn resolve_str(&self, address: &str) -> Result<Option<AddressResolution>, UsymError> {
        self.resolve(parse_address(address)?)
    }

    /// Resolves many addresses.
    ///
    /// Addresses that cannot be resolved, either because they are below the image base or
    /// because they do not map to any source line, are skipped. The results therefore do not
    /// necessarily correspond one to one with the input; use
    /// [`AddressResolution::original_address`] to match them up.
    pub fn resolve_many<I>(&self, addresses: I) -> Vec<AddressResolution>
    where
        I: IntoIterator<Item = u64>,
    {
        addresses
            .into_iter()
            .filter_map(|address| self.resolve(address).ok().flatten())
            .collect()
    }

    /// Parses and resolves many address strings.
    ///
    /// Strings that are not hexadecimal addresses are skipped in addition to the addresses
    /// skipped by [`resolve_many`](Self::resolve_many).
    pub fn resolve_many_str<I, S>(&self, addresses: I) -> Vec<AddressResolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addresses
            .into_iter()
            .filter_map(|address| self.resolve_str(address.as_ref()).ok().flatten())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use symbolic_testutils::UsymBuilder;

    use super::*;

    /// The three record example of a call site at 0x200 with two nested inlinees.
    fn inlined() -> UsymSymbols {
        let data = UsymBuilder::new()
            .record(0x100, 1, Some("Outer.cs"), 10, None)
            .record(0x200, 2, Some("Middle.cs"), 20, Some(0))
            .record(0x200, 3, Some("Inner.cs"), 30, Some(1))
            .build();
        UsymSymbols::parse(&data).unwrap()
    }

    fn lines(resolution: &AddressResolution) -> Vec<u32> {
        resolution.frames().iter().map(|s| s.line()).collect()
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10100").unwrap(), 0x10100);
        assert_eq!(parse_address("0X10100").unwrap(), 0x10100);
        assert_eq!(parse_address("deadBEEF").unwrap(), 0xdeadbeef);
        assert_eq!(parse_address("  0x1f\n").unwrap(), 0x1f);
        assert_eq!(parse_address("ffffffffffffffff").unwrap(), u64::MAX);

        for bad in ["", "0x", "xyz", "0x-1", "+1f", "0x1g", "1 2", "10000000000000000"] {
            let err = parse_address(bad).unwrap_err();
            assert_eq!(err.kind(), UsymErrorKind::BadAddress, "{bad:?}");
        }
    }

    #[test]
    fn test_exact_hit_resolves_innermost() {
        let symbols = inlined();
        assert_eq!(symbols.find_index(0x200), Some(1));

        let resolution = AddressResolver::new(&symbols).resolve(0x200).unwrap().unwrap();
        assert_eq!(resolution.symbol().line(), 30);
        assert_eq!(resolution.symbol().method_index(), 3);
        assert_eq!(lines(&resolution), vec![10, 20, 30]);
        assert!(!resolution.is_truncated());
    }

    #[test]
    fn test_near_hit_uses_preceding_address() {
        let symbols = inlined();
        let resolution = AddressResolver::new(&symbols).resolve(0x1ff).unwrap().unwrap();
        assert_eq!(resolution.symbol().line(), 10);
        assert_eq!(lines(&resolution), vec![10]);
    }

    #[test]
    fn test_image_base() {
        let symbols = inlined();
        let resolver = AddressResolver::new(&symbols).with_image_base(0x10000);

        let resolution = resolver.resolve(0x10100).unwrap().unwrap();
        assert_eq!(resolution.original_address(), 0x10100);
        assert_eq!(resolution.relative_address(), 0x100);
        assert_eq!(resolution.image_base(), 0x10000);
        assert_eq!(resolution.symbol().file_name(), Some("Outer.cs"));
    }

    #[test]
    fn test_address_below_image_base() {
        let symbols = inlined();
        let resolver = AddressResolver::new(&symbols).with_image_base(0x10000);

        let err = resolver.resolve(0x100).unwrap_err();
        assert_eq!(err.kind(), UsymErrorKind::AddressUnderflow);
        assert!(err.kind().is_format_error());
    }

    #[test]
    fn test_no_line() {
        let data = UsymBuilder::new()
            .record(0x100, 1, Some("A.cs"), 10, None)
            .no_line_record(0x180)
            .build();
        let symbols = UsymSymbols::parse(&data).unwrap();
        let resolver = AddressResolver::new(&symbols);

        assert!(resolver.resolve(0x180).unwrap().is_none());
        assert!(resolver.resolve(0x200).unwrap().is_none());
        assert!(resolver.resolve(0x17f).unwrap().is_some());
    }

    #[test]
    fn test_inlinees_innermost_first() {
        let symbols = inlined();
        let resolution = AddressResolver::new(&symbols).resolve(0x204).unwrap().unwrap();
        let files: Vec<_> = resolution
            .inlinees()
            .map(|s| s.file_name().unwrap())
            .collect();
        assert_eq!(files, vec!["Inner.cs", "Middle.cs", "Outer.cs"]);
    }

    #[test]
    fn test_cyclic_chain_is_truncated() {
        let data = UsymBuilder::new()
            .record(0x100, 1, Some("A.cs"), 10, Some(1))
            .record(0x200, 2, Some("B.cs"), 20, Some(0))
            .build();
        let symbols = UsymSymbols::parse(&data).unwrap();

        let resolution = AddressResolver::new(&symbols).resolve(0x200).unwrap().unwrap();
        assert!(resolution.is_truncated());
        assert_eq!(lines(&resolution), vec![10, 20]);
    }

    #[test]
    fn test_resolve_str() {
        let symbols = inlined();
        let resolver = AddressResolver::new(&symbols);

        assert_eq!(
            resolver.resolve_str("0x100").unwrap().unwrap().symbol().line(),
            10
        );
        let resolved = resolver.resolve_str("256").unwrap().unwrap();
        assert_eq!(resolved.original_address(), 0x256);
        let err = resolver.resolve_str("0xzz").unwrap_err();
        assert_eq!(err.kind(), UsymErrorKind::BadAddress);
    }

    #[test]
    fn test_resolve_many_skips_failures() {
        let data = UsymBuilder::new()
            .record(0x10100, 1, Some("A.cs"), 10, None)
            .no_line_record(0x10180)
            .build();
        let symbols = UsymSymbols::parse(&data).unwrap();
        let resolver = AddressResolver::new(&symbols).with_image_base(0x1000);

        let resolved = resolver.resolve_many([0x11100, 0x11180, 0x10, 0x11104]);
        let addrs: Vec<_> = resolved.iter().map(|r| r.original_address()).collect();
        assert_eq!(addrs, vec![0x11100, 0x11104]);

        let resolved = resolver.resolve_many_str(["0x11100", "nope", "11108"]);
        let addrs: Vec<_> = resolved.iter().map(|r| r.relative_address()).collect();
        assert_eq!(addrs, vec![0x10100, 0x10108]);
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UsymSymbols>();
        assert_send_sync::<AddressResolver<'static>>();
        assert_send_sync::<AddressResolution>();
    }
}
