use std::fmt;

/// A line record with its file name resolved from the string table.
///
/// This is an owned value and holds no reference back into the [`UsymSymbols`] it was created
/// from.
///
/// [`UsymSymbols`]: crate::UsymSymbols
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResolvedSymbol {
    pub(crate) address: u64,
    pub(crate) file_name: Option<String>,
    pub(crate) line: u32,
    pub(crate) method_index: u32,
    pub(crate) parent_index: Option<u32>,
}

impl ResolvedSymbol {
    /// The address of the record this symbol was resolved from.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The full path of the managed source file, if the record refers to one.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The last component of the managed source file path.
    pub fn base_name(&self) -> Option<&str> {
        let file_name = self.file_name()?;
        Some(file_name.rsplit(['/', '\\']).next().unwrap_or(file_name))
    }

    /// The managed line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The opaque identifier of the managed method.
    pub fn method_index(&self) -> u32 {
        self.method_index
    }

    /// The index of the record this symbol's record was inlined into.
    pub fn parent_index(&self) -> Option<u32> {
        self.parent_index
    }
}

impl fmt::Display for ResolvedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_name().unwrap_or("??"), self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(file_name: Option<&str>) -> ResolvedSymbol {
        ResolvedSymbol {
            address: 0x7df0b4,
            file_name: file_name.map(str::to_owned),
            line: 10,
            method_index: 1,
            parent_index: None,
        }
    }

    #[test]
    fn test_display() {
        let sym = symbol(Some("/Users/bitfox/Assets/NewBehaviourScript.cs"));
        assert_eq!(sym.to_string(), "/Users/bitfox/Assets/NewBehaviourScript.cs:10");
        assert_eq!(symbol(None).to_string(), "??:10");
    }

    #[test]
    fn test_base_name() {
        let sym = symbol(Some("/Users/bitfox/Assets/NewBehaviourScript.cs"));
        assert_eq!(sym.base_name(), Some("NewBehaviourScript.cs"));

        let sym = symbol(Some("C:\\Project\\Assets\\Player.cs"));
        assert_eq!(sym.base_name(), Some("Player.cs"));

        assert_eq!(symbol(Some("Player.cs")).base_name(), Some("Player.cs"));
        assert_eq!(symbol(None).base_name(), None);
    }
}
