//! Reconstruction of inlined call chains from the parent links of line records.

use std::collections::HashSet;
use std::slice;

use crate::error::{UsymError, UsymErrorKind};
use crate::raw::LineRecord;
use crate::symbol::ResolvedSymbol;

/// The records of an inline chain, outermost caller first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParentChain {
    pub records: Vec<LineRecord>,
    pub truncated: bool,
}

/// Follows the parent links starting at `leaf`.
///
/// Parent indices that are out of range end the chain. The file format does not guarantee that
/// the links are acyclic: when a record is reached a second time the chain is cut off before it
/// and marked as truncated.
pub(crate) fn parent_chain(records: &[LineRecord], leaf: &LineRecord) -> ParentChain {
    let mut chain = vec![*leaf];
    let mut visited = HashSet::new();
    let mut truncated = false;
    let mut current = *leaf;

    while let Some(index) = current.parent_index() {
        let parent = match records.get(index) {
            Some(parent) => *parent,
            None => break,
        };

        // A parent equal to the leaf has the same parent link and would repeat the chain.
        if !visited.insert(index) || parent == *leaf {
            tracing::warn!(
                address = leaf.address,
                parent = index as u64,
                "cyclic inline parent chain, truncating frames"
            );
            truncated = true;
            break;
        }

        chain.push(parent);
        current = parent;
    }

    chain.reverse();
    ParentChain {
        records: chain,
        truncated,
    }
}

/// The frames an instruction address maps to, from the outermost caller to the innermost inlined
/// method.
///
/// Returned by [`UsymSymbols::reconstruct`](crate::UsymSymbols::reconstruct).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frames {
    pub(crate) frames: Vec<ResolvedSymbol>,
    pub(crate) truncated: bool,
}

impl Frames {
    /// The frames as a slice, outermost caller first.
    pub fn as_slice(&self) -> &[ResolvedSymbol] {
        &self.frames
    }

    /// The number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost frame.
    pub fn leaf(&self) -> Option<&ResolvedSymbol> {
        self.frames.last()
    }

    /// Returns `true` if the parent links formed a cycle and the outer frames were cut off.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the frames, or a [`UsymErrorKind::CorruptChain`] error if they were truncated.
    pub fn complete(&self) -> Result<&[ResolvedSymbol], UsymError> {
        match self.truncated {
            true => Err(UsymErrorKind::CorruptChain.into()),
            false => Ok(&self.frames),
        }
    }

    /// Iterates the frames, outermost caller first.
    pub fn iter(&self) -> slice::Iter<'_, ResolvedSymbol> {
        self.frames.iter()
    }

    /// Converts into the list of frames, outermost caller first.
    pub fn into_vec(self) -> Vec<ResolvedSymbol> {
        self.frames
    }
}

impl IntoIterator for Frames {
    type Item = ResolvedSymbol;
    type IntoIter = std::vec::IntoIter<ResolvedSymbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Frames {
    type Item = &'a ResolvedSymbol;
    type IntoIter = slice::Iter<'a, ResolvedSymbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
