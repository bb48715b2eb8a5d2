//! Searching the line record table for the record that covers an address.

use crate::raw::LineRecord;

/// The maximum distance in bytes between a looked up address and the closest preceding record for
/// that record to be considered a match.
pub const MAX_LOOKUP_DISTANCE: u64 = 1024;

/// Finds the index of the record that best describes `address`.
///
/// `records` must be sorted by address. Returns `None` only if `records` is empty.
///
/// - If records exist at exactly `address`, the first of them is returned.
/// - Otherwise, if the closest record below `address` is at most [`MAX_LOOKUP_DISTANCE`] bytes
///   away, the *last* record sharing that record's address is returned.
/// - Otherwise the closest record below `address` is returned, or the last record in the table if
///   `address` precedes all records.
///
/// Existing symbol files rely on this exact selection, including the different tie-breaking of
/// exact and inexact matches and the fallback to the last record. The returned record may not map
/// to a source line at all, which callers must check with [`LineRecord::has_line`].
pub fn locate_index(records: &[LineRecord], address: u64) -> Option<usize> {
    if records.is_empty() {
        return None;
    }

    // `head` is the first index that may be >= address, `tail` + 1 the first index known to be
    // greater. Signed so that `tail` can move below the first record.
    let mut head: isize = 0;
    let mut tail: isize = records.len() as isize - 1;

    while head <= tail {
        let mid = head + (tail - head) / 2;
        let mid_address = records[mid as usize].address;

        if mid_address < address {
            head = mid + 1;
        } else if mid_address > address {
            tail = mid - 1;
        } else {
            let mut index = mid as usize;
            while index > 0 && records[index - 1].address == address {
                index -= 1;
            }
            return Some(index);
        }
    }

    // `tail` now points at the greatest address below the target, if there is one. In a sorted
    // table this is already the last record of its run.
    if tail >= 0 {
        let mut index = tail as usize;
        let base = records[index].address;

        if address - base <= MAX_LOOKUP_DISTANCE {
            while index + 1 < records.len() && records[index + 1].address == base {
                index += 1;
            }
        }

        return Some(index);
    }

    Some(records.len() - 1)
}

/// Finds the record that best describes `address`.
///
/// See [`locate_index`] for the selection rules.
pub fn locate(records: &[LineRecord], address: u64) -> Option<&LineRecord> {
    locate_index(records, address).map(|index| &records[index])
}
