//! Segment type and range planning.

use crate::downloader::TransferError;

/// A single segment: byte range [offset, offset + length) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Position in the work queue; says nothing about completion order.
    pub index: usize,
    /// Start offset (inclusive).
    pub offset: u64,
    /// Length in bytes (never 0 for planned segments).
    pub length: u64,
}

impl Segment {
    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Builds a segment plan of fixed `segment_size` ranges covering `[0, total_size)`.
///
/// Produces `ceil(total_size / segment_size)` segments; the last one holds the
/// remainder (or a full segment when the size divides evenly).
pub fn plan_segments(total_size: u64, segment_size: u64) -> Result<Vec<Segment>, TransferError> {
    if total_size == 0 || segment_size == 0 {
        return Err(TransferError::InvalidSize {
            total_size,
            segment_size,
        });
    }

    let count = total_size.div_ceil(segment_size);
    let mut out = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    let mut index = 0usize;
    while offset < total_size {
        let length = segment_size.min(total_size - offset);
        out.push(Segment {
            index,
            offset,
            length,
        });
        offset += length;
        index += 1;
    }
    Ok(out)
}
