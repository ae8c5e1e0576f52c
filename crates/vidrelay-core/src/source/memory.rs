//! In-memory media source.
//!
//! Serves a byte buffer in fixed-size pieces. Used for dry runs and tests;
//! optional per-segment fault injection lets callers exercise the retry path.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{ChunkStream, MediaSource, SourceError};
use crate::retry::ErrorKind;

/// Byte buffer exposed as a `MediaSource`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<Vec<u8>>,
    piece: usize,
    faults: Arc<Mutex<HashMap<u64, (ErrorKind, u32)>>>,
    calls: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl MemorySource {
    /// Serve `data` in pieces of at most 64 KiB.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_piece_size(data, 64 * 1024)
    }

    pub fn with_piece_size(data: Vec<u8>, piece: usize) -> Self {
        Self {
            data: Arc::new(data),
            piece: piece.max(1),
            faults: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the next `times` fetches of the range starting at `offset` fail
    /// with `kind`. The failure is delivered mid-stream after the first piece,
    /// so a partial write happens before the error.
    pub fn fail_range(&self, offset: u64, kind: ErrorKind, times: u32) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(offset, (kind, times));
    }

    /// Every `(offset, length)` requested so far, in call order.
    pub fn calls(&self) -> Vec<(u64, u64)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_fault(&self, offset: u64) -> Option<ErrorKind> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = faults.get_mut(&offset)?;
        if entry.1 == 0 {
            return None;
        }
        entry.1 -= 1;
        Some(entry.0)
    }
}

#[async_trait]
impl MediaSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn fetch_range(&self, offset: u64, length: u64) -> Result<ChunkStream, SourceError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((offset, length));

        let total = self.data.len() as u64;
        if offset >= total {
            return Err(SourceError::permanent(format!(
                "range start {} beyond object size {}",
                offset, total
            )));
        }
        let end = offset.saturating_add(length).min(total);
        let fault = self.take_fault(offset);

        let data = Arc::clone(&self.data);
        let piece = self.piece as u64;
        let mut pieces: Vec<Result<Vec<u8>, SourceError>> = Vec::new();
        let mut pos = offset;
        while pos < end {
            let next = (pos + piece).min(end);
            pieces.push(Ok(data[pos as usize..next as usize].to_vec()));
            pos = next;
            if let Some(kind) = fault {
                pieces.push(Err(SourceError::new(
                    kind,
                    format!("injected failure at offset {}", offset),
                )));
                break;
            }
        }
        Ok(stream::iter(pieces).boxed())
    }
}
