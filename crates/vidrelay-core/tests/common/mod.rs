//! Shared helpers for integration tests: local HTTP servers and a scripted upload service.
#![allow(dead_code)]

pub mod fake_service;
pub mod range_server;
pub mod upload_server;

/// Deterministic non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect()
}
