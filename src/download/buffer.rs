//! Adaptive I/O buffer sizing.
//!
//! The chunk size grows with the expected transfer size and is capped by a
//! small share of the memory currently available on the host.

use sysinfo::System;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Smallest buffer the engine will ever use.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Largest buffer the engine will ever use.
pub const MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Largest accepted override factor.
pub const MAX_BUFFER_FACTOR: u8 = 10;

/// Base chunk used when the server does not announce a size.
const UNKNOWN_SIZE_BASE: u64 = 64 * KIB;

/// Divisor for the memory cap (0.5% of available memory).
const MEMORY_CAP_DIVISOR: u64 = 200;

fn base_chunk(expected: u64) -> u64 {
    match expected {
        n if n < MIB => 16 * KIB,
        n if n < 10 * MIB => 64 * KIB,
        n if n < 100 * MIB => 256 * KIB,
        n if n < GIB => 512 * KIB,
        _ => MIB,
    }
}

fn auto_factor(expected: Option<u64>) -> u64 {
    match expected {
        Some(n) if n >= GIB => 4,
        Some(n) if n >= 10 * MIB => 2,
        _ => 1,
    }
}

/// Computes the chunk size for one attempt.
///
/// * `expected` - total size announced by the server, if any
/// * `factor` - `0` selects the factor from the size tier, `1..=10` overrides it
///   (larger values are clamped to 10)
/// * `available_memory` - free memory snapshot in bytes; `None` when the host
///   cannot report it, which leaves only the absolute bounds in place
///
/// The result always lies in `MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE`.
#[must_use]
pub fn buffer_size(expected: Option<u64>, factor: u8, available_memory: Option<u64>) -> usize {
    let base = expected.map_or(UNKNOWN_SIZE_BASE, base_chunk);
    let factor = match factor {
        0 => auto_factor(expected),
        n => u64::from(n.min(MAX_BUFFER_FACTOR)),
    };

    let cap = available_memory.map_or(MAX_BUFFER_SIZE as u64, |free| {
        (free / MEMORY_CAP_DIVISOR).clamp(MIN_BUFFER_SIZE as u64, MAX_BUFFER_SIZE as u64)
    });

    let size = base.saturating_mul(factor).min(cap).max(MIN_BUFFER_SIZE as u64);
    usize::try_from(size).unwrap_or(MAX_BUFFER_SIZE)
}

/// Samples the memory currently available to new allocations.
///
/// Returns `None` on platforms where `sysinfo` reports zero.
#[must_use]
pub fn memory_snapshot() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.available_memory() {
        0 => None,
        free => Some(free),
    }
}
