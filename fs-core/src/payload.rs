//! Deterministic write payload generation
//!
//! Every replayed write carries a payload computed from the write's
//! position and an auxiliary value, never from ambient state, so two runs
//! (or two filesystem instances in lockstep) replaying the same logical
//! write produce the same bytes.

use byteorder::{ByteOrder, NativeEndian};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::store::{Result, StoreError};

/// Width of one pattern word in bytes
pub const WORD_SIZE: usize = 4;

/// How a payload buffer is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Every byte is 1
    Ones,
    /// Every byte is the auxiliary value truncated to a byte
    UniformByte,
    /// 4-byte words holding their own word index within the file
    OffsetPattern,
    /// One random 32-bit word per call, repeated across the buffer
    RandomRepeated,
}

/// Generate `len` payload bytes for a write at `offset`.
///
/// For every policy except [`FillPolicy::RandomRepeated`] the result is a
/// pure function of `(len, offset, policy, value)`. `len` comes straight
/// from the log, so an allocation failure is returned rather than aborting.
pub fn generate(len: usize, offset: u64, policy: FillPolicy, value: u32) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| StoreError::OutOfMemory {
            capacity: 0,
            requested: len,
        })?;
    buf.resize(len, 0);
    generate_into(&mut buf, offset, policy, value);
    Ok(buf)
}

/// Fill an existing buffer; see [`generate`]
pub fn generate_into(buf: &mut [u8], offset: u64, policy: FillPolicy, value: u32) {
    match policy {
        FillPolicy::Ones => buf.fill(1),
        FillPolicy::UniformByte => buf.fill(value as u8),
        FillPolicy::OffsetPattern => fill_pattern(buf, offset),
        FillPolicy::RandomRepeated => fill_repeated(buf, random_word(value)),
    }
}

/// Number of zero bytes preceding the first pattern word: `3 - offset mod 4`
pub fn pattern_padding(offset: u64) -> usize {
    3 - (offset % WORD_SIZE as u64) as usize
}

/// Value of pattern word `k` for a write at `offset`: `offset / 4 + k`
pub fn pattern_word(offset: u64, k: usize) -> u32 {
    (offset / WORD_SIZE as u64).wrapping_add(k as u64) as u32
}

fn fill_pattern(buf: &mut [u8], offset: u64) {
    let pad = pattern_padding(offset).min(buf.len());
    buf[..pad].fill(0);

    for (k, chunk) in buf[pad..].chunks_mut(WORD_SIZE).enumerate() {
        let mut word = [0u8; WORD_SIZE];
        NativeEndian::write_u32(&mut word, pattern_word(offset, k));
        // the last word is clipped to whatever is left of the buffer
        let n = chunk.len();
        chunk.copy_from_slice(&word[..n]);
    }
}

fn fill_repeated(buf: &mut [u8], value: u32) {
    let mut word = [0u8; WORD_SIZE];
    NativeEndian::write_u32(&mut word, value);
    for chunk in buf.chunks_mut(WORD_SIZE) {
        let n = chunk.len();
        chunk.copy_from_slice(&word[..n]);
    }
}

fn random_word(fallback: u32) -> u32 {
    let mut bytes = [0u8; WORD_SIZE];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => NativeEndian::read_u32(&bytes),
        Err(e) => {
            warn!("Random source unavailable ({}), filling with {:#x}", e, fallback);
            fallback
        }
    }
}

/// CRC-32 of a payload, logged so a checker can match written content
pub fn digest(buf: &[u8]) -> u32 {
    crc32fast::hash(buf)
}
