//! Candidate phrase generation.
//!
//! Each guess is a 12-word BIP-39 English mnemonic: 128 bits drawn from the
//! operating system's CSPRNG, encoded with the standard wordlist and
//! checksum. Encoding is a deterministic function of the entropy; all the
//! randomness comes from the draw.

use bip39::Mnemonic;
use rand::TryRng;
use rand::rngs::SysRng;
use thiserror::Error;

/// 128 bits per phrase, the 12-word BIP-39 size.
pub const ENTROPY_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The OS random source failed. The cycle is skipped; the loop goes on.
    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(String),
    /// The wordlist encoder refused the entropy. Unreachable at the fixed
    /// 16-byte size; kept so a future size change cannot panic.
    #[error("entropy could not be encoded as a phrase: {0}")]
    Encode(String),
}

/// Generate a batch of independent candidate phrases.
///
/// The batch is all-or-nothing: a mid-batch failure discards what was
/// already drawn rather than submitting a short batch.
pub fn generate_batch(batch_size: usize) -> Result<Vec<String>, GenerationError> {
    let mut batch = Vec::with_capacity(batch_size);
    for _ in 0..batch_size {
        batch.push(generate_phrase()?);
    }
    Ok(batch)
}

fn generate_phrase() -> Result<String, GenerationError> {
    let mut entropy = [0u8; ENTROPY_BYTES];
    SysRng
        .try_fill_bytes(&mut entropy)
        .map_err(|err| GenerationError::EntropyUnavailable(err.to_string()))?;

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|err| GenerationError::Encode(err.to_string()))?;
    Ok(mnemonic.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn batch_has_requested_size() {
        let batch = generate_batch(50).unwrap();
        assert_eq!(batch.len(), 50);
    }

    #[test]
    fn phrases_are_twelve_words() {
        let batch = generate_batch(5).unwrap();
        for phrase in &batch {
            assert_eq!(phrase.split_whitespace().count(), 12, "phrase: {phrase}");
        }
    }

    #[test]
    fn phrases_pass_checksum_validation() {
        let batch = generate_batch(10).unwrap();
        for phrase in &batch {
            let parsed = Mnemonic::parse(phrase).expect("generated phrase must validate");
            assert_eq!(parsed.to_entropy().len(), ENTROPY_BYTES);
        }
    }

    #[test]
    fn phrases_are_distinct_across_a_batch() {
        // 2^128 possibilities; a collision in 50 draws means the entropy
        // source is broken.
        let batch = generate_batch(50).unwrap();
        let unique: HashSet<&String> = batch.iter().collect();
        assert_eq!(unique.len(), batch.len());
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(generate_batch(0).unwrap().is_empty());
    }
}
