//! Study code allocation
//!
//! Study codes are short lowercase strings that researchers hand-copy onto
//! paperwork, so they stay small and unambiguous. Only a few hundred studies
//! are ever expected, created in infrequent batches, so candidates are drawn
//! at random and rejected on collision rather than allocated from a counter.
//!
//! A whole batch must be allocated before any insert: generating codes one at
//! a time against the database would miss duplicates within the batch itself,
//! since earlier picks are not persisted yet when later ones are checked.

use rand::Rng;
use sqlx::SqlitePool;
use std::collections::HashSet;

use studybank_common::Result;

use crate::db;

/// Alphabet study codes are drawn from. Strictly lowercase letters, which
/// keeps codes easy to read aloud and to hand-copy.
pub const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Minimum code length. Shorter encodings are left-padded.
pub const CODE_MIN_LENGTH: usize = 4;

/// Upper bound (exclusive) on the random value a candidate encodes. Policy
/// constant: large enough for the expected low hundreds of codes, small
/// enough that codes stay short.
pub const CODE_VALUE_SPACE: u64 = 10_000;

/// Cap on studies created by a single batch request. Policy constant, also
/// a guard against a participant file full of junk lines.
pub const MAX_STUDIES_PER_REQUEST: usize = 1000;

/// Encode a value in the code alphabet, left-padded to the minimum length
pub fn encode_code(value: u64) -> String {
    let base = CODE_ALPHABET.len() as u64;
    let mut remaining = value;
    let mut digits = Vec::new();
    loop {
        digits.push(CODE_ALPHABET[(remaining % base) as usize]);
        remaining /= base;
        if remaining == 0 {
            break;
        }
    }
    while digits.len() < CODE_MIN_LENGTH {
        digits.push(CODE_ALPHABET[0]);
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

/// Allocate `count` fresh study codes
///
/// Each returned code is distinct from every other code in the batch and
/// from every persisted study. Collisions are simply redrawn; the loop only
/// livelocks if the code space is nearly exhausted, which the expected
/// volume keeps far away.
pub async fn allocate(pool: &SqlitePool, count: usize) -> Result<Vec<String>> {
    let mut taken = HashSet::with_capacity(count);
    let mut codes = Vec::with_capacity(count);

    while codes.len() < count {
        let candidate = encode_code(rand::thread_rng().gen_range(0..CODE_VALUE_SPACE));
        if taken.contains(&candidate) {
            continue;
        }
        if db::study_exists(pool, &candidate).await? {
            continue;
        }
        taken.insert(candidate.clone());
        codes.push(candidate);
    }

    Ok(codes)
}

/// Build the participant-facing URL for a study code
pub fn study_url(prefix: &str, code: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use studybank_common::model::{Study, StudyType};

    #[test]
    fn encoding_is_padded_and_alphabet_only() {
        assert_eq!(encode_code(0), "aaaa");
        assert_eq!(encode_code(1), "aaab");
        assert_eq!(encode_code(25), "aaaz");
        assert_eq!(encode_code(26), "aaba");

        for value in [0, 1, 9_999, 42_000_000] {
            let code = encode_code(value);
            assert!(code.len() >= CODE_MIN_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn encoding_is_deterministic_and_injective_in_the_value_space() {
        let mut seen = HashSet::new();
        for value in 0..CODE_VALUE_SPACE {
            assert!(seen.insert(encode_code(value)), "value {} collided", value);
        }
    }

    #[test]
    fn url_prefix_trailing_slash_is_normalized() {
        assert_eq!(study_url("https://s.test", "abcd"), "https://s.test/abcd");
        assert_eq!(study_url("https://s.test/", "abcd"), "https://s.test/abcd");
        assert_eq!(study_url("https://s.test/go/", "abcd"), "https://s.test/go/abcd");
    }

    async fn pool_with_codes(codes: &[&str]) -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let pool = db::init_database(&dir.path().join("studybank.db"))
            .await
            .expect("Should initialize database");
        let studies: Vec<Study> = codes
            .iter()
            .map(|code| Study {
                study_id: code.to_string(),
                participant_id: "p1".to_string(),
                url: format!("https://s.test/{}", code),
                study_type: StudyType::Baseline,
            })
            .collect();
        db::insert_studies(&pool, &studies).await.unwrap();
        (pool, dir)
    }

    #[tokio::test]
    async fn allocation_avoids_persisted_and_batch_collisions() {
        let (pool, _dir) = pool_with_codes(&["abcd", "efgh"]).await;

        let codes = allocate(&pool, 3).await.unwrap();
        assert_eq!(codes.len(), 3);

        let distinct: HashSet<_> = codes.iter().collect();
        assert_eq!(distinct.len(), 3);

        for code in &codes {
            assert_ne!(code, "abcd");
            assert_ne!(code, "efgh");
            assert!(code.len() >= CODE_MIN_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn large_batches_come_back_fully_distinct() {
        let (pool, _dir) = pool_with_codes(&[]).await;

        // Large enough that naive one-at-a-time generation would collide
        let codes = allocate(&pool, 200).await.unwrap();
        let distinct: HashSet<_> = codes.iter().collect();
        assert_eq!(distinct.len(), 200);
    }
}
