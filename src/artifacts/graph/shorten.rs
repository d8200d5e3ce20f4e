//! Abbreviated object identifiers
//!
//! A snapshot is drawn with every object ID cut to the same length: the
//! shortest one (but never below [`MIN_SHORTEN_LENGTH`]) that keeps all of
//! the snapshot's IDs distinct. The length is recomputed for every snapshot.

use crate::artifacts::objects::OBJECT_ID_LENGTH;
use thiserror::Error;

/// Abbreviations never go below this many characters
pub const MIN_SHORTEN_LENGTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenError {
    #[error("identifiers of different lengths ({0} and {1}) cannot share an abbreviation")]
    MixedLengths(usize, usize),
    #[error("identifier {0} appears more than once")]
    Duplicate(String),
}

/// Smallest length `>= min_length` at which the identifiers stay distinct
///
/// Lengths are capped at the identifiers' own length. An empty set needs no
/// disambiguation and yields `min_length`.
pub fn unique_prefix_length<S: AsRef<str>>(
    ids: &[S],
    min_length: usize,
) -> Result<usize, ShortenError> {
    let mut sorted = ids.iter().map(|id| id.as_ref()).collect::<Vec<&str>>();
    sorted.sort_unstable();

    let full_length = match sorted.first() {
        Some(first) => first.len(),
        None => return Ok(min_length),
    };

    let mut needed = min_length;
    for pair in sorted.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if right.len() != full_length {
            return Err(ShortenError::MixedLengths(full_length, right.len()));
        }
        if left == right {
            return Err(ShortenError::Duplicate(left.to_string()));
        }

        let common = left
            .bytes()
            .zip(right.bytes())
            .take_while(|(l, r)| l == r)
            .count();
        needed = needed.max(common + 1);
    }

    Ok(needed.min(full_length))
}

/// Shorten length for a snapshot's object IDs, falling back to full IDs
pub fn shorten_length<S: AsRef<str>>(ids: &[S]) -> usize {
    unique_prefix_length(ids, MIN_SHORTEN_LENGTH).unwrap_or_else(|error| {
        tracing::debug!(%error, "falling back to full object ids");
        OBJECT_ID_LENGTH
    })
}
