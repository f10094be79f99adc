use std::{collections::HashSet, ops::RangeInclusive};

use rand::RngCore;

use crate::{
    error::Error,
    types::{PlayHistory, Track},
};

/// Smallest accepted entropy for [`random_token`].
pub const MIN_TOKEN_BYTES: usize = 8;

/// Hex-encoded random token from the thread CSPRNG.
///
/// `byte_len` is raised to [`MIN_TOKEN_BYTES`] if smaller, so the result is
/// always at least 16 hex characters.
pub fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len.max(MIN_TOKEN_BYTES)];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Splits ids into chunks of at most `size`, preserving order.
pub fn chunk_ids(ids: &[String], size: usize) -> Vec<&[String]> {
    ids.chunks(size.max(1)).collect()
}

/// Parses a comma separated id list, dropping blanks and duplicates.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(String::from)
        .collect()
}

/// Ids of the given tracks in order, without duplicates or local files.
pub fn unique_track_ids(tracks: &[Track]) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(|track| track.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Tracks of the play history, most recent first, de-duplicated by id and
/// capped at `limit`.
pub fn tracks_from_recent(history: &[PlayHistory], limit: usize) -> Vec<Track> {
    let mut seen = HashSet::new();
    history
        .iter()
        .map(|play| &play.track)
        .filter(|track| match &track.id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        })
        .take(limit)
        .cloned()
        .collect()
}

/// Parses an optional numeric query parameter, rejecting values outside `range`.
pub fn parse_bounded(
    name: &str,
    raw: Option<&str>,
    default: u32,
    range: RangeInclusive<u32>,
) -> Result<u32, Error> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<u32>() {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err(Error::BadRequest(format!(
            "{name} must be an integer between {} and {}",
            range.start(),
            range.end()
        ))),
    }
}
