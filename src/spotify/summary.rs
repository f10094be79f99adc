//! Vibe summary aggregation.
//!
//! One request fans out to every upstream call the summary needs, waits for
//! all of them to settle, and folds whatever succeeded into a
//! [`VibeSummary`]. Failed sections are reported in `errors` instead of
//! failing the response. The one exception is the profile call failing
//! because the session is no longer valid, which is returned as an error.

use std::collections::{BTreeMap, HashMap};

use futures::future::join_all;

use crate::{
    error::Error,
    spotify::proxy::SpotifyApi,
    types::{
        Artist, AudioFeatures, AudioFeaturesResponse, FeatureAverages, GenreCount, ItemSource,
        MoodProfile, Page, PlayHistory, Playlist, TimeRange, TopItems, Track, UserProfile,
        VibeSummary,
    },
    utils,
};

/// Upstream cap on ids per `/audio-features` request.
pub const MAX_IDS_PER_REQUEST: usize = 100;
pub const TOP_GENRES: usize = 10;
pub const RECENTLY_PLAYED_LIMIT: u32 = 50;
pub const PLAYLIST_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    /// Items per top-artists / top-tracks list (1..=50).
    pub limit: u32,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

/// Per-range results, in [`TimeRange::PRIORITY`] order.
pub type RangeResults<T> = Vec<(TimeRange, Result<Vec<T>, Error>)>;

/// Builds the summary for one session.
///
/// # Errors
///
/// Only when the profile call fails with an auth failure
/// ([`Error::is_auth_failure`]); every other failure lands in `errors`.
pub async fn build(
    api: &SpotifyApi,
    session_id: &str,
    options: SummaryOptions,
) -> Result<VibeSummary, Error> {
    let limit = options.limit.clamp(1, 50);

    let top_artists = join_all(TimeRange::PRIORITY.map(|range| {
        let query = top_query(limit, range);
        async move {
            let result = api
                .get::<Page<Artist>>(session_id, "/me/top/artists", &query)
                .await
                .map(|page| page.items);
            (range, result)
        }
    }));
    let top_tracks = join_all(TimeRange::PRIORITY.map(|range| {
        let query = top_query(limit, range);
        async move {
            let result = api
                .get::<Page<Track>>(session_id, "/me/top/tracks", &query)
                .await
                .map(|page| page.items);
            (range, result)
        }
    }));

    let recent_query = [("limit", RECENTLY_PLAYED_LIMIT.to_string())];
    let playlist_query = [("limit", PLAYLIST_LIMIT.to_string())];

    let (profile, artist_results, track_results, recent, playlists) = tokio::join!(
        api.get::<UserProfile>(session_id, "/me", &[]),
        top_artists,
        top_tracks,
        api.get::<Page<PlayHistory>>(session_id, "/me/player/recently-played", &recent_query),
        api.get::<Page<Playlist>>(session_id, "/me/playlists", &playlist_query),
    );

    let mut errors = BTreeMap::new();

    let profile = match profile {
        Ok(profile) => Some(profile),
        Err(e) if e.is_auth_failure() => return Err(e),
        Err(e) => {
            errors.insert("profile", e.to_string());
            None
        }
    };

    let recently_played = match recent {
        Ok(page) => page.items,
        Err(e) => {
            errors.insert("recentlyPlayed", e.to_string());
            Vec::new()
        }
    };

    let playlists = match playlists {
        Ok(page) => page.items,
        Err(e) => {
            errors.insert("playlists", e.to_string());
            Vec::new()
        }
    };

    let (top_artists, artist_error) = select_top_artists(artist_results);
    if let Some(e) = artist_error {
        errors.insert("topArtists", e.to_string());
    }

    let (top_tracks, track_error) =
        select_top_tracks(track_results, &recently_played, limit as usize);
    if let Some(e) = track_error {
        errors.insert("topTracks", e.to_string());
    }

    let top_genres = genre_counts(&top_artists.items, TOP_GENRES);

    let track_ids = utils::unique_track_ids(&top_tracks.items);
    let (features, features_error) = fetch_audio_features(api, session_id, &track_ids).await;
    if let Some(e) = features_error {
        errors.insert("audioFeatures", e.to_string());
    }
    let audio_features = average_features(&features);
    let mood = audio_features.as_ref().map(mood_profile);

    if !errors.is_empty() {
        tracing::info!(
            failed = ?errors.keys().collect::<Vec<_>>(),
            "vibe summary assembled with partial data"
        );
    }

    Ok(VibeSummary {
        profile,
        top_artists,
        top_tracks,
        recently_played,
        playlists,
        top_genres,
        audio_features,
        mood,
        errors,
    })
}

fn top_query(limit: u32, range: TimeRange) -> Vec<(&'static str, String)> {
    vec![
        ("limit", limit.to_string()),
        ("time_range", range.as_str().to_string()),
    ]
}

/// Audio features for `ids`, one request per chunk of at most
/// [`MAX_IDS_PER_REQUEST`].
///
/// The result is aligned with `ids`: position `i` holds the features of
/// `ids[i]`, or `None` when the upstream has none or that chunk failed. The
/// first chunk error, if any, is returned alongside.
pub async fn fetch_audio_features(
    api: &SpotifyApi,
    session_id: &str,
    ids: &[String],
) -> (Vec<Option<AudioFeatures>>, Option<Error>) {
    let chunks = utils::chunk_ids(ids, MAX_IDS_PER_REQUEST);
    let responses = join_all(chunks.iter().map(|chunk| {
        let query = [("ids", chunk.join(","))];
        async move {
            api.get::<AudioFeaturesResponse>(session_id, "/audio-features", &query)
                .await
        }
    }))
    .await;

    let mut merged = Vec::with_capacity(ids.len());
    let mut first_error = None;
    for (chunk, response) in chunks.iter().zip(responses) {
        match response {
            Ok(body) => merged.extend(align_features(chunk, body.audio_features)),
            Err(e) => {
                merged.extend(chunk.iter().map(|_| None));
                first_error.get_or_insert(e);
            }
        }
    }
    (merged, first_error)
}

/// Matches returned feature objects back to the requested ids.
fn align_features(
    ids: &[String],
    features: Vec<Option<AudioFeatures>>,
) -> Vec<Option<AudioFeatures>> {
    let mut by_id: HashMap<String, AudioFeatures> = features
        .into_iter()
        .flatten()
        .map(|f| (f.id.clone(), f))
        .collect();
    ids.iter().map(|id| by_id.remove(id)).collect()
}

/// First range, in priority order, that returned a non-empty list.
///
/// When none did, the items are empty and the error is the first failure,
/// if every range failed.
pub fn first_non_empty<T>(results: RangeResults<T>) -> (TopItems<T>, Option<Error>) {
    let mut first_error = None;
    let mut any_ok = false;

    for (range, result) in results {
        match result {
            Ok(items) if !items.is_empty() => {
                return (
                    TopItems {
                        items,
                        source: Some(ItemSource::from(range)),
                    },
                    None,
                );
            }
            Ok(_) => any_ok = true,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    let error = if any_ok { None } else { first_error };
    (TopItems::default(), error)
}

/// Top artists by range priority.
pub fn select_top_artists(results: RangeResults<Artist>) -> (TopItems<Artist>, Option<Error>) {
    first_non_empty(results)
}

/// Top tracks by range priority, falling back to recently played history.
pub fn select_top_tracks(
    results: RangeResults<Track>,
    recently_played: &[PlayHistory],
    limit: usize,
) -> (TopItems<Track>, Option<Error>) {
    let (top, error) = first_non_empty(results);
    if !top.items.is_empty() {
        return (top, error);
    }

    let items = utils::tracks_from_recent(recently_played, limit);
    if items.is_empty() {
        return (top, error);
    }

    (
        TopItems {
            items,
            source: Some(ItemSource::RecentlyPlayed),
        },
        error,
    )
}

/// Genre occurrences across `artists`, most common first, at most `n`.
///
/// Ties are ordered by genre name.
pub fn genre_counts(artists: &[Artist], n: usize) -> Vec<GenreCount> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for genre in artists.iter().flat_map(|a| a.genres.iter()) {
        *counts.entry(genre.as_str()).or_default() += 1;
    }

    let mut genres: Vec<GenreCount> = counts
        .into_iter()
        .map(|(genre, count)| GenreCount {
            genre: genre.to_string(),
            count,
        })
        .collect();
    genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
    genres.truncate(n);
    genres
}

/// Mean of every feature over the tracks that have features.
///
/// Missing entries are skipped, not counted as zero. `None` when no track
/// has features.
pub fn average_features(features: &[Option<AudioFeatures>]) -> Option<FeatureAverages> {
    let present: Vec<&AudioFeatures> = features.iter().flatten().collect();
    if present.is_empty() {
        return None;
    }

    let n = present.len() as f64;
    let mean = |pick: fn(&AudioFeatures) -> f64| present.iter().map(|f| pick(f)).sum::<f64>() / n;

    Some(FeatureAverages {
        danceability: mean(|f| f.danceability),
        energy: mean(|f| f.energy),
        valence: mean(|f| f.valence),
        acousticness: mean(|f| f.acousticness),
        instrumentalness: mean(|f| f.instrumentalness),
        liveness: mean(|f| f.liveness),
        speechiness: mean(|f| f.speechiness),
        tempo: mean(|f| f.tempo),
        sample_size: present.len(),
    })
}

/// Averaged features as 0-100 percentages; valence reads as happiness.
pub fn mood_profile(averages: &FeatureAverages) -> MoodProfile {
    let pct = |value: f64| (value * 100.0).round().clamp(0.0, 100.0) as u8;
    MoodProfile {
        happiness: pct(averages.valence),
        energy: pct(averages.energy),
        danceability: pct(averages.danceability),
        acousticness: pct(averages.acousticness),
        instrumentalness: pct(averages.instrumentalness),
        speechiness: pct(averages.speechiness),
    }
}
