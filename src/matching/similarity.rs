//! String and track similarity scoring.
//!
//! Every function here is pure and deterministic. Scores are in `[0, 1]`.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::types::{CandidateSong, SourceTrack};

const DURATION_WINDOW_MS: f64 = 3000.0;
const DURATION_LIMIT_MS: f64 = 60000.0;
const ALBUM_SCALE: f64 = 0.8;

/// Start of a suffix annotation: a bracket, tilde or slash anywhere, or a
/// dash that follows whitespace ("Song - Remastered 2011").
static TITLE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[~/]|\s[-–—]").expect("valid title suffix pattern"));

static LIVE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blive\b").expect("valid live marker pattern"));

static COLLABORATION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:feat|ft|featuring|with|x|and|vs|versus|presents|presenting|pres|prod|produced\s+by|dj)\b\.?|&|\+)",
    )
    .expect("valid collaboration marker pattern")
});

static ALBUM_BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:original|soundtrack|sound|track|ost|score|complete|volume|vol|disc|disk)\b\.?",
    )
    .expect("valid album boilerplate pattern")
});

/// Lowercases, strips diacritics and punctuation, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Similarity of two strings that are already normalized.
fn normalized_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

pub fn string_similarity(a: &str, b: &str) -> f64 {
    normalized_ratio(&normalize(a), &normalize(b))
}

/// Cuts a title at its first suffix annotation.
///
/// Returns the trimmed input unchanged when the annotation starts the title,
/// so "(I Can't Get No) Satisfaction" is never reduced to nothing.
pub fn strip_title_suffix(title: &str) -> &str {
    let trimmed = title.trim();
    match TITLE_SUFFIX.find(trimmed) {
        Some(m) => {
            let head = trimmed[..m.start()].trim();
            if head.is_empty() { trimmed } else { head }
        }
        None => trimmed,
    }
}

pub fn normalize_title(title: &str) -> String {
    let stripped = strip_title_suffix(title);
    let without_live = LIVE_MARKER.replace_all(stripped, " ");
    let normalized = normalize(&without_live);
    if normalized.is_empty() {
        normalize(title)
    } else {
        normalized
    }
}

/// Normalizes an artist credit down to its lead artist.
///
/// Everything from the first collaboration marker onward is dropped, so
/// "Artist A feat. Artist B" and "Artist A & Artist B" both become
/// "artist a". A marker that opens the credit ("DJ Shadow") is only removed.
pub fn normalize_artist(artist: &str) -> String {
    let trimmed = artist.trim();
    let lead = COLLABORATION_MARKER
        .find_iter(trimmed)
        .find(|m| !trimmed[..m.start()].trim().is_empty())
        .map(|m| &trimmed[..m.start()])
        .unwrap_or(trimmed);

    normalize(&COLLABORATION_MARKER.replace_all(lead, " "))
}

pub fn normalize_album(album: &str) -> String {
    normalize(&ALBUM_BOILERPLATE.replace_all(album, " "))
}

pub fn title_similarity(a: &str, b: &str) -> f64 {
    normalized_ratio(&normalize_title(a), &normalize_title(b))
}

pub fn artist_similarity(a: &str, b: &str) -> f64 {
    normalized_ratio(&normalize_artist(a), &normalize_artist(b))
}

/// Token overlap of two album names, scaled down because album metadata is
/// a weaker signal than title or artist. Identical names score 1.0.
pub fn album_similarity(a: &str, b: &str) -> f64 {
    let left = normalize_album(a);
    let right = normalize_album(b);
    if left == right {
        return 1.0;
    }

    let left_tokens: Vec<&str> = left.split(' ').filter(|t| !t.is_empty()).collect();
    let right_tokens: Vec<&str> = right.split(' ').filter(|t| !t.is_empty()).collect();
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }

    let shared = left_tokens
        .iter()
        .filter(|t| right_tokens.iter().any(|u| u.contains(*t) || t.contains(u)))
        .count();

    shared as f64 / left_tokens.len().max(right_tokens.len()) as f64 * ALBUM_SCALE
}

/// Compares a duration in milliseconds with one in seconds.
///
/// Inside a 3 second window the score falls linearly from 1.0 to 0.9, then
/// keeps falling linearly to 0 at a 60 second difference.
pub fn duration_similarity(duration_ms: u64, duration_seconds: f64) -> f64 {
    let diff = (duration_ms as f64 - duration_seconds * 1000.0).abs();

    if diff < DURATION_WINDOW_MS {
        return 1.0 - 0.1 * diff / DURATION_WINDOW_MS;
    }

    let remaining = (DURATION_LIMIT_MS - diff) / (DURATION_LIMIT_MS - DURATION_WINDOW_MS);
    (0.9 * remaining).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScores {
    pub artist: f64,
    pub title: f64,
    pub duration: f64,
    pub album: f64,
    pub total: f64,
}

pub fn score_track(source: &SourceTrack, candidate: &CandidateSong) -> SimilarityScores {
    // Compare against both the full credit and the lead artist; the
    // destination usually only stores one of the two.
    let artist = artist_similarity(&source.joined_artists(), &candidate.artist)
        .max(artist_similarity(source.primary_artist(), &candidate.artist));
    let title = title_similarity(&source.title, &candidate.title);
    let duration = duration_similarity(source.duration_ms, candidate.duration_seconds);
    let album = album_similarity(&source.album, &candidate.album);

    SimilarityScores {
        artist,
        title,
        duration,
        album,
        total: composite(artist, title, duration, album),
    }
}

fn composite(artist: f64, title: f64, duration: f64, album: f64) -> f64 {
    if title == 1.0 {
        if artist >= 0.3 {
            let weighted = artist * 0.2 + title * 0.4 + duration * 0.3 + album * 0.1;
            return weighted.max(0.85).min(1.0);
        }
        let weighted = artist * 0.15 + title * 0.45 + duration * 0.3 + album * 0.1;
        return weighted.max(0.75).min(1.0);
    }

    let mut score = artist * 0.25 + title * 0.35 + duration * 0.25 + album * 0.15;

    if duration >= 0.9 {
        score = (score + 0.1).min(0.95);
    }

    if album >= 0.8 && (title >= 0.6 || artist >= 0.4) {
        score = (score + 0.05).min(0.95);
    }

    score.clamp(0.0, 1.0)
}

pub fn track_similarity(source: &SourceTrack, candidate: &CandidateSong) -> f64 {
    score_track(source, candidate).total
}
