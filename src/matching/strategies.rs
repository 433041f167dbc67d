//! The three match strategies and the candidate lookup they share.

use std::collections::HashSet;

use crate::{
    catalog::DestinationCatalog,
    error::CatalogError,
    matching::similarity::{strip_title_suffix, track_similarity},
    types::{CandidateSong, MatchStatus, MatchStrategy, SourceTrack, TrackMatch},
};

/// Maximum distance between two durations for the duration-only identifier
/// heuristic, in milliseconds.
pub const DURATION_TOLERANCE_MS: f64 = 2000.0;

/// Fuzzy scores this close to the best one make a result ambiguous.
pub const AMBIGUITY_MARGIN: f64 = 0.05;

/// How candidate songs are looked up in the destination catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// All songs of the track's primary artist.
    Artist,
    /// Title search with suffix and `/` fallbacks.
    Title,
    /// Artist lookup, then title search when the artist yields nothing.
    #[default]
    ArtistThenTitle,
}

/// Verdict of a single strategy over a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub strategy: MatchStrategy,
    pub status: MatchStatus,
    pub candidate: Option<CandidateSong>,
    pub score: f64,
    /// Every candidate that cleared the threshold, best first. Only the
    /// fuzzy strategy fills this in.
    pub alternates: Vec<CandidateSong>,
}

impl StrategyResult {
    fn matched(strategy: MatchStrategy, candidate: &CandidateSong, score: f64) -> Self {
        Self {
            strategy,
            status: MatchStatus::Matched,
            candidate: Some(candidate.clone()),
            score,
            alternates: Vec::new(),
        }
    }

    fn unmatched(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            status: MatchStatus::Unmatched,
            candidate: None,
            score: 0.0,
            alternates: Vec::new(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched && self.candidate.is_some()
    }

    pub fn into_track_match(self, source_track: SourceTrack) -> TrackMatch {
        TrackMatch {
            source_track,
            candidate_song: self.candidate,
            match_strategy: self.strategy,
            match_score: self.score,
            status: self.status,
            candidates: self.alternates,
        }
    }
}

fn same_isrc(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn within_tolerance(track: &SourceTrack, candidate: &CandidateSong) -> bool {
    (track.duration_ms as f64 - candidate.duration_seconds * 1000.0).abs() < DURATION_TOLERANCE_MS
}

/// Identifier strategy.
///
/// A shared ISRC is an exact match. When the track has an ISRC that no
/// candidate carries, a single candidate less than two seconds away from the
/// track's duration is accepted at the same strength.
pub fn match_by_isrc(track: &SourceTrack, candidates: &[CandidateSong]) -> StrategyResult {
    let Some(isrc) = track.isrc.as_deref().filter(|isrc| !isrc.trim().is_empty()) else {
        return StrategyResult::unmatched(MatchStrategy::Isrc);
    };

    if let Some(song) = candidates
        .iter()
        .find(|c| c.isrc.as_deref().is_some_and(|other| same_isrc(isrc, other)))
    {
        return StrategyResult::matched(MatchStrategy::Isrc, song, 1.0);
    }

    let mut close = candidates.iter().filter(|c| within_tolerance(track, c));
    match (close.next(), close.next()) {
        (Some(song), None) => StrategyResult::matched(MatchStrategy::Isrc, song, 1.0),
        _ => StrategyResult::unmatched(MatchStrategy::Isrc),
    }
}

/// Lowercases, drops everything that is not alphanumeric or whitespace, and
/// collapses whitespace. Unlike title normalization nothing is stripped, so
/// "Song (Live)" stays "song live".
pub fn strict_normalize(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strict strategy: the first candidate whose artist and title equal the
/// track's after [`strict_normalize`].
pub fn match_by_strict(track: &SourceTrack, candidates: &[CandidateSong]) -> StrategyResult {
    let title = strict_normalize(&track.title);
    let joined = strict_normalize(&track.joined_artists());
    let primary = strict_normalize(track.primary_artist());

    if title.is_empty() || primary.is_empty() {
        return StrategyResult::unmatched(MatchStrategy::Strict);
    }

    candidates
        .iter()
        .find(|c| {
            let artist = strict_normalize(&c.artist);
            strict_normalize(&c.title) == title && (artist == joined || artist == primary)
        })
        .map(|song| StrategyResult::matched(MatchStrategy::Strict, song, 1.0))
        .unwrap_or_else(|| StrategyResult::unmatched(MatchStrategy::Strict))
}

/// Fuzzy strategy.
///
/// Candidates scoring at or above `threshold` compete; the best one wins
/// unless a runner-up is within [`AMBIGUITY_MARGIN`], which makes the result
/// ambiguous. Below the threshold the best candidate is still reported on an
/// unmatched result as a hint.
pub fn match_by_fuzzy(
    track: &SourceTrack,
    candidates: &[CandidateSong],
    threshold: f64,
) -> StrategyResult {
    let mut scored: Vec<(f64, &CandidateSong)> = candidates
        .iter()
        .map(|c| (track_similarity(track, c), c))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let Some(&(best_score, best)) = scored.first() else {
        return StrategyResult::unmatched(MatchStrategy::Fuzzy);
    };

    if best_score < threshold {
        return StrategyResult {
            strategy: MatchStrategy::Fuzzy,
            status: MatchStatus::Unmatched,
            candidate: Some(best.clone()),
            score: best_score,
            alternates: Vec::new(),
        };
    }

    let contenders: Vec<&(f64, &CandidateSong)> =
        scored.iter().take_while(|(score, _)| *score >= threshold).collect();
    let ambiguous = contenders
        .iter()
        .skip(1)
        .any(|(score, _)| best_score - score <= AMBIGUITY_MARGIN);

    if !ambiguous {
        return StrategyResult::matched(MatchStrategy::Fuzzy, best, best_score);
    }

    StrategyResult {
        strategy: MatchStrategy::Fuzzy,
        status: MatchStatus::Ambiguous,
        candidate: Some(best.clone()),
        score: best_score,
        alternates: contenders.iter().map(|(_, c)| (*c).clone()).collect(),
    }
}

/// Title queries tried in order: the title without its suffix annotation,
/// the full title, then each `/`-separated segment.
pub fn title_queries(title: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut push = |query: &str| {
        let query = query.trim();
        if !query.is_empty() && !queries.iter().any(|q| q == query) {
            queries.push(query.to_string());
        }
    };

    push(strip_title_suffix(title));
    push(title);
    for segment in title.split('/') {
        push(segment);
    }

    queries
}

fn dedup_by_id(songs: Vec<CandidateSong>, seen: &mut HashSet<String>) -> Vec<CandidateSong> {
    songs
        .into_iter()
        .filter(|song| seen.insert(song.id.clone()))
        .collect()
}

async fn candidates_by_artist<D: DestinationCatalog + ?Sized>(
    destination: &D,
    track: &SourceTrack,
    limit: usize,
) -> Result<Vec<CandidateSong>, CatalogError> {
    let artist = track.primary_artist().trim();
    if artist.is_empty() {
        return Ok(Vec::new());
    }

    let songs = destination.find_candidates_by_artist(artist).await?;
    let mut found = dedup_by_id(songs, &mut HashSet::new());
    found.truncate(limit);
    Ok(found)
}

async fn candidates_by_title<D: DestinationCatalog + ?Sized>(
    destination: &D,
    track: &SourceTrack,
    limit: usize,
) -> Result<Vec<CandidateSong>, CatalogError> {
    let mut seen = HashSet::new();

    for query in title_queries(&track.title) {
        let songs = destination.find_candidates_by_title(&query, limit).await?;
        let mut found = dedup_by_id(songs, &mut seen);
        if !found.is_empty() {
            found.truncate(limit);
            return Ok(found);
        }
    }

    Ok(Vec::new())
}

/// Looks up the candidate set for one track.
pub async fn find_candidates<D: DestinationCatalog + ?Sized>(
    destination: &D,
    track: &SourceTrack,
    mode: SearchMode,
    limit: usize,
) -> Result<Vec<CandidateSong>, CatalogError> {
    match mode {
        SearchMode::Artist => candidates_by_artist(destination, track, limit).await,
        SearchMode::Title => candidates_by_title(destination, track, limit).await,
        SearchMode::ArtistThenTitle => {
            let found = candidates_by_artist(destination, track, limit).await?;
            if found.is_empty() {
                candidates_by_title(destination, track, limit).await
            } else {
                Ok(found)
            }
        }
    }
}
