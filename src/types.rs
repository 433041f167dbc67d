use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::export::descriptor::ExportDescriptor;

/// Reserved source playlist id under which liked songs are cached.
pub const LIKED_SONGS_ID: &str = "liked-songs";

/// A track as reported by the source catalog. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTrack {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub duration_ms: u64,
    pub isrc: Option<String>,
}

impl SourceTrack {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or_default()
    }

    /// All credited artists joined with a single space.
    pub fn joined_artists(&self) -> String {
        self.artists.join(" ")
    }

    pub fn display_artists(&self) -> String {
        if self.artists.is_empty() {
            return "Unknown".to_string();
        }
        self.artists.join(", ")
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// A song returned by a destination-catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSong {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: f64,
    pub isrc: Option<String>,
}

impl CandidateSong {
    /// Rebuilds a candidate for a cached destination song id.
    ///
    /// The export cache only keeps the destination id, so the remaining
    /// metadata is borrowed from the source track it was matched to.
    pub fn from_cached(song_id: &str, track: &SourceTrack) -> Self {
        Self {
            id: song_id.to_string(),
            title: track.title.clone(),
            artist: track.primary_artist().to_string(),
            album: track.album.clone(),
            duration_seconds: track.duration_ms as f64 / 1000.0,
            isrc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePlaylist {
    pub id: String,
    pub name: String,
    pub track_count: u32,
    pub snapshot_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationPlaylist {
    pub id: String,
    pub name: String,
    pub song_count: u32,
    pub descriptor: Option<ExportDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Isrc,
    Fuzzy,
    Strict,
    None,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchStrategy::Isrc => "isrc",
            MatchStrategy::Fuzzy => "fuzzy",
            MatchStrategy::Strict => "strict",
            MatchStrategy::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Ambiguous,
    Unmatched,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Ambiguous => "ambiguous",
            MatchStatus::Unmatched => "unmatched",
        };
        f.write_str(name)
    }
}

/// Outcome of resolving one source track against the destination catalog.
///
/// `candidate_song` may be present on an unmatched track as a best-effort
/// hint; `status` alone decides whether exporters use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub source_track: SourceTrack,
    pub candidate_song: Option<CandidateSong>,
    pub match_strategy: MatchStrategy,
    pub match_score: f64,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateSong>,
}

impl TrackMatch {
    pub fn unmatched(source_track: SourceTrack) -> Self {
        Self {
            source_track,
            candidate_song: None,
            match_strategy: MatchStrategy::None,
            match_score: 0.0,
            status: MatchStatus::Unmatched,
            candidates: Vec::new(),
        }
    }

    pub fn matched(
        source_track: SourceTrack,
        song: CandidateSong,
        strategy: MatchStrategy,
        score: f64,
    ) -> Self {
        Self {
            source_track,
            candidate_song: Some(song),
            match_strategy: strategy,
            match_score: score,
            status: MatchStatus::Matched,
            candidates: Vec::new(),
        }
    }

    /// True when the match is confident and carries a destination song.
    pub fn is_exportable(&self) -> bool {
        self.status == MatchStatus::Matched && self.candidate_song.is_some()
    }

    pub fn destination_song_id(&self) -> Option<&str> {
        self.candidate_song.as_ref().map(|s| s.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCounts {
    pub isrc: usize,
    pub fuzzy: usize,
    pub strict: usize,
    pub none: usize,
}

impl StrategyCounts {
    fn bump(&mut self, strategy: MatchStrategy) {
        match strategy {
            MatchStrategy::Isrc => self.isrc += 1,
            MatchStrategy::Fuzzy => self.fuzzy += 1,
            MatchStrategy::Strict => self.strict += 1,
            MatchStrategy::None => self.none += 1,
        }
    }
}

/// Match-layer statistics. `total == matched + ambiguous + unmatched`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub total: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub by_strategy: StrategyCounts,
}

impl MatchStatistics {
    pub fn from_matches(matches: &[TrackMatch]) -> Self {
        let mut stats = Self::default();
        for m in matches {
            stats.record(m);
        }
        stats
    }

    pub fn record(&mut self, m: &TrackMatch) {
        self.total += 1;
        match m.status {
            MatchStatus::Matched => {
                self.matched += 1;
                self.by_strategy.bump(m.match_strategy);
            }
            MatchStatus::Ambiguous => self.ambiguous += 1,
            MatchStatus::Unmatched => self.unmatched += 1,
        }
    }
}

pub fn ambiguous_matches(matches: &[TrackMatch]) -> Vec<&TrackMatch> {
    matches
        .iter()
        .filter(|m| m.status == MatchStatus::Ambiguous)
        .collect()
}

/// Source tracks that did not resolve to a confident match.
pub fn unmatched_tracks(matches: &[TrackMatch]) -> Vec<&SourceTrack> {
    matches
        .iter()
        .filter(|m| m.status != MatchStatus::Matched)
        .map(|m| &m.source_track)
        .collect()
}

pub fn matched_songs(matches: &[TrackMatch]) -> Vec<(&SourceTrack, &CandidateSong, MatchStrategy)> {
    matches
        .iter()
        .filter(|m| m.status == MatchStatus::Matched)
        .filter_map(|m| {
            m.candidate_song
                .as_ref()
                .map(|song| (&m.source_track, song, m.match_strategy))
        })
        .collect()
}

#[derive(Tabled)]
pub struct PlaylistTableRow {
    pub id: String,
    pub name: String,
    pub tracks: u32,
    pub status: String,
    pub exported_at: String,
}

#[derive(Tabled)]
pub struct UnmatchedTableRow {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: String,
    pub status: String,
}

#[derive(Tabled)]
pub struct CacheTableRow {
    pub playlist: String,
    pub snapshot: String,
    pub destination: String,
    pub total: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub exported_at: String,
}
