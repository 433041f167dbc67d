//! Per-track resolution.
//!
//! [`TrackMatcher`] fetches the candidate set for a track once and walks it
//! through the strategies in priority order:
//!
//! ```text
//! start -> identifier-check -> fuzzy-check -> strict-check -> resolved
//! ```
//!
//! An identifier match is authoritative and short-circuits. An unambiguous
//! fuzzy match short-circuits too; an ambiguous one is remembered while
//! strict equality gets a chance to settle it. Lookup failures never escape:
//! the affected track resolves as unmatched.

use std::sync::Arc;

use crate::{
    catalog::DestinationCatalog,
    config,
    error::ConfigError,
    matching::strategies::{
        SearchMode, StrategyResult, find_candidates, match_by_fuzzy, match_by_isrc,
        match_by_strict,
    },
    types::{CandidateSong, MatchStatus, SourceTrack, TrackMatch},
};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingOptions {
    pub enable_isrc: bool,
    pub enable_fuzzy: bool,
    pub enable_strict: bool,
    pub fuzzy_threshold: f64,
    pub max_search_results: usize,
    pub search_mode: SearchMode,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            enable_isrc: true,
            enable_fuzzy: true,
            enable_strict: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            search_mode: SearchMode::default(),
        }
    }
}

impl MatchingOptions {
    /// Defaults with the threshold and search limit taken from the
    /// environment when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            fuzzy_threshold: config::fuzzy_threshold()?,
            max_search_results: config::max_search_results()?,
            ..Self::default()
        })
    }
}

enum Resolution {
    Start,
    IdentifierCheck,
    FuzzyCheck,
    StrictCheck,
    Resolved(TrackMatch),
}

pub struct TrackMatcher<D: ?Sized> {
    destination: Arc<D>,
    options: MatchingOptions,
}

impl<D: ?Sized> Clone for TrackMatcher<D> {
    fn clone(&self) -> Self {
        Self {
            destination: Arc::clone(&self.destination),
            options: self.options.clone(),
        }
    }
}

impl<D: DestinationCatalog + ?Sized> TrackMatcher<D> {
    pub fn new(destination: Arc<D>, options: MatchingOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    pub fn options(&self) -> &MatchingOptions {
        &self.options
    }

    /// Resolves one track against the destination catalog.
    pub async fn match_track(&self, track: &SourceTrack) -> TrackMatch {
        if !track.has_title() {
            tracing::warn!(track_id = %track.id, "track has no title, leaving it unmatched");
            return TrackMatch::unmatched(track.clone());
        }

        let candidates = match find_candidates(
            self.destination.as_ref(),
            track,
            self.options.search_mode,
            self.options.max_search_results,
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(
                    track_id = %track.id,
                    title = %track.title,
                    error = %err,
                    "candidate lookup failed, leaving track unmatched"
                );
                return TrackMatch::unmatched(track.clone());
            }
        };

        let resolved = self.resolve(track, &candidates);
        tracing::debug!(
            track_id = %track.id,
            candidates = candidates.len(),
            status = %resolved.status,
            strategy = %resolved.match_strategy,
            score = resolved.match_score,
            "resolved track"
        );
        resolved
    }

    /// Runs the enabled strategies over an already fetched candidate set.
    pub fn resolve(&self, track: &SourceTrack, candidates: &[CandidateSong]) -> TrackMatch {
        let mut ambiguous: Option<StrategyResult> = None;
        let mut best_effort: Option<StrategyResult> = None;
        let mut state = Resolution::Start;

        loop {
            state = match state {
                Resolution::Start => Resolution::IdentifierCheck,
                Resolution::IdentifierCheck => {
                    if !self.options.enable_isrc {
                        Resolution::FuzzyCheck
                    } else {
                        let result = match_by_isrc(track, candidates);
                        if result.is_matched() {
                            Resolution::Resolved(result.into_track_match(track.clone()))
                        } else {
                            Resolution::FuzzyCheck
                        }
                    }
                }
                Resolution::FuzzyCheck => {
                    if !self.options.enable_fuzzy {
                        Resolution::StrictCheck
                    } else {
                        let result =
                            match_by_fuzzy(track, candidates, self.options.fuzzy_threshold);
                        match result.status {
                            MatchStatus::Matched => {
                                Resolution::Resolved(result.into_track_match(track.clone()))
                            }
                            MatchStatus::Ambiguous => {
                                ambiguous = Some(result);
                                Resolution::StrictCheck
                            }
                            MatchStatus::Unmatched => {
                                if result.candidate.is_some() {
                                    best_effort = Some(result);
                                }
                                Resolution::StrictCheck
                            }
                        }
                    }
                }
                Resolution::StrictCheck => {
                    let strict = self
                        .options
                        .enable_strict
                        .then(|| match_by_strict(track, candidates))
                        .filter(StrategyResult::is_matched);

                    match strict {
                        Some(result) => Resolution::Resolved(result.into_track_match(track.clone())),
                        None => Resolution::Resolved(settle(
                            track,
                            ambiguous.take(),
                            best_effort.take(),
                        )),
                    }
                }
                Resolution::Resolved(resolved) => return resolved,
            };
        }
    }
}

/// Outcome when no strategy short-circuited.
fn settle(
    track: &SourceTrack,
    ambiguous: Option<StrategyResult>,
    best_effort: Option<StrategyResult>,
) -> TrackMatch {
    if let Some(result) = ambiguous {
        return result.into_track_match(track.clone());
    }

    match best_effort {
        Some(result) => TrackMatch {
            status: MatchStatus::Unmatched,
            ..result.into_track_match(track.clone())
        },
        None => TrackMatch::unmatched(track.clone()),
    }
}
