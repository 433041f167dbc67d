//! Drives [`TrackMatcher`] over whole track lists.
//!
//! Both entry points check the cancellation token before every unit of
//! work (a track, or a chunk when running concurrently) and stop with
//! [`ExportError::Cancelled`]. Results computed before that point stay in
//! the caller's buffer.

use std::collections::{BTreeMap, HashMap, HashSet};

use tokio_util::sync::CancellationToken;

use crate::{
    catalog::DestinationCatalog,
    error::{ExportError, Result},
    export::cache::TrackExportStatus,
    matching::orchestrator::TrackMatcher,
    types::{CandidateSong, MatchStatistics, MatchStatus, SourceTrack, TrackMatch},
};

/// Progress snapshot emitted after every unit of work.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub percent: u8,
    pub current_track: Option<SourceTrack>,
    pub current_match: Option<TrackMatch>,
    pub matched: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone)]
pub struct DifferentialMatchResult {
    /// Carried-over and fresh matches, in input order.
    pub matches: Vec<TrackMatch>,
    /// Matches computed in this run, one per new track id.
    pub new_matches: Vec<TrackMatch>,
    /// Number of input tracks answered from the cache.
    pub carried_over: usize,
    pub statistics: MatchStatistics,
}

struct Tally {
    done: usize,
    total: usize,
    matched: usize,
    unmatched: usize,
}

impl Tally {
    fn new(total: usize) -> Self {
        Self {
            done: 0,
            total,
            matched: 0,
            unmatched: 0,
        }
    }

    fn record(&mut self, m: &TrackMatch) {
        self.count(m.status);
    }

    fn count(&mut self, status: MatchStatus) {
        self.done += 1;
        if status == MatchStatus::Matched {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
    }

    fn snapshot(&self, track: Option<&SourceTrack>, last: Option<&TrackMatch>) -> BatchProgress {
        let percent = if self.total == 0 {
            100
        } else {
            (self.done * 100 / self.total).min(100) as u8
        };

        BatchProgress {
            current: self.done,
            total: self.total,
            percent,
            current_track: track.cloned(),
            current_match: last.cloned(),
            matched: self.matched,
            unmatched: self.unmatched,
        }
    }
}

/// Re-creates a match from its cached outcome without touching the
/// destination catalog.
pub fn carried_match(track: &SourceTrack, cached: &TrackExportStatus) -> TrackMatch {
    TrackMatch {
        source_track: track.clone(),
        candidate_song: cached
            .destination_song_id
            .as_deref()
            .map(|id| CandidateSong::from_cached(id, track)),
        match_strategy: cached.match_strategy,
        match_score: cached.match_score,
        status: cached.status,
        candidates: Vec::new(),
    }
}

pub struct BatchMatcher<D: ?Sized> {
    matcher: TrackMatcher<D>,
    concurrency: usize,
}

impl<D: DestinationCatalog + ?Sized + 'static> BatchMatcher<D> {
    /// `concurrency` is the chunk size; 1 (or 0) means sequential.
    pub fn new(matcher: TrackMatcher<D>, concurrency: usize) -> Self {
        Self {
            matcher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Matches every track.
    pub async fn match_tracks<F>(
        &self,
        tracks: &[SourceTrack],
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<Vec<TrackMatch>>
    where
        F: FnMut(BatchProgress),
    {
        let mut matches = Vec::with_capacity(tracks.len());
        self.match_into(tracks, &mut matches, cancel, progress).await?;
        Ok(matches)
    }

    /// Matches every track, appending to `out` as results come in so they
    /// survive a cancellation.
    pub async fn match_into<F>(
        &self,
        tracks: &[SourceTrack],
        out: &mut Vec<TrackMatch>,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(BatchProgress),
    {
        let mut tally = Tally::new(tracks.len());
        self.run(tracks, out, cancel, &mut tally, &mut progress).await
    }

    /// Matches only the tracks missing from `cached`; the rest are carried
    /// over verbatim. Fresh results are appended to `new_matches` as they
    /// come in.
    pub async fn match_differential<F>(
        &self,
        tracks: &[SourceTrack],
        cached: &BTreeMap<String, TrackExportStatus>,
        new_matches: &mut Vec<TrackMatch>,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<DifferentialMatchResult>
    where
        F: FnMut(BatchProgress),
    {
        let mut seen = HashSet::new();
        let fresh: Vec<SourceTrack> = tracks
            .iter()
            .filter(|t| !cached.contains_key(&t.id))
            .filter(|t| seen.insert(t.id.clone()))
            .cloned()
            .collect();
        let carried: Vec<&TrackExportStatus> =
            tracks.iter().filter_map(|t| cached.get(&t.id)).collect();
        let carried_over = carried.len();

        let mut tally = Tally::new(carried_over + fresh.len());
        for status in &carried {
            tally.count(status.status);
        }
        progress(tally.snapshot(None, None));

        let already = new_matches.len();
        self.run(&fresh, new_matches, cancel, &mut tally, &mut progress)
            .await?;

        let fresh_by_id: HashMap<&str, &TrackMatch> = new_matches[already..]
            .iter()
            .map(|m| (m.source_track.id.as_str(), m))
            .collect();

        let matches: Vec<TrackMatch> = tracks
            .iter()
            .filter_map(|track| match cached.get(&track.id) {
                Some(status) => Some(carried_match(track, status)),
                None => fresh_by_id.get(track.id.as_str()).map(|m| (*m).clone()),
            })
            .collect();

        Ok(DifferentialMatchResult {
            statistics: MatchStatistics::from_matches(&matches),
            new_matches: new_matches[already..].to_vec(),
            carried_over,
            matches,
        })
    }

    async fn run<F>(
        &self,
        tracks: &[SourceTrack],
        out: &mut Vec<TrackMatch>,
        cancel: &CancellationToken,
        tally: &mut Tally,
        progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(BatchProgress),
    {
        if self.concurrency == 1 {
            for track in tracks {
                if cancel.is_cancelled() {
                    return Err(ExportError::Cancelled);
                }

                let resolved = self.matcher.match_track(track).await;
                tally.record(&resolved);
                progress(tally.snapshot(Some(track), Some(&resolved)));
                out.push(resolved);
            }
            return Ok(());
        }

        for chunk in tracks.chunks(self.concurrency) {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            let handles: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|track| {
                    let matcher = self.matcher.clone();
                    tokio::spawn(async move { matcher.match_track(&track).await })
                })
                .collect();

            for (track, handle) in chunk.iter().zip(handles) {
                let resolved = match handle.await {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        tracing::warn!(track_id = %track.id, error = %err, "matching task failed");
                        TrackMatch::unmatched(track.clone())
                    }
                };
                tally.record(&resolved);
                out.push(resolved);
            }

            progress(tally.snapshot(chunk.last(), out.last()));
        }

        Ok(())
    }
}
