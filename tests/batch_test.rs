mod common;

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use common::{FakeDestination, song, track};
use navispot::{
    error::ExportError,
    export::TrackExportStatus,
    matching::{BatchMatcher, BatchProgress, MatchingOptions, TrackMatcher, carried_match},
    types::{MatchStatus, MatchStrategy, SourceTrack},
};
use tokio_util::sync::CancellationToken;

fn catalog() -> Arc<FakeDestination> {
    Arc::new(FakeDestination::with_songs(vec![
        song("sa", "Alpha", "Artist A", 200.0),
        song("sb", "Bravo", "Artist B", 210.0),
        song("sc", "Charlie", "Artist C", 220.0),
        song("sd", "Delta", "Artist D", 230.0),
        song("se", "Echo", "Artist E", 240.0),
    ]))
}

fn tracks() -> Vec<SourceTrack> {
    vec![
        track("a", "Alpha", "Artist A", 200_000),
        track("b", "Bravo", "Artist B", 210_000),
        track("c", "Charlie", "Artist C", 220_000),
        track("d", "Delta", "Artist D", 230_000),
        track("e", "Echo", "Artist E", 240_000),
    ]
}

fn batch(destination: &Arc<FakeDestination>, concurrency: usize) -> BatchMatcher<FakeDestination> {
    let matcher = TrackMatcher::new(Arc::clone(destination), MatchingOptions::default());
    BatchMatcher::new(matcher, concurrency)
}

fn cached(id: &str, song_id: &str) -> TrackExportStatus {
    TrackExportStatus {
        source_track_id: id.to_string(),
        destination_song_id: Some(song_id.to_string()),
        status: MatchStatus::Matched,
        match_strategy: MatchStrategy::Isrc,
        match_score: 1.0,
        matched_at: Utc::now(),
        pending: false,
    }
}

fn ids<'a>(matches: impl IntoIterator<Item = &'a navispot::types::TrackMatch>) -> Vec<String> {
    matches
        .into_iter()
        .map(|m| m.source_track.id.clone())
        .collect()
}

#[test]
fn test_concurrency_is_at_least_one() {
    let destination = catalog();
    assert_eq!(batch(&destination, 0).concurrency(), 1);
    assert_eq!(batch(&destination, 4).concurrency(), 4);
}

#[tokio::test]
async fn test_sequential_match_reports_every_track() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut events: Vec<BatchProgress> = Vec::new();

    let matches = batch(&destination, 1)
        .match_tracks(&tracks(), &cancel, |p| events.push(p))
        .await
        .unwrap();

    assert_eq!(ids(&matches), vec!["a", "b", "c", "d", "e"]);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Matched));

    assert_eq!(events.len(), 5);
    assert_eq!(events[0].current, 1);
    assert_eq!(events[0].current_track.as_ref().unwrap().id, "a");
    assert_eq!(events[0].current_match.as_ref().unwrap().destination_song_id(), Some("sa"));

    let last = events.last().unwrap();
    assert_eq!(last.current, 5);
    assert_eq!(last.total, 5);
    assert_eq!(last.percent, 100);
    assert_eq!(last.matched, 5);
    assert_eq!(last.unmatched, 0);
}

#[tokio::test]
async fn test_chunked_match_keeps_order_and_reports_per_chunk() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut events: Vec<BatchProgress> = Vec::new();

    let matches = batch(&destination, 2)
        .match_tracks(&tracks(), &cancel, |p| events.push(p))
        .await
        .unwrap();

    assert_eq!(ids(&matches), vec!["a", "b", "c", "d", "e"]);

    // Chunks of 2, 2 and 1
    let progress: Vec<usize> = events.iter().map(|p| p.current).collect();
    assert_eq!(progress, vec![2, 4, 5]);
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
}

#[tokio::test]
async fn test_empty_input() {
    let destination = catalog();
    let cancel = CancellationToken::new();

    let matches = batch(&destination, 1)
        .match_tracks(&[], &cancel, |_| {})
        .await
        .unwrap();
    assert!(matches.is_empty());
    assert_eq!(destination.lookups(), 0);
}

#[tokio::test]
async fn test_differential_skips_cached_tracks() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut cache = BTreeMap::new();
    cache.insert("a".to_string(), cached("a", "sa"));
    cache.insert("c".to_string(), cached("c", "sc"));

    let input: Vec<SourceTrack> = tracks().into_iter().take(3).collect();
    let mut new_matches = Vec::new();
    let mut events: Vec<BatchProgress> = Vec::new();

    let result = batch(&destination, 1)
        .match_differential(&input, &cache, &mut new_matches, &cancel, |p| events.push(p))
        .await
        .unwrap();

    // Only the uncached track reached the destination
    assert_eq!(*destination.artist_lookups.lock().unwrap(), vec!["Artist B"]);
    assert!(destination.title_lookups.lock().unwrap().is_empty());

    assert_eq!(ids(&result.matches), vec!["a", "b", "c"]);
    assert_eq!(ids(&result.new_matches), vec!["b"]);
    assert_eq!(ids(&new_matches), vec!["b"]);
    assert_eq!(result.carried_over, 2);
    assert_eq!(result.statistics.total, 3);
    assert_eq!(result.statistics.matched, 3);

    // Carried matches come straight from the cache
    assert_eq!(result.matches[0].match_strategy, MatchStrategy::Isrc);
    assert_eq!(result.matches[0].destination_song_id(), Some("sa"));

    // The first event already accounts for the carried tracks
    let first = events.first().unwrap();
    assert_eq!(first.current, 2);
    assert_eq!(first.matched, 2);
    assert_eq!(first.unmatched, 0);
    assert_eq!(events.last().unwrap().current, 3);
    assert_eq!(events.last().unwrap().percent, 100);
    assert!(events.iter().all(|e| e.matched + e.unmatched == e.current));
}

#[tokio::test]
async fn test_differential_counts_carried_outcomes() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut cache = BTreeMap::new();
    cache.insert("a".to_string(), cached("a", "sa"));
    cache.insert(
        "b".to_string(),
        TrackExportStatus {
            destination_song_id: None,
            status: MatchStatus::Ambiguous,
            ..cached("b", "unused")
        },
    );

    let input: Vec<SourceTrack> = tracks().into_iter().take(3).collect();
    let mut events: Vec<BatchProgress> = Vec::new();
    batch(&destination, 1)
        .match_differential(&input, &cache, &mut Vec::new(), &cancel, |p| events.push(p))
        .await
        .unwrap();

    // Anything short of a confident match counts as unmatched
    let first = events.first().unwrap();
    assert_eq!((first.current, first.matched, first.unmatched), (2, 1, 1));

    let last = events.last().unwrap();
    assert_eq!(last.current, 3);
    assert_eq!(last.matched + last.unmatched, 3);
}

#[tokio::test]
async fn test_differential_with_everything_cached() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let cache: BTreeMap<String, TrackExportStatus> = tracks()
        .iter()
        .map(|t| (t.id.clone(), cached(&t.id, &format!("s{}", t.id))))
        .collect();
    let mut new_matches = Vec::new();

    let result = batch(&destination, 3)
        .match_differential(&tracks(), &cache, &mut new_matches, &cancel, |_| {})
        .await
        .unwrap();

    assert_eq!(destination.lookups(), 0);
    assert_eq!(result.matches.len(), 5);
    assert!(result.new_matches.is_empty());
}

#[test]
fn test_carried_match_without_song() {
    let source = track("x", "Song", "Band", 100_000);
    let status = TrackExportStatus {
        destination_song_id: None,
        status: MatchStatus::Ambiguous,
        match_strategy: MatchStrategy::Fuzzy,
        match_score: 0.9,
        ..cached("x", "unused")
    };

    let m = carried_match(&source, &status);
    assert_eq!(m.status, MatchStatus::Ambiguous);
    assert!(m.candidate_song.is_none());
    assert_eq!(m.match_score, 0.9);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut out = Vec::new();

    let result = batch(&destination, 1)
        .match_into(&tracks(), &mut out, &cancel, |_| {})
        .await;

    assert!(matches!(result, Err(ExportError::Cancelled)));
    assert!(out.is_empty());
    assert_eq!(destination.lookups(), 0);
}

#[tokio::test]
async fn test_cancelled_mid_batch_keeps_finished_tracks() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut out = Vec::new();

    let result = batch(&destination, 1)
        .match_into(&tracks(), &mut out, &cancel, |p| {
            if p.current == 2 {
                cancel.cancel();
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ids(&out), vec!["a", "b"]);
    assert_eq!(destination.artist_lookups.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancelled_between_chunks() {
    let destination = catalog();
    let cancel = CancellationToken::new();
    let mut new_matches = Vec::new();

    let result = batch(&destination, 2)
        .match_differential(&tracks(), &BTreeMap::new(), &mut new_matches, &cancel, |p| {
            if p.current >= 2 {
                cancel.cancel();
            }
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(ids(&new_matches), vec!["a", "b"]);
}
