mod common;

use common::{song, track};
use navispot::matching::similarity::*;

const SAMPLES: &[&str] = &[
    "",
    "Song",
    "Song (Live)",
    "Beyoncé",
    "Artist A feat. Artist B",
    "Don't Stop Me Now - Remastered 2011",
    "   spaced    out   ",
];

#[test]
fn test_normalize() {
    assert_eq!(normalize("Beyoncé!"), "beyonce");
    assert_eq!(normalize("  Hello,   World  "), "hello world");
    assert_eq!(normalize("Sigur Rós"), "sigur ros");
    assert_eq!(normalize("..."), "");
}

#[test]
fn test_string_similarity_identity_and_symmetry() {
    for a in SAMPLES {
        assert_eq!(string_similarity(a, a), 1.0, "identity failed for {a:?}");
        for b in SAMPLES {
            assert_eq!(
                string_similarity(a, b),
                string_similarity(b, a),
                "symmetry failed for {a:?} / {b:?}"
            );
        }
    }
}

#[test]
fn test_string_similarity_values() {
    // Both normalize to empty
    assert_eq!(string_similarity("!!", "??"), 1.0);

    // One edit over four characters
    assert_eq!(string_similarity("abcd", "abce"), 0.75);

    // Case and punctuation do not matter
    assert_eq!(string_similarity("Hello, World", "hello world"), 1.0);

    let score = string_similarity("completely", "different");
    assert!((0.0..1.0).contains(&score));
}

#[test]
fn test_strip_title_suffix() {
    assert_eq!(strip_title_suffix("Song (Live)"), "Song");
    assert_eq!(strip_title_suffix("Song [Remix]"), "Song");
    assert_eq!(strip_title_suffix("Song - Remastered 2011"), "Song");
    assert_eq!(strip_title_suffix("Song A / Song B"), "Song A");
    assert_eq!(strip_title_suffix("Song ~ Acoustic"), "Song");

    // Hyphenated words are not a suffix
    assert_eq!(strip_title_suffix("Jay-Z Anthem"), "Jay-Z Anthem");

    // An annotation at the start keeps the whole title
    assert_eq!(
        strip_title_suffix("(I Can't Get No) Satisfaction"),
        "(I Can't Get No) Satisfaction"
    );
}

#[test]
fn test_title_similarity_ignores_annotations() {
    assert_eq!(title_similarity("Song (Live)", "Song"), 1.0);
    assert_eq!(title_similarity("Song - Remastered 2011", "Song"), 1.0);
    assert_eq!(title_similarity("Live Song", "Song"), 1.0);
    assert!(title_similarity("Song", "Other Song Entirely") < 1.0);
}

#[test]
fn test_artist_similarity_ignores_collaborations() {
    assert_eq!(artist_similarity("Artist A feat. Artist B", "Artist A"), 1.0);
    assert_eq!(artist_similarity("Artist A & Artist B", "Artist A"), 1.0);
    assert_eq!(artist_similarity("Artist A x Artist B", "Artist A"), 1.0);
    assert_eq!(artist_similarity("Artist A vs. Artist B", "Artist A"), 1.0);

    // A leading marker is dropped but the name survives
    assert_eq!(normalize_artist("DJ Shadow"), "shadow");
}

#[test]
fn test_album_similarity() {
    assert_eq!(album_similarity("Greatest Hits", "Greatest Hits"), 1.0);
    assert_eq!(album_similarity("Movie (Original Soundtrack)", "Movie"), 1.0);
    assert_eq!(album_similarity("Album Vol. 2", "Album 2"), 1.0);

    // One shared token out of two, scaled by 0.8
    let score = album_similarity("Greatest Hits", "Hits Live");
    assert!((score - 0.4).abs() < 1e-9);

    assert_eq!(album_similarity("Something", ""), 0.0);
}

#[test]
fn test_duration_similarity_window() {
    assert_eq!(duration_similarity(180_000, 180.0), 1.0);

    let score = duration_similarity(181_500, 180.0);
    assert!((score - 0.95).abs() < 1e-9);

    assert!(duration_similarity(182_999, 180.0) >= 0.9);
    assert!(duration_similarity(183_000, 180.0) <= 0.9);
    assert_eq!(duration_similarity(240_000, 180.0), 0.0);
    assert_eq!(duration_similarity(400_000, 180.0), 0.0);
}

#[test]
fn test_duration_similarity_is_non_increasing() {
    let mut previous = f64::MAX;
    for diff_ms in (0..=70_000u64).step_by(250) {
        let score = duration_similarity(100_000 + diff_ms, 100.0);
        assert!(
            score <= previous,
            "score rose at a difference of {diff_ms}ms"
        );
        assert!((0.0..=1.0).contains(&score));
        previous = score;
    }
}

#[test]
fn test_track_similarity_exact_title() {
    let mut source = track("t1", "Song (Live)", "Band", 180_000);
    source.album = "Record".to_string();
    let candidate = song("s1", "Song", "Band", 180.0);
    assert!(track_similarity(&source, &candidate) >= 0.85);

    // Exact title with an unrelated artist is floored lower
    let mut stranger = song("s2", "Song", "Qwxyz", 180.0);
    stranger.album = "Other".to_string();
    let score = track_similarity(&source, &stranger);
    assert!(score >= 0.75 && score < 0.85, "unexpected score {score}");
}

#[test]
fn test_track_similarity_bonuses_are_capped() {
    let mut source = track("t1", "Night Drive", "Band", 200_000);
    source.album = "Night Drive".to_string();
    let mut candidate = song("s1", "Night Drives", "Band", 200.0);
    candidate.album = "Night Drive".to_string();

    let scores = score_track(&source, &candidate);
    assert!(scores.title < 1.0);
    assert!(scores.total <= 0.95);
    assert!(scores.total > 0.8);
}

#[test]
fn test_track_similarity_uses_primary_artist() {
    let mut source = track("t1", "Anthem", "Artist A", 210_000);
    source.artists.push("Artist B".to_string());
    let candidate = song("s1", "Anthem", "Artist A", 210.0);

    let scores = score_track(&source, &candidate);
    assert_eq!(scores.artist, 1.0);
}
