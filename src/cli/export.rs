use std::sync::Arc;

use indicatif::ProgressBar;
use tabled::Table;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::SourceCatalog,
    config, error,
    export::{
        ExportMode, ExportOptions, ExportPipeline, PipelineEvent,
        playlist::ExportPhase,
    },
    info,
    management::FileExportCache,
    matching::MatchingOptions,
    navidrome::NavidromeClient,
    spotify::SpotifyClient,
    success,
    types::{SourcePlaylist, TrackMatch, UnmatchedTableRow},
    utils, warning,
};

type Pipeline = ExportPipeline<SpotifyClient, NavidromeClient, FileExportCache>;

/// Flags of the `export` command.
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub playlist_ids: Vec<String>,
    pub all: bool,
    pub liked: bool,
    pub force: bool,
    pub mode: Option<ExportMode>,
    pub target: Option<String>,
    pub concurrency: Option<usize>,
    pub threshold: Option<f64>,
    pub skip_unmatched: bool,
    pub no_isrc: bool,
    pub no_fuzzy: bool,
    pub no_strict: bool,
}

pub async fn export(args: ExportArgs) {
    if args.playlist_ids.is_empty() && !args.all && !args.liked {
        error!("Nothing to export. Pass playlist ids, --all or --liked.");
    }
    if args.target.is_some() && (args.all || args.playlist_ids.len() > 1) {
        error!("--target can only be used when exporting a single playlist.");
    }

    let matching = match matching_options(&args) {
        Ok(options) => options,
        Err(e) => error!("Invalid matching configuration. Err: {}", e),
    };
    let concurrency = match args.concurrency {
        Some(n) => n.max(1),
        None => config::match_concurrency().unwrap_or_else(|e| {
            warning!("{}, matching sequentially", e);
            config::DEFAULT_MATCH_CONCURRENCY
        }),
    };

    let source = match SpotifyClient::from_env().await {
        Ok(client) => Arc::new(client),
        Err(e) => error!("Cannot set up Spotify client. Err: {}", e),
    };
    let destination = match NavidromeClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => error!("Cannot set up Navidrome client. Err: {}", e),
    };
    if let Err(e) = destination.login().await {
        error!("Cannot log in to Navidrome. Err: {}", e);
    }

    let playlists = if args.all || !args.playlist_ids.is_empty() {
        select_playlists(source.as_ref(), &args).await
    } else {
        Vec::new()
    };

    let pipeline = ExportPipeline::new(
        Arc::clone(&source),
        destination,
        Arc::new(FileExportCache::new()),
        matching,
        concurrency,
    );
    let options = ExportOptions {
        mode: args.mode,
        target_playlist_id: args.target.clone(),
        force: args.force,
        skip_unmatched: args.skip_unmatched,
    };

    let cancel = CancellationToken::new();
    let handler = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handler.cancel();
        }
    });

    for playlist in &playlists {
        if cancel.is_cancelled() {
            break;
        }
        export_playlist(&pipeline, playlist, &options, &cancel).await;
    }

    if args.liked && !cancel.is_cancelled() {
        export_liked_songs(&pipeline, &options, &cancel).await;
    }

    if cancel.is_cancelled() {
        warning!("Export cancelled. Matched tracks were kept for the next run.");
    }
}

fn matching_options(args: &ExportArgs) -> Result<MatchingOptions, crate::error::ConfigError> {
    let mut options = MatchingOptions::from_env()?;
    if let Some(threshold) = args.threshold {
        options.fuzzy_threshold = threshold.clamp(0.0, 1.0);
    }
    options.enable_isrc &= !args.no_isrc;
    options.enable_fuzzy &= !args.no_fuzzy;
    options.enable_strict &= !args.no_strict;
    Ok(options)
}

async fn select_playlists(source: &SpotifyClient, args: &ExportArgs) -> Vec<SourcePlaylist> {
    let pb = utils::spinner("Fetching Spotify playlists...");
    let mut playlists = match source.list_playlists().await {
        Ok(playlists) => playlists,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch playlists: {}", e);
        }
    };
    pb.finish_and_clear();

    if args.all {
        utils::filter_playlists(&mut playlists, None);
        return playlists;
    }

    let mut selected = Vec::new();
    for id in &args.playlist_ids {
        match playlists.iter().position(|p| &p.id == id) {
            Some(index) => selected.push(playlists.swap_remove(index)),
            None => warning!("Playlist {} not found in your library", id),
        }
    }
    selected
}

async fn export_playlist(
    pipeline: &Pipeline,
    playlist: &SourcePlaylist,
    options: &ExportOptions,
    cancel: &CancellationToken,
) {
    let pb = utils::progress_bar(u64::from(playlist.track_count), utils::truncate(&playlist.name, 30));
    let result = pipeline
        .export_playlist(playlist, options, cancel, |event| render_event(&pb, event))
        .await;
    pb.finish_and_clear();

    match result {
        Ok(outcome) if outcome.up_to_date => {
            info!("{} is up to date", playlist.name);
        }
        Ok(outcome) => {
            let stats = &outcome.statistics;
            if outcome.cross_referenced {
                info!("Found an earlier export of {} on Navidrome", playlist.name);
            }
            if outcome.export.success {
                success!(
                    "{}: {} exported ({}), {} matched, {} ambiguous, {} unmatched",
                    playlist.name,
                    outcome.export.statistics.exported,
                    outcome.export.mode,
                    stats.matched,
                    stats.ambiguous,
                    stats.unmatched
                );
            } else {
                for entry in outcome.export.errors.iter().filter(|e| e.artist_name.is_empty()) {
                    warning!("{}: {}", entry.track_name, entry.reason);
                }
                warning!("{}: export failed, matches were kept", playlist.name);
            }
            print_unmatched(&outcome.matches);
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => warning!("Failed to export {}: {}", playlist.name, e),
    }
}

async fn export_liked_songs(pipeline: &Pipeline, options: &ExportOptions, cancel: &CancellationToken) {
    let pb = utils::progress_bar(0, "Liked Songs");
    let result = pipeline
        .export_liked_songs(options, cancel, |event| render_event(&pb, event))
        .await;
    pb.finish_and_clear();

    match result {
        Ok(outcome) if outcome.up_to_date => info!("Liked Songs are up to date"),
        Ok(outcome) => {
            let stats = &outcome.export.statistics;
            success!(
                "Liked Songs: {} starred, {} failed, {} skipped, {} unstarred",
                stats.starred,
                stats.failed,
                stats.skipped,
                outcome.unstarred
            );
            print_unmatched(&outcome.matches);
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => warning!("Failed to export Liked Songs: {}", e),
    }
}

fn render_event(pb: &ProgressBar, event: PipelineEvent) {
    match event {
        PipelineEvent::FetchingTracks { .. } => pb.set_message("fetching tracks"),
        PipelineEvent::TracksFetched { count } => {
            pb.set_length(count as u64);
            pb.set_message("matching");
        }
        PipelineEvent::UpToDate => pb.set_message("up to date"),
        PipelineEvent::Matching(progress) => {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.current as u64);
            if let Some(track) = progress.current_track {
                pb.set_message(utils::truncate(&track.title, 30));
            }
        }
        PipelineEvent::Exporting(progress) => {
            if progress.phase == ExportPhase::Preparing {
                pb.set_position(pb.length().unwrap_or_default());
            }
            pb.set_message(utils::truncate(&progress.message, 40));
        }
        PipelineEvent::Persisted { .. } => pb.set_message("saved"),
    }
}

fn print_unmatched(matches: &[TrackMatch]) {
    let table_rows: Vec<UnmatchedTableRow> = matches
        .iter()
        .filter(|m| !m.is_exportable())
        .map(|m| UnmatchedTableRow {
            title: utils::truncate(&m.source_track.title, 40),
            artist: utils::truncate(&m.source_track.display_artists(), 30),
            album: utils::truncate(&m.source_track.album, 30),
            duration: utils::format_duration(m.source_track.duration_ms),
            status: m.status.to_string(),
        })
        .collect();

    if table_rows.is_empty() {
        return;
    }

    let table = Table::new(table_rows);
    println!("{}", table);
}
