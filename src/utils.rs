use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{export::ExportMode, types::SourcePlaylist};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS),
    );
    pb
}

pub fn progress_bar(len: u64, prefix: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_prefix(prefix.into());
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:30.blue/white}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb
}

/// Formats milliseconds as `m:ss`.
pub fn format_duration(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Shortens `text` to at most `max` characters, ending in `…` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Keeps the playlists whose name contains `search` (case-insensitive) and
/// sorts them by name.
pub fn filter_playlists(playlists: &mut Vec<SourcePlaylist>, search: Option<&str>) {
    if let Some(search) = search {
        let search_term = search.to_lowercase();
        playlists.retain(|p| p.name.to_lowercase().contains(&search_term));
    }
    playlists.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
}

/// Parses the `--mode` flag. Update mode is picked automatically from the
/// export cache and is not accepted here.
pub fn parse_export_mode(s: &str) -> Result<ExportMode, String> {
    match s.trim().to_lowercase().as_str() {
        "create" => Ok(ExportMode::Create),
        "append" => Ok(ExportMode::Append),
        "overwrite" => Ok(ExportMode::Overwrite),
        other => Err(format!(
            "Invalid export mode: {other}. Expected one of: create, append, overwrite"
        )),
    }
}
