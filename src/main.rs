use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use navispot::{cli, config, error, export::ExportMode, utils};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List Spotify playlists and their export status
    Playlists(PlaylistsOptions),

    /// Match and export playlists to Navidrome
    Export(ExportOptions),

    /// Show or clear the local export cache
    Cache(CacheOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistsOptions {
    /// Only show playlists whose name contains this text
    #[clap(long)]
    pub search: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ExportOptions {
    /// Spotify playlist ids to export
    pub ids: Vec<String>,

    /// Export every playlist in the library
    #[clap(long)]
    pub all: bool,

    /// Export liked songs as Navidrome favorites
    #[clap(long)]
    pub liked: bool,

    /// Re-match every track even when nothing changed
    #[clap(long)]
    pub force: bool,

    /// Export mode (create, append, overwrite); picked automatically when omitted
    #[clap(long, value_parser = utils::parse_export_mode)]
    pub mode: Option<ExportMode>,

    /// Existing Navidrome playlist for append or overwrite
    #[clap(long)]
    pub target: Option<String>,

    /// Number of tracks matched in parallel
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Minimum fuzzy score between 0 and 1
    #[clap(long)]
    pub threshold: Option<f64>,

    /// Do not report unmatched tracks as failures
    #[clap(long)]
    pub skip_unmatched: bool,

    /// Disable ISRC matching
    #[clap(long)]
    pub no_isrc: bool,

    /// Disable fuzzy matching
    #[clap(long)]
    pub no_fuzzy: bool,

    /// Disable strict matching
    #[clap(long)]
    pub no_strict: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    /// Remove the export record of this source playlist id
    #[clap(long)]
    pub clear: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("NAVISPOT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Playlists(opt) => cli::list_playlists(opt.search).await,
        Command::Export(opt) => {
            cli::export(cli::ExportArgs {
                playlist_ids: opt.ids,
                all: opt.all,
                liked: opt.liked,
                force: opt.force,
                mode: opt.mode,
                target: opt.target,
                concurrency: opt.concurrency,
                threshold: opt.threshold,
                skip_unmatched: opt.skip_unmatched,
                no_isrc: opt.no_isrc,
                no_fuzzy: opt.no_fuzzy,
                no_strict: opt.no_strict,
            })
            .await
        }
        Command::Cache(opt) => match opt.clear {
            Some(id) => cli::clear_cache(&id).await,
            None => cli::list_cache().await,
        },
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
