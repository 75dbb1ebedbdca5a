mod build_info;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use sprite_atlas::logging::{self, LogBuffer};
use sprite_atlas::{AtlasConfig, AtlasError, AtlasManager, AtlasSettings, ContentItem, FileStore, SolidRenderer};

use crate::build_info::BuildInfo;

const APP_NAME: &str = "sprite_atlas";

#[derive(Parser, Debug)]
#[command(name = "sprite_atlas", version, about = "Packs sprite frame strips into atlas pages")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Page directory, overriding `output_dir` from the settings
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Write the captured log lines to debug.log before exiting
    #[arg(long, global = true)]
    export_logs: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place every manifest item that is not placed yet
    Pack { manifest: PathBuf },
    /// Re-render or reallocate manifest items whose size changed
    Update { manifest: PathBuf },
    /// Repack all manifest items from scratch
    Rebuild { manifest: PathBuf },
    /// Print per-page usage
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Print build details
    Version,
}

#[derive(Debug, Serialize)]
struct PageStats {
    name: String,
    width: i32,
    height: i32,
    occupancy: f32,
    live: usize,
    dead_area: i64,
}

type Manager = AtlasManager<FileStore, SolidRenderer>;

fn main() -> ExitCode {
    let log_buffer = logging::setup_logger();
    logging::setup_panic_hook(APP_NAME, log_buffer.clone());

    let cli = Cli::parse();
    let export_logs = cli.export_logs;

    let result = run(cli);
    if let Err(e) = &result {
        error!("{}", e);
        eprintln!("error: {}", e);
    }

    if export_logs {
        export(&log_buffer);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn run(cli: Cli) -> Result<(), AtlasError> {
    if let Command::Version = cli.cmd {
        println!("{}", BuildInfo::detailed_info());
        return Ok(());
    }

    let settings = AtlasSettings::load(cli.settings.as_deref());
    let mut config = AtlasConfig::from_settings(&settings)?;
    if let Some(out) = cli.out {
        config.output_dir = out;
    }
    debug!("sprite_atlas {} ({})", BuildInfo::version(), BuildInfo::git_hash_short());

    let store = FileStore::new(config.output_dir.clone());
    let mut atlas: Manager = AtlasManager::open(config, store, SolidRenderer)?;

    match cli.cmd {
        Command::Pack { manifest } => {
            let items = load_manifest(&manifest)?;
            let heuristic = atlas.config().heuristic;
            let mut failed = 0;
            for item in &items {
                if let Err(e) = atlas.auto_assign(item, heuristic) {
                    error!("Could not place '{}': {}", item.name, e);
                    failed += 1;
                }
            }
            let saved = atlas.save_dirty()?;
            println!(
                "Packed {} items ({} failed) into {} pages, {} saved",
                items.len() - failed,
                failed,
                atlas.page_count(),
                saved
            );
        }
        Command::Update { manifest } => {
            let items = load_manifest(&manifest)?;
            let stale = atlas.rebuild_stale(&items)?;
            if stale > 0 {
                println!("Rebuilt {} pages packed at an old scale", stale);
            }
            let mut failed = 0;
            for item in &items {
                if let Err(e) = atlas.update_dirty(item) {
                    error!("Could not update '{}': {}", item.name, e);
                    failed += 1;
                }
            }
            let saved = atlas.save_dirty()?;
            println!("Updated {} items ({} failed), {} pages saved", items.len() - failed, failed, saved);
        }
        Command::Rebuild { manifest } => {
            let items = load_manifest(&manifest)?;
            let report = atlas.rebuild_all(&items);
            atlas.save_dirty()?;
            println!(
                "Rebuilt: {} assigned, {} failed, {} pages ({} deleted)",
                report.assigned,
                report.failed,
                report.page_count,
                report.deleted_pages.len()
            );
            for name in &report.deleted_pages {
                println!("  deleted {}", name);
            }
        }
        Command::Stats { json } => print_stats(&atlas, json)?,
        Command::Version => {}
    }

    Ok(())
}

/// Read a YAML list of content items.
fn load_manifest(path: &Path) -> Result<Vec<ContentItem>, AtlasError> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| AtlasError::Parse {
        path: path.to_path_buf(),
        line: e.location().map_or(0, |location| location.line()),
        message: e.to_string(),
    })
}

fn print_stats(atlas: &Manager, json: bool) -> Result<(), AtlasError> {
    let stats: Vec<PageStats> = atlas
        .pages()
        .map(|page| PageStats {
            name: page.name().to_string(),
            width: page.width(),
            height: page.height(),
            occupancy: page.occupancy(),
            live: page.live_count(),
            dead_area: page.dead_area(),
        })
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&stats)?;
        println!("{}", text);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No pages in {}", atlas.config().output_dir.display());
    }
    for page in &stats {
        println!(
            "{:<20} {}x{}  {:>5.1}%  {:>4} live  {:>8} px dead",
            page.name,
            page.width,
            page.height,
            page.occupancy * 100.0,
            page.live,
            page.dead_area
        );
    }
    Ok(())
}

fn export(log_buffer: &LogBuffer) {
    match logging::export_debug_logs(APP_NAME, log_buffer) {
        Ok(path) => println!("Logs written to {}", path.display()),
        Err(e) => eprintln!("Failed to export logs: {}", e),
    }
}
