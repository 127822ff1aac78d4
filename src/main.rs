use clap::{ArgAction, Parser, Subcommand};
use fotos::imaging::RustBackend;
use fotos::photo::PhotoContext;
use fotos::store::{AlbumSink, SqliteStore};
use fotos::types::AlbumNode;
use fotos::{album, config, import, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "fotos")]
#[command(about = "Build web albums next to your photo folders")]
#[command(long_about = "\
Build web albums next to your photo folders

Every folder gets an album directory holding scaled copies of its selected
photos, their thumbnails, and a JSON snapshot of the folder tree:

  2021/summer/
  ├── IMG_0001.jpg               # source, never rewritten except its rating
  └── album/
      ├── IMG_0001.jpg           # scaled to the album height, or a symlink
      ├── thumbs/IMG_0001.jpg    # thumbnail
      └── album.json             # snapshot, read back by 'fotos import'

A photo is selected when its rating is at least 1 or it is marked as a
favorite. Rebuilding reuses existing album images and regenerates thumbnails;
--force wipes album directories fotos created itself.

Run 'fotos gen-config' to print a documented fotos.toml.")]
#[command(version)]
struct Cli {
    /// Config file; stock defaults are used when it does not exist
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a folder tree, produce derivatives and snapshots
    Build {
        /// Folder, relative to one of the configured paths
        path: PathBuf,
        /// Wipe managed album directories and regenerate everything
        #[arg(long)]
        force: bool,
        /// Store the finished tree in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Load a previously built tree from its snapshot
    Import {
        /// Folder, relative to one of the configured paths
        path: PathBuf,
        /// Store the imported tree in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print a stock fotos.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Build { path, force, db } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::new();
            let ctx = PhotoContext::new(&config, &backend);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = album::build(&ctx, &path, force, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;
            let node = result?;

            store(&node, db.as_deref())?;
            println!("{}", output::format_summary(&node, db.as_deref()));
        }
        Command::Import { path, db } => {
            let config = config::load_config(&cli.config)?;
            let node = import::import_album(&config, &path)?;
            output::print_album_tree(&node);

            store(&node, db.as_deref())?;
            println!("{}", output::format_summary(&node, db.as_deref()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, leaving stdout to progress output. `RUST_LOG` still
/// applies; `-v` raises the level of this crate.
fn init_tracing(verbosity: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::from_default_env().add_directive(format!("fotos={}", level).parse()?);
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. User can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn store(node: &AlbumNode, db: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(db) = db {
        SqliteStore::open(db)?.create_album(node, None)?;
    }
    Ok(())
}
