use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use takeout_reconcile::archive::FsArchive;
use takeout_reconcile::exif::NoExif;
use takeout_reconcile::resolve::{CancelToken, resolve};
use takeout_reconcile::types::AssetRecord;
use takeout_reconcile::{config, output};

#[derive(Parser)]
#[command(name = "takeout-reconcile")]
#[command(about = "Reconcile a Google Photos takeout into one record per asset")]
#[command(long_about = "\
Reconcile a Google Photos takeout into one record per asset

Takeout archives scatter each photo across album folders and year buckets,
truncate file names, and split metadata into JSON sidecars whose names no
longer match the media. This tool walks an extracted takeout, pairs every
sidecar with its media, merges the copies, and prints one record per asset.

Archive layout:

  Takeout/Google Photos/
  ├── Photos from 2023/              # Year bucket (never an album)
  │   ├── IMG_0170.HEIC
  │   ├── IMG_0170.HEIC.json         # Sidecar: title, capture time, geo
  │   └── IMG_0170.MP4               # Live-photo video, attached as companion
  └── Belize/                        # Album
      ├── metadata.json              # Album definition
      ├── IMG_0170.HEIC              # Same photo, merged with the year copy
      └── IMG_0170.HEIC.json

Capture time (first available wins, see dates.method):
  sidecar photoTakenTime → file name stamp → EXIF

Run 'takeout-reconcile gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (TOML). Stock defaults apply to anything it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that run a resolution.
#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Root of the extracted takeout
    root: PathBuf,

    /// Issues listed in the summary before eliding the rest
    #[arg(long, default_value_t = 20)]
    max_issues: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the archive and print one record per asset
    Scan {
        #[command(flatten)]
        run: RunArgs,

        /// Print records as JSON lines instead of text
        #[arg(long)]
        json: bool,

        /// Also emit media that has no sidecar
        #[arg(long)]
        force_upload_without_sidecar: bool,
    },
    /// Resolve the archive and print only the summary
    Check(RunArgs),
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Scan {
            run,
            json,
            force_upload_without_sidecar,
        } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            if force_upload_without_sidecar {
                config.upload.force_without_sidecar = true;
            }
            init_thread_pool(&config.processing);

            let (records, report) = run_resolution(&run.root, &config)?;
            if json {
                for record in &records {
                    println!("{}", serde_json::to_string(record)?);
                }
                for line in output::format_summary(&report, run.max_issues) {
                    eprintln!("{}", line);
                }
            } else {
                output::print_records(&records);
                println!();
                output::print_summary(&report, run.max_issues);
            }
        }
        Command::Check(run) => {
            let config = config::load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);

            println!("==> Checking {}", run.root.display());
            let (records, report) = run_resolution(&run.root, &config)?;
            output::print_summary(&report, run.max_issues);
            let issues = report.issues().len();
            if issues == 0 {
                println!("==> {} assets, archive is consistent", records.len());
            } else {
                println!("==> {} assets, {} issues", records.len(), issues);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Resolve the takeout at `root` to completion.
fn run_resolution(
    root: &Path,
    config: &config::ResolverConfig,
) -> Result<(Vec<AssetRecord>, takeout_reconcile::report::Report), Box<dyn std::error::Error>> {
    let archive = FsArchive::new(root);
    let mut resolution = resolve(&archive, &NoExif, config, CancelToken::new())?;
    let records = resolution
        .by_ref()
        .collect::<Result<Vec<_>, _>>()?;
    Ok((records, resolution.into_report()))
}

/// Log to stderr at a level picked by `-v`/`-q`. `RUST_LOG` overrides.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
