//! wpmigrate: move a WordPress export into a target content store

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use wpmigrate::{
    config::{init_logging, Config},
    pipeline::RunOutcome,
};

mod commands;

use commands::{
    import::{run_import, ImportArgs},
    scan::scan_export,
    status::show_status,
};

#[derive(Parser)]
#[command(name = "wpmigrate")]
#[command(about = "Migrate a WordPress WXR export into a content store")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "wpmigrate.toml")]
    config: PathBuf,

    /// Data directory (mapping cache, log, store)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an export and show what it contains
    Scan {
        /// Export file (default: the only *.xml or *.xml.bz2 in source.dir)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import an export into the target store
    Import {
        /// Export file (default: the only *.xml or *.xml.bz2 in source.dir)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Run every phase without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Archive the mapping cache and start over
        #[arg(long)]
        fresh: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Create an account per author instead of mapping all to admin
        #[arg(long)]
        create_users: bool,

        /// Publish imported content
        #[arg(long)]
        publish: bool,

        /// Skip downloading attachments
        #[arg(long)]
        no_media: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the mapping cache contents
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Override data dir if specified
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    if let Err(e) = init_logging(&config.logging, &config.data_dir, cli.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Scan { file, json } => scan_export(config, file, json),
        Commands::Import {
            file,
            dry_run,
            fresh,
            yes,
            create_users,
            publish,
            no_media,
            quiet,
        } => {
            let args = ImportArgs {
                file,
                dry_run,
                fresh,
                yes,
                create_users,
                publish,
                no_media,
                quiet,
            };
            match run_import(config, args)? {
                RunOutcome::Completed(stats) if stats.total_failed() > 0 => {
                    println!("\n{} item(s) failed; see the log for details", stats.total_failed());
                    Ok(())
                }
                RunOutcome::Completed(_) => Ok(()),
                RunOutcome::Aborted => {
                    println!("Migration cancelled.");
                    Ok(())
                }
            }
        }
        Commands::Status => show_status(config),
    }
}
