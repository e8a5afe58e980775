mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process;

use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
    output::OutputManager,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let output = OutputManager::new(args.output, !args.output.is_json());
    if let Err(e) = run(args, &output).await {
        error!("Application error: {}", e);
        match output.error(&e.to_string(), &e.kind()) {
            Ok(message) if output.format().is_json() => println!("{message}"),
            Ok(message) => eprintln!("{message}"),
            Err(_) => eprintln!("Error: {e}"),
        }
        process::exit(1);
    }
}

async fn run(args: Args, output: &OutputManager) -> Result<()> {
    match args.command {
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { show, reset, path } => {
            if path {
                let path = match args.config.as_deref() {
                    Some(p) => p.to_path_buf(),
                    None => AppConfig::default_path()?,
                };
                println!("{}", path.display());
            }
            if reset {
                let path = AppConfig::reset(args.config.as_deref())?;
                println!("Configuration reset to defaults: {}", path.display());
            } else if show {
                let config = AppConfig::load(args.config.as_deref())?;
                println!("{}", config.show()?);
            } else if !path {
                println!(
                    "Use --show to display the configuration, --reset to restore defaults or --path to locate it"
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.cache_dir {
        config.engine.cache_dir = dir;
    }
    if let Some(cookies) = args.cookies {
        config.engine.http.cookies = Some(cookies);
    }

    let executor = CommandExecutor::new(config, *output)?;

    match args.command {
        Commands::Clip {
            source_id,
            start,
            end,
            quality,
        } => executor.clip(&source_id, quality, start, end).await,
        Commands::Prefetch {
            source_id,
            start,
            end,
            quality,
        } => executor.prefetch(&source_id, quality, start, end).await,
        Commands::Dash { source_id, quality } => executor.dash(&source_id, quality).await,
        Commands::Segment {
            source_id,
            track,
            index,
            out,
            quality,
        } => {
            executor
                .segment(&source_id, quality, track, index, &out)
                .await
        }
        Commands::Info { source_id } => executor.info(&source_id).await,
        Commands::Sweep => executor.sweep().await,
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
