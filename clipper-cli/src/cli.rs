use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clipper_engine::{Quality, TrackKind};

#[derive(Parser, Debug)]
#[command(name = "clipper", author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to <config dir>/clipper/config.toml)
    #[arg(short, long, global = true, env = "CLIPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true, env = "CLIPPER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cookie header forwarded to every request
    #[arg(long, global = true, env = "CLIPPER_COOKIES", hide_env_values = true)]
    pub cookies: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce a trimmed local clip for a time range
    Clip {
        /// Source id (BV id, av id or page URL)
        source_id: String,
        /// Range start in seconds
        start: f64,
        /// Range end in seconds
        end: f64,
        #[arg(short = 'Q', long, value_enum, default_value_t = Quality::P720)]
        quality: Quality,
    },

    /// Warm the chunk cache for a time range without producing a clip
    Prefetch {
        source_id: String,
        start: f64,
        end: f64,
        #[arg(short = 'Q', long, value_enum, default_value_t = Quality::P720)]
        quality: Quality,
    },

    /// Resolve the DASH manifest and segment index of a source
    Dash {
        source_id: String,
        #[arg(short = 'Q', long, value_enum, default_value_t = Quality::P720)]
        quality: Quality,
    },

    /// Download one init or media segment of a DASH track
    Segment {
        source_id: String,
        #[arg(value_enum)]
        track: TrackKind,
        /// Media segment index; omit for the init segment
        index: Option<usize>,
        /// Destination file
        #[arg(short = 'O', long)]
        out: PathBuf,
        #[arg(short = 'Q', long, value_enum, default_value_t = Quality::P720)]
        quality: Quality,
    },

    /// Show the title and duration of a source
    Info { source_id: String },

    /// Delete stale cache files
    Sweep,

    /// Show or reset the configuration
    Config {
        #[arg(long)]
        show: bool,
        #[arg(long, conflicts_with = "show")]
        reset: bool,
        /// Print the configuration file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
    JsonCompact,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonCompact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clip() {
        let args =
            Args::try_parse_from(["clipper", "clip", "BV1xx411c7mD", "5", "35", "-Q", "1080p"])
                .unwrap();
        match args.command {
            Commands::Clip {
                source_id,
                start,
                end,
                quality,
            } => {
                assert_eq!(source_id, "BV1xx411c7mD");
                assert_eq!((start, end), (5.0, 35.0));
                assert_eq!(quality, Quality::P1080);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.output, OutputFormat::Pretty);
    }

    #[test]
    fn test_parse_segment_defaults_to_init() {
        let args = Args::try_parse_from([
            "clipper", "segment", "BV1", "audio", "-O", "/tmp/a.m4s", "-o", "json-compact",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Segment {
                track: TrackKind::Audio,
                index: None,
                ..
            }
        ));
        assert!(args.output.is_json());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["clipper", "-v", "-q", "sweep"]).is_err());
    }
}
