use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "atd",
    version,
    about = "Download movies, episodes and whole series from arabic-toons"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to <config dir>/atd/config.toml)
    #[arg(long, global = true, env = "ATD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated log files into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

/// Options shared by every download command.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Parallel segment downloads per item
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub segments: Option<u16>,

    /// Remux the downloaded stream to mp4 with ffmpeg
    #[arg(long)]
    pub ffmpeg: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a movie page
    Movie {
        url: String,
        /// Output directory
        dir: Option<PathBuf>,
        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Download a single episode page
    Episode {
        url: String,
        /// Output directory
        dir: Option<PathBuf>,
        #[command(flatten)]
        options: DownloadOptions,
    },

    /// Download the episodes of a series listing page
    Series {
        url: String,
        /// Output directory
        dir: Option<PathBuf>,
        /// Episodes to download, e.g. "2 5 3-7" (default: all)
        #[arg(short, long)]
        episodes: Option<String>,
        /// Episodes downloaded at the same time
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        processes: Option<u16>,
        #[command(flatten)]
        options: DownloadOptions,
    },
}

impl Commands {
    pub fn dir(&self) -> Option<&PathBuf> {
        match self {
            Self::Movie { dir, .. } | Self::Episode { dir, .. } | Self::Series { dir, .. } => {
                dir.as_ref()
            }
        }
    }

    pub fn options(&self) -> &DownloadOptions {
        match self {
            Self::Movie { options, .. }
            | Self::Episode { options, .. }
            | Self::Series { options, .. } => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_series_flags() {
        let args = Args::parse_from([
            "atd",
            "series",
            "http://www.arabic-toons.com/dai-1405896719-anime-streaming.html",
            "~/Videos/dai",
            "--episodes",
            "2 5 3-7",
            "--segments",
            "8",
            "--processes",
            "2",
            "--ffmpeg",
        ]);
        match args.command {
            Commands::Series {
                dir,
                episodes,
                processes,
                options,
                ..
            } => {
                assert_eq!(dir, Some(PathBuf::from("~/Videos/dai")));
                assert_eq!(episodes.as_deref(), Some("2 5 3-7"));
                assert_eq!(processes, Some(2));
                assert_eq!(options.segments, Some(8));
                assert!(options.ffmpeg);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_zero_segments_rejected() {
        let result = Args::try_parse_from(["atd", "movie", "http://x/y.html", "--segments", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_movie_defaults() {
        let args = Args::parse_from(["atd", "-v", "movie", "http://x/y.html"]);
        assert!(args.verbose);
        assert!(args.command.dir().is_none());
        assert_eq!(args.command.options().segments, None);
        assert!(!args.command.options().ffmpeg);
    }
}
