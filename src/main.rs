//! Tileclear — tile-matching puzzle in the terminal: rows rise from below, clear
//! same-coloured groups, remaining tiles fall.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use game::EngineConfig;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Largest board side the terminal layout is sized for.
const MAX_BOARD_SIDE: u64 = 100;

/// Options derived from CLI that affect the session (board shape, seeding, persistence).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub engine: EngineConfig,
    /// Rows injected right after a new game starts.
    pub seed_rows: usize,
    /// Fixed RNG seed; entropy when unset.
    pub seed: Option<u64>,
    pub no_animation: bool,
    pub high_score_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let engine = EngineConfig::new(args.rows, args.cols, args.colors, args.threshold)
        .context("invalid board configuration")?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        warn!("theme not loaded ({e}); using defaults");
        let mut t = theme::Theme::default();
        t.apply_palette(args.palette);
        t
    });
    let config = GameConfig {
        engine,
        seed_rows: args.seed_rows,
        seed: args.seed,
        no_animation: args.no_animation,
        high_score_path: args.high_score_file.unwrap_or_else(highscores::default_path),
    };
    info!("starting with {:?}", config);

    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// Log to a file when asked; the terminal itself is owned by the game.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Tile-matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tileclear",
    version,
    about = "Tile-matching puzzle in the terminal. Clear groups of same-coloured tiles before the rising rows reach the top.",
    long_about = "Tileclear is a terminal tile-matching puzzle.\n\n\
        Rows of coloured tiles rise from the bottom whenever you ask for a new one. \
        Clear a group of two or more touching tiles of one colour (up/down/left/right) \
        to score the square of its size; tiles above fall into the gap. The game ends \
        when a new row is requested while the top row is occupied.\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor   Space / Enter  Clear group   Left click  Clear group\n  \
        N              New row (new game once over)       Q / Esc  Quit menu"
)]
pub struct Args {
    /// Board height in rows (1-100).
    #[arg(
        long,
        default_value = "10",
        value_name = "ROWS",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=MAX_BOARD_SIDE)
    )]
    pub rows: usize,

    /// Board width in columns (1-100).
    #[arg(
        long,
        default_value = "8",
        value_name = "COLS",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=MAX_BOARD_SIDE)
    )]
    pub cols: usize,

    /// Number of tile colours, at most one per theme colour (1-6).
    #[arg(
        long,
        default_value = "5",
        value_name = "N",
        value_parser = clap::value_parser!(u8).range(1..=theme::TILE_COLORS as i64)
    )]
    pub colors: u8,

    /// Minimum group size a click needs to clear.
    #[arg(long, default_value = "2", value_name = "N")]
    pub threshold: usize,

    /// Rows injected at the start of every game.
    #[arg(long, default_value = "2", value_name = "N")]
    pub seed_rows: usize,

    /// RNG seed for reproducible boards.
    #[arg(long, value_name = "U64")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// High score file. Defaults to $XDG_CONFIG_HOME/tileclear/highscore.
    #[arg(long, value_name = "FILE")]
    pub high_score_file: Option<PathBuf>,

    /// Disable the clear fade (board updates instantly either way).
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file (RUST_LOG selects the level).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let args = Args::parse_from(["tileclear"]);
        let engine = EngineConfig::new(args.rows, args.cols, args.colors, args.threshold).unwrap();
        assert_eq!(engine, EngineConfig::default());
        assert_eq!(args.seed_rows, 2);
        assert_eq!(args.palette, Palette::Normal);
    }

    #[test]
    fn test_palette_aliases() {
        let args = Args::parse_from(["tileclear", "--palette", "colourblind", "--seed", "9"]);
        assert_eq!(args.palette, Palette::Colorblind);
        assert_eq!(args.seed, Some(9));
    }

    #[test]
    fn test_board_sides_are_bounded() {
        assert!(Args::try_parse_from(["tileclear", "--cols", "0"]).is_err());
        assert!(Args::try_parse_from(["tileclear", "--rows", "0"]).is_err());
        assert!(Args::try_parse_from(["tileclear", "--cols", "40000"]).is_err());
        assert!(Args::try_parse_from(["tileclear", "--rows", "101"]).is_err());
        let args = Args::try_parse_from(["tileclear", "--rows", "100", "--cols", "100"]).unwrap();
        assert_eq!((args.rows, args.cols), (100, 100));
    }

    #[test]
    fn test_colors_limited_to_theme_palette() {
        assert!(Args::try_parse_from(["tileclear", "--colors", "7"]).is_err());
        assert!(Args::try_parse_from(["tileclear", "--colors", "0"]).is_err());
        let args = Args::try_parse_from(["tileclear", "--colors", "6"]).unwrap();
        assert_eq!(args.colors, 6);
    }
}
