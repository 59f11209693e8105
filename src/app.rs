//! App: terminal init, main loop, key/mouse handling and high score sync.

use crate::GameConfig;
use crate::game::{Board, GameSession, InjectOutcome};
use crate::highscores::{load_high_score, save_high_score};
use crate::input::{Action, key_to_action, left_click};
use crate::theme::Theme;
use crate::ui::{self, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Event poll timeout; also the animation frame interval.
const FRAME_MS: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    NewGame,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::NewGame,
            Self::NewGame => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::NewGame => Self::Resume,
            Self::Exit => Self::NewGame,
        }
    }
}

/// Positions whose cell differs between two boards of the same shape.
fn changed_cells(before: &Board, after: &Board) -> Vec<(usize, usize)> {
    (0..after.rows())
        .flat_map(|r| (0..after.cols()).map(move |c| (r, c)))
        .filter(|&(r, c)| before.get(r, c) != after.get(r, c))
        .collect()
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    session: GameSession,
    screen: Screen,
    cursor: (usize, usize),
    /// Points of the most recent clear in this game.
    last_points: Option<u32>,
    /// High score when the current game started; beating it is a new record.
    record_to_beat: u32,
    /// Last value written to (or read from) the high score file.
    saved_high_score: u32,
    quit_selected: QuitOption,
    /// Cells the last clear changed (vacated or landed on), faded in by the renderer.
    fade_cells: Vec<(usize, usize)>,
    fade_effect: Option<Effect>,
    fade_process_time: Option<Instant>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut session = GameSession::new(config.engine, rng);
        let saved_high_score = load_high_score(&config.high_score_path);
        session.set_high_score(saved_high_score);

        let mut app = Self {
            cursor: (config.engine.rows - 1, 0),
            config,
            theme,
            session,
            screen: Screen::Playing,
            last_points: None,
            record_to_beat: saved_high_score,
            saved_high_score,
            quit_selected: QuitOption::Resume,
            fade_cells: Vec::new(),
            fade_effect: None,
            fade_process_time: None,
        };
        app.seed_rows();
        app
    }

    /// Inject the configured starting rows. A board too short for them ends the game.
    fn seed_rows(&mut self) {
        for _ in 0..self.config.seed_rows {
            if self.session.inject_row() != InjectOutcome::Injected {
                break;
            }
        }
        self.screen = if self.session.is_over() {
            Screen::GameOver
        } else {
            Screen::Playing
        };
    }

    fn new_game(&mut self) {
        self.session.reset();
        self.record_to_beat = self.session.high_score();
        self.last_points = None;
        self.reset_fade();
        self.seed_rows();
        info!("new game");
    }

    fn reset_fade(&mut self) {
        self.fade_cells.clear();
        self.fade_effect = None;
        self.fade_process_time = None;
    }

    fn move_cursor(&mut self, dr: isize, dc: isize) {
        let board = self.session.board();
        let (row, col) = self.cursor;
        let row = row.saturating_add_signed(dr).min(board.rows() - 1);
        let col = col.saturating_add_signed(dc).min(board.cols() - 1);
        self.cursor = (row, col);
    }

    fn clear_at(&mut self, row: usize, col: usize) {
        let before = self.session.board().clone();
        let Some(cleared) = self.session.clear_group(row, col) else {
            return;
        };
        self.last_points = Some(cleared.points);
        self.reset_fade();
        if !self.config.no_animation {
            self.fade_cells = changed_cells(&before, self.session.board());
        }
        self.persist_high_score();
    }

    fn new_row(&mut self) {
        if self.session.inject_row() == InjectOutcome::GameOver {
            self.screen = Screen::GameOver;
        }
    }

    /// Write the high score whenever a clear raised it.
    fn persist_high_score(&mut self) {
        let high = self.session.high_score();
        if high <= self.saved_high_score {
            return;
        }
        let path = &self.config.high_score_path;
        if let Err(e) = save_high_score(path, high) {
            warn!("cannot save high score to {}: {e:#}", path.display());
        }
        // Not retried on failure: one warning per record is enough.
        self.saved_high_score = high;
    }

    fn new_record(&self) -> bool {
        self.session.score() > 0 && self.session.score() > self.record_to_beat
    }

    /// Apply one action. Returns false when the app should exit.
    fn handle_action(&mut self, action: Action) -> bool {
        match self.screen {
            Screen::Playing => match action {
                Action::CursorUp => self.move_cursor(-1, 0),
                Action::CursorDown => self.move_cursor(1, 0),
                Action::CursorLeft => self.move_cursor(0, -1),
                Action::CursorRight => self.move_cursor(0, 1),
                Action::Clear => {
                    let (row, col) = self.cursor;
                    self.clear_at(row, col);
                }
                Action::NewRow => self.new_row(),
                Action::Quit => {
                    self.screen = Screen::QuitMenu;
                    self.quit_selected = QuitOption::Resume;
                }
                Action::Restart | Action::None => {}
            },
            Screen::GameOver => match action {
                Action::Quit => return false,
                Action::NewRow | Action::Restart | Action::Clear => self.new_game(),
                _ => {}
            },
            Screen::QuitMenu => match action {
                Action::CursorDown | Action::CursorRight => {
                    self.quit_selected = self.quit_selected.next();
                }
                Action::CursorUp | Action::CursorLeft => {
                    self.quit_selected = self.quit_selected.prev();
                }
                Action::Clear => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::NewGame => self.new_game(),
                    QuitOption::Exit => return false,
                },
                Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
        }
        true
    }

    /// Left click at terminal position (x, y) within the last drawn `area`.
    fn handle_click(&mut self, area: Rect, x: u16, y: u16) {
        if self.screen != Screen::Playing {
            return;
        }
        if let Some((row, col)) = ui::cell_at(area, self.session.board(), x, y) {
            self.cursor = (row, col);
            self.clear_at(row, col);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let result = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| self.run_loop(&mut terminal));

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let view = View {
                screen: self.screen,
                theme: &self.theme,
                cursor: self.cursor,
                last_points: self.last_points,
                new_record: self.new_record(),
                quit_selected: self.quit_selected,
            };
            let area = terminal
                .draw(|f| {
                    ui::draw(
                        f,
                        &self.session,
                        &view,
                        &self.fade_cells,
                        &mut self.fade_effect,
                        &mut self.fade_process_time,
                        now,
                    )
                })?
                .area;

            if self.fade_effect.as_ref().is_some_and(|e| e.done()) {
                self.reset_fade();
            }

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if !self.handle_action(key_to_action(key)) {
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => {
                            if let Some((x, y)) = left_click(mouse) {
                                self.handle_click(area, x, y);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EngineConfig;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tileclear-app-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("highscore")
    }

    fn config(rows: usize, seed_rows: usize, seed: u64, path: PathBuf) -> GameConfig {
        GameConfig {
            engine: EngineConfig::new(rows, 8, 5, 2).unwrap(),
            seed_rows,
            seed: Some(seed),
            no_animation: false,
            high_score_path: path,
        }
    }

    /// First cell whose group is big enough to clear.
    fn clearable_cell(app: &App) -> Option<(usize, usize)> {
        let board = app.session.board();
        (0..board.rows())
            .flat_map(|r| (0..board.cols()).map(move |c| (r, c)))
            .find(|&(r, c)| app.session.find_group(r, c).len() >= 2)
    }

    #[test]
    fn test_new_app_seeds_two_rows_and_loads_high_score() {
        let path = scratch_file("seed");
        save_high_score(&path, 77).unwrap();
        let app = App::new(config(10, 2, 1, path.clone()), Theme::default());
        assert_eq!(app.screen, Screen::Playing);
        assert_eq!(app.session.board().tile_count(), 16);
        assert!(app.session.board().is_row_empty(7));
        assert_eq!(app.session.high_score(), 77);
        assert_eq!(app.cursor, (9, 0));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_clear_updates_score_and_persists_record() {
        let path = scratch_file("clear");
        let (mut app, (row, col)) = (0..200)
            .find_map(|seed| {
                let app = App::new(config(10, 2, seed, path.clone()), Theme::default());
                clearable_cell(&app).map(|cell| (app, cell))
            })
            .expect("some seed deals a clearable pair");

        let size = app.session.find_group(row, col).len() as u32;
        let before = app.session.board().clone();
        app.cursor = (row, col);
        assert!(app.handle_action(Action::Clear));
        assert_eq!(app.session.score(), size * size);
        assert_eq!(app.last_points, Some(size * size));
        assert_eq!(app.fade_cells, changed_cells(&before, app.session.board()));
        assert!(app.new_record());
        assert_eq!(load_high_score(&path), size * size);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_fade_follows_tiles_that_fell() {
        // Column 0 holds 3 over a pair of 1s; clearing the pair drops the 3 to the bottom.
        let before = Board::from_text(&["3.", "1.", "1."]);
        let after = Board::from_text(&["..", "..", "3."]);
        assert_eq!(changed_cells(&before, &after), vec![(0, 0), (1, 0), (2, 0)]);
        assert!(changed_cells(&before, &before).is_empty());

        let mut lines = vec!["........"; 7];
        lines.extend(["2.......", "1.......", "1......."]);
        let before = Board::from_text(&lines);
        let session = GameSession::with_board(before.clone(), 5, 2);
        let path = scratch_file("fade");
        let mut app = App::new(config(10, 0, 1, path.clone()), Theme::default());
        app.session = session;
        app.handle_action(Action::Clear);
        assert_eq!(app.session.score(), 4);
        // The 2 landed on (9, 0): it fades in together with the vacated cells above it.
        assert_eq!(app.session.board().get(9, 0), Some(crate::game::Cell::Tile(2)));
        assert_eq!(app.fade_cells, vec![(7, 0), (8, 0), (9, 0)]);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_click_outside_board_does_nothing() {
        let path = scratch_file("click");
        let mut app = App::new(config(10, 2, 3, path), Theme::default());
        let before = app.session.board().clone();
        app.handle_click(Rect::new(0, 0, 80, 24), 0, 0);
        assert_eq!(app.session.board(), &before);
        assert_eq!(app.cursor, (9, 0));
    }

    #[test]
    fn test_new_row_until_game_over_then_restart() {
        let path = scratch_file("over");
        let mut app = App::new(config(3, 2, 5, path), Theme::default());
        assert!(app.handle_action(Action::NewRow));
        assert_eq!(app.screen, Screen::Playing);
        assert!(app.handle_action(Action::NewRow));
        assert_eq!(app.screen, Screen::GameOver);
        assert!(app.session.is_over());

        // Cursor and clear keys do nothing while over; N starts over.
        let before = app.session.board().clone();
        app.handle_action(Action::CursorUp);
        assert_eq!(app.session.board(), &before);
        assert!(app.handle_action(Action::NewRow));
        assert_eq!(app.screen, Screen::Playing);
        assert!(!app.session.is_over());
        assert_eq!(app.session.score(), 0);
        assert_eq!(app.session.board().tile_count(), 16);
    }

    #[test]
    fn test_too_many_seed_rows_ends_first_game() {
        let path = scratch_file("tall");
        let app = App::new(config(2, 3, 5, path), Theme::default());
        assert_eq!(app.screen, Screen::GameOver);
    }

    #[test]
    fn test_quit_menu_cycles_and_exits() {
        let path = scratch_file("quit");
        let mut app = App::new(config(10, 2, 1, path), Theme::default());
        assert!(app.handle_action(Action::Quit));
        assert_eq!(app.screen, Screen::QuitMenu);
        assert_eq!(app.quit_selected, QuitOption::Resume);

        app.handle_action(Action::CursorUp);
        assert_eq!(app.quit_selected, QuitOption::Exit);
        app.handle_action(Action::CursorDown);
        assert_eq!(app.quit_selected, QuitOption::Resume);

        assert!(app.handle_action(Action::Quit));
        assert_eq!(app.screen, Screen::Playing);

        app.handle_action(Action::Quit);
        app.handle_action(Action::CursorDown);
        app.handle_action(Action::CursorDown);
        assert_eq!(app.quit_selected, QuitOption::Exit);
        assert!(!app.handle_action(Action::Clear));
    }

    #[test]
    fn test_cursor_stays_on_board() {
        let path = scratch_file("cursor");
        let mut app = App::new(config(10, 2, 1, path), Theme::default());
        app.handle_action(Action::CursorDown);
        app.handle_action(Action::CursorLeft);
        assert_eq!(app.cursor, (9, 0));
        for _ in 0..20 {
            app.handle_action(Action::CursorUp);
            app.handle_action(Action::CursorRight);
        }
        assert_eq!(app.cursor, (0, 7));
    }
}
