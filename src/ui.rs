//! Layout and drawing: board, cursor and group preview, sidebar, game over, quit menu.

use crate::app::{QuitOption, Screen};
use crate::game::{Board, Cell, GameSession};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count};

/// Each board cell is two terminal columns wide so tiles look square.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;
const SIDEBAR_WIDTH: u16 = 26;
/// Duration of the fade-in over cells changed by a clear.
const CLEAR_FADE_MS: u32 = 250;

/// Terminal extent of `n` board cells of `per` terminal cells each, saturating at u16::MAX.
fn term_extent(n: usize, per: u16) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX).saturating_mul(per)
}

/// Board size in terminal cells, border included.
fn board_outer_size(board: &Board) -> (u16, u16) {
    let w = term_extent(board.cols(), CELL_WIDTH);
    let h = term_extent(board.rows(), CELL_HEIGHT);
    (w.saturating_add(2), h.saturating_add(2))
}

/// Outer board rect and sidebar rect, centred in `area`.
fn game_layout(area: Rect, board: &Board) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size(board);
    let total_w = bw.saturating_add(SIDEBAR_WIDTH);
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(bh) / 2;
    let board_outer = Rect {
        x,
        y,
        width: bw.min(area.width),
        height: bh.min(area.height),
    };
    let sidebar_x = x.saturating_add(board_outer.width);
    let sidebar = Rect {
        x: sidebar_x,
        y,
        width: SIDEBAR_WIDTH.min(area.right().saturating_sub(sidebar_x)),
        height: bh.min(area.height),
    };
    (board_outer, sidebar)
}

/// Board inner rect (no border) for the given area.
fn board_rect(area: Rect, board: &Board) -> Rect {
    let (outer, _) = game_layout(area, board);
    Rect {
        x: outer.x.saturating_add(1),
        y: outer.y.saturating_add(1),
        width: term_extent(board.cols(), CELL_WIDTH).min(outer.width.saturating_sub(2)),
        height: term_extent(board.rows(), CELL_HEIGHT).min(outer.height.saturating_sub(2)),
    }
}

/// Board cell (row, col) under terminal position (x, y), if any.
pub fn cell_at(area: Rect, board: &Board, x: u16, y: u16) -> Option<(usize, usize)> {
    let inner = board_rect(area, board);
    if !inner.contains(Position { x, y }) {
        return None;
    }
    let col = ((x - inner.x) / CELL_WIDTH) as usize;
    let row = ((y - inner.y) / CELL_HEIGHT) as usize;
    (row < board.rows() && col < board.cols()).then_some((row, col))
}

/// Terminal positions covered by the given board cells.
fn cell_buffer_positions(inner: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(row, col) in cells {
        let x0 = inner.x.saturating_add(term_extent(col, CELL_WIDTH));
        let y0 = inner.y.saturating_add(term_extent(row, CELL_HEIGHT));
        for bx in x0..x0.saturating_add(CELL_WIDTH).min(inner.right()) {
            for by in y0..y0.saturating_add(CELL_HEIGHT).min(inner.bottom()) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Everything the front-end shows besides the session itself.
pub struct View<'a> {
    pub screen: Screen,
    pub theme: &'a Theme,
    pub cursor: (usize, usize),
    pub last_points: Option<u32>,
    pub new_record: bool,
    pub quit_selected: QuitOption,
}

/// Draw the current screen. While `fade_cells` is non-empty the fade effect is created
/// on first use and advanced by the time since the last frame.
pub fn draw(
    frame: &mut Frame,
    session: &GameSession,
    view: &View,
    fade_cells: &[(usize, usize)],
    fade_effect: &mut Option<Effect>,
    fade_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    draw_game(frame, session, view, area);
    if !fade_cells.is_empty() {
        apply_clear_fade(frame, session, view.theme, area, fade_cells, fade_effect, fade_process_time, now);
    }
    match view.screen {
        Screen::Playing => {}
        Screen::GameOver => draw_game_over(frame, session, view, area),
        Screen::QuitMenu => draw_quit_menu(frame, view.theme, view.quit_selected),
    }
}

/// Fade the cells a clear changed in from the background (TachyonFX).
fn apply_clear_fade(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    area: Rect,
    fade_cells: &[(usize, usize)],
    fade_effect: &mut Option<Effect>,
    fade_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let inner = board_rect(area, session.board());
    let delta = fade_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *fade_process_time = Some(now);

    if fade_effect.is_none() {
        let positions = cell_buffer_positions(inner, fade_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_from(theme.bg, theme.bg, (CLEAR_FADE_MS, Interpolation::QuadOut))
            .with_filter(filter)
            .with_area(inner);
        *fade_effect = Some(effect);
    }

    if let Some(effect) = fade_effect {
        frame.render_effect(effect, inner, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_game(frame: &mut Frame, session: &GameSession, view: &View, area: Rect) {
    let (board_outer, sidebar) = game_layout(area, session.board());
    draw_board(frame, session, view, board_outer);
    draw_sidebar(frame, session, view, sidebar);
}

fn draw_board(frame: &mut Frame, session: &GameSession, view: &View, area: Rect) {
    let theme = view.theme;
    let board = session.board();
    let (cursor_row, cursor_col) = view.cursor;

    // Preview the group under the cursor only when a click would clear it.
    let group = session.find_group(cursor_row, cursor_col);
    let preview: HashSet<(usize, usize)> = if view.screen == Screen::Playing
        && group.len() >= session.config().clear_threshold
    {
        group.into_iter().collect()
    } else {
        HashSet::new()
    };

    let lines: Vec<Line> = (0..board.rows())
        .map(|row| {
            let spans: Vec<Span> = (0..board.cols())
                .map(|col| {
                    let cell = board.get(row, col).unwrap_or(Cell::Empty);
                    let is_cursor = view.screen == Screen::Playing && (row, col) == view.cursor;
                    cell_span(theme, cell, is_cursor, preview.contains(&(row, col)))
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let title = if session.is_over() {
        Span::styled(" Tileclear ", Style::default().fg(Color::Red).bold())
    } else {
        Span::styled(" Tileclear ", Style::default().fg(theme.title).bold())
    };
    let p = Paragraph::new(lines).style(Style::default().bg(theme.bg)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(title),
    );
    p.render(area, frame.buffer_mut());
}

fn cell_span(theme: &Theme, cell: Cell, is_cursor: bool, in_preview: bool) -> Span<'static> {
    let Some(index) = cell.color() else {
        return if is_cursor {
            Span::styled("[]", Style::default().fg(theme.title).bg(theme.bg))
        } else {
            Span::styled(" ·", Style::default().fg(theme.div_line).bg(theme.bg))
        };
    };
    let color = theme.tile_color(index);
    if is_cursor {
        Span::styled("[]", Style::default().fg(theme.bg).bg(color).bold())
    } else if in_preview {
        Span::styled("▒▒", Style::default().fg(theme.bg).bg(color))
    } else {
        Span::styled("  ", Style::default().bg(color))
    }
}

fn draw_sidebar(frame: &mut Frame, session: &GameSession, view: &View, area: Rect) {
    let theme = view.theme;
    let label = Style::default().fg(theme.inactive_fg);
    let value = Style::default().fg(theme.main_fg).bold();
    let config = session.config();

    let mut lines = vec![
        Line::from(Span::styled(" TILECLEAR", Style::default().fg(theme.title).bold())),
        Line::from(""),
        Line::from(vec![Span::styled(" Score  ", label), Span::styled(session.score().to_string(), value)]),
        Line::from(vec![Span::styled(" Best   ", label), Span::styled(session.high_score().to_string(), value)]),
        Line::from(vec![
            Span::styled(" Tiles  ", label),
            Span::styled(session.board().tile_count().to_string(), value),
        ]),
    ];
    if let Some(points) = view.last_points {
        lines.push(Line::from(vec![
            Span::styled(" Last   ", label),
            Span::styled(format!("+{}", points), Style::default().fg(theme.title)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(" {} colours, groups of {}+", config.palette_size, config.clear_threshold),
        label,
    )));
    lines.push(Line::from(""));
    for (keys, what) in [
        ("←↓↑→/hjkl", "move"),
        ("space/click", "clear"),
        ("n", "new row"),
        ("q", "quit"),
    ] {
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<12}", keys), Style::default().fg(theme.main_fg)),
            Span::styled(what, label),
        ]));
    }

    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line)),
    );
    p.render(area, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, session: &GameSession, view: &View, area: Rect) {
    let theme = view.theme;
    let popup_w = 30u16;
    let popup_h = if view.new_record { 9 } else { 8 };
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Game Over ", Style::default().fg(Color::White).bg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {} ", session.score()),
            Style::default().fg(theme.main_fg),
        )),
    ];
    if view.new_record {
        lines.push(Line::from(Span::styled(" New record! ", Style::default().fg(theme.title).bold())));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " N/R — New game    Q — Quit ",
        Style::default().fg(theme.main_fg),
    )));

    frame.render_widget(ratatui::widgets::Clear, popup);
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        );
    p.render(popup, frame.buffer_mut());
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24;
    let qh = 8;
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw.min(area.width),
        height: qh.min(area.height),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    frame.render_widget(ratatui::widgets::Clear, quit_rect);
    frame.buffer_mut().set_style(quit_rect, Style::default().bg(theme.bg));

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::NewGame, " New game "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let ry = inner.y + 1 + i as u16 * 2;
        if ry >= inner.y + inner.height {
            break;
        }
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_at_maps_board_cells() {
        let board = Board::new(10, 8);
        let area = Rect::new(0, 0, 80, 24);
        let inner = board_rect(area, &board);
        assert_eq!(inner.width, 16);
        assert_eq!(inner.height, 10);

        assert_eq!(cell_at(area, &board, inner.x, inner.y), Some((0, 0)));
        // Both terminal columns of a cell hit the same board column.
        assert_eq!(cell_at(area, &board, inner.x + 3, inner.y + 2), Some((2, 1)));
        assert_eq!(cell_at(area, &board, inner.x + 15, inner.y + 9), Some((9, 7)));
    }

    #[test]
    fn test_cell_at_ignores_border_and_sidebar() {
        let board = Board::new(10, 8);
        let area = Rect::new(0, 0, 80, 24);
        let inner = board_rect(area, &board);
        assert_eq!(cell_at(area, &board, inner.x - 1, inner.y), None);
        assert_eq!(cell_at(area, &board, inner.x, inner.y - 1), None);
        assert_eq!(cell_at(area, &board, inner.x + 16, inner.y), None);
        assert_eq!(cell_at(area, &board, inner.x, inner.y + 10), None);
    }

    #[test]
    fn test_layout_is_centred() {
        let board = Board::new(10, 8);
        let area = Rect::new(0, 0, 80, 24);
        let (outer, sidebar) = game_layout(area, &board);
        assert_eq!(outer.width, 18);
        assert_eq!(outer.height, 12);
        assert_eq!(outer.x, (80 - 18 - SIDEBAR_WIDTH) / 2);
        assert_eq!(outer.y, (24 - 12) / 2);
        assert_eq!(sidebar.x, outer.x + outer.width);
    }

    #[test]
    fn test_oversized_board_layout_saturates() {
        let area = Rect::new(0, 0, 80, 24);
        let wide = Board::new(10, 40_000);
        assert_eq!(board_outer_size(&wide).0, u16::MAX);
        let inner = board_rect(area, &wide);
        assert!(inner.right() <= area.right());
        assert_eq!(cell_at(area, &wide, inner.x + 4, inner.y + 2), Some((2, 2)));

        let tall = Board::new(65_546, 8);
        assert_eq!(board_outer_size(&tall).1, u16::MAX);
        assert_eq!(cell_at(area, &tall, 0, 0), None);
        let far = cell_buffer_positions(board_rect(area, &tall), &[(70_000, 70_000)]);
        assert!(far.is_empty());
    }

    #[test]
    fn test_fade_positions_cover_both_columns() {
        let inner = Rect::new(5, 3, 16, 10);
        let set = cell_buffer_positions(inner, &[(0, 0), (1, 2)]);
        assert_eq!(set.len(), 4);
        assert!(set.contains(&(5, 3)) && set.contains(&(6, 3)));
        assert!(set.contains(&(9, 4)) && set.contains(&(10, 4)));
    }
}
