use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, InputMode};
use crate::model::ResourceKind;
use crate::view::DrawnCell;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut left = Vec::new();
    push_powerline_segment(&mut left, " ⛵ skiff ", Color::White, PL_A, PL_B);
    push_powerline_segment(
        &mut left,
        format!(" {} ", app.context()),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut left,
        format!(" {} ", app.kind().title()),
        Color::White,
        PL_C,
        PL_D,
    );
    let scope = if !app.kind().namespaced() {
        "cluster".to_string()
    } else if app.scope().is_all() {
        "all namespaces".to_string()
    } else {
        app.scope().label()
    };
    push_powerline_segment(&mut left, format!(" {scope} "), Color::White, PL_D, BG);
    let left = Line::from(left);

    let mut right = Vec::new();
    let view = app.view();
    if view.live_count() != view.data().len() {
        right.push(Span::styled(
            format!(" {}/{} ", view.live_count(), view.data().len()),
            Style::default().fg(WARN).bg(BG),
        ));
    }
    let forwards = app.port_forwards().len();
    if forwards > 0 {
        right.push(Span::styled(
            format!(" ⇄ {forwards} pf "),
            Style::default().fg(ACCENT).bg(BG),
        ));
    }
    if app.render_failures() > 0 {
        right.push(Span::styled(
            format!(" ✗ {} ", app.render_failures()),
            Style::default().fg(ERROR).bg(BG),
        ));
    }
    let refresh = app.last_refresh().unwrap_or("waiting");
    right.push(Span::styled(
        format!(" ⟳ {refresh} "),
        Style::default().fg(MUTED).bg(BG),
    ));

    let right_width = spans_width(&right) as u16;
    if area.width < 42 || right_width >= area.width {
        frame.render_widget(Paragraph::new(left).style(Style::default().bg(BG)), area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right)).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    // Borders and the header row.
    app.set_table_page_size(area.height.saturating_sub(3) as usize);
    app.set_detail_viewport(area.height.saturating_sub(2));

    if app.detail_overlay_active() {
        render_detail(frame, area, app);
    } else {
        render_table(frame, area, app);
    }
}

fn render_table(frame: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let styles = view.styles();
    let drawn = view.drawn();

    let header_row = Row::new(drawn.header.iter().map(|cell| {
        Cell::from(cell.text.clone()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(styles.header_fg).bg(styles.header_bg));

    let rows = drawn.rows.iter().map(|row| {
        let mut row_style = Style::default();
        if row.marked {
            row_style = row_style.add_modifier(Modifier::BOLD);
        }
        Row::new(row.cells.iter().map(drawn_cell)).style(row_style)
    });

    let border = if view.filter_error().is_some() {
        ERROR
    } else {
        ACCENT
    };
    let block = Block::default()
        .title(Line::from(Span::styled(
            format!(" {} ", drawn.title),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(styles.bg).fg(styles.fg));

    let table = Table::new(rows, column_constraints(&drawn.header))
        .header(header_row)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(styles.cursor)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(view.selected_index());
    frame.render_stateful_widget(table, area, &mut state);
}

fn drawn_cell(cell: &DrawnCell) -> Cell<'static> {
    let mut style = Style::default().fg(cell.color);
    if cell.dim {
        style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
    }
    Cell::from(cell.text.clone()).style(style)
}

fn render_detail(frame: &mut Frame, area: Rect, app: &App) {
    let text = if app.detail_title().starts_with("Describe") {
        highlight_yaml_text(app.detail_text())
    } else {
        Text::from(app.detail_text().to_string())
    };
    let block = Block::default()
        .title(format!(" {} ", app.detail_title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));
    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll(), 0));

    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    match app.mode() {
        InputMode::Command => {
            push_powerline_segment(&mut spans, " : ", Color::Black, ACCENT, BG);
            spans.push(Span::styled(
                format!(" {}▏", app.input()),
                Style::default().fg(Color::White).bg(BG),
            ));
        }
        InputMode::Filter => {
            let view = app.view();
            let (bg, hint) = match view.filter_error() {
                Some(error) => (ERROR, format!("  {error}")),
                None => (ACCENT, String::new()),
            };
            push_powerline_segment(&mut spans, " / ", Color::Black, bg, BG);
            spans.push(Span::styled(
                format!(" {}▏", view.cmd_buff().text()),
                Style::default().fg(Color::White).bg(BG),
            ));
            spans.push(Span::styled(
                compact_text(&hint, area.width.saturating_sub(24) as usize),
                Style::default().fg(ERROR).bg(BG),
            ));
        }
        InputMode::Normal => {
            let (status, status_fg, status_bg) = match app.pending_confirmation_prompt() {
                Some(prompt) => (format!("{prompt}? (y/n)"), Color::Black, WARN),
                None => (app.status().to_string(), Color::White, PL_B),
            };
            push_powerline_segment(&mut spans, " 󰘳 nrm ", Color::White, PL_A, status_bg);
            let width_hint = area.width.saturating_sub(24).max(24) as usize;
            push_powerline_segment(
                &mut spans,
                format!(" {} ", compact_text(&status, width_hint)),
                status_fg,
                status_bg,
                BG,
            );
            if let Some(badge) = app.port_forward_badge() {
                spans.push(Span::styled(
                    format!(" {badge} "),
                    Style::default().fg(ACCENT).bg(BG),
                ));
            }
        }
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(78, 72, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "skiff help  kind:{}  scope:{}",
            app.kind().title(),
            app.scope()
        )),
        Line::from(""),
    ];
    for line in help_lines(app) {
        lines.push(Line::from(line));
    }

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn help_lines(app: &App) -> Vec<String> {
    let mut lines = vec![
        "Move: j/k  PgUp/PgDn  gg/G  Enter drill-down  Esc back".to_string(),
        "Filter: /text  /-l app=web,tier!=db  /-f fuzzy  Esc clear  Enter keep".to_string(),
        "Sort: N name  A age  P namespace  I invert".to_string(),
        "Act: d describe  l logs  Ctrl-d delete  Ctrl-b rollback (rs)".to_string(),
        "Marks: Space toggle  Ctrl-\\ clear".to_string(),
        "Commands: :<kind> [ns|all]  :ns <name|all>  :pf <local>:<remote>  :q".to_string(),
        format!(
            "Kinds: {}",
            ResourceKind::ALL
                .iter()
                .map(|kind| kind.short_token())
                .collect::<Vec<_>>()
                .join(" ")
        ),
    ];

    let bindings = app.view().sort_bindings();
    if !bindings.is_empty() {
        let shortcuts = bindings
            .iter()
            .map(|binding| format!("{} {}", binding.key, binding.label.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(format!("{} sort: {shortcuts}", app.kind().title()));
    }

    if let Some(source) = app.config_source() {
        lines.push(String::new());
        lines.push(format!("Config: {source}"));
    }
    lines
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    Text::from(input.lines().map(highlight_yaml_line).collect::<Vec<_>>())
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    let mut spans = vec![Span::raw(indent.to_string())];

    let body = match body.strip_prefix("- ") {
        Some(rest) => {
            spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
            rest
        }
        None => body,
    };

    match body.split_once(':') {
        Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
            spans.push(Span::styled(
                key.to_string(),
                Style::default().fg(Color::Rgb(103, 232, 249)),
            ));
            spans.push(Span::styled(":", Style::default().fg(MUTED)));
            if !value.trim().is_empty() {
                spans.push(Span::styled(
                    value.to_string(),
                    Style::default().fg(yaml_value_color(value.trim())),
                ));
            }
        }
        _ => spans.push(Span::styled(
            body.to_string(),
            Style::default().fg(Color::White),
        )),
    }
    Line::from(spans)
}

fn yaml_value_color(value: &str) -> Color {
    if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.width()).sum()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut shortened = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Drawn cells are already padded, so the header width is the column width.
/// The last column takes whatever is left.
fn column_constraints(header: &[DrawnCell]) -> Vec<Constraint> {
    if header.is_empty() {
        return vec![Constraint::Percentage(100)];
    }

    let last = header.len() - 1;
    header
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let width = cell.text.width() as u16;
            if index == last {
                Constraint::Min(width)
            } else {
                Constraint::Length(width)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{column_constraints, compact_text, highlight_yaml_line};
    use crate::table::Align;
    use crate::view::DrawnCell;
    use ratatui::layout::Constraint;
    use ratatui::style::Color;

    fn cell(text: &str) -> DrawnCell {
        DrawnCell {
            text: text.to_string(),
            align: Align::Left,
            color: Color::White,
            dim: false,
            delta: None,
        }
    }

    #[test]
    fn columns_follow_padded_header_widths() {
        let constraints = column_constraints(&[cell("NAME  "), cell("READY↑"), cell("AGE")]);
        assert_eq!(
            constraints,
            vec![
                Constraint::Length(6),
                Constraint::Length(6),
                Constraint::Min(3)
            ]
        );
        assert_eq!(column_constraints(&[]), vec![Constraint::Percentage(100)]);
    }

    #[test]
    fn compact_text_adds_ellipsis() {
        assert_eq!(compact_text("abcdef", 4), "abc…");
        assert_eq!(compact_text("abc", 4), "abc");
    }

    #[test]
    fn yaml_keys_are_split_from_values() {
        let line = highlight_yaml_line("  - name: web");
        let texts = line
            .spans
            .iter()
            .map(|span| span.content.to_string())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["  ", "- ", "name", ":", " web"]);
    }
}
