use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row as TableRow, Table,
    TableState, Wrap,
};

use crate::app::{App, LoginField, Modal};
use crate::kinds::ResourceKind;

const BG: Color = Color::Rgb(12, 16, 24);
const PANEL: Color = Color::Rgb(20, 28, 42);
const ACCENT: Color = Color::Rgb(96, 165, 250);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_kind_bar(frame, root[1], app);
    render_body(frame, root[2], app);
    render_footer(frame, root[3], app);

    match app.modal() {
        Modal::None => {}
        Modal::Menu {
            title,
            items,
            selected,
            search,
        } => render_menu(frame, title, items, *selected, search),
        Modal::Confirm { title, message, .. } => render_confirm(frame, title, message),
        Modal::Login {
            server,
            username,
            password,
            field,
        } => render_login(frame, server, username, password, *field),
        Modal::Rescale { name, input, .. } => render_rescale(frame, name, input),
        Modal::Report { title, detail } => render_report(frame, title, detail),
        Modal::Notice { message } => render_notice(frame, message),
    }

    if let Some(message) = app.waiting() {
        render_waiting(frame, message);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled(
            " OCULAR ",
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(app.server().to_string(), Style::default().fg(MUTED)),
        Span::raw("  "),
        Span::styled(
            format!("user:{}", display_or_dash(app.username())),
            Style::default().fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled(
            format!("ns:{}", app.namespace()),
            Style::default().fg(WARN),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn render_kind_bar(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (index, kind) in ResourceKind::TOP_LEVEL.iter().enumerate() {
        let label = format!(" [{}] {} ", index + 1, kind.title().to_ascii_lowercase());
        let style = if kind == app.kind() {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED).bg(PANEL)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    if let ResourceKind::ReplicaSets { owner } | ResourceKind::ReplicationControllers { owner } =
        app.kind()
    {
        spans.push(Span::styled(
            format!(" {} of {} ", app.kind().title().to_ascii_lowercase(), owner),
            Style::default().fg(Color::Black).bg(WARN),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    if app.shows_placeholder() {
        let placeholder = Paragraph::new(app.placeholder_text())
            .alignment(Alignment::Center)
            .style(Style::default().fg(MUTED).bg(BG))
            .block(Block::default().borders(Borders::ALL).style(Style::default().bg(BG)));
        frame.render_widget(placeholder, area);
        return;
    }

    let table = app.table();
    let header = TableRow::new(
        table
            .headers
            .iter()
            .map(|header| {
                Cell::from(header.clone()).style(
                    Style::default()
                        .fg(ACCENT)
                        .add_modifier(Modifier::BOLD),
                )
            })
            .collect::<Vec<_>>(),
    );
    let rows = table
        .rows
        .iter()
        .map(|row| {
            TableRow::new(
                row.cells
                    .iter()
                    .map(|cell| Cell::from(cell.clone()))
                    .collect::<Vec<_>>(),
            )
        })
        .collect::<Vec<_>>();

    let column_count = table.headers.len().max(1) as u32;
    let widths = table
        .headers
        .iter()
        .enumerate()
        .map(|(index, _)| {
            if index == 0 {
                Constraint::Ratio(2, column_count + 1)
            } else {
                Constraint::Ratio(1, column_count + 1)
            }
        })
        .collect::<Vec<_>>();

    let widget = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(
            Style::default()
                .bg(PANEL)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).style(Style::default().bg(BG)));

    let mut state = TableState::default();
    state.select(Some(table.selected));
    frame.render_stateful_widget(widget, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let refreshed = app
        .table()
        .last_refreshed
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let line = Line::from(vec![
        Span::styled(format!(" {} ", app.status()), Style::default().fg(Color::White)),
        Span::styled(
            format!(
                " refreshed {refreshed}  enter:ops n:namespaces y:yaml e:edit \
                 del:delete shift+del:delete-all q:quit "
            ),
            Style::default().fg(MUTED),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn render_menu(
    frame: &mut Frame,
    title: &str,
    items: &[crate::app::MenuItem],
    selected: usize,
    search: &str,
) {
    let height = (items.len() as u16 + 4).min(frame.area().height.saturating_sub(2));
    let area = centered_rect(40, height, frame.area());
    frame.render_widget(Clear, area);

    let entries = items
        .iter()
        .map(|item| ListItem::new(item.label.clone()))
        .collect::<Vec<_>>();
    let footer = if search.is_empty() {
        title.to_string()
    } else {
        format!("{title} /{search}")
    };
    let list = List::new(entries)
        .highlight_style(
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(footer)
                .style(Style::default().bg(PANEL)),
        );
    let mut state = ListState::default();
    state.select(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_confirm(frame: &mut Frame, title: &str, message: &str) {
    let area = centered_rect(52, 6, frame.area());
    frame.render_widget(Clear, area);
    let body = Paragraph::new(vec![
        Line::raw(message.to_string()),
        Line::raw(""),
        Line::styled("[y]es / [n]o", Style::default().fg(WARN)),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(body, area);
}

fn render_login(frame: &mut Frame, server: &str, username: &str, password: &str, field: LoginField) {
    let area = centered_rect(60, 9, frame.area());
    frame.render_widget(Clear, area);
    let mask = "*".repeat(password.chars().count());
    let row = |label: &str, value: &str, active: bool| {
        let marker = if active { "> " } else { "  " };
        Line::from(vec![
            Span::styled(
                format!("{marker}{label:<9}"),
                if active {
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(MUTED)
                },
            ),
            Span::raw(value.to_string()),
        ])
    };
    let body = Paragraph::new(vec![
        row("server", server, field == LoginField::Server),
        row("user", username, field == LoginField::Username),
        row("password", &mask, field == LoginField::Password),
        Line::raw(""),
        Line::styled(
            "tab: next field  enter: log in  esc: quit",
            Style::default().fg(MUTED),
        ),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Please log in")
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(body, area);
}

fn render_rescale(frame: &mut Frame, name: &str, input: &str) {
    let area = centered_rect(48, 5, frame.area());
    frame.render_widget(Clear, area);
    let body = Paragraph::new(vec![
        Line::raw(format!("Set new #replicas for {name}")),
        Line::styled(format!("> {input}"), Style::default().fg(ACCENT)),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Rescale")
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(body, area);
}

fn render_report(frame: &mut Frame, title: &str, detail: &str) {
    // Full-screen, dismissible; the table stays untouched beneath it.
    let area = frame.area();
    frame.render_widget(Clear, area);
    let body = Paragraph::new(detail.to_string())
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White).bg(BG))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{title} (enter/esc to dismiss)"))
                .style(Style::default().fg(ERROR).bg(BG)),
        );
    frame.render_widget(body, area);
}

fn render_notice(frame: &mut Frame, message: &str) {
    let area = centered_rect(50, 5, frame.area());
    frame.render_widget(Clear, area);
    let body = Paragraph::new(vec![
        Line::raw(message.to_string()),
        Line::styled("enter/esc to dismiss", Style::default().fg(MUTED)),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Notice")
            .style(Style::default().bg(PANEL).fg(WARN)),
    );
    frame.render_widget(body, area);
}

fn render_waiting(frame: &mut Frame, message: &str) {
    let area = centered_rect(40, 3, frame.area());
    frame.render_widget(Clear, area);
    let body = Paragraph::new(message.to_string())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Please wait")
                .style(Style::default().bg(PANEL).fg(WARN)),
        );
    frame.render_widget(body, area);
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
