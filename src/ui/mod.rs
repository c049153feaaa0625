mod theme;

use crate::app::{AppModel, ClearConfirmDialog, ClearConfirmSelection, NoticeKind};
use crate::domain::{ChangeCategory, DashboardViewModel, ValidationState};
use ratatui::prelude::*;
use ratatui::widgets::*;
use time::macros::format_description;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn render(frame: &mut Frame, model: &AppModel) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    frame.render_widget(Block::default().style(Style::default().fg(theme::FG)), full_area);

    let view = DashboardViewModel::build(&model.logs, &model.session, &model.validator);
    let area = inner_area(full_area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Length(10),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_path_input(frame, chunks[0], model, &view);
    render_status_line(frame, chunks[1], model, &view);
    render_category_cards(frame, chunks[2], &view);
    render_chart(frame, chunks[3], &view);
    render_change_log(frame, chunks[4], model, &view);
    frame.render_widget(footer_line(model), chunks[5]);

    if model.help_open {
        render_help_overlay(frame, area);
    }

    if let Some(confirm) = &model.clear_confirm {
        render_clear_confirm_overlay(frame, area, confirm);
    }
}

fn render_path_input(frame: &mut Frame, area: Rect, model: &AppModel, view: &DashboardViewModel) {
    let validity_color = match model.validator.state() {
        ValidationState::Unvalidated => theme::DIM,
        ValidationState::Pending(_) => theme::MUTED,
        ValidationState::Valid(_) => theme::SUCCESS,
        ValidationState::Invalid(_) => theme::ERROR,
    };
    let validity_label = match model.validator.check_failed() {
        Some(reason) => format!(
            "{}: {}",
            view.validity_label,
            truncate_end(reason, (area.width as usize / 2).max(8))
        ),
        None => view.validity_label.to_string(),
    };

    let border = if model.session.is_monitoring() {
        theme::ACCENT
    } else {
        theme::BORDER
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .padding(Padding::horizontal(1))
        .title(" Directory to monitor ")
        .title(
            Line::from(Span::styled(
                format!(" {validity_label} "),
                Style::default()
                    .fg(validity_color)
                    .add_modifier(Modifier::BOLD),
            ))
            .right_aligned(),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let text = model.path_input.text();
    let cursor_col = model.path_input.cursor_col();
    if text.is_empty() {
        frame.render_widget(
            Paragraph::new("Type a directory path, e.g. /var/log")
                .style(Style::default().fg(theme::DIM)),
            inner,
        );
    } else {
        let (visible, _) = visible_input(text, cursor_col, inner.width as usize);
        frame.render_widget(Paragraph::new(visible), inner);
    }

    if model.help_open || model.clear_confirm.is_some() {
        return;
    }
    let (_, cursor_x) = visible_input(text, cursor_col, inner.width as usize);
    let x = inner
        .x
        .saturating_add(cursor_x as u16)
        .min(inner.x.saturating_add(inner.width.saturating_sub(1)));
    frame.set_cursor_position(Position { x, y: inner.y });
}

fn render_status_line(frame: &mut Frame, area: Rect, model: &AppModel, view: &DashboardViewModel) {
    let session_color = if model.session.is_monitoring() {
        theme::SUCCESS
    } else if model.session.is_busy() {
        theme::WARNING
    } else {
        theme::MUTED
    };
    let last_refresh = model
        .last_refreshed
        .and_then(|at| at.format(format_description!("[hour]:[minute]:[second]")).ok())
        .unwrap_or_else(|| "never".to_string());
    let loading = if view.loading { "  ·  refreshing…" } else { "" };

    let max_dir_width = (area.width as usize).saturating_sub(70).max(12);
    let spans = vec![
        Span::styled("● ", Style::default().fg(session_color)),
        Span::styled(
            view.session_label,
            Style::default()
                .fg(session_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ·  Directory: ", Style::default().fg(theme::DIM)),
        Span::raw(truncate_middle(view.bound_directory_label(), max_dir_width)),
        Span::styled("  ·  Service: ", Style::default().fg(theme::DIM)),
        Span::raw(model.service_url.clone()),
        Span::styled("  ·  Last refresh: ", Style::default().fg(theme::DIM)),
        Span::raw(last_refresh),
        Span::styled(loading, Style::default().fg(theme::MUTED)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_category_cards(frame: &mut Frame, area: Rect, view: &DashboardViewModel) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 6); 6])
        .split(area);

    render_card(frame, columns[0], "Total", view.total(), theme::ACCENT);
    for (idx, (category, count)) in view.category_counts.iter().enumerate() {
        let color = theme::category_color(category.color());
        render_card(frame, columns[idx + 1], category.label(), count, color);
    }
}

fn render_card(frame: &mut Frame, area: Rect, label: &str, count: usize, color: Color) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .title(Span::styled(
            format!(" {label} "),
            Style::default().fg(theme::MUTED),
        ));
    let value = Paragraph::new(Span::styled(
        count.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(value, area);
}

fn render_chart(frame: &mut Frame, area: Rect, view: &DashboardViewModel) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .title(" Changes by category ");
    let inner_width = block.inner(area).width;

    let series_len = view.chart_series.len().max(1) as u16;
    let gap = 2u16;
    let bar_width = (inner_width.saturating_sub(gap * series_len) / series_len).clamp(3, 14);

    let bars = view
        .chart_series
        .iter()
        .map(|(category, count)| {
            let color = theme::category_color(category.color());
            Bar::default()
                .value(*count as u64)
                .label(Line::from(truncate_end(category.label(), bar_width as usize)))
                .style(Style::default().fg(color))
                .value_style(Style::default().fg(theme::SURFACE).bg(color))
        })
        .collect::<Vec<_>>();

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width)
        .bar_gap(gap)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_change_log(frame: &mut Frame, area: Rect, model: &AppModel, view: &DashboardViewModel) {
    let title = if view.display_log.is_empty() {
        " Change log ".to_string()
    } else {
        format!(" Change log ({}) · newest first ", view.display_log.len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .padding(Padding::horizontal(1))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if view.display_log.is_empty() {
        let hint = if view.loading {
            "Loading logs…"
        } else {
            "No changes recorded yet."
        };
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().fg(theme::DIM)),
            inner,
        );
        return;
    }

    let timestamp_width = view
        .display_log
        .iter()
        .map(|item| UnicodeWidthStr::width(item.entry.timestamp.as_str()))
        .max()
        .unwrap_or(0)
        .min(26);
    let label_width = ChangeCategory::ALL
        .iter()
        .map(|category| category.label().len())
        .max()
        .unwrap_or(0);
    let message_width = (inner.width as usize).saturating_sub(timestamp_width + label_width + 4);

    let items = view
        .display_log
        .iter()
        .skip(model.log_scroll)
        .take(inner.height as usize)
        .map(|item| {
            let color = theme::category_color(item.color);
            ListItem::new(Line::from(vec![
                Span::styled(
                    pad_right(
                        &truncate_end(&item.entry.timestamp, timestamp_width),
                        timestamp_width,
                    ),
                    Style::default().fg(theme::DIM),
                ),
                Span::raw("  "),
                Span::styled(
                    pad_right(item.category.label(), label_width),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(
                    truncate_end(&item.entry.message, message_width),
                    Style::default().fg(color),
                ),
            ]))
        })
        .collect::<Vec<_>>();

    frame.render_widget(List::new(items), inner);
}

fn footer_line(model: &AppModel) -> Paragraph<'static> {
    let toggle = if model.session.is_monitoring() {
        "Enter=stop"
    } else {
        "Enter=start"
    };
    let mut spans = vec![Span::styled(
        format!(
            "Keys: {toggle}  Ctrl+R/F5=refresh  Ctrl+L=clear logs  ↑/↓ PgUp/PgDn=scroll  Ctrl+Q/Ctrl+C=quit  F1=help"
        ),
        Style::default().fg(theme::DIM),
    )];

    if let Some(notice) = model.notice.as_ref().filter(|notice| !notice.text.trim().is_empty()) {
        let color = match notice.kind {
            NoticeKind::Info => theme::SUCCESS,
            NoticeKind::Error => theme::ERROR,
        };
        spans.push(Span::styled("  ·  ", Style::default().fg(theme::DIM)));
        spans.push(Span::styled(
            notice.text.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    Paragraph::new(Line::from(spans))
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup);

    let text = vec![
        Line::from("Directory"),
        Line::from("  - Type or paste a path; it is checked with the monitor service as you type"),
        Line::from("  - ←/→ Home/End: move cursor, Ctrl+W: delete segment, Ctrl+U: clear"),
        Line::from(""),
        Line::from("Monitoring"),
        Line::from("  - Enter or Ctrl+S: start monitoring a valid directory, or stop"),
        Line::from("  - Logs refresh automatically while monitoring"),
        Line::from(""),
        Line::from("Logs"),
        Line::from("  - Ctrl+R or F5: refresh now"),
        Line::from("  - Ctrl+L: clear all logs on the service (asks first)"),
        Line::from("  - ↑/↓ PgUp/PgDn: scroll the change log"),
        Line::from(""),
        Line::from("Global"),
        Line::from("  - Ctrl+Q or Ctrl+C: quit"),
        Line::from("  - F1: toggle this help"),
    ];

    let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .padding(Padding::horizontal(1))
            .title("Help (F1 or Esc to close)"),
    );
    frame.render_widget(paragraph, popup);
}

fn render_clear_confirm_overlay(frame: &mut Frame, area: Rect, confirm: &ClearConfirmDialog) {
    let popup = centered_rect(60, 40, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .padding(Padding::horizontal(1))
        .title("Clear Logs");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(inner);

    let entry_word = if confirm.entry_count == 1 {
        "entry"
    } else {
        "entries"
    };
    let message = vec![
        Line::from(vec![
            Span::raw("Clear "),
            Span::styled(
                format!("{} {entry_word}", confirm.entry_count),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" from the change log?"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "This deletes the logs on the monitor service for every client.",
            Style::default()
                .fg(theme::WARNING)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    frame.render_widget(Paragraph::new(message).wrap(Wrap { trim: false }), chunks[0]);

    let cancel_style = if confirm.selection == ClearConfirmSelection::Cancel {
        Style::default()
            .add_modifier(Modifier::REVERSED)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let clear_base = Style::default().fg(theme::ERROR);
    let clear_style = if confirm.selection == ClearConfirmSelection::Clear {
        clear_base
            .add_modifier(Modifier::REVERSED)
            .add_modifier(Modifier::BOLD)
    } else {
        clear_base.add_modifier(Modifier::BOLD)
    };

    let buttons = Paragraph::new(Line::from(vec![
        Span::styled("[ Cancel ]", cancel_style),
        Span::raw("   "),
        Span::styled("[ Clear ]", clear_style),
    ]))
    .alignment(Alignment::Center);
    frame.render_widget(buttons, chunks[1]);

    let hint = Paragraph::new("Keys: ←/→ choose  Enter confirm  Esc cancel  y/n")
        .style(Style::default().fg(theme::DIM))
        .alignment(Alignment::Center);
    frame.render_widget(hint, chunks[2]);
}

/// Slice of `text` that fits `width` cells while keeping the cursor visible, plus the cursor's
/// cell offset within that slice.
fn visible_input(text: &str, cursor_col: usize, width: usize) -> (String, usize) {
    if width == 0 {
        return (String::new(), 0);
    }
    let chars = text.chars().collect::<Vec<_>>();
    let cursor_col = cursor_col.min(chars.len());
    let char_width = |ch: &char| UnicodeWidthChar::width(*ch).unwrap_or(0);

    let mut start = 0;
    while start < cursor_col
        && chars[start..cursor_col]
            .iter()
            .map(char_width)
            .sum::<usize>()
            >= width
    {
        start += 1;
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in &chars[start..] {
        let w = char_width(ch);
        if used + w > width {
            break;
        }
        used += w;
        out.push(*ch);
    }
    let cursor_x = chars[start..cursor_col].iter().map(char_width).sum();
    (out, cursor_x)
}

fn inner_area(area: Rect) -> Rect {
    if area.width < 60 || area.height < 24 {
        return area;
    }
    area.inner(Margin {
        vertical: 1,
        horizontal: 2,
    })
}

fn pad_right(text: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(text);
    if w >= width {
        return text.to_string();
    }
    format!("{text}{}", " ".repeat(width - w))
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let ellipsis = "…";
    let available = max_width.saturating_sub(UnicodeWidthStr::width(ellipsis));
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > available {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str(ellipsis);
    out
}

fn truncate_middle(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let available = max_width.saturating_sub(1);
    if available <= 4 {
        return truncate_end(text, max_width);
    }

    let left_width = available / 2;
    let right_width = available - left_width;
    let left = take_width(text.chars(), left_width);
    let right = take_width(text.chars().rev(), right_width)
        .chars()
        .rev()
        .collect::<String>();
    format!("{left}…{right}")
}

fn take_width(chars: impl Iterator<Item = char>, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in chars {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
