mod theme;

use crate::app::{AppModel, Mode};
use crate::domain::{Action, CommandInfo, Context, GitStatus, WorkflowSource, WorkflowSummary};
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

/// Rows shown by the plain renderer when stdin is not a terminal.
const PLAIN_RESULTS: usize = 8;

pub fn render(frame: &mut Frame, model: &AppModel) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }
    frame.render_widget(Block::default().style(Style::default().bg(theme::BG)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, chunks[0], model);
    render_search_box(frame, chunks[1], model);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(chunks[2]);
    render_results(frame, body[0], model);
    render_workflow_panel(frame, body[1], model);

    render_footer(frame, chunks[3], model);
}

fn render_header(frame: &mut Frame, area: Rect, model: &AppModel) {
    let bar = Style::default().fg(theme::FG).bg(theme::BAR_BG);
    let mut spans = vec![
        Span::styled(
            " gitdeck ",
            Style::default()
                .fg(theme::ACCENT)
                .bg(theme::BAR_BG)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("[{}] ", model.ui.mode.label()), bar.fg(theme::MUTED)),
    ];

    match &model.git {
        Some(status) => spans.extend(git_spans(status, bar)),
        None => spans.push(Span::styled("no git status", bar.fg(theme::DIM))),
    }

    let used: usize = spans.iter().map(|span| span.content.width()).sum();
    let remaining = (area.width as usize).saturating_sub(used);
    spans.push(Span::styled(" ".repeat(remaining), bar));
    frame.render_widget(Paragraph::new(Line::from(spans)).style(bar), area);
}

fn git_spans(status: &GitStatus, base: Style) -> Vec<Span<'static>> {
    let mut spans = vec![Span::styled(
        status.branch.clone(),
        base.fg(theme::BRANCH).add_modifier(Modifier::BOLD),
    )];
    if status.has_upstream && (status.ahead > 0 || status.behind > 0) {
        spans.push(Span::styled(
            format!(" ↑{} ↓{}", status.ahead, status.behind),
            base.fg(theme::MUTED),
        ));
    }
    if status.is_clean() {
        spans.push(Span::styled(" clean", base.fg(theme::DIM)));
        return spans;
    }
    let counts = [
        (status.staged, '+', theme::STAGED),
        (status.modified, '~', theme::MODIFIED),
        (status.untracked, '?', theme::UNTRACKED),
    ];
    for (count, sign, color) in counts {
        if count > 0 {
            spans.push(Span::styled(format!(" {sign}{count}"), base.fg(color)));
        }
    }
    spans
}

fn render_search_box(frame: &mut Frame, area: Rect, model: &AppModel) {
    let searching = model.ui.mode == Mode::Search;
    let border = if searching && matches!(model.context(), Context::Input | Context::Search) {
        theme::BORDER_FOCUS
    } else {
        theme::BORDER
    };

    let text = if model.ui.input.is_empty() {
        Line::from(Span::styled(
            "Type to search git commands…",
            Style::default().fg(theme::DIM),
        ))
    } else {
        Line::from(Span::styled(model.ui.input.text(), Style::default().fg(theme::FG)))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .padding(Padding::horizontal(1))
        .title("Search");
    let inner = block.inner(area);
    frame.render_widget(Paragraph::new(text).block(block), area);

    if searching && inner.width > 0 && inner.height > 0 {
        let column = u16::try_from(model.ui.input.cursor_column()).unwrap_or(u16::MAX);
        let x = inner.x.saturating_add(column).min(inner.right().saturating_sub(1));
        frame.set_cursor_position(Position::new(x, inner.y));
    }
}

fn render_results(frame: &mut Frame, area: Rect, model: &AppModel) {
    let focused = model.ui.mode == Mode::Search;
    let title = format!("Commands ({}/{})", model.ui.filtered.len(), model.catalog.len());
    let block = panel_block(title, focused);

    if model.ui.filtered.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No matching commands. Press Esc to clear the filter.",
            Style::default().fg(theme::MUTED),
        ))
        .wrap(Wrap { trim: true })
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let max_width = (area.width as usize).saturating_sub(6);
    let items: Vec<ListItem> = model
        .ui
        .filtered
        .iter()
        .filter_map(|index| model.catalog.get(*index))
        .map(|entry| command_item(entry, max_width))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(theme::SELECTION_BG)
                .fg(theme::ACCENT)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    if focused {
        state.select(Some(model.ui.selected()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn command_item(entry: &CommandInfo, max_width: usize) -> ListItem<'static> {
    let command = truncate_end(&entry.command, max_width);
    let mut spans = template_spans(&command);
    let used = command.width();
    if used + 3 < max_width {
        let description = truncate_end(&entry.description, max_width - used - 3);
        spans.push(Span::raw("   "));
        spans.push(Span::styled(description, Style::default().fg(theme::DIM)));
    }
    ListItem::new(Line::from(spans))
}

/// Splits a step template so `<name>` placeholders stand out.
fn template_spans(template: &str) -> Vec<Span<'static>> {
    let plain = Style::default().fg(theme::FG);
    let marked = Style::default().fg(theme::PLACEHOLDER);
    let mut spans = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>').map(|offset| open + offset) else {
            break;
        };
        if open > 0 {
            spans.push(Span::styled(rest[..open].to_string(), plain));
        }
        spans.push(Span::styled(rest[open..=close].to_string(), marked));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        spans.push(Span::styled(rest.to_string(), plain));
    }
    spans
}

fn render_workflow_panel(frame: &mut Frame, area: Rect, model: &AppModel) {
    let focused = model.ui.mode == Mode::WorkflowManagement;
    if model.context() == Context::WorkflowSelection {
        render_workflow_list(frame, area, model);
        return;
    }

    let title = match model.active_summary() {
        Some(summary) => workflow_title(&summary),
        None => "Workflow".to_string(),
    };
    let block = panel_block(title, focused);

    let steps = model.active_steps();
    if steps.is_empty() {
        let hint = match key_hint(model, Context::Search, Action::AddToWorkflow) {
            Some(key) => format!("No steps yet. Press {key} on a command to add it."),
            None => "No steps yet.".to_string(),
        };
        let empty = Paragraph::new(Span::styled(hint, Style::default().fg(theme::MUTED)))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let max_width = (area.width as usize).saturating_sub(10);
    let items: Vec<ListItem> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut spans = vec![Span::styled(
                format!("{:>2}. ", index + 1),
                Style::default().fg(theme::DIM),
            )];
            spans.extend(template_spans(&truncate_end(&step.template(), max_width)));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(theme::SELECTION_BG).add_modifier(Modifier::BOLD))
        .highlight_symbol("▸ ");
    let mut state = ListState::default();
    if focused {
        state.select(Some(model.ui.step_cursor.min(steps.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_workflow_list(frame: &mut Frame, area: Rect, model: &AppModel) {
    let workflows = model.workflows.list_workflows();
    let block = panel_block("Select workflow".to_string(), true);
    if workflows.is_empty() {
        frame.render_widget(Paragraph::new("No workflows.").block(block), area);
        return;
    }

    let items: Vec<ListItem> = workflows
        .iter()
        .map(|summary| {
            let marker = if summary.is_active { "● " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(theme::ACCENT)),
                Span::styled(summary.name.clone(), Style::default().fg(theme::FG)),
                Span::styled(
                    format!("  {} steps", summary.step_count),
                    Style::default().fg(theme::DIM),
                ),
            ];
            if summary.read_only {
                spans.push(Span::styled(
                    format!("  {}", summary.source.label()),
                    Style::default().fg(theme::READ_ONLY),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(theme::SELECTION_BG).add_modifier(Modifier::BOLD))
        .highlight_symbol("▸ ");
    let mut state = ListState::default();
    state.select(Some(model.ui.workflow_cursor.min(workflows.len() - 1)));
    frame.render_stateful_widget(list, area, &mut state);
}

fn workflow_title(summary: &WorkflowSummary) -> String {
    let mut title = format!("Workflow: {} ({} steps)", summary.name, summary.step_count);
    if summary.read_only {
        title.push_str(" read-only");
    }
    title
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused { theme::BORDER_FOCUS } else { theme::BORDER };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .padding(Padding::horizontal(1))
        .title(title)
}

fn render_footer(frame: &mut Frame, area: Rect, model: &AppModel) {
    let line = match model.notice_text() {
        Some(notice) => Line::from(Span::styled(
            truncate_end(notice, area.width as usize),
            Style::default().fg(theme::NOTICE),
        )),
        None => Line::from(Span::styled(
            truncate_end(&footer_hints(model), area.width as usize),
            Style::default().fg(theme::MUTED),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn hint_actions(context: Context) -> &'static [(Action, &'static str)] {
    match context {
        Context::WorkflowView => &[
            (Action::WorkflowExecute, "run"),
            (Action::WorkflowCreate, "new"),
            (Action::WorkflowClone, "clone"),
            (Action::WorkflowSelect, "select"),
            (Action::WorkflowRemoveStep, "remove"),
            (Action::WorkflowClear, "clear"),
            (Action::WorkflowDelete, "delete"),
            (Action::ToggleWorkflowView, "search"),
        ],
        Context::WorkflowSelection => &[
            (Action::Submit, "activate"),
            (Action::WorkflowExecute, "run"),
            (Action::WorkflowCreate, "new"),
            (Action::WorkflowDelete, "delete"),
            (Action::WorkflowCancel, "back"),
        ],
        _ => &[
            (Action::Submit, "run"),
            (Action::AddToWorkflow, "add"),
            (Action::ToggleWorkflowView, "workflows"),
            (Action::SoftCancel, "clear"),
            (Action::Quit, "quit"),
        ],
    }
}

fn key_hint(model: &AppModel, context: Context, action: Action) -> Option<String> {
    model
        .bindings
        .snapshot()
        .keys(context, action)
        .first()
        .map(ToString::to_string)
}

fn footer_hints(model: &AppModel) -> String {
    hint_actions(model.context())
        .iter()
        .filter_map(|(action, label)| model.bindings.hint(*action).map(|key| format!("{key} {label}")))
        .collect::<Vec<_>>()
        .join("  ·  ")
}

/// Text rendition for piped stdin, printed after each handled line.
pub fn render_plain(model: &AppModel) -> Vec<String> {
    let mut lines = Vec::new();
    let git = match &model.git {
        Some(status) => git_spans(status, Style::default())
            .iter()
            .map(|span| span.content.as_ref())
            .collect::<String>(),
        None => "no git status".to_string(),
    };
    lines.push(format!("gitdeck [{}] {git}", model.ui.mode.label()));

    match model.ui.mode {
        Mode::Search => {
            lines.push(format!("> {}", model.ui.input.text()));
            let selected = model.ui.selected();
            for (row, index) in model.ui.filtered.iter().take(PLAIN_RESULTS).enumerate() {
                let Some(entry) = model.catalog.get(*index) else {
                    continue;
                };
                let marker = if row == selected { '>' } else { ' ' };
                lines.push(format!("{marker} {}  {}", entry.command, entry.description));
            }
            let hidden = model.ui.filtered.len().saturating_sub(PLAIN_RESULTS);
            if hidden > 0 {
                lines.push(format!("  … {hidden} more"));
            }
        }
        Mode::WorkflowManagement if model.context() == Context::WorkflowSelection => {
            for (row, summary) in model.workflows.list_workflows().iter().enumerate() {
                let marker = if row == model.ui.workflow_cursor { '>' } else { ' ' };
                let active = if summary.is_active { '*' } else { ' ' };
                let source = match summary.source {
                    WorkflowSource::Config => " (config)",
                    WorkflowSource::Dynamic => "",
                };
                lines.push(format!(
                    "{marker}{active}{} [{} steps]{source}",
                    summary.name, summary.step_count
                ));
            }
        }
        Mode::WorkflowManagement => {
            match model.active_summary() {
                Some(summary) => lines.push(workflow_title(&summary)),
                None => lines.push("No active workflow".to_string()),
            }
            for (row, step) in model.active_steps().iter().enumerate() {
                let marker = if row == model.ui.step_cursor { '>' } else { ' ' };
                lines.push(format!("{marker}{:>2}. {}", row + 1, step.template()));
            }
        }
    }

    match model.notice_text() {
        Some(notice) => lines.push(format!("! {notice}")),
        None => lines.push(footer_hints(model)),
    }
    lines
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if text.width() <= max_width {
        return text.to_string();
    }
    let available = max_width.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let width = crate::app::rune_width(ch);
        if used + width > available {
            break;
        }
        used += width;
        out.push(ch);
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppEvent, update};
    use crate::domain::{
        CommandInfo, ContextualKeyBindingMap, KeyBindingResolver, KeyStroke, WorkflowManager,
    };
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn model() -> AppModel {
        let catalog: Arc<[CommandInfo]> = vec![
            CommandInfo::new("status", "Show the working tree status"),
            CommandInfo::new("commit -m <message>", "Commit with a message"),
            CommandInfo::new("push", "Update the remote branch"),
        ]
        .into();
        AppModel::new(
            catalog,
            Arc::new(WorkflowManager::new()),
            Arc::new(KeyBindingResolver::new(ContextualKeyBindingMap::builtin())),
        )
    }

    fn screen(model: &AppModel) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        terminal.draw(|frame| render(frame, model)).expect("draw");
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn draws_catalog_and_git_header() {
        let mut model = model();
        model.git = Some(GitStatus {
            branch: "main".to_string(),
            staged: 2,
            modified: 1,
            ..GitStatus::default()
        });
        let text = screen(&model);
        assert!(text.contains("gitdeck"));
        assert!(text.contains("main"));
        assert!(text.contains("+2"));
        assert!(text.contains("commit -m <message>"));
        assert!(text.contains("Commands (3/3)"));
    }

    #[test]
    fn footer_prefers_the_notice() {
        let mut model = model();
        assert!(screen(&model).contains("Enter run"));
        model.post_notice("Added 'push' to Workflow 1");
        assert!(screen(&model).contains("Added 'push'"));
    }

    #[test]
    fn template_spans_mark_placeholders() {
        let spans = template_spans("tag -a <name> -m <message>");
        let parts: Vec<&str> = spans.iter().map(|span| span.content.as_ref()).collect();
        assert_eq!(parts, vec!["tag -a ", "<name>", " -m ", "<message>"]);
        assert_eq!(template_spans("log <broken").len(), 1);
    }

    #[test]
    fn plain_rendering_follows_mode() {
        let model = model();
        let (model, _) = update(model, AppEvent::Key(KeyStroke::Char('p')));
        let lines = render_plain(&model);
        assert_eq!(lines[1], "> p");
        assert!(lines.iter().any(|line| line.starts_with("> push")));

        let (model, _) = update(model, AppEvent::Key(KeyStroke::Ctrl('t')));
        let (model, _) = update(model, AppEvent::Key(KeyStroke::tab()));
        let lines = render_plain(&model);
        assert!(lines.iter().any(|line| line.contains("1. push")), "{lines:?}");
    }

    #[test]
    fn truncation_respects_wide_characters() {
        assert_eq!(truncate_end("status", 10), "status");
        assert_eq!(truncate_end("status", 4), "sta…");
        assert_eq!(truncate_end("日本語です", 5), "日本…");
        assert_eq!(truncate_end("anything", 0), "");
    }
}
