use crate::state::{App, Page, PageView};
use crate::theme::{
    age_color, battery_color, block_style, border_style, role_color, SELECTED_STYLE, THEME,
    TITLE_STYLE,
};
use crate::views::{
    ellipsize, Artifacts, DashboardView, DebugView, Feed, IntegrationsView, MemoryView,
    NoteStatus, NotesView, VoiceView,
};
use alex_core::topics;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.size();
    frame.render_widget(Block::default().style(block_style()), size);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(frame, app, layout[0]);
    match &app.view {
        PageView::Dashboard(view) => render_dashboard(frame, view, layout[1]),
        PageView::Notes(view) => render_notes(frame, view, app.scroll, layout[1]),
        PageView::Memory(view) => render_memory(frame, view, app.scroll, layout[1]),
        PageView::Integrations(view) => {
            render_integrations(frame, view, app.selected_integration, layout[1])
        }
        PageView::Voice(view) => render_voice(frame, view, app.selected_voice, layout[1]),
        PageView::Debug(view) => render_debug(frame, app, view, layout[1]),
    }
    render_footer(frame, app, layout[2]);

    if app.help_open {
        render_help_overlay(frame, app);
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style())
        .style(block_style())
        .title(Span::styled(format!(" {title} "), TITLE_STYLE))
}

fn muted(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(THEME.muted)))
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(14)])
        .split(area);

    let titles: Vec<Line> = Page::ALL
        .iter()
        .enumerate()
        .map(|(idx, page)| Line::from(format!("{} {}", idx + 1, page.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.page.index())
        .style(Style::default().fg(THEME.muted))
        .highlight_style(Style::default().fg(THEME.accent).add_modifier(Modifier::BOLD))
        .block(panel("ALEX"));
    frame.render_widget(tabs, columns[0]);

    let (label, color) = if app.connection.is_connected() {
        ("Online", THEME.ok)
    } else {
        ("Offline", THEME.critical)
    };
    let badge = Paragraph::new(Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .block(panel("Broker"));
    frame.render_widget(badge, columns[1]);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;
    let text = match app.status_note.as_deref() {
        Some(note) => note.to_string(),
        None => format!("{} | ? help, q quit", app.client.config().broker_label()),
    };
    let footer = Paragraph::new(Line::from(Span::styled(
        ellipsize(&text, width.max(8)),
        Style::default().fg(THEME.muted).bg(THEME.surface),
    )));
    frame.render_widget(footer, area);
}

fn render_dashboard(frame: &mut Frame, view: &DashboardView, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    let state_color = if view.agent_active {
        THEME.ok
    } else {
        THEME.muted
    };
    let mut agent_lines = vec![Line::from(Span::styled(
        view.agent_state.clone(),
        Style::default().fg(state_color).add_modifier(Modifier::BOLD),
    ))];
    if let Some(feedback) = &view.agent_feedback {
        agent_lines.push(Line::from(feedback.clone()));
    }
    agent_lines.push(muted("s start, x stop"));
    frame.render_widget(
        Paragraph::new(agent_lines)
            .wrap(Wrap { trim: true })
            .block(panel("Agent")),
        top[0],
    );

    let weather = vec![
        Line::from(Span::styled(
            view.temperature.clone(),
            Style::default().fg(THEME.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(view.weather.clone()),
    ];
    frame.render_widget(
        Paragraph::new(weather).block(panel("Weather")),
        top[1],
    );

    let battery = &view.battery;
    let label = match (battery.reported, battery.charging) {
        (false, _) => format!("{}% (waiting for device)", battery.level),
        (true, true) => format!("{}% charging", battery.level),
        (true, false) => format!("{}%", battery.level),
    };
    let gauge = Gauge::default()
        .block(panel("Battery"))
        .gauge_style(Style::default().fg(battery_color(battery.level, battery.charging)))
        .percent(battery.level.clamp(0, 100) as u16)
        .label(label);
    frame.render_widget(gauge, rows[1]);

    let summary = match &view.live_summary {
        Some(text) => Text::from(text.clone()),
        None => Text::from(muted("No live summary yet.")),
    };
    frame.render_widget(
        Paragraph::new(summary)
            .wrap(Wrap { trim: true })
            .block(panel("Live Summary")),
        rows[2],
    );
}

fn render_notes(frame: &mut Frame, view: &NotesView, scroll: u16, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    match &view.status {
        Some(NoteStatus::Progress {
            message,
            percent: Some(percent),
        }) => {
            let gauge = Gauge::default()
                .block(panel("Recording"))
                .gauge_style(Style::default().fg(THEME.accent))
                .percent((*percent).min(100))
                .label(ellipsize(message, rows[0].width.saturating_sub(4) as usize));
            frame.render_widget(gauge, rows[0]);
        }
        Some(NoteStatus::Progress {
            message,
            percent: None,
        })
        | Some(NoteStatus::Raw(message)) => {
            frame.render_widget(
                Paragraph::new(message.clone())
                    .wrap(Wrap { trim: true })
                    .block(panel("Recording")),
                rows[0],
            );
        }
        None => {
            frame.render_widget(
                Paragraph::new(muted("Idle. s start, x stop")).block(panel("Recording")),
                rows[0],
            );
        }
    }

    let body = match &view.artifacts {
        None => Text::from(muted("No notes processed yet.")),
        Some(Err(message)) => Text::from(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(THEME.critical),
        ))),
        Some(Ok(artifacts)) => artifact_text(artifacts),
    };
    frame.render_widget(
        Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(panel("Study Notes")),
        rows[1],
    );
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(THEME.accent).add_modifier(Modifier::BOLD),
    ))
}

fn artifact_text(artifacts: &Artifacts) -> Text<'static> {
    let mut lines = vec![section("Summary"), Line::from(artifacts.summary.clone())];

    if !artifacts.flashcards.is_empty() {
        lines.push(Line::default());
        lines.push(section("Flashcards"));
        for card in &artifacts.flashcards {
            lines.push(Line::from(format!("Q: {}", card.front)));
            lines.push(muted(format!("A: {}", card.back)));
        }
    }

    if !artifacts.quiz.is_empty() {
        lines.push(Line::default());
        lines.push(section("Quiz"));
        for (idx, item) in artifacts.quiz.iter().enumerate() {
            lines.push(Line::from(format!("{}. {}", idx + 1, item.question)));
            for option in &item.options {
                let style = if *option == item.correct_answer {
                    Style::default().fg(THEME.ok)
                } else {
                    Style::default().fg(THEME.muted)
                };
                lines.push(Line::from(Span::styled(format!("   - {option}"), style)));
            }
        }
    }

    if let Some(mindmap) = &artifacts.mindmap {
        lines.push(Line::default());
        lines.push(section("Mind Map"));
        lines.extend(mindmap.lines().map(|line| Line::from(line.to_string())));
    }

    if let Some(cornell) = &artifacts.cornell {
        lines.push(Line::default());
        lines.push(section("Cornell"));
        for cue in &cornell.cues {
            lines.push(Line::from(format!("* {cue}")));
        }
        if !cornell.notes.is_empty() {
            lines.push(Line::from(cornell.notes.clone()));
        }
        if !cornell.summary.is_empty() {
            lines.push(muted(cornell.summary.clone()));
        }
    }

    Text::from(lines)
}

fn feed_lines<T>(feed: &Feed<T>, empty: &str, item: impl Fn(&T) -> Line<'static>) -> Vec<Line<'static>> {
    match feed {
        Feed::Empty => vec![muted(empty)],
        Feed::Items(items) if items.is_empty() => vec![muted(empty)],
        Feed::Items(items) => items.iter().map(item).collect(),
        Feed::Raw(text) => text.lines().map(|line| Line::from(line.to_string())).collect(),
    }
}

fn render_memory(frame: &mut Frame, view: &MemoryView, scroll: u16, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(35),
            Constraint::Percentage(30),
        ])
        .split(columns[1]);

    let history = feed_lines(&view.history, "No conversation history.", |line| {
        Line::from(vec![
            Span::styled(
                format!("{}: ", line.role),
                Style::default()
                    .fg(role_color(&line.role))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(line.content.clone()),
        ])
    });
    frame.render_widget(
        Paragraph::new(history)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(panel("Conversation")),
        columns[0],
    );

    let activity = feed_lines(&view.activity, "No recent activity.", |entry| {
        Line::from(format!("- {entry}"))
    });
    frame.render_widget(
        Paragraph::new(activity)
            .wrap(Wrap { trim: true })
            .block(panel("Activity")),
        right[0],
    );

    let mut stats: Vec<Line> = view
        .stats
        .iter()
        .map(|(key, value)| {
            Line::from(vec![
                Span::styled(format!("{key}: "), Style::default().fg(THEME.muted)),
                Span::raw(value.clone()),
            ])
        })
        .collect();
    if stats.is_empty() {
        stats.push(muted("No stats reported."));
    }
    if let Some(context) = &view.context {
        stats.push(Line::default());
        stats.push(section("Context"));
        stats.push(Line::from(context.clone()));
    }
    frame.render_widget(
        Paragraph::new(stats)
            .wrap(Wrap { trim: true })
            .block(panel("Stats")),
        right[1],
    );

    let base = match &view.base {
        Some(text) => Text::from(text.clone()),
        None => Text::from(muted("Knowledge base not loaded.")),
    };
    frame.render_widget(
        Paragraph::new(base)
            .wrap(Wrap { trim: false })
            .block(panel("Knowledge Base")),
        right[2],
    );
}

fn render_integrations(frame: &mut Frame, view: &IntegrationsView, selected: usize, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(topics::INTEGRATIONS.len() as u16 + 2),
            Constraint::Min(0),
        ])
        .split(area);

    let items: Vec<ListItem> = topics::INTEGRATIONS
        .iter()
        .map(|integration| {
            ListItem::new(Line::from(vec![
                Span::raw(integration.name),
                Span::styled(
                    format!("  {}", integration.command),
                    Style::default().fg(THEME.muted),
                ),
            ]))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(selected));
    let list = List::new(items)
        .block(panel("Connect (Enter)"))
        .highlight_style(SELECTED_STYLE)
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, rows[0], &mut state);

    let auth = match &view.auth_url {
        Some(url) => Text::from(vec![
            Line::from("Open this link to finish authorization:"),
            Line::from(Span::styled(
                url.clone(),
                Style::default()
                    .fg(THEME.accent)
                    .add_modifier(Modifier::UNDERLINED),
            )),
        ]),
        None => Text::from(muted("No authorization link received.")),
    };
    frame.render_widget(
        Paragraph::new(auth)
            .wrap(Wrap { trim: false })
            .block(panel("Authorization")),
        rows[1],
    );
}

fn render_voice(frame: &mut Frame, view: &VoiceView, selected: usize, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    if view.voices.is_empty() {
        frame.render_widget(
            Paragraph::new(muted("Loading voices...")).block(panel("Voices")),
            rows[0],
        );
    } else {
        let items: Vec<ListItem> = view
            .voices
            .iter()
            .map(|voice| ListItem::new(voice.clone()))
            .collect();
        let mut state = ListState::default();
        state.select(Some(selected));
        let list = List::new(items)
            .block(panel("Voices (Enter to select)"))
            .highlight_style(SELECTED_STYLE)
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, rows[0], &mut state);
    }

    let status = match &view.status {
        Some(text) => Line::from(text.clone()),
        None => muted("No voice status."),
    };
    frame.render_widget(Paragraph::new(status).block(panel("Status")), rows[1]);
}

fn render_debug(frame: &mut Frame, app: &App, view: &DebugView, area: Rect) {
    let config = app.client.config();
    let mut lines = vec![
        Line::from(vec![
            Span::styled("state ", Style::default().fg(THEME.muted)),
            Span::raw(app.connection.to_string()),
            Span::styled("  client ", Style::default().fg(THEME.muted)),
            Span::raw(config.client_id.clone()),
            Span::styled("  broker ", Style::default().fg(THEME.muted)),
            Span::raw(config.broker_label()),
        ]),
        Line::default(),
    ];
    lines.push(Line::from(Span::styled(
        format!(
            "{:<32} {:>6} {:>6} {:<5} preview",
            "topic", "seq", "age", "kind"
        ),
        Style::default().fg(THEME.muted).add_modifier(Modifier::BOLD),
    )));
    if view.rows.is_empty() {
        lines.push(muted("Cache is empty."));
    }
    for row in &view.rows {
        lines.push(Line::from(vec![
            Span::raw(format!(
                "{:<32} {:>6} ",
                ellipsize(&row.topic, 32),
                row.seq
            )),
            Span::styled(
                format!("{:>5}s ", row.age_secs),
                Style::default().fg(age_color(row.age_secs)),
            ),
            Span::styled(format!("{:<5} ", row.kind), Style::default().fg(THEME.accent)),
            Span::raw(row.preview.clone()),
        ]));
    }
    let title = format!("Topic Cache ({} topics, seq {})", view.rows.len(), view.last_seq);
    frame.render_widget(
        Paragraph::new(lines)
            .scroll((app.scroll, 0))
            .block(panel(&title)),
        area,
    );
}

fn render_help_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 70, frame.size());
    let mut lines = vec![
        section("Navigation"),
        Line::from("  Tab/l    next page"),
        Line::from("  S-Tab/h  previous page"),
        Line::from("  1-6      jump to page"),
        Line::from("  r        re-request page data"),
        Line::from("  ?        toggle help"),
        Line::from("  q/Esc    quit"),
        Line::default(),
        section(app.page.title()),
    ];
    lines.extend(page_help(app.page).iter().map(|line| Line::from(*line)));
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines)
            .style(block_style())
            .block(panel("Help")),
        area,
    );
}

fn page_help(page: Page) -> &'static [&'static str] {
    match page {
        Page::Dashboard => &["  s        start agent", "  x        stop agent"],
        Page::Notes => &[
            "  s        start recording",
            "  x        stop recording",
            "  j/k      scroll notes",
        ],
        Page::Memory => &["  j/k      scroll conversation"],
        Page::Integrations => &["  j/k      select service", "  Enter    request auth link"],
        Page::Voice => &["  j/k      select voice", "  Enter    apply voice"],
        Page::Debug => &["  j/k      scroll rows"],
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}
