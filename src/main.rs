use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use docrag::{
    ChatModel, CondenseQuestionEngine, Config, Dispatch, Embedder, IndexProvider, IndexSource,
    Interaction, OpenAiChat, OpenAiEmbedder, Role, Session, TurnState, VectorIndex, respond,
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const TITLE: &str = "Chat with the MDC/PPX docs 💬";
const BANNER: &str = "📃 Check out the full MDC tutorial: https://pages.github.tools.sap/sfmobile/mdc-docs/";
const LOADING_TEXT: &str = "Loading and indexing the MDC docs - hang tight! This should take 1-2 minutes.";

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = Config::from_env().map_err(|err| io::Error::other(err.to_string()))?;
    let _log_guard = init_logging(&cfg.log_dir);
    tracing::info!(
        docs = %cfg.docs_dir.display(),
        persist = ?cfg.persist_dir,
        model = %cfg.llm.model,
        "starting mdc-chat"
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(Arc::new(cfg));
    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn init_logging(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "mdc-chat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mdc_chat=info,docrag=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();
    guard
}

enum IndexStatus {
    Loading,
    Ready { source: IndexSource, nodes: usize },
    Failed(String),
}

enum Response {
    Index(Result<(Arc<VectorIndex>, IndexSource), String>),
    Token(String),
    Done(Result<String, String>),
}

struct App {
    cfg: Arc<Config>,
    provider: Arc<IndexProvider>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    index: Option<Arc<VectorIndex>>,
    index_status: IndexStatus,
    session: Session,
    input: String,
    cursor: usize,
    notice: Option<String>,
    scroll: usize,
    content_len: usize,
    view_height: usize,
    auto_scroll: bool,
    spinner_idx: usize,
}

impl App {
    fn new(cfg: Arc<Config>) -> Self {
        Self {
            provider: Arc::new(IndexProvider::new(cfg.as_ref().clone())),
            embedder: Arc::new(OpenAiEmbedder::from_config(&cfg)),
            chat: Arc::new(OpenAiChat::from_config(&cfg)),
            index: None,
            index_status: IndexStatus::Loading,
            session: Session::new(cfg.greeting.clone()),
            input: String::new(),
            cursor: 0,
            notice: None,
            scroll: 0,
            content_len: 0,
            view_height: 0,
            auto_scroll: true,
            spinner_idx: 0,
            cfg,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self.index_status, IndexStatus::Loading)
            || self.session.state() == TurnState::AwaitingResponse
    }

    fn load_index(&mut self, tx: mpsc::UnboundedSender<Response>) {
        self.index_status = IndexStatus::Loading;
        let provider = self.provider.clone();
        let embedder = self.embedder.clone();
        tokio::task::spawn_blocking(move || {
            let result = provider
                .get_with_source(embedder.as_ref())
                .map_err(|err| err.to_string());
            let _ = tx.send(Response::Index(result));
        });
    }

    fn on_index(&mut self, result: Result<(Arc<VectorIndex>, IndexSource), String>) {
        match result {
            Ok((index, source)) => {
                tracing::info!(?source, nodes = index.len(), "index ready");
                self.index_status = IndexStatus::Ready {
                    source,
                    nodes: index.len(),
                };
                self.index = Some(index);
            }
            Err(err) => {
                tracing::error!(error = %err, "index unavailable");
                self.index_status = IndexStatus::Failed(err);
            }
        }
    }

    fn submit(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.input.trim().is_empty() {
            return;
        }
        if self.index.is_none() {
            self.notice = Some("The docs index is not ready yet.".to_string());
            return;
        }
        if self.session.state() == TurnState::AwaitingResponse {
            self.notice = Some("Still answering the previous question.".to_string());
            return;
        }
        let prompt = std::mem::take(&mut self.input);
        self.cursor = 0;
        let dispatch = self.session.handle(Interaction::Message(prompt));
        self.dispatch(dispatch, tx);
    }

    /// Retries a failed index load, otherwise an unanswered question.
    fn rerender(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if matches!(self.index_status, IndexStatus::Failed(_)) {
            tracing::info!("retrying index load");
            self.notice = None;
            self.load_index(tx);
            return;
        }
        if self.index.is_none() {
            return;
        }
        let dispatch = self.session.handle(Interaction::Rerender);
        self.dispatch(dispatch, tx);
    }

    fn dispatch(&mut self, dispatch: Dispatch, tx: mpsc::UnboundedSender<Response>) {
        self.notice = None;
        match dispatch {
            Dispatch::Idle => {}
            Dispatch::Busy => {
                self.notice = Some("Still answering the previous question.".to_string());
            }
            Dispatch::Generate { prompt } => {
                let Some(index) = self.index.clone() else {
                    self.session.finish(Err("the docs index is not loaded".to_string()));
                    return;
                };
                let (embedder, chat, cfg) = (self.embedder.clone(), self.chat.clone(), self.cfg.clone());
                let engine = self.session.chat_engine(move || {
                    CondenseQuestionEngine::new(index, embedder, chat, cfg.llm.clone(), cfg.top_k)
                });
                self.auto_scroll = true;
                tokio::task::spawn_blocking(move || {
                    let token_tx = tx.clone();
                    let result = respond(&engine, &prompt, &mut |token: &str| {
                        let _ = token_tx.send(Response::Token(token.to_string()));
                    });
                    let _ = tx.send(Response::Done(
                        result.map(|r| r.response).map_err(|err| err.to_string()),
                    ));
                });
            }
        }
    }

    fn char_len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_at_cursor(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_at_cursor();
        self.input.insert(at, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_at_cursor();
        self.input.remove(at);
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    fn scroll_up(&mut self, by: usize) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(by);
    }

    fn scroll_down(&mut self, by: usize) {
        let max_scroll = self.content_len.saturating_sub(self.view_height);
        self.scroll = (self.scroll + by).min(max_scroll);
        self.auto_scroll = self.scroll == max_scroll;
    }

    fn scroll_to_start(&mut self) {
        self.auto_scroll = false;
        self.scroll = 0;
    }

    fn scroll_to_end(&mut self) {
        self.auto_scroll = true;
        self.scroll = self.content_len.saturating_sub(self.view_height);
    }
}

fn inner_width(area: ratatui::layout::Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: ratatui::layout::Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

fn visible_start(len: usize, cursor: usize, max_width: usize) -> usize {
    if len <= max_width {
        return 0;
    }
    let cursor = cursor.min(len);
    let start = cursor.saturating_sub(max_width / 2);
    start.min(len - max_width)
}

fn truncate_input(input: &str, cursor: usize, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = input.chars().count();
    let start = visible_start(len, cursor, max_width);
    input.chars().skip(start).take(max_width).collect()
}

fn cursor_x_in_view(input: &str, cursor: usize, max_width: usize) -> usize {
    if max_width == 0 {
        return 0;
    }
    let len = input.chars().count();
    let start = visible_start(len, cursor, max_width);
    cursor.min(len).saturating_sub(start).min(max_width)
}

/// Rows `lines` occupy once word-wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'static>], width: usize) -> usize {
    if width == 0 {
        return lines.len();
    }
    let width = u16::try_from(width).unwrap_or(u16::MAX);
    Paragraph::new(Text::from(lines.to_vec()))
        .wrap(Wrap { trim: false })
        .line_count(width)
}

fn history_lines(app: &App, spinner: &str) -> Vec<Line<'static>> {
    let user_style = Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD);
    let assistant_style = Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD);
    let body_style = Style::default();
    let muted = Style::default().fg(Color::DarkGray);

    let mut lines = Vec::new();
    let push_entry = |lines: &mut Vec<Line<'static>>, role: Role, content: &str| {
        let (label, style) = match role {
            Role::User => ("You", user_style),
            _ => ("Assistant", assistant_style),
        };
        lines.push(Line::from(Span::styled(label, style)));
        for text in content.lines() {
            lines.push(Line::from(Span::styled(text.to_string(), body_style)));
        }
        lines.push(Line::default());
    };

    for entry in app.session.transcript().entries() {
        push_entry(&mut lines, entry.role, &entry.content);
    }

    if let Some(partial) = app.session.streaming() {
        let content = if partial.is_empty() {
            format!("Thinking {}", spinner)
        } else {
            format!("{} {}", partial, spinner)
        };
        push_entry(&mut lines, Role::Assistant, &content);
    }

    match &app.index_status {
        IndexStatus::Loading => {
            lines.push(Line::from(Span::styled(format!("{} {}", LOADING_TEXT, spinner), muted)));
        }
        IndexStatus::Failed(err) => {
            lines.push(Line::from(Span::styled(
                format!("Could not load the docs index: {}  (Ctrl+L to retry)", err),
                Style::default().fg(Color::Red),
            )));
        }
        IndexStatus::Ready { .. } => {}
    }

    if let Some(err) = app.session.last_error() {
        lines.push(Line::from(Span::styled(
            format!("Error: {}  (Ctrl+L to retry)", err),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(notice) = &app.notice {
        lines.push(Line::from(Span::styled(notice.clone(), muted)));
    }

    lines
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let spinner = ["|", "/", "-", "\\"];

    terminal.draw(|frame| {
        let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
        let info_border = Style::default().fg(Color::Blue);
        let history_border = Style::default().fg(Color::Black);
        let input_border = Style::default().fg(Color::DarkGray);
        let help_border = Style::default().fg(Color::DarkGray);
        let info_text_style = Style::default().fg(Color::Blue);
        let help_text_style = Style::default().fg(Color::DarkGray);
        let input_text_style = Style::default().fg(Color::DarkGray);

        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Line::from(Span::styled(TITLE, title_style)));
        frame.render_widget(title, chunks[0]);

        let banner = Paragraph::new(BANNER)
            .style(info_text_style)
            .wrap(Wrap { trim: true })
            .block(Block::bordered().border_style(info_border));
        frame.render_widget(banner, chunks[1]);

        let history_title = match &app.index_status {
            IndexStatus::Ready { source, nodes } => format!(
                "Messages  [{} chunks, {}]",
                nodes,
                match source {
                    IndexSource::Built => "built",
                    IndexSource::Loaded => "loaded from storage",
                }
            ),
            IndexStatus::Loading => "Messages  [indexing]".to_string(),
            IndexStatus::Failed(_) => "Messages  [no index]".to_string(),
        };
        let history_block = Block::bordered()
            .title(history_title)
            .title_style(title_style)
            .border_style(history_border);

        let lines = history_lines(app, spinner[app.spinner_idx]);
        app.view_height = inner_height(chunks[2]);
        app.content_len = wrapped_height(&lines, inner_width(chunks[2]).saturating_sub(1));
        let max_scroll = app.content_len.saturating_sub(app.view_height);
        if app.auto_scroll || app.scroll > max_scroll {
            app.scroll = max_scroll;
        }

        let history = Paragraph::new(Text::from(lines))
            .scroll((app.scroll as u16, 0))
            .wrap(Wrap { trim: false })
            .block(history_block);
        frame.render_widget(history, chunks[2]);

        let mut scrollbar = ScrollbarState::new(app.content_len).position(app.scroll);
        let scrollbar_widget = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .track_style(Style::default().fg(Color::DarkGray))
            .thumb_style(Style::default().fg(Color::Blue));
        frame.render_stateful_widget(
            scrollbar_widget,
            chunks[2].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar,
        );

        let input_title = if app.is_busy() {
            format!("Ask a question {}", spinner[app.spinner_idx])
        } else {
            "Ask a question".to_string()
        };
        let input_block = Block::bordered()
            .title(input_title)
            .title_style(title_style)
            .border_style(input_border);
        let input_view = truncate_input(&app.input, app.cursor, inner_width(chunks[3]));
        let input = Paragraph::new(input_view)
            .style(input_text_style)
            .block(input_block);
        frame.render_widget(input, chunks[3]);

        let cursor_x = cursor_x_in_view(&app.input, app.cursor, inner_width(chunks[3]));
        let x = chunks[3].x + 1 + cursor_x as u16;
        let y = chunks[3].y + 1;
        frame.set_cursor_position((x, y));

        let help_block = Block::bordered()
            .title("Controls")
            .title_style(title_style)
            .border_style(help_border);
        let help = Paragraph::new(
            "Enter: Send | Ctrl+L: Redraw/Retry | Up/Down/PgUp/PgDn/Home/End: Scroll | Esc/Ctrl+C: Quit",
        )
        .style(help_text_style)
        .wrap(Wrap { trim: true })
        .block(help_block);
        frame.render_widget(help, chunks[4]);
    })?;

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    app.load_index(tx.clone());
    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.is_busy() {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_result = rx.recv() => {
                if let Some(result) = maybe_result {
                    match result {
                        Response::Index(res) => app.on_index(res),
                        Response::Token(token) => app.session.push_token(&token),
                        Response::Done(res) => app.session.finish(res),
                    }
                    draw_ui(terminal, app)?;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                            KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => app.rerender(tx.clone()),
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Enter => app.submit(tx.clone()),
                            KeyCode::Up => app.scroll_up(1),
                            KeyCode::Down => app.scroll_down(1),
                            KeyCode::PageUp => app.scroll_up(app.view_height.max(1)),
                            KeyCode::PageDown => app.scroll_down(app.view_height.max(1)),
                            KeyCode::Home => app.scroll_to_start(),
                            KeyCode::End => app.scroll_to_end(),
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) => app.insert_char(ch),
                            _ => {}
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(Event::Resize(_, _))) => draw_ui(terminal, app)?,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => tracing::warn!(error = %err, "terminal event error"),
                    None => return Ok(()),
                }
            }
        }
    }
}
