//! Terminal user interface for the recorder.
//!
//! One screen: title input, level bars, countdown gauge, status line and the
//! list of uploaded clips. Key handling depends on the recorder state; while
//! idle or holding a stopped clip, printable keys edit the title.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
};
use std::io::{self, Stdout};
use std::time::Duration;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use super::session::RecordingState;
use super::visualizer::{bar_color, bar_width, LevelFrame, BAR_GAP};
use crate::collector::AudioRecord;

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(206, 224, 220);
const HELP_FG: Color = Color::Rgb(100, 100, 100);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// No key, or a key with no meaning in this state
    Continue,
    /// Title text changed (idle, or holding a stopped clip)
    TitleEdited(String),
    /// Start recording with this title (Enter while idle)
    Start(String),
    /// Pause or resume (Space)
    TogglePause,
    /// Stop recording (Enter while recording or paused)
    Stop,
    /// Discard the session (Esc outside idle)
    Cancel,
    /// Upload the stopped clip (Enter when stopped or after a failed upload)
    Submit,
    /// Refetch the clip list (F5)
    Refresh,
    /// Play the selected clip (Ctrl+P)
    Play,
    /// Leave the recorder (Esc while idle, Ctrl+C anywhere)
    Quit,
}

/// Keyboard state: title editor plus clip selection.
#[derive(Debug, Default)]
pub struct RecorderInput {
    title: Input,
    selected: Option<usize>,
}

impl RecorderInput {
    pub fn title(&self) -> &str {
        self.title.value()
    }

    pub fn reset_title(&mut self) {
        self.title.reset();
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Keeps the selection inside a list of `len` clips.
    pub fn clamp_selection(&mut self, len: usize) {
        self.selected = match (self.selected, len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), len) => Some(i.min(len - 1)),
        };
    }

    /// Maps a key press to a command for the given recorder state.
    pub fn handle_key(&mut self, state: RecordingState, key: KeyEvent, clip_count: usize) -> UiCommand {
        if key.kind == KeyEventKind::Release {
            return UiCommand::Continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => return UiCommand::Quit,
            KeyCode::Char('p') if ctrl => return UiCommand::Play,
            KeyCode::F(5) => return UiCommand::Refresh,
            KeyCode::Up => {
                self.selected = self.selected.map(|i| i.saturating_sub(1));
                self.clamp_selection(clip_count);
                return UiCommand::Continue;
            }
            KeyCode::Down => {
                self.selected = self.selected.map(|i| i + 1);
                self.clamp_selection(clip_count);
                return UiCommand::Continue;
            }
            _ => {}
        }

        let has_title = self.has_title();
        match state {
            RecordingState::Idle => match key.code {
                KeyCode::Enter if has_title => UiCommand::Start(self.title.value().to_string()),
                KeyCode::Enter => UiCommand::Continue,
                KeyCode::Esc => UiCommand::Quit,
                _ => self.edit_title(key),
            },
            RecordingState::Recording | RecordingState::Paused => match key.code {
                KeyCode::Char(' ') => UiCommand::TogglePause,
                KeyCode::Enter => UiCommand::Stop,
                KeyCode::Esc => UiCommand::Cancel,
                _ => UiCommand::Continue,
            },
            RecordingState::Stopped | RecordingState::UploadFailed => match key.code {
                KeyCode::Enter if has_title => UiCommand::Submit,
                KeyCode::Enter => UiCommand::Continue,
                KeyCode::Esc => UiCommand::Cancel,
                _ => self.edit_title(key),
            },
            RecordingState::Uploading => UiCommand::Continue,
        }
    }

    fn has_title(&self) -> bool {
        !self.title.value().trim().is_empty()
    }

    fn edit_title(&mut self, key: KeyEvent) -> UiCommand {
        match self.title.handle_event(&Event::Key(key)) {
            Some(change) if change.value => UiCommand::TitleEdited(self.title.value().to_string()),
            _ => UiCommand::Continue,
        }
    }
}

/// The clip list pane.
#[derive(Debug, Clone, Copy)]
pub struct ClipsView<'a> {
    pub records: &'a [AudioRecord],
    pub error: Option<&'a str>,
    pub loading: bool,
    pub media_origin: &'a str,
}

/// Everything one frame shows.
#[derive(Debug, Clone, Copy)]
pub struct RecorderView<'a> {
    pub state: RecordingState,
    /// Session title (ignored while the title is editable; the editor's text
    /// is shown instead)
    pub title: &'a str,
    pub budget_remaining: u32,
    /// Fraction of the countdown used, 0.0..=1.0
    pub progress: f64,
    /// Length of the finalized clip, once stopped
    pub clip_secs: Option<f32>,
    pub frame: &'a LevelFrame,
    pub last_error: Option<&'a str>,
    /// Transient message, e.g. a rejected start
    pub notice: Option<&'a str>,
    pub clips: ClipsView<'a>,
}

/// Recorder screen in the alternate terminal buffer.
pub struct RecorderTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    input: RecorderInput,
    list_state: ListState,
    cleaned_up: bool,
}

impl RecorderTui {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            input: RecorderInput::default(),
            list_state: ListState::default(),
            cleaned_up: false,
        })
    }

    pub fn reset_title(&mut self) {
        self.input.reset_title();
    }

    pub fn selected_clip(&self) -> Option<usize> {
        self.input.selected()
    }

    pub fn render(&mut self, view: &RecorderView) -> Result<()> {
        self.input.clamp_selection(view.clips.records.len());
        self.list_state.select(self.input.selected());

        let input = &self.input;
        let list_state = &mut self.list_state;
        self.terminal.draw(|frame| draw_recorder(frame, view, input, list_state))?;
        Ok(())
    }

    /// Waits up to `timeout` for a key and maps it to a command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(
        &mut self,
        state: RecordingState,
        clip_count: usize,
        timeout: Duration,
    ) -> Result<UiCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                let command = self.input.handle_key(state, key, clip_count);
                if command != UiCommand::Continue {
                    tracing::debug!("Key {:?} while {}: {:?}", key.code, state, command);
                }
                return Ok(command);
            }
        }
        Ok(UiCommand::Continue)
    }

    /// Restores the terminal. Safe to call more than once.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for RecorderTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Draws one recorder frame.
pub fn draw_recorder(frame: &mut Frame, view: &RecorderView, input: &RecorderInput, list_state: &mut ListState) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(BG).fg(FG)), area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Percentage(35),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(Paragraph::new(status_line(view.state, view.clip_secs)), layout[0]);
    draw_title(frame, layout[1], view, input);
    draw_bars(frame, layout[2], view.frame);
    draw_countdown(frame, layout[3], view);

    let message = match (view.notice, view.last_error) {
        (Some(notice), _) => Line::from(Span::styled(notice.to_string(), Style::default().fg(Color::Yellow))),
        (None, Some(error)) => Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))),
        (None, None) => Line::default(),
    };
    frame.render_widget(Paragraph::new(message), layout[4]);

    draw_clips(frame, layout[5], &view.clips, list_state);

    frame.render_widget(
        Paragraph::new(help_text(view.state, input.has_title()))
            .alignment(Alignment::Center)
            .style(Style::default().fg(HELP_FG)),
        layout[6],
    );
}

fn status_line(state: RecordingState, clip_secs: Option<f32>) -> Line<'static> {
    let indicator = match state {
        RecordingState::Idle => Span::styled("○ ", Style::default().fg(HELP_FG)),
        RecordingState::Recording => Span::styled("● ", Style::default().fg(Color::Red)),
        RecordingState::Paused => Span::styled("⏸ ", Style::default().fg(Color::Yellow)),
        RecordingState::Stopped => Span::styled("■ ", Style::default().fg(Color::Green)),
        RecordingState::Uploading => Span::styled("↑ ", Style::default().fg(Color::Cyan)),
        RecordingState::UploadFailed => Span::styled("✗ ", Style::default().fg(Color::Red)),
    };
    let mut spans = vec![
        Span::styled("voxclip ", Style::default().add_modifier(Modifier::BOLD)),
        indicator,
        Span::raw(state.as_str()),
    ];
    if let Some(secs) = clip_secs.filter(|_| state.has_clip()) {
        spans.push(Span::styled(format!(" ({secs:.1}s clip)"), Style::default().fg(HELP_FG)));
    }
    Line::from(spans)
}

fn draw_title(frame: &mut Frame, area: Rect, view: &RecorderView, input: &RecorderInput) {
    let editing = view.state.title_editable();
    let block = Block::default().title(" Title ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(&block, area);

    let text = if editing { input.title() } else { view.title };
    let style = if editing {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(HELP_FG)
    };
    frame.render_widget(Paragraph::new(text.to_string()).style(style), inner);

    if editing {
        let x = inner.x + (input.title.visual_cursor() as u16).min(inner.width.saturating_sub(1));
        frame.set_cursor_position(Position::new(x, inner.y));
    }
}

fn draw_bars(frame: &mut Frame, area: Rect, levels: &LevelFrame) {
    let bars: Vec<Bar> = levels
        .magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            Bar::default()
                .value(m as u64)
                .text_value(String::new())
                .style(Style::default().fg(bar_color(i)))
        })
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(area.width, bars.len(), BAR_GAP))
        .bar_gap(BAR_GAP)
        .max(255);
    frame.render_widget(chart, area);
}

fn draw_countdown(frame: &mut Frame, area: Rect, view: &RecorderView) {
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Red).bg(HIGHLIGHT_BG))
        .ratio(view.progress.clamp(0.0, 1.0))
        .label(format!("{}s left", view.budget_remaining));
    frame.render_widget(gauge, area);
}

fn draw_clips(frame: &mut Frame, area: Rect, clips: &ClipsView, list_state: &mut ListState) {
    let title = if clips.loading { " Clips (loading) " } else { " Clips " };
    let block = Block::default().title(title).borders(Borders::ALL);

    if let Some(error) = clips.error {
        let text = Line::from(Span::styled(
            format!("Could not load clips: {error}"),
            Style::default().fg(Color::Red),
        ));
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    if clips.records.is_empty() {
        let text = if clips.loading { "" } else { "No clips yet" };
        frame.render_widget(Paragraph::new(text).style(Style::default().fg(HELP_FG)).block(block), area);
        return;
    }

    let items: Vec<ListItem> = clips
        .records
        .iter()
        .map(|record| {
            let url = record
                .playback_url(clips.media_origin)
                .unwrap_or_else(|| "(no audio)".to_string());
            ListItem::new(Line::from(vec![
                Span::styled(record.title.clone(), Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(url, Style::default().fg(HELP_FG)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(HIGHLIGHT_BG).fg(Color::White));
    frame.render_stateful_widget(list, area, list_state);
}

fn help_text(state: RecordingState, has_title: bool) -> &'static str {
    match (state, has_title) {
        (RecordingState::Idle, true) => "enter record, ↑↓ select, ^P play, F5 refresh, esc quit",
        (RecordingState::Idle, false) => "type a title, ↑↓ select, ^P play, F5 refresh, esc quit",
        (RecordingState::Recording, _) => "space pause, enter stop, esc cancel",
        (RecordingState::Paused, _) => "space resume, enter stop, esc cancel",
        (RecordingState::Stopped, true) => "edit title, enter submit, esc discard",
        (RecordingState::Stopped, false) => "type a title to submit, esc discard",
        (RecordingState::Uploading, _) => "uploading...",
        (RecordingState::UploadFailed, true) => "edit title, enter retry, esc discard",
        (RecordingState::UploadFailed, false) => "type a title to retry, esc discard",
    }
}
