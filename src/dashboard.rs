use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::error::ProcessError;
use crate::history::{Processed, ProcessingEntry};
use crate::processor::Mode;
use crate::session::Session;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const SPINNER_TICK: Duration = Duration::from_millis(120);

// One piece of a screen line, drawn in a single colour
#[derive(Debug, Clone, PartialEq)]
struct Span {
    text: String,
    color: Color,
}

impl Span {
    fn new(text: impl Into<String>, color: Color) -> Self {
        Span {
            text: text.into(),
            color,
        }
    }
}

type Row = Vec<Span>;

/// Full-screen terminal front end over a [`Session`].
pub struct Dashboard {
    session: Session,
    completions: UnboundedReceiver<Processed>,
    config: Config,

    input: String,
    output: String,
    mode: Mode,

    terminal_width: u16,
    terminal_height: u16,

    // Whether the screen needs redrawing
    dirty: bool,
    status: Option<String>,
    last_refresh: Instant,
    last_spinner: Instant,
    processing_started: Instant,
}

impl Dashboard {
    pub fn new(
        session: Session,
        completions: UnboundedReceiver<Processed>,
        config: Config,
    ) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(session, completions, config, width, height))
    }

    fn with_size(
        session: Session,
        completions: UnboundedReceiver<Processed>,
        config: Config,
        width: u16,
        height: u16,
    ) -> Self {
        let mode = config.default_mode;
        Dashboard {
            session,
            completions,
            config,
            input: String::new(),
            output: String::new(),
            mode,
            terminal_width: width,
            terminal_height: height,
            dirty: true,
            status: None,
            last_refresh: Instant::now(),
            last_spinner: Instant::now(),
            processing_started: Instant::now(),
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        self.enter_raw_mode()?;
        // Restore the terminal even when the loop fails
        let result = self.event_loop();
        self.leave_raw_mode()?;
        result
    }

    fn event_loop(&mut self) -> io::Result<()> {
        // 'loop' runs until a key handler asks to quit and we 'break'
        loop {
            // Pick up results finished by the background task since the last tick
            self.drain_completions();

            // Recent activity depends on the clock, so refresh at least once a second
            if self.last_refresh.elapsed() >= Duration::from_secs(1) {
                self.dirty = true;
            }
            // While busy the spinner advances on its own, without any key press
            if self.session.is_busy() && self.last_spinner.elapsed() >= SPINNER_TICK {
                self.last_spinner = Instant::now();
                self.dirty = true;
            }

            if self.dirty {
                self.render()?;
            }

            // Poll for events with 16ms timeout (roughly 60 FPS)
            if event::poll(Duration::from_millis(16))? {
                // Pattern match on event type; mouse and focus events are ignored
                match event::read()? {
                    Event::Key(key_event) => {
                        if self.handle_key_event(key_event) {
                            break;
                        }
                    }
                    Event::Resize(width, height) => {
                        self.terminal_width = width;
                        self.terminal_height = height;
                        self.dirty = true;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn enter_raw_mode(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            io::stdout(),
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All)
        )?;
        self.dirty = true;
        Ok(())
    }

    fn leave_raw_mode(&mut self) -> io::Result<()> {
        execute!(io::stdout(), Show, EnableLineWrap, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Returns true when the user asked to quit.
    fn handle_key_event(&mut self, key_event: KeyEvent) -> bool {
        // Some platforms also report key releases
        if key_event.kind != KeyEventKind::Press {
            return false;
        }
        // KeyModifiers is a bitflag, contains() checks if a flag is set
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);

        // Match guards ('if ctrl') must come before the plain KeyCode::Char arm,
        // since arms are tried top to bottom
        match key_event.code {
            KeyCode::Esc => return true,
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return true,
            KeyCode::Char('u') if ctrl => {
                self.input.clear();
                self.output.clear();
                self.status = None;
            }
            KeyCode::Char('l') if ctrl => {
                self.session.clear_history();
                self.status = Some("History cleared".to_string());
            }
            KeyCode::Tab => self.mode = self.mode.next(),
            KeyCode::BackTab => self.mode = self.mode.previous(),
            KeyCode::Enter if key_event.modifiers.contains(KeyModifiers::ALT) => {
                self.input.push('\n');
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            // 'c' binds the character carried by the Char variant
            KeyCode::Char(c) => {
                // intersects() is true if ANY of the flags are set
                if key_event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                    return false;
                }
                self.input.push(c);
            }
            // Anything else changes nothing on screen
            _ => return false,
        }

        self.dirty = true;
        false
    }

    fn submit(&mut self) {
        // Rejections are only status messages, the loop keeps running
        match self.session.submit_processing(self.input.clone(), self.mode) {
            Ok(()) => {
                self.status = None;
                self.processing_started = Instant::now();
            }
            Err(ProcessError::InvalidInput) => {
                self.status = Some("Please enter some text to process".to_string());
            }
            Err(ProcessError::Busy) => {
                self.status = Some("Still processing...".to_string());
            }
        }
    }

    fn drain_completions(&mut self) {
        // try_recv() never blocks; Err means the channel is empty for now
        while let Ok(processed) = self.completions.try_recv() {
            self.status = Some(format!(
                "{} completed in {}ms",
                processed.mode, processed.processing_time
            ));
            self.output = processed.output;
            self.dirty = true;
        }
    }

    fn render(&mut self) -> io::Result<()> {
        let rows = self.layout();
        let mut stdout = io::stdout();
        let width = self.terminal_width as usize;

        for y in 0..self.terminal_height {
            execute!(stdout, MoveTo(0, y), Clear(ClearType::CurrentLine))?;

            // The footer always sits on the last line
            let row = if y + 1 == self.terminal_height {
                Some(self.footer())
            } else {
                rows.get(y as usize).cloned()
            };

            if let Some(row) = row {
                let mut used = 0;
                for span in row {
                    let visible: String = span.text.chars().take(width.saturating_sub(used)).collect();
                    used += visible.chars().count();
                    execute!(stdout, SetForegroundColor(span.color), Print(visible), ResetColor)?;
                }
            }
        }

        stdout.flush()?;
        self.dirty = false;
        self.last_refresh = Instant::now();
        Ok(())
    }

    // Everything above the footer, top to bottom
    fn layout(&self) -> Vec<Row> {
        let width = self.terminal_width as usize;
        let mut rows: Vec<Row> = Vec::new();

        rows.push(vec![
            Span::new("API Rate Limiter", Color::Magenta),
            Span::new("  traffic control demo", Color::DarkGrey),
        ]);
        rows.push(vec![Span::new("─".repeat(width), Color::DarkGrey)]);

        // Mode selector
        let mut selector = vec![Span::new("Mode: ", Color::White)];
        for mode in Mode::ALL {
            let color = if mode == self.mode {
                Color::Magenta
            } else {
                Color::DarkGrey
            };
            selector.push(Span::new(format!("[{}] ", mode.name()), color));
        }
        rows.push(selector);
        rows.push(vec![Span::new(
            format!("      {}", self.mode.description()),
            Color::DarkGrey,
        )]);
        rows.push(Vec::new());

        rows.push(vec![Span::new("Input Data", Color::Cyan)]);
        let input = tail(&flatten(&self.input), width.saturating_sub(3));
        rows.push(vec![
            Span::new(format!("> {}", input), Color::White),
            Span::new("_", Color::DarkGrey),
        ]);
        rows.push(Vec::new());

        rows.push(vec![Span::new("Processed Output", Color::Cyan)]);
        if self.session.is_busy() {
            let tick = self.processing_started.elapsed().as_millis() / SPINNER_TICK.as_millis();
            let frame = SPINNER[tick as usize % SPINNER.len()];
            rows.push(vec![Span::new(
                format!("{} Processing your data...", frame),
                Color::Yellow,
            )]);
        } else if self.output.is_empty() {
            rows.push(vec![Span::new(
                "Processed data will appear here...",
                Color::DarkGrey,
            )]);
        } else {
            rows.push(vec![Span::new(flatten(&self.output), Color::Green)]);
        }
        rows.push(Vec::new());

        rows.extend(self.stats_rows());
        rows.push(Vec::new());
        rows.extend(self.history_rows());

        rows
    }

    fn stats_rows(&self) -> Vec<Row> {
        let stats = self.session.stats(Utc::now());
        let mut rows: Vec<Row> = vec![vec![Span::new("System Statistics", Color::Cyan)]];

        rows.push(vec![Span::new(
            format!(
                "Total Operations: {}   Avg Processing Time: {}ms   Recent Activity: {}/min   All-time: {}",
                stats.total_operations,
                stats.average_processing_time_ms,
                stats.recent_operations,
                self.session.lifetime_operations()
            ),
            Color::White,
        )]);

        match self.session.performance() {
            Some(perf) => rows.push(vec![Span::new(
                format!(
                    "Fastest: {}ms   Slowest: {}ms   Std Dev: {:.1}ms",
                    perf.fastest_ms, perf.slowest_ms, perf.std_dev_ms
                ),
                Color::White,
            )]),
            None => rows.push(vec![Span::new(
                "Timing spread shows after two operations",
                Color::DarkGrey,
            )]),
        }

        let distribution = self.session.mode_distribution();
        if !distribution.is_empty() {
            let usage = distribution
                .iter()
                .map(|(mode, count)| format!("{} {}", mode.name(), count))
                .collect::<Vec<_>>()
                .join(" · ");
            rows.push(vec![Span::new(format!("Usage: {}", usage), Color::White)]);
        }

        rows
    }

    fn history_rows(&self) -> Vec<Row> {
        let history = self.session.history();
        let mut header = vec![Span::new("Processing History", Color::Cyan)];
        if !history.is_empty() {
            header.push(Span::new("  (Ctrl+L to clear)", Color::DarkGrey));
        }

        let mut rows = vec![header];
        if history.is_empty() {
            rows.push(vec![Span::new("No processing history yet", Color::DarkGrey)]);
            rows.push(vec![Span::new(
                "Start processing data to see history",
                Color::DarkGrey,
            )]);
            return rows;
        }

        for entry in &history {
            rows.push(vec![
                Span::new(format!("[{}] ", entry.mode.name()), Color::Magenta),
                Span::new(history_line(entry, self.config.preview_chars), Color::White),
            ]);
        }
        rows
    }

    fn footer(&self) -> Row {
        match &self.status {
            Some(status) => vec![Span::new(status.clone(), Color::Yellow)],
            None => vec![Span::new(
                "Enter process · Alt+Enter newline · Tab mode · Ctrl+U clear all · Ctrl+L clear history · Esc quit",
                Color::DarkGrey,
            )],
        }
    }
}

/// Cuts `text` to `max_len` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let head: String = text.chars().take(max_len).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Time, duration and previews of one history entry, for a single screen line.
pub fn history_line(entry: &ProcessingEntry, preview_chars: usize) -> String {
    format!(
        "{} ({}ms)  {}  ->  {}",
        entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        entry.processing_time,
        truncate_text(&flatten(&entry.input), preview_chars),
        truncate_text(&flatten(&entry.output), preview_chars)
    )
}

// Multi-line text has to fit on one screen line
fn flatten(text: &str) -> String {
    text.replace("\r\n", "↵").replace('\n', "↵").replace('\t', " ")
}

fn tail(text: &str, max_len: usize) -> String {
    let len = text.chars().count();
    text.chars().skip(len.saturating_sub(max_len)).collect()
}
