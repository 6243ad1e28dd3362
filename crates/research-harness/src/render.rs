//! Text rendering of progress snapshots and the sinks that display them.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset as _, Utc};
use crossterm::{cursor, queue, terminal};

use crate::model::ToolKind;
use crate::progress::ProgressSnapshot;

/// Width of the proportional progress bar, in columns.
pub const BAR_WIDTH: usize = 40;

const LABEL_WIDTH: usize = 15;
const TITLE: &str = "Deep Research Progress";

/// Formats progress snapshots as a text panel.
#[derive(Clone, Debug)]
pub struct Renderer {
    utc_offset: FixedOffset,
}

impl Renderer {
    /// Renders timestamps in the machine's local time zone.
    pub fn local() -> Self {
        Self {
            utc_offset: Local::now().offset().fix(),
        }
    }

    /// Renders timestamps with a fixed UTC offset.
    pub fn with_offset(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    pub fn render(&self, snapshot: &ProgressSnapshot) -> String {
        let mut lines = vec![format!("── {TITLE} ──")];
        let mut row = |label: &str, value: &str| {
            if label.is_empty() && value.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("{label:>LABEL_WIDTH$}  {value}"));
            }
        };

        let percent = snapshot.completion_ratio * 100.0;
        row("Model:", &snapshot.model);
        row("Elapsed:", &format_elapsed(snapshot.elapsed));
        row(
            "Progress:",
            &format!(
                "{percent:.1}% ({}/{} calls)",
                snapshot.tool_calls_observed, snapshot.tool_call_budget
            ),
        );
        let eta = match snapshot.eta.finish_at() {
            Some(finish_at) => format!("{} (finishes ~{})", snapshot.eta, self.clock_time(finish_at)),
            None => format!("{} (finishes ~{})", snapshot.eta, snapshot.eta),
        };
        row("ETA:", &eta);
        row("", "");

        for kind in ToolKind::ALL {
            let count = snapshot.count(kind);
            if kind == ToolKind::WebSearch || count > 0 {
                row(&format!("{}:", kind.label()), &count.to_string());
            }
        }

        if !snapshot.recent_actions.is_empty() {
            row("", "");
            row("Recent Actions:", "");
            for action in &snapshot.recent_actions {
                row(
                    "",
                    &format!("[{}] {}", self.clock_time(action.at), action.description),
                );
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "{} {percent:.1}%",
            progress_bar(snapshot.completion_ratio)
        ));
        lines.join("\n")
    }

    fn clock_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.utc_offset)
            .format("%I:%M:%S %p")
            .to_string()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::local()
    }
}

/// Renders a snapshot with timestamps in local time.
pub fn render_panel(snapshot: &ProgressSnapshot) -> String {
    Renderer::local().render(snapshot)
}

/// `floor(ratio × 40)` filled cells followed by empty cells.
pub fn progress_bar(ratio: f64) -> String {
    let filled = ((ratio.clamp(0.0, 1.0) * BAR_WIDTH as f64).floor() as usize).min(BAR_WIDTH);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}

/// `H:MM:SS`, hours unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Receives every painted frame.
pub trait RenderSink: Send {
    fn paint(&mut self, frame: &str);

    /// Called once after the last frame.
    fn finish(&mut self) {}
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn paint(&mut self, _frame: &str) {}
}

/// Collects frames in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl RenderSink for MemorySink {
    fn paint(&mut self, frame: &str) {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_string());
    }
}

/// Repaints the panel in place on a terminal.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    /// Fixed column count; `None` asks the terminal on every repaint.
    width: Option<u16>,
    painted_rows: u16,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: None,
            painted_rows: 0,
        }
    }

    /// Uses a fixed terminal width instead of querying it.
    pub fn with_width(out: W, width: u16) -> Self {
        Self {
            out,
            width: Some(width),
            painted_rows: 0,
        }
    }

    fn columns(&self) -> u16 {
        self.width
            .or_else(|| terminal::size().ok().map(|(cols, _)| cols))
            .unwrap_or(u16::MAX)
    }

    fn repaint(&mut self, frame: &str) -> std::io::Result<()> {
        if self.painted_rows > 0 {
            queue!(self.out, cursor::MoveUp(self.painted_rows))?;
        }
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::FromCursorDown)
        )?;
        writeln!(self.out, "{frame}")?;
        self.out.flush()?;
        self.painted_rows = screen_rows(frame, self.columns());
        Ok(())
    }
}

/// Rows `frame` occupies once lines longer than `columns` wrap.
fn screen_rows(frame: &str, columns: u16) -> u16 {
    let columns = usize::from(columns.max(1));
    let rows: usize = frame
        .lines()
        .map(|line| line.chars().count().div_ceil(columns).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

impl<W: Write + Send> RenderSink for TerminalSink<W> {
    fn paint(&mut self, frame: &str) {
        if let Err(err) = self.repaint(frame) {
            tracing::debug!(error = %err, "progress repaint failed");
        }
    }

    fn finish(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.painted_rows = 0;
    }
}
