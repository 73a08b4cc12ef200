use std::io::{self, IsTerminal, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use community_images_report::{ContextReport, Progress};

/// Single status line on stderr, only drawn when stderr is a terminal
pub struct StderrProgress {
    enabled: bool,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self {
            enabled: io::stderr().is_terminal(),
        }
    }

    fn redraw(&self, message: Option<String>) {
        if !self.enabled {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = queue!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
        if let Some(message) = message {
            let _ = write!(stderr, "  {}", message);
        }
        let _ = stderr.flush();
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for StderrProgress {
    fn context_started(&self, context: &str) {
        self.redraw(Some(format!(
            "{} ({})",
            "Searching for images".cyan(),
            context
        )));
    }

    fn context_finished(&self, _report: &ContextReport) {
        self.redraw(None);
    }
}
