//! Progress reporting for image builds
//!
//! Spinners are drawn with indicatif when attached to a terminal. Plain mode
//! streams raw build output to stderr instead, and hidden mode reports
//! nothing at all.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

/// How progress should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Animated spinners
    Interactive,
    /// Raw build output on stderr (CI logs, `--verbose`)
    Plain,
    /// No output (`--quiet`)
    Hidden,
}

/// Progress reporter for Docker operations
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    mode: ProgressMode,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(ProgressMode::Interactive)
    }
}

impl ProgressReporter {
    pub fn new(mode: ProgressMode) -> Self {
        let multi = match mode {
            ProgressMode::Interactive => MultiProgress::new(),
            ProgressMode::Plain | ProgressMode::Hidden => {
                MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
            }
        };
        Self {
            multi,
            bars: HashMap::new(),
            mode,
        }
    }

    /// True when raw build output should be echoed instead of spinners
    pub fn is_plain_output(&self) -> bool {
        self.mode == ProgressMode::Plain
    }

    /// Create a spinner for indeterminate progress (e.g., build steps)
    pub fn add_spinner(&mut self, id: &str, message: &str) -> &ProgressBar {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        spinner.set_message(message.to_string());
        if self.mode == ProgressMode::Interactive {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        self.bars.entry(id.to_string()).insert_entry(spinner).into_mut()
    }

    /// Update spinner message, creating the spinner if needed
    pub fn update_spinner(&mut self, id: &str, message: &str) {
        // Build output lines can carry trailing newlines and carriage returns
        let message = message.trim_end();
        if let Some(spinner) = self.bars.get(id) {
            spinner.set_message(message.to_string());
        } else {
            self.add_spinner(id, message);
        }
    }

    /// Mark a step as complete
    pub fn finish(&mut self, id: &str, message: &str) {
        if let Some(bar) = self.bars.get(id) {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Mark all progress as failed
    pub fn abandon_all(&self, message: &str) {
        for bar in self.bars.values() {
            bar.abandon_with_message(message.to_string());
        }
    }
}
