//! Command spinner with elapsed time
//!
//! Wraps an indicatif spinner for one long-running command. In quiet mode the
//! spinner is hidden but the same calls are accepted.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

pub struct CommandSpinner {
    bar: ProgressBar,
    started: Instant,
    quiet: bool,
}

impl CommandSpinner {
    /// Create a spinner that draws nothing when `quiet` is set
    pub fn new_maybe(message: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new_spinner()
        };
        if let Ok(template) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed:.dim}")
        {
            bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.set_message(message.to_string());
        if !quiet {
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self {
            bar,
            started: Instant::now(),
            quiet,
        }
    }

    pub fn update(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a green check and the elapsed time
    pub fn success(&self, message: &str) {
        self.bar.finish_and_clear();
        if !self.quiet {
            eprintln!(
                "{} {} {}",
                style("✓").green(),
                message,
                style(format!("({})", format_elapsed(self.started.elapsed()))).dim()
            );
        }
    }

    /// Finish with a red cross
    pub fn fail(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("✗").red(), message);
    }

    /// Hide the spinner so other output can stream to the terminal
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Whole-second elapsed time, e.g. "1m 12s"
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = Duration::from_secs(elapsed.as_secs());
    if secs.is_zero() {
        return "<1s".to_string();
    }
    humantime::format_duration(secs).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_elapsed_rounds_to_seconds() {
        assert_eq!(format_elapsed(Duration::from_millis(300)), "<1s");
        assert_eq!(format_elapsed(Duration::from_millis(5_400)), "5s");
        assert_eq!(format_elapsed(Duration::from_secs(72)), "1m 12s");
    }

    #[test]
    fn quiet_spinner_accepts_calls() {
        let spinner = CommandSpinner::new_maybe("Building...", true);
        spinner.update("Still building...");
        spinner.success("Built");
    }
}
