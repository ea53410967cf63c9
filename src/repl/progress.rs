use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a registry fetch is in flight.
pub struct FetchSpinner {
    bar: ProgressBar,
    started: Instant,
}

impl FetchSpinner {
    pub fn start(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
            bar.set_style(spinner_style);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Hidden spinner, for output that is not a terminal.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            started: Instant::now(),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn finish(self, message: &str) {
        self.bar.finish_and_clear();
        if !self.bar.is_hidden() {
            println!(
                "  {} {} {}",
                style("✓").green(),
                message,
                style(format_elapsed(self.started.elapsed())).dim()
            );
        }
    }

    pub fn fail(self) {
        self.bar.finish_and_clear();
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis() as u64;
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        let secs = ms / 1000;
        let mins = secs / 60;
        if mins > 0 {
            format!("{}m{}s", mins, secs % 60)
        } else {
            format!("{}.{}s", secs, (ms % 1000) / 100)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m5s");
    }
}
