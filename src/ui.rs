//! Terminal output for vidrelay: spinner and coloured job log.
//!
//! Uses `indicatif` for the progress spinner and `console` for colours.
//! [`JobProgress`] follows one job in the terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::jobs::{JobStatus, JobView, LogEntry};

/// Spinner plus log printer for a job being watched.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl JobProgress {
    /// Start the spinner for the given video.
    pub fn start(video_key: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("PENDING: {video_key}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn update_status(&self, status: JobStatus, video_key: &str) {
        self.pb.set_message(format!("{status}: {video_key}"));
    }

    /// Print one log entry above the spinner.
    pub fn log(&self, entry: &LogEntry) {
        self.pb.println(format!(
            "  {} {}",
            self.dim.apply_to(entry.timestamp.format("%H:%M:%S")),
            entry.message
        ));
    }

    /// Stop the spinner and print the final outcome.
    pub fn complete(&self, view: &JobView) {
        self.pb.finish_and_clear();
        match view.status {
            JobStatus::Completed => {
                println!("  {} Job {} completed", self.green.apply_to("✓"), view.id);
            }
            JobStatus::Failed => {
                println!("  {} Job {} failed", self.red.apply_to("✗"), view.id);
            }
            JobStatus::Pending | JobStatus::Running => {
                println!(
                    "  {} Job {} is still {}; no longer watching it",
                    self.yellow.apply_to("?"),
                    view.id,
                    view.status
                );
            }
        }
    }

    /// Print the job view as pretty JSON.
    pub fn print_view(&self, view: &JobView) {
        let style = match view.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Job ───"));
        println!("{}", serde_json::to_string_pretty(view).unwrap_or_default());
    }
}

/// Print the result of a configuration check.
pub fn print_config_check(missing: &[&str]) {
    if missing.is_empty() {
        println!("  {} Configuration complete", Style::new().green().bold().apply_to("✓"));
    } else {
        println!(
            "  {} Configuration incomplete, missing: {}",
            Style::new().red().bold().apply_to("✗"),
            missing.join(", ")
        );
    }
}
