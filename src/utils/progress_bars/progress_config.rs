// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

use crate::models::run_models::RunState;
use crate::utils::format_duration_ms;

/// Configuration for terminal progress rendering
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Refresh rate for progress bars in milliseconds
    pub refresh_rate_ms: u64,
    /// Whether to show the estimated time remaining next to the bar
    pub show_time_remaining: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_rate_ms: 100,
            show_time_remaining: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            refresh_rate_ms: env::var("PROGRESS_REFRESH_RATE_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            show_time_remaining: env::var("PROGRESS_SHOW_TIME_REMAINING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    /// Percent bar for a run, attached to `multi` when given.
    pub fn create_run_bar(&self, multi: Option<&MultiProgress>) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }
        let pb = ProgressBar::new(100);
        let template = "📞 [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}";
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");
        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(self.refresh_rate_ms.max(16)));
        Some(match multi {
            Some(mp) => mp.add(pb),
            None => pb,
        })
    }

    /// Readout text: processed/total counts, remaining time, pause marker.
    pub fn render_message(&self, state: &RunState) -> String {
        let shown_processed = state.processed_numbers.max(state.projected_processed);
        let mut msg = format!("{}/{} numbers", shown_processed, state.total_numbers);
        if self.show_time_remaining && !state.is_complete() {
            msg.push_str(&format!(
                " | ~{} left",
                format_duration_ms(state.time_remaining_ms)
            ));
        }
        if state.is_paused {
            msg.push_str(" | ⏸ paused");
        }
        msg.push_str(&format!(" | {}", state.phase));
        msg
    }

    /// Pushes the published fields of `state` onto `pb`.
    pub fn render(&self, pb: &ProgressBar, state: &RunState) {
        pb.set_position(state.progress_percent.clamp(0.0, 100.0).floor() as u64);
        pb.set_message(self.render_message(state));
    }
}
