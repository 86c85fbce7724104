pub mod constants;
pub mod env;
pub mod instantiate_run;
pub mod pipeline_state;
pub mod progress_bars;
pub mod verification_config;

/// Formats milliseconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration_ms(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
