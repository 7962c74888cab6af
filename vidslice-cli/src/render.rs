//! Progress rendering for long engine runs.

use indicatif::{ProgressBar, ProgressStyle};
use vidslice_core::ProgressEvent;

/// A 0-100 bar fed by core progress events.
pub struct ProgressRender {
    bar: ProgressBar,
}

impl ProgressRender {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        Self { bar }
    }

    pub fn update(&self, event: ProgressEvent) {
        self.bar.set_position(u64::from(event.percent));
        self.bar.set_message(event.message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
