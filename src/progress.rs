//! Progress reporting that becomes no-op when the `progress` feature is disabled

#[cfg(feature = "progress")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progress"))]
pub use self::noop::*;

/// Sink for progress callbacks from long-running build and search tasks.
///
/// Callbacks run synchronously on the worker thread; implementations must
/// not block.
pub trait ProgressSink: Send {
    /// Task started; `total` is the number of work units, 0 if unknown.
    fn begin(&mut self, total: u64);

    /// `completed` units are done so far.
    fn advance(&mut self, completed: u64);

    /// Task finished (completed, cancelled, or superseded).
    fn finish(&mut self);
}

/// Discards all progress events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&mut self, _total: u64) {}
    fn advance(&mut self, _completed: u64) {}
    fn finish(&mut self) {}
}

/// Terminal progress bar sink.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());
        Self { bar }
    }
}

impl ProgressSink for BarSink {
    fn begin(&mut self, total: u64) {
        self.bar.set_length(total);
    }

    fn advance(&mut self, completed: u64) {
        self.bar.set_position(completed);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(not(feature = "progress"))]
mod noop {
    /// No-op progress bar when `progress` feature is disabled
    #[derive(Clone)]
    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new(_len: u64) -> Self {
            ProgressBar
        }

        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn set_message(&self, _msg: impl Into<std::borrow::Cow<'static, str>>) {}
        pub fn set_length(&self, _len: u64) {}
        pub fn set_position(&self, _pos: u64) {}
        pub fn inc(&self, _delta: u64) {}
        pub fn finish_and_clear(&self) {}
    }

    /// No-op progress style
    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_bar() -> Self {
            ProgressStyle
        }

        pub fn template(self, _template: &str) -> Result<Self, std::convert::Infallible> {
            Ok(self)
        }

        pub fn progress_chars(self, _chars: &str) -> Self {
            self
        }
    }
}
