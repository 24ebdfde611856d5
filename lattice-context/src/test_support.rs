//! Log capture for tests that assert on emitted events.

use std::sync::{Arc, Mutex};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Records the level of every event seen while installed.
#[derive(Clone, Default)]
pub(crate) struct LevelCapture {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl LevelCapture {
    /// Number of captured events at exactly `level`.
    pub(crate) fn count(&self, level: Level) -> usize {
        self.levels
            .lock()
            .map(|levels| levels.iter().filter(|seen| **seen == level).count())
            .unwrap_or(0)
    }
}

impl<S: Subscriber> Layer<S> for LevelCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if let Ok(mut levels) = self.levels.lock() {
            levels.push(*event.metadata().level());
        }
    }
}

/// Run `f` with a capturing subscriber installed on this thread.
pub(crate) fn capture_levels<R>(f: impl FnOnce() -> R) -> (R, LevelCapture) {
    let capture = LevelCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}
