//! Shared test utilities.
//!
//! Provides a fixture writer, a validated [`Config`] builder rooted in a temp
//! directory, and [`MockRenderer`], a scriptable renderer that records how
//! many conversions run at the same time.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[("in/a.md", "# A"), ("in/b.md", "slow")]);
//! let config = test_config(tmp.path(), 2);
//!
//! let renderer = MockRenderer::new().delay_for("slow", Duration::from_millis(50));
//! run_batch_with(&config, &renderer, BatchOptions::default()).unwrap();
//! assert!(renderer.max_in_flight() <= 2);
//! ```

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{Config, Options};
use crate::markup::{CmarkRenderer, MarkdownExtension, MarkupRenderer, RenderError};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, contents)` pairs under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

/// Validated config reading `root/in` and writing `root/out`.
///
/// `root/in` must already exist. Logs go to `root/logs`; nothing is written
/// there unless a test installs a subscriber.
pub fn test_config(root: &Path, workers: usize) -> Config {
    let options = Options {
        input_dir: Some(root.join("in")),
        output_dir: root.join("out"),
        max_workers: Some(workers),
        ..Options::default()
    };
    let mut config = options.validate().unwrap();
    // Tests asking for more workers than the machine has still get them.
    config.workers = workers;
    config.log_dir = root.join("logs");
    config
}

// =========================================================================
// Mock renderer
// =========================================================================

/// Renderer double: delegates to [`CmarkRenderer`] unless a script matches.
///
/// Scripts are matched by substring against the markdown source, first match
/// wins within each list.
#[derive(Default)]
pub struct MockRenderer {
    fail_on: Vec<String>,
    panic_on: Vec<String>,
    delays: Vec<(String, Duration)>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    spans: Mutex<Vec<(Instant, Instant)>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    pub fn panic_on(mut self, needle: &str) -> Self {
        self.panic_on.push(needle.to_string());
        self
    }

    pub fn delay_for(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    /// Sleep for `delay` on every render without a more specific script.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(start, end)` of every finished render, in completion order.
    pub fn spans(&self) -> Vec<(Instant, Instant)> {
        self.spans.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the render panics.
struct InFlightGuard<'a> {
    mock: &'a MockRenderer,
    started: Instant,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.mock.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut spans) = self.mock.spans.lock() {
            spans.push((self.started, Instant::now()));
        }
    }
}

impl MarkupRenderer for MockRenderer {
    fn render(
        &self,
        source: &str,
        extensions: &[MarkdownExtension],
    ) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard {
            mock: self,
            started: Instant::now(),
        };

        let delay = self
            .delays
            .iter()
            .find(|(needle, _)| source.contains(needle.as_str()))
            .map(|(_, d)| *d)
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if self.panic_on.iter().any(|n| source.contains(n.as_str())) {
            panic!("mock renderer panic");
        }
        if self.fail_on.iter().any(|n| source.contains(n.as_str())) {
            return Err(RenderError::Failed("mock renderer failure".to_string()));
        }
        CmarkRenderer.render(source, extensions)
    }
}
