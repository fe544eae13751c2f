//! Runtime tuning knobs for an editing session.
//!
//! Every field has a compiled-in default; `from_env` lets a host override
//! any of them through `INKPAGE_*` environment variables. Unparseable values
//! fall back to the default rather than failing startup.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

const DEFAULT_SURFACE_WIDTH: f64 = 800.0;
const DEFAULT_VIEWPORT_HEIGHT: f64 = 1000.0;
const DEFAULT_MAX_PAGES: u32 = 20;
const DEFAULT_HISTORY_CAP: usize = 150;
const DEFAULT_HISTORY_KEEP: usize = 50;
const DEFAULT_MODIFY_DEBOUNCE_MS: u64 = 500;
const DEFAULT_PEN_WINDOW_MS: u64 = 500;
const DEFAULT_PALM_THRESHOLD: f64 = 25.0;
const DEFAULT_EXTEND_COOLDOWN_MS: u64 = 500;
const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 7000;

/// Tuning knobs for the engine, its router and its history.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Page width in logical units.
    pub surface_width: f64,
    /// Height of one page step; the surface grows by this amount.
    pub viewport_height: f64,
    /// Upper bound on the number of page steps.
    pub max_pages: u32,
    /// Log length above which history is compacted.
    pub history_cap: usize,
    /// Entries retained after the compaction snapshot.
    pub history_keep: usize,
    /// Quiet period before a modified object is recorded.
    pub modify_debounce_ms: u64,
    /// Time after the last pen contact during which touch is ignored.
    pub pen_window_ms: u64,
    /// Touch contact width/height above which the contact is a palm.
    pub palm_threshold: f64,
    /// Minimum time between two proximity page extensions.
    pub extend_cooldown_ms: u64,
    /// Period of the autosave task.
    pub autosave_interval_ms: u64,
    /// Whether single-finger touch draws (otherwise it pans).
    pub finger_drawing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface_width: DEFAULT_SURFACE_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            max_pages: DEFAULT_MAX_PAGES,
            history_cap: DEFAULT_HISTORY_CAP,
            history_keep: DEFAULT_HISTORY_KEEP,
            modify_debounce_ms: DEFAULT_MODIFY_DEBOUNCE_MS,
            pen_window_ms: DEFAULT_PEN_WINDOW_MS,
            palm_threshold: DEFAULT_PALM_THRESHOLD,
            extend_cooldown_ms: DEFAULT_EXTEND_COOLDOWN_MS,
            autosave_interval_ms: DEFAULT_AUTOSAVE_INTERVAL_MS,
            finger_drawing: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from `INKPAGE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            surface_width: env_parse("INKPAGE_SURFACE_WIDTH", DEFAULT_SURFACE_WIDTH),
            viewport_height: env_parse("INKPAGE_VIEWPORT_HEIGHT", DEFAULT_VIEWPORT_HEIGHT),
            max_pages: env_parse("INKPAGE_MAX_PAGES", DEFAULT_MAX_PAGES),
            history_cap: env_parse("INKPAGE_HISTORY_CAP", DEFAULT_HISTORY_CAP),
            history_keep: env_parse("INKPAGE_HISTORY_KEEP", DEFAULT_HISTORY_KEEP),
            modify_debounce_ms: env_parse("INKPAGE_MODIFY_DEBOUNCE_MS", DEFAULT_MODIFY_DEBOUNCE_MS),
            pen_window_ms: env_parse("INKPAGE_PEN_WINDOW_MS", DEFAULT_PEN_WINDOW_MS),
            palm_threshold: env_parse("INKPAGE_PALM_THRESHOLD", DEFAULT_PALM_THRESHOLD),
            extend_cooldown_ms: env_parse("INKPAGE_EXTEND_COOLDOWN_MS", DEFAULT_EXTEND_COOLDOWN_MS),
            autosave_interval_ms: env_parse("INKPAGE_AUTOSAVE_MS", DEFAULT_AUTOSAVE_INTERVAL_MS),
            finger_drawing: env_parse("INKPAGE_FINGER_DRAWING", false),
        }
        .normalized()
    }

    /// Clamp interdependent fields into a usable range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.history_cap = self.history_cap.max(2);
        self.history_keep = self.history_keep.clamp(1, self.history_cap);
        self.max_pages = self.max_pages.max(1);
        self
    }

    /// Tallest the surface may grow.
    #[must_use]
    pub fn max_height(&self) -> f64 {
        self.viewport_height * f64::from(self.max_pages)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
