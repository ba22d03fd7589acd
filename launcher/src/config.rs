// Launcher timing and labels

/// Input queue poll timeout per loop iteration.
pub const DEFAULT_POLL_TIMEOUT_MS: u32 = 16;

/// How long an install status line stays up before returning.
pub const DEFAULT_STATUS_HOLD_MS: u32 = 100;

pub const DEFAULT_TITLE: &str = "Apps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LauncherConfig {
    pub poll_timeout_ms: u32,
    pub status_hold_ms: u32,
    /// Menu heading
    pub title: &'static str,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            status_hold_ms: DEFAULT_STATUS_HOLD_MS,
            title: DEFAULT_TITLE,
        }
    }
}
