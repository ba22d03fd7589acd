// Ring-buffer backend for the `log` facade
//
// The launcher has no console to stream to while the menu owns the display,
// so records are kept in memory and read back by the status screens.

use core::fmt::Write;
use core::sync::atomic::{AtomicUsize, Ordering};

use heapless::String;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

pub const MAX_LOG_ENTRIES: usize = 128;
pub const LINE_CAPACITY: usize = 96;

/// One formatted log line, truncated to [`LINE_CAPACITY`] bytes.
pub type LogLine = String<LINE_CAPACITY>;

/// Fixed-size ring of formatted records. When full, the oldest line is
/// overwritten.
pub struct RingLogger {
    lines: Mutex<[LogLine; MAX_LOG_ENTRIES]>,
    count: AtomicUsize, // Total lines written
}

impl RingLogger {
    pub const fn new() -> Self {
        const EMPTY: LogLine = String::new();
        Self {
            lines: Mutex::new([EMPTY; MAX_LOG_ENTRIES]),
            count: AtomicUsize::new(0),
        }
    }

    /// Append an already formatted line.
    pub fn push(&self, args: core::fmt::Arguments<'_>) {
        let mut lines = self.lines.lock();
        let count = self.count.load(Ordering::SeqCst);
        let line = &mut lines[count % MAX_LOG_ENTRIES];
        line.clear();
        // Overlong lines are cut, not dropped
        let _ = Truncating(line).write_fmt(args);
        self.count.store(count + 1, Ordering::SeqCst);
    }

    /// All retained lines, oldest first.
    pub fn iter(&self) -> LogIterator<'_> {
        self.last_n(MAX_LOG_ENTRIES)
    }

    /// The newest `n` lines (fewer if not that many were retained).
    pub fn last_n(&self, n: usize) -> LogIterator<'_> {
        let total = self.count.load(Ordering::SeqCst);
        let num = n.min(total.min(MAX_LOG_ENTRIES));
        LogIterator {
            logger: self,
            next: total - num,
            end: total,
        }
    }

    /// Lines currently retained.
    pub fn len(&self) -> usize {
        self.total().min(MAX_LOG_ENTRIES)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Lines written since boot, including overwritten ones.
    pub fn total(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for RingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.push(format_args!("{:<5} {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

struct Truncating<'a>(&'a mut LogLine);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Walks a window of the ring by absolute line number. Lines overwritten
/// while iterating are skipped.
pub struct LogIterator<'a> {
    logger: &'a RingLogger,
    next: usize,
    end: usize,
}

impl Iterator for LogIterator<'_> {
    type Item = LogLine;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.logger.lines.lock();
        let oldest = self.logger.count.load(Ordering::SeqCst).saturating_sub(MAX_LOG_ENTRIES);
        self.next = self.next.max(oldest);
        if self.next >= self.end {
            return None;
        }
        let line = lines[self.next % MAX_LOG_ENTRIES].clone();
        self.next += 1;
        Some(line)
    }
}

static LOGGER: RingLogger = RingLogger::new();

/// Install the global ring logger. Calling it again only changes the level.
pub fn init(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

pub fn get_logs_iter() -> LogIterator<'static> {
    LOGGER.iter()
}

/// Get the last N log entries (up to MAX_LOG_ENTRIES)
pub fn get_last_n_logs(n: usize) -> LogIterator<'static> {
    LOGGER.last_n(n)
}

pub fn log_count() -> usize {
    LOGGER.len()
}

pub fn total_log_count() -> usize {
    LOGGER.total()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;
    use std::vec::Vec;

    fn collect(iter: LogIterator<'_>) -> Vec<std::string::String> {
        iter.map(|line| line.as_str().into()).collect()
    }

    #[test]
    fn test_keeps_order_before_wrap() {
        let logger = RingLogger::new();
        logger.push(format_args!("one"));
        logger.push(format_args!("two"));
        assert_eq!(collect(logger.iter()), ["one", "two"]);
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn test_wraps_and_drops_oldest() {
        let logger = RingLogger::new();
        for i in 0..MAX_LOG_ENTRIES + 5 {
            logger.push(format_args!("line {}", i));
        }
        let lines = collect(logger.iter());
        assert_eq!(lines.len(), MAX_LOG_ENTRIES);
        assert_eq!(lines[0], "line 5");
        assert_eq!(logger.total(), MAX_LOG_ENTRIES + 5);

        let tail = collect(logger.last_n(2));
        assert_eq!(tail, [format!("line {}", MAX_LOG_ENTRIES + 3), format!("line {}", MAX_LOG_ENTRIES + 4)]);
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let logger = RingLogger::new();
        let long = "x".repeat(LINE_CAPACITY * 2);
        logger.push(format_args!("{}", long));
        let lines = collect(logger.iter());
        assert_eq!(lines[0].len(), LINE_CAPACITY);
    }

    #[test]
    fn test_last_n_larger_than_history() {
        let logger = RingLogger::new();
        logger.push(format_args!("only"));
        assert_eq!(collect(logger.last_n(10)), ["only"]);
        assert!(collect(RingLogger::new().last_n(3)).is_empty());
    }
}
