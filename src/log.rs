// ABOUTME: Bounded, timestamped diagnostic trace of modem traffic shared by the client and reader
// ABOUTME: Keeps the most recent entries in FIFO order and mirrors every entry into tracing

use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Default number of entries kept
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Cloneable handle to a shared diagnostic log
///
/// Every entry is one line prefixed with the local wall-clock time as
/// `[HH:MM:SS] `. Once the log holds `capacity` entries the oldest one is
/// dropped for each new line.
#[derive(Clone, Debug)]
pub struct DiagnosticLog {
    entries: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a timestamped entry per line of `message`, evicting the
    /// oldest entries when full.
    pub fn append(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(target: "sim800::modem", "{}", message);

        let stamp = Local::now().format("%H:%M:%S").to_string();
        let mut lines: Vec<&str> = message
            .split(['\r', '\n'])
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            lines.push("");
        }

        let mut entries = self.entries();
        for line in lines {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(format!("[{stamp}] {line}"));
        }
    }

    /// All entries, oldest first, each terminated by `\n`
    pub fn read(&self) -> String {
        self.entries().iter().fold(String::new(), |mut out, entry| {
            out.push_str(entry);
            out.push('\n');
            out
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_timestamped() {
        let log = DiagnosticLog::default();
        log.append("TX: AT");

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        let entry = &lines[0];
        // [HH:MM:SS] prefix
        assert_eq!(entry.len(), "[00:00:00] TX: AT".len());
        assert!(entry.starts_with('['));
        assert_eq!(&entry[9..11], "] ");
        assert!(entry.ends_with("TX: AT"));
    }

    #[test]
    fn test_read_terminates_every_line() {
        let log = DiagnosticLog::default();
        assert_eq!(log.read(), "");
        log.append("one");
        log.append("two");
        let text = log.read();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("two\n"));
    }

    #[test]
    fn test_keeps_most_recent_entries() {
        let log = DiagnosticLog::default();
        for i in 0..1005 {
            log.append(format!("entry {i}"));
        }
        let lines = log.lines();
        assert_eq!(lines.len(), DEFAULT_LOG_CAPACITY);
        assert!(lines[0].ends_with("entry 5"));
        assert!(lines[999].ends_with("entry 1004"));
    }

    #[test]
    fn test_multiline_messages_respect_capacity() {
        let log = DiagnosticLog::default();
        for i in 0..1200 {
            log.append(format!("CMD RX: AT\r\r\nOK {i}"));
        }
        let text = log.read();
        assert_eq!(text.lines().count(), DEFAULT_LOG_CAPACITY);
        assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);
        assert!(text.ends_with("] OK 1199\n"));

        let lines = log.lines();
        assert!(lines[998].ends_with("] CMD RX: AT"));
        assert!(lines.iter().all(|line| !line.contains(['\r', '\n'])));
    }

    #[test]
    fn test_clear_and_shared_handles() {
        let log = DiagnosticLog::new(3);
        let other = log.clone();
        other.append("a");
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_concurrent_appends() {
        let log = DiagnosticLog::new(50);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.append(format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 50);
    }
}
