use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, Ordering};

/// A writer that throws its input away and counts how many times `write` was called.
///
/// The size of each buffer is irrelevant, an empty write counts as one. The tally lives
/// in an atomic so another thread can poll it through a shared reference while writes
/// go through `&WriteCount`.
///
/// ```
/// use std::io::Write;
/// use script_output::WriteCount;
///
/// let mut counter = WriteCount::new();
/// for _ in 0..3 {
///     counter.write(b"bla bla bla").unwrap();
/// }
/// assert_eq!(counter.tell(), 3);
/// ```
#[derive(Debug, Default)]
pub struct WriteCount {
    pub count: AtomicI64,
}

impl WriteCount {
    pub fn new() -> Self {
        WriteCount::with_initial(0)
    }

    /// Starts the tally at `initial`, which may be negative.
    pub fn with_initial(initial: i64) -> Self {
        WriteCount { count: AtomicI64::new(initial) }
    }

    pub fn tell(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Write for &WriteCount {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for WriteCount {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared: &WriteCount = self;
        shared.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counts_calls_from_initial_value() {
        let mut counter = WriteCount::with_initial(5);
        for _ in 0..3 {
            counter.write(b"some content").unwrap();
        }
        assert_eq!(counter.tell(), 8);
        assert_eq!(counter.count.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn test_empty_write_counts_once() {
        let mut counter = WriteCount::new();
        assert_eq!(counter.write(b"").unwrap(), 0);
        assert_eq!(counter.tell(), 1);
    }

    #[test]
    fn test_size_is_ignored() {
        let mut counter = WriteCount::new();
        counter.write(&[0u8; 4096]).unwrap();
        counter.write(b"x").unwrap();
        assert_eq!(counter.tell(), 2);
    }

    #[test]
    fn test_negative_initial_value() {
        let mut counter = WriteCount::with_initial(-2);
        counter.write(b"a").unwrap();
        assert_eq!(counter.tell(), -1);
        counter.write(b"b").unwrap();
        counter.write(b"c").unwrap();
        assert_eq!(counter.tell(), 1);
    }

    #[test]
    fn test_formatted_writes() {
        let mut counter = WriteCount::default();
        writeln!(counter, "line").unwrap();
        counter.flush().unwrap();
        assert!(counter.tell() >= 1);
    }

    #[test]
    fn test_shared_reference_writes_from_threads() {
        let counter = WriteCount::new();
        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut writer = &counter;
                    for _ in 0..250 {
                        writer.write(b"tick").unwrap();
                    }
                });
            }
        });
        assert_eq!(counter.tell(), 1000);
    }
}
