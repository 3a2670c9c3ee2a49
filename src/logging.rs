use log::LevelFilter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Initialize env_logger. Defaults to warn when RUST_LOG is unset.
pub fn init_logger() {
    let mut builder = env_logger::Builder::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Warn);
    }

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    let _ = builder.try_init();
}

/// Running average of response times for one side of the protocol.
///
/// The client side measures the tracker answering our requests; the server
/// side measures us answering the tracker's pushes.
#[derive(Debug, Default)]
pub struct ResponseStats {
    responses: AtomicU64,
    total_ms: AtomicU64,
}

impl ResponseStats {
    pub fn record(&self, elapsed: Duration) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        self.total_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    pub fn average_ms(&self) -> f64 {
        let n = self.responses.load(Ordering::Relaxed);
        if n == 0 {
            return 0.0;
        }
        self.total_ms.load(Ordering::Relaxed) as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_over_recorded_responses() {
        let stats = ResponseStats::default();
        assert_eq!(stats.average_ms(), 0.0);

        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.responses(), 2);
        assert_eq!(stats.average_ms(), 20.0);
    }
}
