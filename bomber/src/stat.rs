use core::time::Duration;

/// Sink for probe observations.
///
/// Implementations must be thread-safe: workers report concurrently and
/// the engine performs no serialization of its own.
pub trait RecordStat: Send + Sync {
    /// Called once per completed probe, including non-2xx responses.
    fn on_probe(&self, name: &str, code: u16, elapsed: Duration);

    /// Called when a job fails before receiving an HTTP response.
    fn on_failure(&self, name: &str);

    /// Called after each full catalog pass has drained.
    fn on_run_done(&self, run: u64);
}
