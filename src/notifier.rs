pub mod json;
pub mod terminal;

use crate::signal::SignalReport;

/// Sink for signal reports.
pub trait Notifier: Send + Sync {
    fn notify(&self, report: &SignalReport);
}
