use std::io::{self, Write};
use std::sync::Mutex;

use crate::notifier::Notifier;
use crate::signal::SignalReport;

/// Writes each report as one line of JSON.
pub struct JsonNotifier<W> {
    out: Mutex<W>,
}

impl JsonNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, report: &SignalReport) -> io::Result<()> {
        let line = serde_json::to_string(report)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("json notifier output poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Notifier for JsonNotifier<W> {
    fn notify(&self, report: &SignalReport) {
        if let Err(e) = self.write_line(report) {
            tracing::warn!(error = %e, symbol = %report.symbol, "failed to write signal report");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::SourceKind;
    use crate::signal::{Signal, SignalAction};

    #[test]
    fn writes_one_json_line_per_report() {
        let notifier = JsonNotifier::new(Vec::new());
        let mut signal = Signal::neutral("Bullish MA alignment");
        signal.action = SignalAction::Buy;
        signal.confidence = 55;
        let report = SignalReport {
            symbol: "GBP/USD".into(),
            timeframe: "5m".into(),
            source: Some(SourceKind::Binance),
            signal,
            last_price: Some(1.27),
            total_candles: 42,
            last_update: Utc::now(),
        };

        notifier.notify(&report);
        notifier.notify(&report);

        let out = String::from_utf8(notifier.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["symbol"], "GBP/USD");
        assert_eq!(json["source"], "binance");
        assert_eq!(json["signal"]["action"], "BUY");
        assert_eq!(json["signal"]["confidence"], 55);
        assert_eq!(json["lastPrice"], 1.27);
        assert_eq!(json["totalCandles"], 42);
    }

    #[test]
    fn missing_source_serializes_as_null() {
        let notifier = JsonNotifier::new(Vec::new());
        let report = SignalReport {
            symbol: "EUR/USD".into(),
            timeframe: "15m".into(),
            source: None,
            signal: Signal::neutral("No market data available"),
            last_price: None,
            total_candles: 0,
            last_update: Utc::now(),
        };
        notifier.notify(&report);

        let out = String::from_utf8(notifier.into_inner()).unwrap();
        let json: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert!(json["source"].is_null());
        assert_eq!(json["signal"]["action"], "HOLD");
        assert_eq!(json["signal"]["reasons"][0], "No market data available");
    }
}
