use crate::notifier::Notifier;
use crate::signal::SignalReport;

/// Emits each report as a `tracing` event: `warn` for BUY/SELL, `info` for HOLD.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, report: &SignalReport) {
        let signal = &report.signal;
        let source = report
            .source
            .map_or_else(|| "none".to_owned(), |s| s.to_string());
        let reasons = signal.reasons.join("; ");

        if signal.action.is_actionable() {
            tracing::warn!(
                pair = %report.symbol,
                timeframe = %report.timeframe,
                source = %source,
                action = %signal.action,
                confidence = signal.confidence,
                strength = %signal.strength,
                price = ?report.last_price,
                "SIGNAL: {reasons}",
            );
        } else {
            tracing::info!(
                pair = %report.symbol,
                timeframe = %report.timeframe,
                source = %source,
                action = %signal.action,
                confidence = signal.confidence,
                strength = %signal.strength,
                "no trade: {reasons}",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::SourceKind;
    use crate::signal::{Signal, SignalAction};

    fn report(action: SignalAction) -> SignalReport {
        let mut signal = Signal::neutral("RSI indicates oversold");
        signal.action = action;
        SignalReport {
            symbol: "EUR/USD".into(),
            timeframe: "15m".into(),
            source: Some(SourceKind::Yahoo),
            signal,
            last_price: Some(1.0862),
            total_candles: 100,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn terminal_notifier_does_not_panic() {
        let notifier = TerminalNotifier;
        notifier.notify(&report(SignalAction::StrongBuy));
        notifier.notify(&report(SignalAction::Hold));

        let mut no_source = report(SignalAction::Sell);
        no_source.source = None;
        no_source.last_price = None;
        notifier.notify(&no_source);
    }
}
