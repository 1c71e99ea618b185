// =============================================================================
// Notification formatting
// =============================================================================
//
// The core only owns the message CONTENT; delivery (token, transport, retry)
// belongs to an external collaborator that takes the finished string.

use crate::types::Signal;

/// Format the outbound alert for a ticker's latest evaluation.
pub fn format_signal_alert(
    ticker: &str,
    price: f64,
    signal: Signal,
    stop_loss: Option<f64>,
) -> String {
    let stop = match stop_loss {
        Some(s) => format!("{s:.2}"),
        None => "n/a".to_string(),
    };
    format!("[{ticker}] {signal} @ {price:.2} | stop loss {stop}")
}
