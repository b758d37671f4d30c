//! Session interface for the legacy color sensor protocol.

use crate::analog::NXT_COLOR_BYTES;
use crate::types::Port;

/// A per-port legacy color session driven by a fast bit timer.
///
/// The connection manager starts a session, polls [`ready`](Self::ready)
/// once per tick and collects the response when the session has finished.
/// Sessions on different ports share one bit timer; the implementation arms
/// it on the first `start` and cancels it when the last session stops.
pub trait ColorProtocol {
    /// Begin a session on `port` that sends `command` and reads the
    /// calibration block.
    fn start(&mut self, port: Port, command: u8);

    /// `true` once the session on `port` has finished (or was never started).
    fn ready(&self, port: Port) -> bool;

    /// Abort or release the session on `port`. Idempotent.
    fn stop(&mut self, port: Port);

    /// Bytes received by the last session on `port`.
    fn response(&self, port: Port) -> &[u8; NXT_COLOR_BYTES];
}
