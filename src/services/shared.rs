//! Shared controller state for the web surface and the simulator loop.
//!
//! `SharedDcmState` wraps one [`DcmController`] behind a mutex together with
//! the instant it was created, which becomes the controller's time base: the
//! background loop calls [`catch_up`](SharedDcmState::catch_up) to run every
//! job that fell due since, and request handlers take the lock briefly to
//! read or write.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use brick_dcm::services::SharedDcmState;
//!
//! let state = Arc::new(SharedDcmState::new(controller));
//!
//! // Background loop
//! state.catch_up()?;
//!
//! // Handlers
//! let snapshot = state.snapshot();
//! state.with_controller(|c| c.write_control(b"e0---"));
//! ```

use std::sync::Mutex;
use std::time::Instant;

use crate::controller::{BrickSnapshot, DcmController};
use crate::traits::{AdcSpi, PortPins};

/// One controller shared by every service.
///
/// Uses `Mutex` rather than `RwLock`: the sampler loop writes every few
/// hundred microseconds, reads are comparatively rare.
pub struct SharedDcmState<P: PortPins, S: AdcSpi> {
    controller: Mutex<DcmController<P, S>>,
    start_time: Instant,
}

impl<P: PortPins, S: AdcSpi> SharedDcmState<P, S> {
    /// Wrap a controller. Its clock is aligned with `Instant::now()`.
    pub fn new(controller: DcmController<P, S>) -> Self {
        Self {
            controller: Mutex::new(controller),
            start_time: Instant::now(),
        }
    }

    /// Microseconds since the state was created.
    #[inline]
    pub fn now_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Time base of [`now_us`](Self::now_us).
    #[inline]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Access the controller with the lock held.
    ///
    /// The closure pattern keeps the lock from being held across await
    /// points.
    pub fn with_controller<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DcmController<P, S>) -> R,
    {
        let mut guard = self.controller.lock().unwrap();
        f(&mut guard)
    }

    /// Run every job due up to now.
    pub fn catch_up(&self) -> Result<(), S::Error> {
        let now_us = self.now_us();
        self.with_controller(|controller| controller.run_until(now_us))
    }

    /// Snapshot of every port.
    pub fn snapshot(&self) -> BrickSnapshot {
        self.controller.lock().unwrap().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DcmConfig};
    use crate::hal::{MockAdc, MockPins};
    use crate::Port;
    use std::sync::Arc;

    fn state() -> SharedDcmState<MockPins, MockAdc> {
        let config = Config::default().with_dcm(DcmConfig::default().with_device_reset_ms(20));
        let controller = DcmController::new(MockPins::new(), MockAdc::new(), &config).unwrap();
        SharedDcmState::new(controller)
    }

    #[test]
    fn creation() {
        let state = state();
        assert!(state.now_us() < 100_000);
        assert!(state.start_time().elapsed().as_millis() < 100);
    }

    #[test]
    fn catch_up_follows_wall_clock() {
        let state = state();
        std::thread::sleep(std::time::Duration::from_millis(15));
        state.catch_up().unwrap();

        let controller_us = state.with_controller(|c| c.now_us());
        assert!(controller_us >= 15_000);
        assert!(state.snapshot().sampler_cycles >= 15);
    }

    #[test]
    fn with_controller_writes() {
        let state = state();
        state.with_controller(|c| c.write_control(b"e0---")).unwrap();
        assert!(!state.snapshot().inputs[Port::P1.index()].fsm_enabled);
    }

    #[test]
    fn concurrent_access() {
        let state = Arc::new(state());
        let reader = Arc::clone(&state);

        let handle = std::thread::spawn(move || {
            for _ in 0..10 {
                let _ = reader.snapshot();
            }
        });
        for _ in 0..10 {
            state.catch_up().unwrap();
        }
        handle.join().unwrap();
    }
}
