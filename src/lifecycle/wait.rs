//! Poll intervals, bounds, and the TCP readiness probe.

use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::LifecycleError;

/// Intervals and bounds for every wait in the lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitSettings {
    /// Delay between instance state polls.
    pub state_poll_interval: Duration,
    /// Bound on start/stop state polls.
    pub state_timeout: Duration,
    /// Delay between port probes.
    pub port_poll_interval: Duration,
    /// Failed port probes tolerated before giving up.
    pub port_max_attempts: u32,
    /// Timeout of a single port probe.
    pub connect_timeout: Duration,
    /// Pause after the port opens; early boot can still fail package updates.
    pub settle_delay: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            state_poll_interval: Duration::from_secs(5),
            state_timeout: Duration::from_secs(120),
            port_poll_interval: Duration::from_secs(3),
            port_max_attempts: 10,
            connect_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(20),
        }
    }
}

impl WaitSettings {
    /// Settings with every delay at zero and a single port probe, for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            state_poll_interval: Duration::ZERO,
            state_timeout: Duration::from_secs(5),
            port_poll_interval: Duration::ZERO,
            port_max_attempts: 1,
            connect_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
        }
    }
}

/// Probes `address` until it accepts a TCP connection.
///
/// # Errors
///
/// Returns [`LifecycleError::PortNeverOpened`] after
/// [`WaitSettings::port_max_attempts`] failed probes.
pub fn wait_for_port(address: SocketAddr, settings: &WaitSettings) -> Result<(), LifecycleError> {
    let mut attempts = 0_u32;
    loop {
        if TcpStream::connect_timeout(&address, settings.connect_timeout).is_ok() {
            return Ok(());
        }
        attempts += 1;
        if attempts >= settings.port_max_attempts {
            return Err(LifecycleError::PortNeverOpened { address, attempts });
        }
        debug!(%address, attempts, "port not open yet");
        thread::sleep(settings.port_poll_interval);
    }
}
