//! System-wide network byte counters.
//!
//! The monitor only ever looks at deltas between two readings, so the source
//! just has to hand out cumulative totals.

use serde::Serialize;
use sysinfo::Networks;

/// Cumulative bytes sent/received across all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterReading {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Anything that can produce a [`CounterReading`].
pub trait CounterSource: Send {
    fn read(&mut self) -> CounterReading;
}

/// Counter source backed by `sysinfo`.
pub struct SystemCounters {
    networks: Networks,
}

impl SystemCounters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SystemCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SystemCounters {
    fn read(&mut self) -> CounterReading {
        // Rebuild the interface list so hot-plugged interfaces are counted.
        self.networks.refresh_list();
        self.networks.refresh();
        let reading = self
            .networks
            .list()
            .values()
            .fold(CounterReading::default(), |acc, data| CounterReading {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
            });
        tracing::trace!(
            "Counters: sent={} recv={} over {} interfaces",
            reading.bytes_sent,
            reading.bytes_recv,
            self.networks.list().len()
        );
        reading
    }
}
