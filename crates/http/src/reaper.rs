//! Periodic closing of idle keep-alive connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::ConnectionRegistry;
use crate::stats::ServerStats;

/// Sweeps `registry` every `period` until `shutdown` fires, then closes
/// whatever connections are left.
pub(crate) async fn reap_idle(
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ServerStats>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            now = interval.tick() => {
                let reaped = registry.reap(now);
                if reaped > 0 {
                    debug!(reaped, live = registry.len(), "reaped idle connections");
                    stats.connections_reaped(reaped);
                }
            }
        }
    }

    let closed = registry.close_all();
    info!(closed, "closed remaining connections");
}
