use crate::registry::{now_unix_secs, LinkStatus, Registry};
use std::thread;
use std::time::Duration;

/// Periodic sweep marking stale records offline. Never touches `connected`
/// or closes a Link — the Telemetry Reader is the only thing that can revive
/// a record, and transient UDP loss must not destroy session state.
pub fn spawn(registry: Registry, sweep_interval: Duration, stale_after: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        sweep(&registry, stale_after);
        thread::sleep(sweep_interval);
    })
}

fn sweep(registry: &Registry, stale_after: Duration) {
    let now = now_unix_secs();
    for record in registry.snapshot_all() {
        let is_stale = match record.last_heartbeat {
            Some(last) => now.saturating_sub(last) > stale_after.as_secs(),
            None => true,
        };
        if is_stale && record.status == LinkStatus::Online {
            let _ = registry.update(&record.uav_id, |record| record.status = LinkStatus::Offline);
        }
    }
}
