//! Status role
//!
//! Publishes a `system_status` envelope on a fixed cadence so every node
//! in the mesh can see every other node's health without asking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::{Components, Disks, Networks, System};

use vigil_core::{ShutdownToken, Timestamp};
use vigil_mesh::MeshClient;
use vigil_wire::{Envelope, StatusPayload};

/// One sampling pass over the host.
#[derive(Clone, Debug, Default)]
pub struct StatusReading {
    pub cpu_percent: f32,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_percent: f32,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_percent: f32,
    pub net_up_kbps: f64,
    pub net_down_kbps: f64,
    pub temperature_c: Option<f32>,
}

/// Source of host resource readings, injectable so the status loop can
/// run against a scripted probe in tests.
pub trait ResourceSampler: Send {
    fn sample(&mut self) -> StatusReading;
}

/// The real probe, backed by `sysinfo`. Network speeds are deltas over
/// the time elapsed since the previous sample.
pub struct SysinfoSampler {
    system: System,
    networks: Networks,
    disks: Disks,
    components: Components,
    last_sample: Instant,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        SysinfoSampler {
            system: System::new(),
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            last_sample: Instant::now(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> StatusReading {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.networks.refresh();
        self.disks.refresh();
        self.components.refresh();

        let elapsed = self.last_sample.elapsed().as_secs_f64().max(0.001);
        self.last_sample = Instant::now();

        let (mut rx_bytes, mut tx_bytes) = (0u64, 0u64);
        for (_, data) in &self.networks {
            rx_bytes += data.received();
            tx_bytes += data.transmitted();
        }

        let (mut disk_total, mut disk_free) = (0u64, 0u64);
        for disk in &self.disks {
            disk_total += disk.total_space();
            disk_free += disk.available_space();
        }
        let disk_used = disk_total.saturating_sub(disk_free);

        let mem_total = self.system.total_memory();
        let mem_used = self.system.used_memory();

        StatusReading {
            cpu_percent: self.system.global_cpu_info().cpu_usage(),
            mem_total,
            mem_used,
            mem_percent: percent(mem_used, mem_total),
            disk_total,
            disk_used,
            disk_percent: percent(disk_used, disk_total),
            net_up_kbps: tx_bytes as f64 / 1024.0 / elapsed,
            net_down_kbps: rx_bytes as f64 / 1024.0 / elapsed,
            temperature_c: self.components.iter().next().map(|c| c.temperature()),
        }
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

pub(crate) async fn run_status_loop(
    mesh: Arc<MeshClient>,
    mut sampler: Box<dyn ResourceSampler>,
    interval: Duration,
    mut shutdown: ShutdownToken,
) {
    let node_id = mesh.node_id().clone();
    tracing::info!(%node_id, "status role started");

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let reading = sampler.sample();
        let payload = StatusPayload {
            node_id: node_id.clone(),
            ts: Timestamp::now(),
            cpu_percent: reading.cpu_percent,
            mem_total: reading.mem_total,
            mem_used: reading.mem_used,
            mem_percent: reading.mem_percent,
            disk_total: reading.disk_total,
            disk_used: reading.disk_used,
            disk_percent: reading.disk_percent,
            net_up_kbps: reading.net_up_kbps,
            net_down_kbps: reading.net_down_kbps,
            temperature_c: reading.temperature_c,
        };
        if let Err(e) = mesh.publish(&Envelope::SystemStatus(payload)) {
            tracing::warn!("status publish failed: {e}");
        }
    }

    tracing::info!(%node_id, "status role stopped");
}
