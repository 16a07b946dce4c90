// Turn one raw Docker stats payload into a ContainerStatsSample.
// The payload carries both the current and the previous counter readings, so nothing is kept between ticks.

use crate::models::{BlockIo, ContainerStatsSample, MemoryUsage, NetworkIo};
use bollard::models::ContainerStatsResponse;

pub fn compute_sample(s: &ContainerStatsResponse, id: &str, name: &str) -> ContainerStatsSample {
    ContainerStatsSample {
        id: id.to_string(),
        name: name.to_string(),
        cpu_percent: cpu_percent(s),
        memory: memory_usage(s),
        network: network_io(s),
        block_io: block_io(s),
    }
}

/// (Δcontainer / Δsystem) × online cores × 100; 0 when the system delta is not positive.
pub fn cpu_percent(s: &ContainerStatsResponse) -> f64 {
    let (Some(cpu_stats), Some(precpu_stats)) = (s.cpu_stats.as_ref(), s.precpu_stats.as_ref())
    else {
        return 0.0;
    };
    let total = |c: &bollard::models::ContainerCpuStats| {
        c.cpu_usage
            .as_ref()
            .and_then(|u| u.total_usage)
            .unwrap_or(0) as i128
    };

    let cpu_delta = total(cpu_stats) - total(precpu_stats);
    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as i128
        - precpu_stats.system_cpu_usage.unwrap_or(0) as i128;
    let online = cpu_stats
        .online_cpus
        .map(u64::from)
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu_stats
                .cpu_usage
                .as_ref()
                .and_then(|u| u.percpu_usage.as_ref())
                .map(|p| p.len() as u64)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1) as f64;

    if system_delta > 0 && cpu_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * online * 100.0
    } else {
        0.0
    }
}

/// Usage minus page cache; percent is 0 when no limit is reported.
pub fn memory_usage(s: &ContainerStatsResponse) -> MemoryUsage {
    let Some(mem) = s.memory_stats.as_ref() else {
        return MemoryUsage::default();
    };
    let usage = mem.usage.unwrap_or(0);
    let cache = mem
        .stats
        .as_ref()
        .and_then(|st| st.get("cache").or_else(|| st.get("inactive_file")).copied())
        .unwrap_or(0);
    let used = usage.saturating_sub(cache);
    let limit = mem.limit.unwrap_or(0);
    let percent = if limit > 0 {
        (used as f64 / limit as f64) * 100.0
    } else {
        0.0
    };
    MemoryUsage {
        used,
        limit,
        percent,
    }
}

pub fn network_io(s: &ContainerStatsResponse) -> NetworkIo {
    s.networks
        .as_ref()
        .map_or_else(NetworkIo::default, |n| {
            n.values().fold(NetworkIo::default(), |acc, v| NetworkIo {
                rx: acc.rx.saturating_add(v.rx_bytes.unwrap_or(0)),
                tx: acc.tx.saturating_add(v.tx_bytes.unwrap_or(0)),
            })
        })
}

/// Sums "Read" and "Write" entries (cgroup v2 reports them lowercase); other ops are ignored.
pub fn block_io(s: &ContainerStatsResponse) -> BlockIo {
    s.blkio_stats
        .as_ref()
        .and_then(|b| b.io_service_bytes_recursive.as_ref())
        .map_or_else(BlockIo::default, |entries| {
            let mut io = BlockIo::default();
            for e in entries {
                let value = e.value.unwrap_or(0);
                match e.op.as_deref() {
                    Some(op) if op.eq_ignore_ascii_case("read") => {
                        io.read = io.read.saturating_add(value)
                    }
                    Some(op) if op.eq_ignore_ascii_case("write") => {
                        io.write = io.write.saturating_add(value)
                    }
                    _ => {}
                }
            }
            io
        })
}
