// Kernel counters under a proc root: stat, meminfo, uptime.

use crate::models::{HostCpu, HostMemory, HostMetrics};
use anyhow::Context;
use std::path::Path;

/// Aggregate jiffies from the first `cpu` line of `stat`. `idle` includes iowait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map_while(|v| v.parse().ok())
        .collect();
    if values.len() < 4 {
        return None;
    }
    // user nice system idle iowait irq softirq steal; guest columns are already counted in user/nice.
    let total = values.iter().take(8).fold(0u64, |acc, v| acc.saturating_add(*v));
    let idle = values[3].saturating_add(values.get(4).copied().unwrap_or(0));
    Some(CpuTimes { total, idle })
}

/// Busy share of the jiffies elapsed since `prev`.
pub fn cpu_percent(prev: CpuTimes, cur: CpuTimes) -> f64 {
    let total = cur.total.saturating_sub(prev.total);
    let idle = cur.idle.saturating_sub(prev.idle);
    if total == 0 {
        return 0.0;
    }
    (total.saturating_sub(idle) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Values in kB as the kernel reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: Option<u64>,
}

pub fn parse_meminfo(s: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in s.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        match key {
            "MemTotal" => info.total_kb = value,
            "MemFree" => info.free_kb = value,
            "MemAvailable" => info.available_kb = Some(value),
            _ => {}
        }
    }
    info
}

/// `used` counts page cache (total - free); `usage` is the share not available.
pub fn memory_metrics(m: &MemInfo) -> HostMemory {
    let total = m.total_kb.saturating_mul(1024);
    let free = m.free_kb.saturating_mul(1024);
    let available = m.available_kb.map_or(free, |kb| kb.saturating_mul(1024));
    let usage = if total > 0 {
        (total.saturating_sub(available) as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    HostMemory {
        total,
        free,
        available,
        used: total.saturating_sub(free),
        usage,
    }
}

pub fn parse_uptime(s: &str) -> Option<f64> {
    s.split_whitespace().next()?.parse().ok()
}

async fn read_file(root: &Path, name: &str) -> anyhow::Result<String> {
    let path = root.join(name);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("read {}", path.display()))
}

/// Current aggregate CPU counters; the baseline a sampler diffs its first tick against.
pub(super) async fn read_cpu_times(root: &Path) -> anyhow::Result<CpuTimes> {
    let stat = read_file(root, "stat").await?;
    parse_cpu_times(&stat).context("no aggregate cpu line in stat")
}

/// Reads all three files fresh; returns the metrics and the CPU reading for the next delta.
/// Without a previous reading CPU usage is 0 rather than an average since boot.
pub(super) async fn read_host(
    root: &Path,
    prev: Option<CpuTimes>,
) -> anyhow::Result<(HostMetrics, CpuTimes)> {
    let (stat, meminfo, uptime) = tokio::try_join!(
        read_file(root, "stat"),
        read_file(root, "meminfo"),
        read_file(root, "uptime")
    )?;

    let cpu = parse_cpu_times(&stat).context("no aggregate cpu line in stat")?;
    let metrics = HostMetrics {
        cpu: HostCpu {
            usage: prev.map_or(0.0, |prev| cpu_percent(prev, cpu)),
        },
        memory: memory_metrics(&parse_meminfo(&meminfo)),
        uptime: parse_uptime(&uptime).unwrap_or(0.0),
    };
    Ok((metrics, cpu))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  4705 150 1120 16250 520 30 45 0 0 0\ncpu0 2000 70 500 8000 300 10 20 0 0 0\nintr 12345\n";

    #[test]
    fn parses_aggregate_cpu_line() {
        let t = parse_cpu_times(STAT).unwrap();
        assert_eq!(t.total, 4705 + 150 + 1120 + 16250 + 520 + 30 + 45);
        assert_eq!(t.idle, 16250 + 520);
        assert!(parse_cpu_times("cpu0 1 2 3 4\n").is_none());
        assert!(parse_cpu_times("cpu  1 2\n").is_none());
    }

    #[test]
    fn cpu_percent_uses_delta_between_samples() {
        let prev = CpuTimes { total: 1_000, idle: 800 };
        let cur = CpuTimes { total: 1_200, idle: 850 };
        // Since-boot ratio would be 29.2%; the delta is what counts.
        assert!((cpu_percent(prev, cur) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_percent_without_elapsed_jiffies_is_zero() {
        let t = CpuTimes { total: 500, idle: 100 };
        assert_eq!(cpu_percent(t, t), 0.0);
        assert_eq!(cpu_percent(CpuTimes::default(), CpuTimes::default()), 0.0);
    }

    #[test]
    fn meminfo_to_bytes_and_usage() {
        let info = parse_meminfo(
            "MemTotal:        8000000 kB\nMemFree:         1000000 kB\nMemAvailable:    6000000 kB\nBuffers:          100 kB\n",
        );
        let m = memory_metrics(&info);
        assert_eq!(m.total, 8_000_000 * 1024);
        assert_eq!(m.free, 1_000_000 * 1024);
        assert_eq!(m.available, 6_000_000 * 1024);
        assert_eq!(m.used, 7_000_000 * 1024);
        assert!((m.usage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn meminfo_without_available_falls_back_to_free() {
        let m = memory_metrics(&parse_meminfo("MemTotal: 100 kB\nMemFree: 40 kB\n"));
        assert_eq!(m.available, 40 * 1024);
        assert_eq!(m.used, 60 * 1024);
        assert!((m.usage - 60.0).abs() < 1e-9);
        assert_eq!(memory_metrics(&MemInfo::default()).usage, 0.0);
    }

    #[test]
    fn uptime_first_field() {
        assert_eq!(parse_uptime("35421.77 140012.35\n"), Some(35421.77));
        assert_eq!(parse_uptime(""), None);
    }

    #[tokio::test]
    async fn reads_files_under_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stat"), STAT).unwrap();
        std::fs::write(
            dir.path().join("meminfo"),
            "MemTotal: 1000 kB\nMemFree: 500 kB\nMemAvailable: 750 kB\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("uptime"), "12.5 40.0\n").unwrap();

        let (metrics, cpu) = read_host(dir.path(), None).await.unwrap();
        assert_eq!(metrics.uptime, 12.5);
        assert_eq!(metrics.cpu.usage, 0.0);
        assert_eq!(metrics.memory.used, 500 * 1024);
        assert!((metrics.memory.usage - 25.0).abs() < 1e-9);
        assert_eq!(cpu, parse_cpu_times(STAT).unwrap());
        assert_eq!(read_cpu_times(dir.path()).await.unwrap(), cpu);

        let missing = read_host(&dir.path().join("nope"), None).await;
        assert!(missing.is_err());
    }
}
