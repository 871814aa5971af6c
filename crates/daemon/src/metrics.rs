// SPDX-License-Identifier: MIT

//! Metrics (`spec.md` §4.O): system and per-agent sampling, built on
//! `sysinfo::System` refreshed at query time. No background aggregation
//! beyond a short moving average for CPU, kept per agent.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use sysinfo::{Disks, Networks, Pid, System};

const CPU_WINDOW: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub disk_bytes: Vec<(String, u64)>,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub load_average: (f64, f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentMetrics {
    pub rss_bytes: u64,
    pub cpu_percent: f32,
    pub syscall_count: u64,
    pub uptime_secs: u64,
}

#[derive(Default)]
pub struct Metrics {
    system: Mutex<System>,
    cpu_history: Mutex<HashMap<u32, VecDeque<f32>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(&self) -> SystemMetrics {
        let mut sys = self.system.lock();
        sys.refresh_all();
        let cpu_percent = sys.global_cpu_info().cpu_usage();
        let memory_used_bytes = sys.used_memory();
        let memory_total_bytes = sys.total_memory();

        let disks = Disks::new_with_refreshed_list();
        let disk_bytes = disks
            .iter()
            .map(|disk| {
                let used = disk.total_space().saturating_sub(disk.available_space());
                (disk.name().to_string_lossy().into_owned(), used)
            })
            .collect();

        let networks = Networks::new_with_refreshed_list();
        let (network_rx_bytes, network_tx_bytes) = networks
            .iter()
            .fold((0u64, 0u64), |(rx, tx), (_iface, data)| {
                (rx + data.total_received(), tx + data.total_transmitted())
            });

        let load = System::load_average();
        SystemMetrics {
            cpu_percent,
            memory_used_bytes,
            memory_total_bytes,
            disk_bytes,
            network_rx_bytes,
            network_tx_bytes,
            load_average: (load.one, load.five, load.fifteen),
        }
    }

    pub fn agent(&self, pid: u32, syscall_count: u64, uptime_secs: u64) -> Option<AgentMetrics> {
        let mut sys = self.system.lock();
        sys.refresh_all();
        let process = sys.process(Pid::from_u32(pid))?;
        let sample = process.cpu_usage();

        let mut history = self.cpu_history.lock();
        let window = history.entry(pid).or_default();
        if window.len() >= CPU_WINDOW {
            window.pop_front();
        }
        window.push_back(sample);
        let averaged = window.iter().sum::<f32>() / window.len() as f32;

        Some(AgentMetrics { rss_bytes: process.memory(), cpu_percent: averaged, syscall_count, uptime_secs })
    }

    pub fn remove_agent(&self, pid: u32) {
        self.cpu_history.lock().remove(&pid);
    }

    /// Best-effort cgroup v2 unified-hierarchy counters; an empty object
    /// when the host has no cgroup filesystem mounted there (`spec.md`
    /// §4.O: "returns controller counters where available").
    pub fn cgroup(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        if let Ok(mem) = std::fs::read_to_string("/sys/fs/cgroup/memory.current") {
            if let Ok(bytes) = mem.trim().parse::<u64>() {
                counters.insert("memory_current_bytes".into(), serde_json::json!(bytes));
            }
        }
        if let Ok(stat) = std::fs::read_to_string("/sys/fs/cgroup/cpu.stat") {
            for line in stat.lines() {
                if let Some((key, value)) = line.split_once(' ') {
                    if let Ok(n) = value.trim().parse::<u64>() {
                        counters.insert(format!("cpu_{key}"), serde_json::json!(n));
                    }
                }
            }
        }
        serde_json::Value::Object(counters)
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
