//! Host resource sampling.
//!
//! [`ResourceSampler`] keeps the monitor testable: production uses
//! [`SysinfoSampler`], tests use [`StaticSampler`] or feed samples to the
//! monitor directly.

use chrono::Utc;
use sysinfo::{CpuExt, System, SystemExt};

use crate::monitor::types::SystemSample;

pub trait ResourceSampler: Send + Sync {
    fn sample(&mut self) -> SystemSample;
}

/// Samples the host via `sysinfo`. The `System` handle is kept alive
/// between ticks so CPU usage deltas are meaningful.
pub struct SysinfoSampler {
    sys: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();
        Self { sys }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> SystemSample {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let memory_pct = if total == 0 {
            0.0
        } else {
            self.sys.used_memory() as f64 / total as f64 * 100.0
        };

        SystemSample {
            timestamp: Utc::now(),
            cpu_pct: self.sys.global_cpu_info().cpu_usage() as f64,
            memory_pct,
            load_one: self.sys.load_average().one,
            cpu_count: self
                .sys
                .physical_core_count()
                .unwrap_or_else(|| self.sys.cpus().len())
                .max(1),
        }
    }
}

/// Returns the same reading on every tick.
pub struct StaticSampler {
    sample: SystemSample,
}

impl StaticSampler {
    pub fn new(sample: SystemSample) -> Self {
        Self { sample }
    }

    /// A quiet machine: low CPU, low memory, low load.
    pub fn idle() -> Self {
        Self::new(SystemSample {
            timestamp: Utc::now(),
            cpu_pct: 5.0,
            memory_pct: 20.0,
            load_one: 0.1,
            cpu_count: 4,
        })
    }
}

impl ResourceSampler for StaticSampler {
    fn sample(&mut self) -> SystemSample {
        SystemSample {
            timestamp: Utc::now(),
            ..self.sample.clone()
        }
    }
}
