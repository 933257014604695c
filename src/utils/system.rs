// src/utils/system.rs: System functions

use std::time::Duration;

use anyhow::Result;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::time::sleep;


/// Determines number of cores that can be used by the wrapped tools
///
/// # Arguments
///
/// * `args_threads` - Thread budget from the command line.
///
/// # Returns
///
/// Result<(usize, f32)> maximum cores, current cpu usage
pub async fn detect_cores_and_load(args_threads: usize) -> Result<(usize, f32)> {
    let refresh_kind = RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing());
    let mut system = System::new_with_specifics(refresh_kind);
    system.refresh_cpu_all();
    let logical_cores = system.cpus().len().max(1);
    let physical_cores = System::physical_core_count().unwrap_or(logical_cores);
    system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
    sleep(Duration::from_millis(100)).await;
    system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
    let cpu_load = system.global_cpu_usage();
    Ok((thread_budget(physical_cores, args_threads), cpu_load))
}

/// Threads handed to tools never exceed the requested budget or the machine.
pub fn thread_budget(physical_cores: usize, args_threads: usize) -> usize {
    physical_cores.min(args_threads).max(1)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_bounded() {
        assert_eq!(thread_budget(8, 32), 8);
        assert_eq!(thread_budget(64, 32), 32);
        assert_eq!(thread_budget(8, 0), 1);
    }

    #[tokio::test]
    async fn detects_at_least_one_core() {
        let (cores, _load) = detect_cores_and_load(4).await.unwrap();
        assert!(cores >= 1 && cores <= 4);
    }
}
