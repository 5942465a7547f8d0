use std::sync::OnceLock;

use log::{info, warn};

static TOPOLOGY: OnceLock<SystemTopology> = OnceLock::new();

/// Hardware concurrency probe used to size parallel batch work.
#[derive(Debug, Clone)]
pub struct SystemTopology {
    online_cores: usize,
}

impl SystemTopology {
    /// Queries the OS for the number of online cores.
    ///
    /// # Logic
    /// Uses `sysconf(_SC_NPROCESSORS_ONLN)` on Unix, then
    /// `std::thread::available_parallelism`, then a single core. Never fails.
    pub fn detect() -> Self {
        let online_cores = match Self::sysconf_cores().or_else(Self::std_cores) {
            Some(n) => n,
            None => {
                warn!("Failed to detect core count. Fallback to 1.");
                1
            }
        };
        info!("Topology Discovery: {} online cores", online_cores);
        Self { online_cores }
    }

    /// The process-wide probe result, detected once.
    pub fn global() -> &'static SystemTopology {
        TOPOLOGY.get_or_init(Self::detect)
    }

    #[cfg(unix)]
    fn sysconf_cores() -> Option<usize> {
        // SAFETY: sysconf has no preconditions.
        let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if count > 0 {
            Some(count as usize)
        } else {
            None
        }
    }

    #[cfg(not(unix))]
    fn sysconf_cores() -> Option<usize> {
        None
    }

    fn std_cores() -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }

    pub fn online_cores(&self) -> usize {
        self.online_cores
    }

    /// Worker count for a parallel batch, honoring an optional cap. At least 1.
    pub fn worker_threads(&self, cap: Option<usize>) -> usize {
        let n = match cap {
            Some(cap) => self.online_cores.min(cap),
            None => self.online_cores,
        };
        n.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_at_least_one_core() {
        assert!(SystemTopology::detect().online_cores() >= 1);
        assert!(SystemTopology::global().online_cores() >= 1);
    }

    #[test]
    fn test_worker_cap() {
        let topo = SystemTopology { online_cores: 12 };
        assert_eq!(topo.worker_threads(None), 12);
        assert_eq!(topo.worker_threads(Some(4)), 4);
        assert_eq!(topo.worker_threads(Some(64)), 12);
        assert_eq!(topo.worker_threads(Some(0)), 1);
    }
}
