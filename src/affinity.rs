//! # Affinity
//!
//! Keeps the benchmark on one logical CPU so the scheduler can't migrate it
//! mid-measurement and leave a cold L1 behind. The OS specifics (core mask on
//! Windows, `sched_setaffinity` on Linux/Android/FreeBSD, thread affinity policy
//! on macOS) come from `core_affinity`; everything here talks to them through
//! [`SchedulerControl`] so the harness can run against a stub.
use crate::error::BenchError;
use log::{info, warn};

/// Scheduler facilities the harness relies on
pub trait SchedulerControl {
    /// Logical CPUs the process is currently permitted to run on, `None` if the
    /// permitted set can't be queried
    fn allowed_cores(&self) -> Option<Vec<usize>>;

    /// Restrict the calling (and only) benchmark thread to exactly `core`.
    ///
    /// `OsScheduler` sets thread affinity only. The process-wide mask (e.g.
    /// `SetProcessAffinityMask` on Windows) is left as is, which pins the whole
    /// workload here because every timed region runs on this one thread.
    fn pin(&self, core: usize) -> Result<(), BenchError>;

    /// Raise the calling thread to maximum priority, returns `false` on failure
    fn raise_priority(&self) -> bool;
}

/// Real scheduler via `core_affinity` and `thread-priority`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsScheduler;

impl SchedulerControl for OsScheduler {
    fn allowed_cores(&self) -> Option<Vec<usize>> {
        core_affinity::get_core_ids().map(|ids| ids.into_iter().map(|c| c.id).collect())
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "windows",
        target_os = "macos"
    ))]
    fn pin(&self, core: usize) -> Result<(), BenchError> {
        if core_affinity::set_for_current(core_affinity::CoreId { id: core }) {
            Ok(())
        } else {
            Err(BenchError::AffinityDenied { core })
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "windows",
        target_os = "macos"
    )))]
    fn pin(&self, _core: usize) -> Result<(), BenchError> {
        Err(BenchError::AffinityUnsupported)
    }

    fn raise_priority(&self) -> bool {
        thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max).is_ok()
    }
}

/// Which core the run ended up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinOutcome {
    pub core: usize,
    /// `false` means the run is unpinned and timings may be noisier
    pub pinned: bool,
}

/// Lowest-numbered core the process may already run on, or core 0 if the
/// permitted set is unknown
pub fn select_preferred_core(ctl: &impl SchedulerControl) -> usize {
    match ctl.allowed_cores().and_then(|cores| cores.into_iter().min()) {
        Some(core) => core,
        None => {
            warn!("Couldn't query permitted CPU set, defaulting to core 0");
            0
        }
    }
}

/// Pin to `core`. Failure is reported and logged, never fatal.
pub fn pin_to_core(ctl: &impl SchedulerControl, core: usize) -> bool {
    match ctl.pin(core) {
        Ok(()) => {
            info!("Pinned benchmark thread to CPU core {core}");
            true
        }
        Err(BenchError::AffinityUnsupported) => {
            warn!("CPU affinity control is unsupported on this platform, running unpinned");
            false
        }
        Err(e) => {
            warn!("{e}, running unpinned (NOTE: this is expected on some macOS versions)");
            false
        }
    }
}

/// Select the preferred core, pin to it, and bump thread priority
pub fn pin_preferred_core(ctl: &impl SchedulerControl) -> PinOutcome {
    let core = select_preferred_core(ctl);
    let pinned = pin_to_core(ctl, core);
    if !ctl.raise_priority() {
        warn!("Couldn't set benchmark thread to maximum thread priority");
    }
    PinOutcome { core, pinned }
}
