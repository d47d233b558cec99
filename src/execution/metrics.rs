use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Real-time counters for one hashing fan-out.
///
/// Tasks update these while they run; callers can snapshot them at any time.
#[derive(Default)]
pub struct HashMetrics {
    tasks_started: AtomicU64,
    tasks_finished: AtomicU64,
    files_hashed: AtomicU64,
    files_missing: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_tasks: AtomicUsize,
    max_active_tasks: AtomicUsize,
}

impl HashMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task was admitted and starts reading its file.
    pub fn on_task_start(&self) {
        let _ = self.tasks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_tasks.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_tasks, now);
    }

    /// A task is done with the filesystem; `hashed` is false when the file was missing/unreadable.
    pub fn on_task_end(&self, hashed: bool) {
        let _ = self.active_tasks.fetch_sub(1, Ordering::SeqCst);
        let _ = self.tasks_finished.fetch_add(1, Ordering::SeqCst);
        if hashed {
            let _ = self.files_hashed.fetch_add(1, Ordering::SeqCst);
        } else {
            let _ = self.files_missing.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HashMetricsSnapshot {
        HashMetricsSnapshot {
            tasks_started: self.tasks_started.load(Ordering::SeqCst),
            tasks_finished: self.tasks_finished.load(Ordering::SeqCst),
            files_hashed: self.files_hashed.load(Ordering::SeqCst),
            files_missing: self.files_missing.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_tasks: self.max_active_tasks.load(Ordering::SeqCst),
        }
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`HashMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashMetricsSnapshot {
    pub tasks_started: u64,
    pub tasks_finished: u64,
    pub files_hashed: u64,
    pub files_missing: u64,
    pub throttle_wait: Duration,
    pub max_active_tasks: usize,
}

impl fmt::Display for HashMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tasks={}/{}, hashed={}, missing={}, max_active_tasks={}, throttle_wait={:?}",
            self.tasks_finished,
            self.tasks_started,
            self.files_hashed,
            self.files_missing,
            self.max_active_tasks,
            self.throttle_wait
        )
    }
}
