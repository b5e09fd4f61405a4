//! Invocation-wide accounting of local CPU, RAM, and test-slot
//! consumption.
//!
//! The manager is constructed once by the build bootstrap and shared by
//! `Arc` with every component that spawns local work; it is deliberately
//! not a global so tests can hold isolated instances.

use crate::error::{Error, Result};
use crate::options::ExecutionOptions;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One action's declared resource requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    /// CPU units (typically cores).
    pub cpu: u32,
    /// RAM in megabytes.
    pub ram_mb: u64,
    /// Local test slots consumed; 1 for test actions, 0 otherwise.
    pub local_test_count: u32,
}

impl ResourceSet {
    /// A requirement of `cpu` units and `ram_mb` megabytes.
    pub fn new(cpu: u32, ram_mb: u64) -> Self {
        Self {
            cpu,
            ram_mb,
            local_test_count: 0,
        }
    }

    /// The same requirement, additionally consuming one local test slot.
    #[must_use]
    pub fn with_test_slot(mut self) -> Self {
        self.local_test_count = 1;
        self
    }

    /// Whether this set reserves nothing.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Component-wise minimum against a budget.
    ///
    /// Requests above the total budget are clamped so they can still be
    /// satisfied (alone) rather than blocking forever.
    #[must_use]
    pub fn clamped_to(&self, budget: &ResourceBudget) -> Self {
        Self {
            cpu: self.cpu.min(budget.cpu),
            ram_mb: self.ram_mb.min(budget.ram_mb),
            local_test_count: self.local_test_count.min(budget.local_test_jobs),
        }
    }
}

/// The invocation-wide ceiling on concurrently reserved resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Total CPU units.
    pub cpu: u32,
    /// Total RAM in megabytes.
    pub ram_mb: u64,
    /// Total local test slots.
    pub local_test_jobs: u32,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self::from(&ExecutionOptions::default())
    }
}

impl From<&ExecutionOptions> for ResourceBudget {
    /// The budget the execution options declare. The bootstrap derives the
    /// invocation's [`ResourceManager`] budget through this, so the
    /// configured knobs are the single source of the ceilings.
    fn from(options: &ExecutionOptions) -> Self {
        Self {
            cpu: options.local_cpu_resources,
            ram_mb: options.local_ram_resources_mb,
            local_test_jobs: options.local_test_jobs,
        }
    }
}

/// Mutable accounting behind the manager's lock.
#[derive(Debug, Default)]
struct Ledger {
    cpu: u32,
    ram_mb: u64,
    local_tests: u32,
    acquires: u64,
    releases: u64,
}

/// Gates concurrent consumption of local resources against a fixed budget.
///
/// `acquire` waits (per caller, asynchronously) until the request fits,
/// honoring cancellation; the returned [`ResourceHandle`] releases exactly
/// once when dropped, on every exit path.
#[derive(Debug)]
pub struct ResourceManager {
    budget: ResourceBudget,
    ledger: Mutex<Ledger>,
    freed: Notify,
}

impl ResourceManager {
    /// A manager over the given budget.
    pub fn new(budget: ResourceBudget) -> Arc<Self> {
        Arc::new(Self {
            budget,
            ledger: Mutex::new(Ledger::default()),
            freed: Notify::new(),
        })
    }

    /// The fixed budget this manager enforces.
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Reserve `resources`, waiting until capacity is available.
    ///
    /// Zero-resource requests still pass through the protocol so
    /// acquire/release accounting stays uniform across all actions.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if `cancel` fires while waiting, and a
    /// protocol error if the manager's lock was poisoned by a panic.
    pub async fn acquire(
        self: &Arc<Self>,
        resources: ResourceSet,
        cancel: &CancellationToken,
    ) -> Result<ResourceHandle> {
        let clamped = resources.clamped_to(&self.budget);
        loop {
            let freed = self.freed.notified();
            tokio::pin!(freed);
            // Register for wakeups before checking, so a release between
            // the check and the await cannot be lost.
            freed.as_mut().enable();

            if self.try_reserve(&clamped)? {
                tracing::debug!(
                    cpu = clamped.cpu,
                    ram_mb = clamped.ram_mb,
                    test_slots = clamped.local_test_count,
                    "acquired local resources"
                );
                return Ok(ResourceHandle {
                    manager: Arc::clone(self),
                    resources: clamped,
                });
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = &mut freed => {}
            }
        }
    }

    /// Current reservation counts `(cpu, ram_mb, test_slots)`.
    pub fn reserved(&self) -> (u32, u64, u32) {
        match self.ledger.lock() {
            Ok(ledger) => (ledger.cpu, ledger.ram_mb, ledger.local_tests),
            Err(_) => (0, 0, 0),
        }
    }

    /// Lifetime acquire/release call counts, for balance checking.
    pub fn protocol_counts(&self) -> (u64, u64) {
        match self.ledger.lock() {
            Ok(ledger) => (ledger.acquires, ledger.releases),
            Err(_) => (0, 0),
        }
    }

    fn try_reserve(&self, resources: &ResourceSet) -> Result<bool> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| Error::ResourceProtocol("resource ledger poisoned".to_owned()))?;
        let fits = ledger.cpu + resources.cpu <= self.budget.cpu
            && ledger.ram_mb + resources.ram_mb <= self.budget.ram_mb
            && ledger.local_tests + resources.local_test_count <= self.budget.local_test_jobs;
        if fits {
            ledger.cpu += resources.cpu;
            ledger.ram_mb += resources.ram_mb;
            ledger.local_tests += resources.local_test_count;
            ledger.acquires += 1;
        }
        Ok(fits)
    }

    fn release(&self, resources: &ResourceSet) {
        let Ok(mut ledger) = self.ledger.lock() else {
            return;
        };
        if ledger.cpu < resources.cpu
            || ledger.ram_mb < resources.ram_mb
            || ledger.local_tests < resources.local_test_count
        {
            // Releasing more than is reserved is an acquire/release
            // imbalance; the RAII handle makes this unreachable in
            // correct code.
            tracing::error!(?resources, "resource release exceeds reservation");
            ledger.cpu = ledger.cpu.saturating_sub(resources.cpu);
            ledger.ram_mb = ledger.ram_mb.saturating_sub(resources.ram_mb);
            ledger.local_tests = ledger.local_tests.saturating_sub(resources.local_test_count);
        } else {
            ledger.cpu -= resources.cpu;
            ledger.ram_mb -= resources.ram_mb;
            ledger.local_tests -= resources.local_test_count;
        }
        ledger.releases += 1;
        drop(ledger);
        self.freed.notify_waiters();
    }
}

/// RAII reservation over a [`ResourceManager`].
///
/// Dropping the handle releases the reservation; this is the only release
/// path, so release-on-every-exit is guaranteed by ownership.
#[derive(Debug)]
pub struct ResourceHandle {
    manager: Arc<ResourceManager>,
    resources: ResourceSet,
}

impl ResourceHandle {
    /// The reservation this handle holds.
    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.manager.release(&self.resources);
    }
}
