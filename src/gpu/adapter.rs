//! Adapter enumeration.
//!
//! Adapters are queried by increasing index from 0 until the driver reports
//! nothing at an index. Adapters without the extended descriptor interface are
//! skipped. Nothing is cached: every listing and every lookup enumerates the
//! system again.

use crate::driver::{AdapterProbe, GpuDriver};
use crate::error::HarnessError;

/// Description of an enumerated adapter.
///
/// Only a snapshot. Use [`find_adapter`](crate::gpu::device::find_adapter) to
/// get a live handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// Index the driver reported this adapter at.
    pub index: u32,
    /// Human-readable description, e.g. "Microsoft Basic Render Driver".
    pub description: String,
}

impl std::fmt::Display for AdapterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.index, self.description)
    }
}

/// Lazy walk over the system's adapters.
///
/// Each enumerator starts from index 0, so restarting is creating a new one.
/// Yields each adapter's descriptor together with its live handle.
pub struct AdapterEnumerator<'d, D: GpuDriver> {
    driver: &'d D,
    factory: D::Factory,
    next_index: u32,
    done: bool,
}

impl<'d, D: GpuDriver> AdapterEnumerator<'d, D> {
    /// Creates the enumeration factory.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::EnumerationUnavailable` if the driver cannot
    /// create the factory.
    pub fn new(driver: &'d D) -> Result<Self, HarnessError> {
        let factory = driver
            .create_factory()
            .map_err(HarnessError::EnumerationUnavailable)?;
        Ok(Self {
            driver,
            factory,
            next_index: 0,
            done: false,
        })
    }
}

impl<D: GpuDriver> Iterator for AdapterEnumerator<'_, D> {
    type Item = (AdapterDescriptor, D::Adapter);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let index = self.next_index;
            match self.driver.enum_adapter(&self.factory, index) {
                AdapterProbe::Found {
                    adapter,
                    description,
                } => {
                    self.next_index += 1;
                    return Some((AdapterDescriptor { index, description }, adapter));
                }
                AdapterProbe::MissingExtendedInterface => {
                    log::debug!("Skipping adapter {}: no extended descriptor interface", index);
                    self.next_index += 1;
                }
                AdapterProbe::End => self.done = true,
            }
        }
        None
    }
}

/// Lists every adapter visible to the system, in driver order.
///
/// # Errors
///
/// Returns `HarnessError::EnumerationUnavailable` if the enumeration factory
/// cannot be created.
pub fn list_adapters<D: GpuDriver>(driver: &D) -> Result<Vec<AdapterDescriptor>, HarnessError> {
    let adapters: Vec<AdapterDescriptor> = AdapterEnumerator::new(driver)?
        .map(|(descriptor, _)| descriptor)
        .collect();
    log::debug!("{} backend reported {} adapter(s)", driver.name(), adapters.len());
    Ok(adapters)
}
