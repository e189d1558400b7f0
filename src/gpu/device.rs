//! Adapter resolution and device creation.
//!
//! A device is bound to one adapter for its whole life. It owns the driver it
//! was created through so buffers can reach the driver via the device.

use crate::desc::FeatureLevel;
use crate::driver::GpuDriver;
use crate::error::HarnessError;
use crate::gpu::adapter::{AdapterDescriptor, AdapterEnumerator};

/// Minimum feature level requested unless the factory is told otherwise.
pub const MIN_FEATURE_LEVEL: FeatureLevel = FeatureLevel::Level11_0;

/// A live adapter handle found by exact description match.
pub struct ResolvedAdapter<A> {
    pub descriptor: AdapterDescriptor,
    pub adapter: A,
}

/// Resolves `target` to a live adapter handle.
///
/// Enumerates the system again (no cache) and returns the first adapter whose
/// description equals `target` exactly. Case and whitespace are significant.
///
/// # Errors
///
/// Returns `HarnessError::EnumerationUnavailable` if the factory cannot be
/// created, or `HarnessError::AdapterNotFound` if nothing matches.
pub fn find_adapter<D: GpuDriver>(
    driver: &D,
    target: &str,
) -> Result<ResolvedAdapter<D::Adapter>, HarnessError> {
    let mut available = Vec::new();
    for (descriptor, adapter) in AdapterEnumerator::new(driver)? {
        if descriptor.description == target {
            return Ok(ResolvedAdapter {
                descriptor,
                adapter,
            });
        }
        available.push(descriptor.description);
    }
    Err(HarnessError::AdapterNotFound {
        target: target.to_string(),
        available,
    })
}

/// Logical device bound to a single adapter.
pub struct Device<D: GpuDriver> {
    // Dropped before `driver`
    raw: D::Device,
    driver: D,
    adapter: AdapterDescriptor,
    feature_level: FeatureLevel,
}

impl<D: GpuDriver> Device<D> {
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn raw(&self) -> &D::Device {
        &self.raw
    }

    /// The adapter this device is bound to.
    pub fn adapter(&self) -> &AdapterDescriptor {
        &self.adapter
    }

    pub fn feature_level(&self) -> FeatureLevel {
        self.feature_level
    }
}

impl<D: GpuDriver> std::fmt::Debug for Device<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.driver.name())
            .field("adapter", &self.adapter)
            .field("feature_level", &self.feature_level)
            .finish()
    }
}

/// Creates devices at a fixed minimum feature level.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFactory {
    min_feature_level: FeatureLevel,
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self {
            min_feature_level: MIN_FEATURE_LEVEL,
        }
    }
}

impl DeviceFactory {
    pub fn new(min_feature_level: FeatureLevel) -> Self {
        Self { min_feature_level }
    }

    /// Resolves `target` and creates a device on it.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::AdapterNotFound` if no adapter matches, or
    /// `HarnessError::DeviceCreationFailed` if the driver rejects the device.
    pub fn create_device<D: GpuDriver>(&self, driver: D, target: &str) -> Result<Device<D>, HarnessError> {
        let resolved = find_adapter(&driver, target)?;
        log::debug!(
            "Resolved \"{}\" to adapter {} on {}",
            target,
            resolved.descriptor.index,
            driver.name()
        );

        let raw = driver
            .create_device(&resolved.adapter, self.min_feature_level)
            .map_err(|source| HarnessError::DeviceCreationFailed {
                adapter: resolved.descriptor.description.clone(),
                source,
            })?;

        log::info!(
            "Created device on {} (feature level {})",
            resolved.descriptor.description,
            self.min_feature_level
        );

        Ok(Device {
            raw,
            driver,
            adapter: resolved.descriptor,
            feature_level: self.min_feature_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::simulated::{DriverCall, SimulatedDriver};

    const BRD: &str = "Microsoft Basic Render Driver";

    #[test]
    fn test_find_adapter_exact_match() {
        let driver = SimulatedDriver::new(["Other", BRD]);
        let resolved = find_adapter(&driver, BRD).unwrap();
        assert_eq!(resolved.descriptor.description, BRD);
        assert_eq!(resolved.descriptor.index, 1);
    }

    #[test]
    fn test_find_adapter_returns_first_match() {
        let driver = SimulatedDriver::new([BRD, BRD]);
        let resolved = find_adapter(&driver, BRD).unwrap();
        assert_eq!(resolved.descriptor.index, 0);
    }

    #[test]
    fn test_find_adapter_rejects_case_and_whitespace() {
        let driver = SimulatedDriver::new([BRD]);
        for target in [
            "microsoft basic render driver",
            "Microsoft Basic Render Driver ",
            " Microsoft Basic Render Driver",
            "Microsoft Basic Render",
        ] {
            match find_adapter(&driver, target) {
                Err(HarnessError::AdapterNotFound { target: t, available }) => {
                    assert_eq!(t, target);
                    assert_eq!(available, vec![BRD.to_string()]);
                }
                _ => panic!("Expected AdapterNotFound for {:?}", target),
            }
        }
    }

    #[test]
    fn test_find_adapter_reenumerates() {
        let driver = SimulatedDriver::new([BRD]);
        find_adapter(&driver, BRD).unwrap();
        find_adapter(&driver, BRD).unwrap();
        let factories = driver
            .calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::CreateFactory))
            .count();
        assert_eq!(factories, 2);
    }

    #[test]
    fn test_create_device() {
        let driver = SimulatedDriver::new([BRD]);
        let device = DeviceFactory::default()
            .create_device(driver.clone(), BRD)
            .unwrap();
        assert_eq!(device.adapter().description, BRD);
        assert_eq!(device.feature_level(), FeatureLevel::Level11_0);
        assert_eq!(driver.live_devices(), 1);
        assert!(driver.calls().contains(&DriverCall::CreateDevice {
            adapter: BRD.to_string(),
            min_feature_level: FeatureLevel::Level11_0,
        }));

        drop(device);
        assert_eq!(driver.live_devices(), 0);
    }

    #[test]
    fn test_create_device_custom_feature_level() {
        let driver = SimulatedDriver::new([BRD]);
        let device = DeviceFactory::new(FeatureLevel::Level12_0)
            .create_device(driver, BRD)
            .unwrap();
        assert_eq!(device.feature_level(), FeatureLevel::Level12_0);
    }

    #[test]
    fn test_create_device_adapter_not_found() {
        let driver = SimulatedDriver::new([BRD]);
        let result = DeviceFactory::default().create_device(driver.clone(), "Compute Only Sample Driver");
        assert!(matches!(result, Err(HarnessError::AdapterNotFound { .. })));
        assert!(!driver
            .calls()
            .iter()
            .any(|c| matches!(c, DriverCall::CreateDevice { .. })));
    }

    #[test]
    fn test_create_device_driver_failure() {
        let driver = SimulatedDriver::new([BRD]).with_device_creation_failure();
        let result = DeviceFactory::default().create_device(driver.clone(), BRD);
        match result {
            Err(HarnessError::DeviceCreationFailed { adapter, .. }) => assert_eq!(adapter, BRD),
            other => panic!("Expected DeviceCreationFailed, got {:?}", other),
        }
        assert_eq!(driver.live_devices(), 0);
    }

    #[test]
    fn test_create_device_enumeration_unavailable() {
        let driver = SimulatedDriver::new([BRD]).with_factory_unavailable();
        let result = DeviceFactory::default().create_device(driver, BRD);
        assert!(matches!(result, Err(HarnessError::EnumerationUnavailable(_))));
    }
}
