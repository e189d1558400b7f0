//! In-process driver used for dry runs and tests.
//!
//! Adapters are plain descriptions. Devices and resources are counted handles
//! whose drops are recorded, so tests can check release order. Each driver
//! entry point can be told to fail.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::desc::{FeatureLevel, HeapFlags, HeapProperties, ResourceDesc, ResourceStates};
use crate::driver::{AdapterProbe, GpuDriver};
use crate::error::DriverError;

/// A driver call observed by the simulated backend.
#[allow(dead_code)] // Fields are read by tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    CreateFactory,
    EnumAdapter(u32),
    CreateDevice { adapter: String, min_feature_level: FeatureLevel },
    CreateCommittedResource { device: u64, width: u64, initial_state: ResourceStates },
    Evict { device: u64, resources: Vec<u64> },
    MakeResident { device: u64, resources: Vec<u64> },
    ReleaseResource(u64),
    ReleaseDevice(u64),
}

#[derive(Debug, Clone)]
struct SimAdapter {
    description: String,
    extended_interface: bool,
}

#[derive(Debug)]
struct SimResource {
    device: u64,
    resident: bool,
}

#[derive(Debug, Default)]
struct SimState {
    adapters: Vec<SimAdapter>,
    factory_unavailable: bool,
    fail_device_creation: bool,
    fail_evict: bool,
    fail_make_resident: bool,
    memory_budget: Option<u64>,
    next_handle: u64,
    live_devices: Vec<u64>,
    live_resources: HashMap<u64, SimResource>,
    release_order_violations: usize,
    calls: Vec<DriverCall>,
}

impl SimState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Simulated GPU driver. Clones share the same simulated system.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    state: Rc<RefCell<SimState>>,
}

/// Adapter handle, an index into the adapter table.
#[derive(Debug, Clone)]
pub struct SimAdapterHandle {
    index: u32,
    description: String,
}

/// Device handle. Dropping it records a device release.
#[derive(Debug)]
pub struct SimDevice {
    id: u64,
    state: Rc<RefCell<SimState>>,
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.live_resources.values().any(|r| r.device == self.id) {
            state.release_order_violations += 1;
        }
        state.live_devices.retain(|d| *d != self.id);
        state.calls.push(DriverCall::ReleaseDevice(self.id));
    }
}

/// Resource handle. Dropping it records a resource release.
#[derive(Debug)]
pub struct SimResourceHandle {
    id: u64,
    state: Rc<RefCell<SimState>>,
}

#[allow(dead_code)] // Used by tests
impl SimResourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SimResourceHandle {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live_resources.remove(&self.id);
        state.calls.push(DriverCall::ReleaseResource(self.id));
    }
}

#[allow(dead_code)] // Failure injection and inspection are used by tests
impl SimulatedDriver {
    /// A system exposing the given adapters, all supporting the extended
    /// descriptor interface.
    pub fn new<I, S>(adapters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let driver = Self::default();
        driver.set_adapters(adapters);
        driver
    }

    /// The system the probe is usually pointed at when no test driver is
    /// installed: only the software renderer is present.
    pub fn reference_system() -> Self {
        Self::new(["Microsoft Basic Render Driver"])
    }

    /// Replaces the adapter list.
    pub fn set_adapters<I, S>(&self, adapters: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.borrow_mut().adapters = adapters
            .into_iter()
            .map(|description| SimAdapter {
                description: description.into(),
                extended_interface: true,
            })
            .collect();
    }

    /// Appends an adapter supporting the extended descriptor interface.
    pub fn with_adapter(self, description: impl Into<String>) -> Self {
        self.state.borrow_mut().adapters.push(SimAdapter {
            description: description.into(),
            extended_interface: true,
        });
        self
    }

    /// Appends an adapter that fails the extended interface query.
    pub fn with_legacy_adapter(self, description: impl Into<String>) -> Self {
        self.state.borrow_mut().adapters.push(SimAdapter {
            description: description.into(),
            extended_interface: false,
        });
        self
    }

    pub fn with_factory_unavailable(self) -> Self {
        self.state.borrow_mut().factory_unavailable = true;
        self
    }

    pub fn with_device_creation_failure(self) -> Self {
        self.state.borrow_mut().fail_device_creation = true;
        self
    }

    /// Resource creation fails for any buffer larger than `bytes`.
    pub fn with_memory_budget(self, bytes: u64) -> Self {
        self.state.borrow_mut().memory_budget = Some(bytes);
        self
    }

    pub fn with_evict_failure(self) -> Self {
        self.state.borrow_mut().fail_evict = true;
        self
    }

    pub fn with_make_resident_failure(self) -> Self {
        self.state.borrow_mut().fail_make_resident = true;
        self
    }

    /// Every driver call made so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.borrow().calls.clone()
    }

    pub fn live_devices(&self) -> usize {
        self.state.borrow().live_devices.len()
    }

    pub fn live_resources(&self) -> usize {
        self.state.borrow().live_resources.len()
    }

    /// Devices that were released while they still owned resources.
    pub fn release_order_violations(&self) -> usize {
        self.state.borrow().release_order_violations
    }

    pub fn is_resident(&self, resource: &SimResourceHandle) -> Option<bool> {
        self.state
            .borrow()
            .live_resources
            .get(&resource.id)
            .map(|r| r.resident)
    }

    fn set_residency(
        &self,
        device: &SimDevice,
        resources: &[&SimResourceHandle],
        resident: bool,
    ) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        for resource in resources {
            match state.live_resources.get_mut(&resource.id) {
                Some(r) if r.device == device.id => r.resident = resident,
                _ => {
                    return Err(DriverError::new(
                        DriverError::E_FAIL,
                        format!("resource {} is not owned by device {}", resource.id, device.id),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl GpuDriver for SimulatedDriver {
    type Factory = ();
    type Adapter = SimAdapterHandle;
    type Device = SimDevice;
    type Resource = SimResourceHandle;

    fn name(&self) -> &'static str {
        "simulated"
    }

    fn create_factory(&self) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DriverCall::CreateFactory);
        if state.factory_unavailable {
            return Err(DriverError::new(DriverError::E_FAIL, "factory unavailable"));
        }
        Ok(())
    }

    fn enum_adapter(&self, _factory: &(), index: u32) -> AdapterProbe<SimAdapterHandle> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DriverCall::EnumAdapter(index));
        match state.adapters.get(index as usize) {
            None => AdapterProbe::End,
            Some(adapter) if !adapter.extended_interface => AdapterProbe::MissingExtendedInterface,
            Some(adapter) => AdapterProbe::Found {
                adapter: SimAdapterHandle {
                    index,
                    description: adapter.description.clone(),
                },
                description: adapter.description.clone(),
            },
        }
    }

    fn create_device(
        &self,
        adapter: &SimAdapterHandle,
        min_feature_level: FeatureLevel,
    ) -> Result<SimDevice, DriverError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DriverCall::CreateDevice {
            adapter: adapter.description.clone(),
            min_feature_level,
        });
        if state.fail_device_creation {
            return Err(DriverError::new(DriverError::E_FAIL, "device creation rejected"));
        }
        if state.adapters.get(adapter.index as usize).map(|a| &a.description)
            != Some(&adapter.description)
        {
            return Err(DriverError::new(DriverError::E_FAIL, "stale adapter handle"));
        }
        let id = state.handle();
        state.live_devices.push(id);
        Ok(SimDevice {
            id,
            state: Rc::clone(&self.state),
        })
    }

    fn create_committed_resource(
        &self,
        device: &SimDevice,
        _heap: &HeapProperties,
        _heap_flags: HeapFlags,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
    ) -> Result<SimResourceHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DriverCall::CreateCommittedResource {
            device: device.id,
            width: desc.width,
            initial_state,
        });
        if desc.width == 0 {
            return Err(DriverError::new(DriverError::E_FAIL, "zero-sized buffer"));
        }
        if let Some(budget) = state.memory_budget {
            if desc.width > budget {
                return Err(DriverError::new(
                    DriverError::E_OUTOFMEMORY,
                    format!("{} bytes exceeds budget of {} bytes", desc.width, budget),
                ));
            }
        }
        let id = state.handle();
        state.live_resources.insert(
            id,
            SimResource {
                device: device.id,
                resident: true,
            },
        );
        Ok(SimResourceHandle {
            id,
            state: Rc::clone(&self.state),
        })
    }

    fn evict(&self, device: &SimDevice, resources: &[&SimResourceHandle]) -> Result<(), DriverError> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(DriverCall::Evict {
                device: device.id,
                resources: resources.iter().map(|r| r.id).collect(),
            });
            if state.fail_evict {
                return Err(DriverError::new(DriverError::E_FAIL, "evict rejected"));
            }
        }
        self.set_residency(device, resources, false)
    }

    fn make_resident(
        &self,
        device: &SimDevice,
        resources: &[&SimResourceHandle],
    ) -> Result<(), DriverError> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(DriverCall::MakeResident {
                device: device.id,
                resources: resources.iter().map(|r| r.id).collect(),
            });
            if state.fail_make_resident {
                return Err(DriverError::new(
                    DriverError::E_OUTOFMEMORY,
                    "make resident rejected",
                ));
            }
        }
        self.set_residency(device, resources, true)
    }

    fn query_residency(&self, _device: &SimDevice, resource: &SimResourceHandle) -> Option<bool> {
        self.is_resident(resource)
    }
}
