//! The GPU driver surface the probe runs against.
//!
//! This module defines the `GpuDriver` trait that every backend (native D3D12,
//! wgpu, simulated) implements. Handles are owned values: dropping one
//! releases the underlying driver object exactly once.

use crate::desc::{FeatureLevel, HeapFlags, HeapProperties, ResourceDesc, ResourceStates};
use crate::error::DriverError;

/// Result of querying the adapter factory at one index.
#[derive(Debug)]
pub enum AdapterProbe<A> {
    /// An adapter exists and supports the extended descriptor interface.
    Found { adapter: A, description: String },
    /// An adapter exists but lacks the extended descriptor interface.
    MissingExtendedInterface,
    /// No adapter at this index. Enumeration is complete.
    End,
}

/// External driver/runtime interface.
///
/// Calls are blocking and complete before returning. Implementations do not
/// need to be thread safe.
pub trait GpuDriver {
    /// Adapter enumeration factory.
    type Factory;
    /// Live adapter handle.
    type Adapter;
    /// Logical device handle.
    type Device;
    /// Committed resource handle.
    type Resource;

    /// Short backend name, e.g. "d3d12".
    fn name(&self) -> &'static str;

    fn create_factory(&self) -> Result<Self::Factory, DriverError>;

    /// Queries the adapter at `index`.
    fn enum_adapter(&self, factory: &Self::Factory, index: u32) -> AdapterProbe<Self::Adapter>;

    fn create_device(
        &self,
        adapter: &Self::Adapter,
        min_feature_level: FeatureLevel,
    ) -> Result<Self::Device, DriverError>;

    fn create_committed_resource(
        &self,
        device: &Self::Device,
        heap: &HeapProperties,
        heap_flags: HeapFlags,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
    ) -> Result<Self::Resource, DriverError>;

    fn evict(&self, device: &Self::Device, resources: &[&Self::Resource]) -> Result<(), DriverError>;

    fn make_resident(
        &self,
        device: &Self::Device,
        resources: &[&Self::Resource],
    ) -> Result<(), DriverError>;

    /// Actual residency of `resource` as seen by the driver, when the backend
    /// can observe it.
    fn query_residency(&self, _device: &Self::Device, _resource: &Self::Resource) -> Option<bool> {
        None
    }
}
