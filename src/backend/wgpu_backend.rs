//! Portable backend built on wgpu.
//!
//! wgpu covers adapter enumeration, device creation and buffer allocation on
//! Vulkan, Metal and DX12. It exposes no residency control, so evict and
//! make-resident report `E_NOTIMPL`.

use pollster::block_on;
use wgpu::{Adapter, Backends, BufferUsages, Instance, InstanceDescriptor};

use crate::desc::{
    FeatureLevel, HeapFlags, HeapProperties, HeapType, ResourceDesc, ResourceFlags, ResourceStates,
};
use crate::driver::{AdapterProbe, GpuDriver};
use crate::error::DriverError;

/// wgpu-backed driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgpuDriver;

/// Snapshot of the adapters wgpu reported when the factory was created.
pub struct WgpuFactory {
    adapters: Vec<Adapter>,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    _queue: wgpu::Queue,
}

fn required_limits(level: FeatureLevel) -> wgpu::Limits {
    match level {
        FeatureLevel::Level11_0 | FeatureLevel::Level11_1 => wgpu::Limits::downlevel_defaults(),
        FeatureLevel::Level12_0 | FeatureLevel::Level12_1 => wgpu::Limits::default(),
    }
}

fn buffer_usages(heap_type: HeapType, flags: ResourceFlags) -> BufferUsages {
    let mut usage = match heap_type {
        HeapType::Default => BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
        HeapType::Upload => BufferUsages::MAP_WRITE | BufferUsages::COPY_SRC,
        HeapType::Readback => BufferUsages::MAP_READ | BufferUsages::COPY_DST,
    };
    if flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS) {
        usage |= BufferUsages::STORAGE;
    }
    usage
}

impl GpuDriver for WgpuDriver {
    type Factory = WgpuFactory;
    type Adapter = Adapter;
    type Device = WgpuDevice;
    type Resource = wgpu::Buffer;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_factory(&self) -> Result<WgpuFactory, DriverError> {
        let instance = Instance::new(&InstanceDescriptor::default());
        let adapters = instance.enumerate_adapters(Backends::all());
        Ok(WgpuFactory { adapters })
    }

    fn enum_adapter(&self, factory: &WgpuFactory, index: u32) -> AdapterProbe<Adapter> {
        match factory.adapters.get(index as usize) {
            Some(adapter) => AdapterProbe::Found {
                description: adapter.get_info().name,
                adapter: adapter.clone(),
            },
            None => AdapterProbe::End,
        }
    }

    fn create_device(
        &self,
        adapter: &Adapter,
        min_feature_level: FeatureLevel,
    ) -> Result<WgpuDevice, DriverError> {
        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("pagingprobe"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits(min_feature_level),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .map_err(|e| DriverError::new(DriverError::E_FAIL, e.to_string()))?;

        Ok(WgpuDevice {
            device,
            _queue: queue,
        })
    }

    fn create_committed_resource(
        &self,
        device: &WgpuDevice,
        heap: &HeapProperties,
        _heap_flags: HeapFlags,
        desc: &ResourceDesc,
        _initial_state: ResourceStates,
    ) -> Result<wgpu::Buffer, DriverError> {
        // Validation and OOM errors would otherwise hit the uncaptured handler
        device.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let buffer = device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("paging_buffer"),
            size: desc.width,
            usage: buffer_usages(heap.heap_type, desc.flags),
            mapped_at_creation: false,
        });

        let validation = block_on(device.device.pop_error_scope());
        let oom = block_on(device.device.pop_error_scope());

        if let Some(e) = oom {
            return Err(DriverError::new(DriverError::E_OUTOFMEMORY, e.to_string()));
        }
        if let Some(e) = validation {
            return Err(DriverError::new(DriverError::E_FAIL, e.to_string()));
        }
        Ok(buffer)
    }

    fn evict(&self, _device: &WgpuDevice, _resources: &[&wgpu::Buffer]) -> Result<(), DriverError> {
        Err(DriverError::unsupported("wgpu does not expose Evict"))
    }

    fn make_resident(
        &self,
        _device: &WgpuDevice,
        _resources: &[&wgpu::Buffer],
    ) -> Result<(), DriverError> {
        Err(DriverError::unsupported("wgpu does not expose MakeResident"))
    }
}
