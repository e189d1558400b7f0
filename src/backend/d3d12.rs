//! Native D3D12 backend.
//!
//! Adapters come from DXGI (`IDXGIFactory2::EnumAdapters1`, then a cast to
//! `IDXGIAdapter2` for the extended descriptor). Devices and resources are COM
//! interfaces from the `windows` crate: dropping one calls `Release`, cloning
//! one calls `AddRef`.
//!
//! To really exercise the kernel-mode paging path the user-mode driver must
//! clear `EvictOnlyIfNecessary` in its `pfnEvict` DDI; otherwise Evict may be
//! satisfied without any paging work.

use windows::core::Interface;
use windows::Win32::Graphics::Direct3D::{
    D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_12_0,
    D3D_FEATURE_LEVEL_12_1,
};
use windows::Win32::Graphics::Direct3D12::{
    D3D12CreateDevice, ID3D12Device, ID3D12Pageable, ID3D12Resource, D3D12_CPU_PAGE_PROPERTY,
    D3D12_CPU_PAGE_PROPERTY_NOT_AVAILABLE, D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
    D3D12_CPU_PAGE_PROPERTY_WRITE_BACK, D3D12_CPU_PAGE_PROPERTY_WRITE_COMBINE, D3D12_HEAP_FLAGS,
    D3D12_HEAP_PROPERTIES, D3D12_HEAP_TYPE, D3D12_HEAP_TYPE_DEFAULT, D3D12_HEAP_TYPE_READBACK,
    D3D12_HEAP_TYPE_UPLOAD, D3D12_MEMORY_POOL, D3D12_MEMORY_POOL_L0, D3D12_MEMORY_POOL_L1,
    D3D12_MEMORY_POOL_UNKNOWN, D3D12_RESOURCE_DESC, D3D12_RESOURCE_DIMENSION_BUFFER,
    D3D12_RESOURCE_FLAGS, D3D12_RESOURCE_STATES, D3D12_TEXTURE_LAYOUT,
    D3D12_TEXTURE_LAYOUT_ROW_MAJOR, D3D12_TEXTURE_LAYOUT_UNKNOWN,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory2, IDXGIAdapter2, IDXGIFactory2, DXGI_CREATE_FACTORY_FLAGS,
    DXGI_ERROR_NOT_FOUND,
};

use crate::desc::{
    CpuPageProperty, FeatureLevel, HeapFlags, HeapProperties, HeapType, MemoryPool, ResourceDesc,
    ResourceStates, TextureLayout,
};
use crate::driver::{AdapterProbe, GpuDriver};
use crate::error::DriverError;

/// D3D12 driver reached through DXGI.
#[derive(Debug, Clone, Copy, Default)]
pub struct D3d12Driver;

fn driver_error(err: windows::core::Error) -> DriverError {
    DriverError::new(err.code().0 as u32, err.message().to_string())
}

fn feature_level(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
        FeatureLevel::Level12_0 => D3D_FEATURE_LEVEL_12_0,
        FeatureLevel::Level12_1 => D3D_FEATURE_LEVEL_12_1,
    }
}

fn heap_type(heap_type: HeapType) -> D3D12_HEAP_TYPE {
    match heap_type {
        HeapType::Default => D3D12_HEAP_TYPE_DEFAULT,
        HeapType::Upload => D3D12_HEAP_TYPE_UPLOAD,
        HeapType::Readback => D3D12_HEAP_TYPE_READBACK,
    }
}

fn cpu_page_property(prop: CpuPageProperty) -> D3D12_CPU_PAGE_PROPERTY {
    match prop {
        CpuPageProperty::Unknown => D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
        CpuPageProperty::NotAvailable => D3D12_CPU_PAGE_PROPERTY_NOT_AVAILABLE,
        CpuPageProperty::WriteCombine => D3D12_CPU_PAGE_PROPERTY_WRITE_COMBINE,
        CpuPageProperty::WriteBack => D3D12_CPU_PAGE_PROPERTY_WRITE_BACK,
    }
}

fn memory_pool(pool: MemoryPool) -> D3D12_MEMORY_POOL {
    match pool {
        MemoryPool::Unknown => D3D12_MEMORY_POOL_UNKNOWN,
        MemoryPool::L0 => D3D12_MEMORY_POOL_L0,
        MemoryPool::L1 => D3D12_MEMORY_POOL_L1,
    }
}

fn texture_layout(layout: TextureLayout) -> D3D12_TEXTURE_LAYOUT {
    match layout {
        TextureLayout::Unknown => D3D12_TEXTURE_LAYOUT_UNKNOWN,
        TextureLayout::RowMajor => D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
    }
}

/// Adapter descriptions are fixed-size, NUL-terminated UTF-16.
fn description_from_utf16(raw: &[u16]) -> String {
    let len = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
    String::from_utf16_lossy(&raw[..len])
}

fn pageables(resources: &[&ID3D12Resource]) -> Result<Vec<Option<ID3D12Pageable>>, DriverError> {
    resources
        .iter()
        .map(|r| r.cast::<ID3D12Pageable>().map(Some).map_err(driver_error))
        .collect()
}

impl GpuDriver for D3d12Driver {
    type Factory = IDXGIFactory2;
    type Adapter = IDXGIAdapter2;
    type Device = ID3D12Device;
    type Resource = ID3D12Resource;

    fn name(&self) -> &'static str {
        "d3d12"
    }

    fn create_factory(&self) -> Result<IDXGIFactory2, DriverError> {
        unsafe { CreateDXGIFactory2::<IDXGIFactory2>(DXGI_CREATE_FACTORY_FLAGS::default()) }
            .map_err(driver_error)
    }

    fn enum_adapter(&self, factory: &IDXGIFactory2, index: u32) -> AdapterProbe<IDXGIAdapter2> {
        let adapter = match unsafe { factory.EnumAdapters1(index) } {
            Ok(adapter) => adapter,
            Err(e) => {
                if e.code() != DXGI_ERROR_NOT_FOUND {
                    log::debug!("EnumAdapters1({}) ended enumeration: {}", index, e);
                }
                return AdapterProbe::End;
            }
        };

        let Ok(adapter2) = adapter.cast::<IDXGIAdapter2>() else {
            return AdapterProbe::MissingExtendedInterface;
        };

        match unsafe { adapter2.GetDesc2() } {
            Ok(desc) => AdapterProbe::Found {
                description: description_from_utf16(&desc.Description),
                adapter: adapter2,
            },
            Err(e) => {
                log::debug!("GetDesc2 failed on adapter {}: {}", index, e);
                AdapterProbe::MissingExtendedInterface
            }
        }
    }

    fn create_device(
        &self,
        adapter: &IDXGIAdapter2,
        min_feature_level: FeatureLevel,
    ) -> Result<ID3D12Device, DriverError> {
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(adapter, feature_level(min_feature_level), &mut device) }
            .map_err(driver_error)?;
        device.ok_or_else(|| DriverError::new(DriverError::E_FAIL, "D3D12CreateDevice returned no device"))
    }

    fn create_committed_resource(
        &self,
        device: &ID3D12Device,
        heap: &HeapProperties,
        heap_flags: HeapFlags,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
    ) -> Result<ID3D12Resource, DriverError> {
        let heap_properties = D3D12_HEAP_PROPERTIES {
            Type: heap_type(heap.heap_type),
            CPUPageProperty: cpu_page_property(heap.cpu_page_property),
            MemoryPoolPreference: memory_pool(heap.memory_pool),
            CreationNodeMask: heap.creation_node_mask,
            VisibleNodeMask: heap.visible_node_mask,
        };

        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Alignment: desc.alignment,
            Width: desc.width,
            Height: desc.height,
            DepthOrArraySize: desc.depth_or_array_size,
            MipLevels: desc.mip_levels,
            Format: DXGI_FORMAT_UNKNOWN,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: desc.sample_count,
                Quality: desc.sample_quality,
            },
            Layout: texture_layout(desc.layout),
            Flags: D3D12_RESOURCE_FLAGS(desc.flags.bits() as i32),
        };

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_properties,
                D3D12_HEAP_FLAGS(heap_flags.bits() as i32),
                &resource_desc,
                D3D12_RESOURCE_STATES(initial_state.bits() as i32),
                None,
                &mut resource,
            )
        }
        .map_err(driver_error)?;
        resource.ok_or_else(|| {
            DriverError::new(DriverError::E_FAIL, "CreateCommittedResource returned no resource")
        })
    }

    fn evict(&self, device: &ID3D12Device, resources: &[&ID3D12Resource]) -> Result<(), DriverError> {
        let objects = pageables(resources)?;
        unsafe { device.Evict(&objects) }.map_err(driver_error)
    }

    fn make_resident(
        &self,
        device: &ID3D12Device,
        resources: &[&ID3D12Resource],
    ) -> Result<(), DriverError> {
        let objects = pageables(resources)?;
        unsafe { device.MakeResident(&objects) }.map_err(driver_error)
    }
}
