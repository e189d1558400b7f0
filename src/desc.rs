//! Backend-neutral resource descriptors.
//!
//! Flag values mirror the D3D12 constants so the native backend can pass the
//! raw bits straight through.

use bitflags::bitflags;

/// Memory pool class a resource is allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum HeapType {
    /// Device-local memory, not CPU visible.
    #[default]
    Default,
    /// CPU write-combined memory for uploads.
    Upload,
    /// CPU cached memory for readback.
    Readback,
}

impl HeapType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Upload => "upload",
            Self::Readback => "readback",
        }
    }
}

#[allow(dead_code)] // Only Unknown is requested; the rest map 1:1 to D3D12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuPageProperty {
    #[default]
    Unknown,
    NotAvailable,
    WriteCombine,
    WriteBack,
}

#[allow(dead_code)] // Only Unknown is requested; the rest map 1:1 to D3D12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryPool {
    #[default]
    Unknown,
    L0,
    L1,
}

bitflags! {
    /// Heap creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeapFlags: u32 {
        const SHARED = 0x1;
        const DENY_BUFFERS = 0x4;
        const CREATE_NOT_RESIDENT = 0x800;
    }
}

bitflags! {
    /// Resource access states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceStates: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const UNORDERED_ACCESS = 0x8;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const GENERIC_READ = 0x1 | 0x2 | 0x40 | 0x80 | 0x200 | 0x800;
    }
}

bitflags! {
    /// Resource capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const ALLOW_RENDER_TARGET = 0x1;
        const ALLOW_UNORDERED_ACCESS = 0x4;
        const DENY_SHADER_RESOURCE = 0x8;
        const ALLOW_SIMULTANEOUS_ACCESS = 0x20;
    }
}

/// Minimum feature level requested at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, clap::ValueEnum)]
pub enum FeatureLevel {
    #[default]
    #[value(name = "11_0")]
    Level11_0,
    #[value(name = "11_1")]
    Level11_1,
    #[value(name = "12_0")]
    Level12_0,
    #[value(name = "12_1")]
    Level12_1,
}

impl std::fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Level11_0 => "11_0",
            Self::Level11_1 => "11_1",
            Self::Level12_0 => "12_0",
            Self::Level12_1 => "12_1",
        };
        write!(f, "{}", name)
    }
}

/// Heap placement properties for a committed allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapProperties {
    pub heap_type: HeapType,
    pub cpu_page_property: CpuPageProperty,
    pub memory_pool: MemoryPool,
    pub creation_node_mask: u32,
    pub visible_node_mask: u32,
}

impl HeapProperties {
    /// Properties for a heap of `heap_type` on the default node, letting the
    /// driver pick page property and pool.
    pub fn of_type(heap_type: HeapType) -> Self {
        Self {
            heap_type,
            cpu_page_property: CpuPageProperty::Unknown,
            memory_pool: MemoryPool::Unknown,
            creation_node_mask: 0,
            visible_node_mask: 0,
        }
    }
}

#[allow(dead_code)] // Buffers are always row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureLayout {
    Unknown,
    RowMajor,
}

/// Shape of a resource. Only buffers are ever described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDesc {
    pub alignment: u64,
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub layout: TextureLayout,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    /// A one-dimensional, untyped, row-major buffer of `width` bytes.
    pub fn buffer(width: u64, flags: ResourceFlags) -> Self {
        Self {
            alignment: 0,
            width,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            sample_quality: 0,
            layout: TextureLayout::RowMajor,
            flags,
        }
    }
}
