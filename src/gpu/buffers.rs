//! Committed buffer allocation and state bookkeeping.
//!
//! A `Buffer` borrows the `Device` that created it, so the buffer's driver
//! handle is always released before the device's.

use crate::desc::{HeapFlags, HeapProperties, HeapType, ResourceDesc, ResourceFlags, ResourceStates};
use crate::driver::GpuDriver;
use crate::error::HarnessError;
use crate::gpu::device::Device;
use bytesize::ByteSize;

/// Element of the reference buffer. Eight bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BufferElement {
    pub i: i32,
    pub f: f32,
}

/// Number of elements in the reference buffer.
pub const REFERENCE_ELEMENT_COUNT: u64 = 1024 * 64;

/// Size, heap and state of a buffer to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size_bytes: u64,
    pub heap_type: HeapType,
    pub initial_state: ResourceStates,
    pub flags: ResourceFlags,
}

impl BufferDesc {
    /// A buffer with the state and flags a heap of `heap_type` accepts.
    ///
    /// Default heaps start in unordered-access and allow unordered access.
    /// Upload heaps start in generic-read, readback heaps in copy-dest. Neither
    /// allows unordered access.
    pub fn new(size_bytes: u64, heap_type: HeapType) -> Self {
        let (initial_state, flags) = match heap_type {
            HeapType::Default => (
                ResourceStates::UNORDERED_ACCESS,
                ResourceFlags::ALLOW_UNORDERED_ACCESS,
            ),
            HeapType::Upload => (ResourceStates::GENERIC_READ, ResourceFlags::empty()),
            HeapType::Readback => (ResourceStates::COPY_DEST, ResourceFlags::empty()),
        };
        Self {
            size_bytes,
            heap_type,
            initial_state,
            flags,
        }
    }
}

/// `element_count * element_stride`, checked.
pub fn buffer_size(element_count: u64, element_stride: u64) -> Result<u64, HarnessError> {
    element_count
        .checked_mul(element_stride)
        .ok_or(HarnessError::InvalidBufferSize {
            element_count,
            element_stride,
        })
}

/// Bookkeeping phase of a buffer.
///
/// Labels only: nothing here is read back from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    Created,
    TrackingReset,
    Evicted,
    Resident,
}

/// A committed buffer owned by its device.
pub struct Buffer<'d, D: GpuDriver> {
    device: &'d Device<D>,
    raw: D::Resource,
    desc: BufferDesc,
    current_state: ResourceStates,
    phase: TrackingPhase,
}

/// Creates a committed buffer on `device`.
///
/// The buffer is one-dimensional with a single mip and array slice, untyped
/// and row-major. No heap flags are set.
///
/// # Errors
///
/// Returns `HarnessError::ResourceCreationFailed` if the driver rejects the
/// allocation.
pub fn create_buffer<D: GpuDriver>(
    device: &Device<D>,
    desc: BufferDesc,
) -> Result<Buffer<'_, D>, HarnessError> {
    let heap = HeapProperties::of_type(desc.heap_type);
    let resource_desc = ResourceDesc::buffer(desc.size_bytes, desc.flags);

    log::debug!(
        "Creating {} {} buffer on {}",
        ByteSize::b(desc.size_bytes),
        desc.heap_type.name(),
        device.adapter().description
    );

    let raw = device
        .driver()
        .create_committed_resource(
            device.raw(),
            &heap,
            HeapFlags::empty(),
            &resource_desc,
            desc.initial_state,
        )
        .map_err(|source| HarnessError::ResourceCreationFailed {
            size_bytes: desc.size_bytes,
            source,
        })?;

    Ok(Buffer {
        device,
        raw,
        desc,
        current_state: desc.initial_state,
        phase: TrackingPhase::Created,
    })
}

impl<'d, D: GpuDriver> Buffer<'d, D> {
    /// The device that owns this buffer.
    pub fn device(&self) -> &'d Device<D> {
        self.device
    }

    pub fn raw(&self) -> &D::Resource {
        &self.raw
    }

    pub fn size_bytes(&self) -> u64 {
        self.desc.size_bytes
    }

    pub fn initial_state(&self) -> ResourceStates {
        self.desc.initial_state
    }

    pub fn current_state(&self) -> ResourceStates {
        self.current_state
    }

    pub fn phase(&self) -> TrackingPhase {
        self.phase
    }

    /// Resets the tracked state to the initial state.
    ///
    /// Bookkeeping only. No transition is issued to the driver.
    pub fn start_state_tracking(&mut self) {
        self.current_state = self.desc.initial_state;
        self.phase = TrackingPhase::TrackingReset;
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.phase = TrackingPhase::Evicted;
    }

    pub(crate) fn mark_resident(&mut self) {
        self.phase = TrackingPhase::Resident;
    }
}

impl<D: GpuDriver> std::fmt::Debug for Buffer<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("desc", &self.desc)
            .field("current_state", &self.current_state)
            .field("phase", &self.phase)
            .finish()
    }
}
