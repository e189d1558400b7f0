//! Device, buffer and residency layers of the probe.
//!
//! Used strictly in order: enumerate adapters, create a device on a named
//! adapter, allocate one committed buffer, then evict and re-admit it.

pub mod adapter;
pub mod buffers;
pub mod device;
pub mod residency;

#[allow(unused_imports)]
pub use adapter::{list_adapters, AdapterDescriptor, AdapterEnumerator};
#[allow(unused_imports)]
pub use buffers::{create_buffer, Buffer, BufferDesc, BufferElement, TrackingPhase};
#[allow(unused_imports)]
pub use device::{find_adapter, Device, DeviceFactory};
#[allow(unused_imports)]
pub use residency::{ResidencyController, ResidencyReport};
