//! Error types for the residency probe.
//!
//! Setup failures (enumeration, adapter lookup, device and buffer creation)
//! end the current scenario. Residency failures are reported but never fatal.

use thiserror::Error;

/// A failed call into the GPU driver or runtime.
///
/// `code` is the raw result code reported by the backend (an `HRESULT` on
/// D3D12, a synthetic code elsewhere).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code 0x{code:08X})")]
pub struct DriverError {
    pub code: u32,
    pub message: String,
}

impl DriverError {
    /// Generic failure code (`E_FAIL`).
    pub const E_FAIL: u32 = 0x8000_4005;
    /// Out of memory (`E_OUTOFMEMORY`).
    pub const E_OUTOFMEMORY: u32 = 0x8007_000E;
    /// Operation not implemented by the backend (`E_NOTIMPL`).
    pub const E_NOTIMPL: u32 = 0x8000_4001;

    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(Self::E_NOTIMPL, message)
    }
}

/// Setup errors. Any of these ends the current scenario.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The adapter enumeration factory could not be created.
    #[error("Unable to create adapter enumeration factory: {0}")]
    EnumerationUnavailable(DriverError),

    /// No adapter description matched the requested name exactly.
    #[error("Failed to find adapter \"{target}\" (available: {available:?})")]
    AdapterNotFound {
        target: String,
        available: Vec<String>,
    },

    /// The driver refused to create a device on the resolved adapter.
    #[error("Failed to create device on {adapter}: {source}")]
    DeviceCreationFailed {
        adapter: String,
        #[source]
        source: DriverError,
    },

    /// The driver refused to create the committed buffer.
    #[error("Unable to create buffer of {size_bytes} bytes: {source}")]
    ResourceCreationFailed {
        size_bytes: u64,
        #[source]
        source: DriverError,
    },

    /// The requested element count and stride overflow a buffer size.
    #[error("Invalid buffer size: {element_count} elements of {element_stride} bytes")]
    InvalidBufferSize {
        element_count: u64,
        element_stride: u64,
    },
}

/// Residency probe failures. Logged and reported, never promoted to fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResidencyError {
    #[error("Evict failed: {0}")]
    EvictFailed(DriverError),

    #[error("MakeResident failed: {0}")]
    MakeResidentFailed(DriverError),
}
