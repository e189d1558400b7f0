//! Driver backends.
//!
//! The simulated backend is always available. `wgpu` needs the `gpu` feature
//! and the native D3D12 backend needs the `d3d12` feature on Windows.

#[cfg(all(windows, feature = "d3d12"))]
pub mod d3d12;
pub mod simulated;
#[cfg(feature = "gpu")]
pub mod wgpu_backend;

#[cfg(all(windows, feature = "d3d12"))]
pub use d3d12::D3d12Driver;
pub use simulated::SimulatedDriver;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuDriver;

/// Backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Native D3D12 through DXGI (Windows, `d3d12` feature).
    D3d12,
    /// Portable wgpu backend without residency control (`gpu` feature).
    Wgpu,
    /// In-process simulated driver.
    Simulated,
}

impl BackendKind {
    /// Whether this backend was compiled into the binary.
    pub fn is_available(&self) -> bool {
        match self {
            Self::D3d12 => cfg!(all(windows, feature = "d3d12")),
            Self::Wgpu => cfg!(feature = "gpu"),
            Self::Simulated => true,
        }
    }

    /// Feature that enables this backend.
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            Self::D3d12 => Some("d3d12"),
            Self::Wgpu => Some("gpu"),
            Self::Simulated => None,
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        [Self::D3d12, Self::Wgpu]
            .into_iter()
            .find(BackendKind::is_available)
            .unwrap_or(Self::Simulated)
    }
}
