//! Run configuration.

use crate::desc::{FeatureLevel, HeapType};
use crate::gpu::buffers::{BufferElement, REFERENCE_ELEMENT_COUNT};

/// The compute-only test driver the probe is written for.
pub const COMPUTE_ONLY_DRIVER: &str = "Compute Only Sample Driver";
/// Software renderer present on every Windows system.
pub const BASIC_RENDER_DRIVER: &str = "Microsoft Basic Render Driver";

/// Configuration for one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Adapter descriptions in priority order. The last entry is the baseline
    /// adapter that must be present for the run to proceed.
    pub candidates: Vec<String>,
    /// Number of elements in the buffer.
    pub element_count: u64,
    /// Bytes per element.
    pub element_stride: u64,
    pub heap_type: HeapType,
    pub min_feature_level: FeatureLevel,
    /// Evict/make-resident cycles to run.
    pub cycles: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            candidates: vec![COMPUTE_ONLY_DRIVER.to_string(), BASIC_RENDER_DRIVER.to_string()],
            element_count: REFERENCE_ELEMENT_COUNT,
            element_stride: std::mem::size_of::<BufferElement>() as u64,
            heap_type: HeapType::Default,
            min_feature_level: FeatureLevel::Level11_0,
            cycles: 1,
        }
    }
}

impl HarnessConfig {
    /// The adapter whose absence ends the run before any device work.
    pub fn baseline(&self) -> Option<&str> {
        self.candidates.last().map(String::as_str)
    }

    /// First candidate, in priority order, that appears in `available`.
    pub fn select<'a>(&'a self, available: &[impl AsRef<str>]) -> Option<&'a str> {
        self.candidates
            .iter()
            .map(String::as_str)
            .find(|candidate| available.iter().any(|a| a.as_ref() == *candidate))
    }
}
