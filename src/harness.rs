//! The probe scenario.
//!
//! Lists adapters, picks the first configured candidate that is present,
//! creates a device and one buffer on it, and runs the evict/make-resident
//! cycles. Setup failures end the scenario with a message; the process still
//! exits cleanly.

use std::io::Write;

use bytesize::ByteSize;

use crate::config::HarnessConfig;
use crate::driver::GpuDriver;
use crate::error::HarnessError;
use crate::gpu::buffers::buffer_size;
use crate::gpu::{
    create_buffer, list_adapters, BufferDesc, DeviceFactory, ResidencyController, ResidencyReport,
};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Device and buffer were created and every residency cycle ran.
    Completed { reports: Vec<ResidencyReport> },
    /// The baseline adapter is not on the system. No device work was done.
    BaselineMissing { name: String },
    /// A setup step failed.
    SetupFailed(HarnessError),
}

/// Runs the scenario against `driver`, writing console output to `out`.
///
/// # Errors
///
/// Only fails if writing to `out` fails.
pub fn run<D: GpuDriver, W: Write>(
    driver: D,
    config: &HarnessConfig,
    out: &mut W,
) -> std::io::Result<RunOutcome> {
    log::info!("Running residency probe on {} backend", driver.name());

    let adapters = match list_adapters(&driver) {
        Ok(adapters) => adapters,
        Err(e) => return finish_with_error(out, e),
    };

    writeln!(out, "Found adapters:")?;
    for adapter in &adapters {
        writeln!(out, "  {}", adapter.description)?;
    }

    let names: Vec<&str> = adapters.iter().map(|a| a.description.as_str()).collect();

    let Some(baseline) = config.baseline() else {
        writeln!(out, "No candidate adapters configured")?;
        return Ok(RunOutcome::BaselineMissing {
            name: String::new(),
        });
    };
    if !names.contains(&baseline) {
        writeln!(out, "{} was not found", baseline)?;
        return Ok(RunOutcome::BaselineMissing {
            name: baseline.to_string(),
        });
    }

    // The baseline is present, so some candidate always matches
    let target = config.select(names.as_slice()).unwrap_or(baseline);

    match run_steps(driver, target, config, out)? {
        Ok(reports) => {
            writeln!(out, "Done.")?;
            Ok(RunOutcome::Completed { reports })
        }
        Err(e) => finish_with_error(out, e),
    }
}

fn finish_with_error<W: Write>(out: &mut W, error: HarnessError) -> std::io::Result<RunOutcome> {
    log::error!("{}", error);
    writeln!(out, "Hit error: {}", error)?;
    writeln!(out, "Done.")?;
    Ok(RunOutcome::SetupFailed(error))
}

/// Device, buffer and residency steps. The outer `Result` is console I/O.
fn run_steps<D: GpuDriver, W: Write>(
    driver: D,
    target: &str,
    config: &HarnessConfig,
    out: &mut W,
) -> std::io::Result<Result<Vec<ResidencyReport>, HarnessError>> {
    write!(out, "Creating device on {} ... ", target)?;
    out.flush()?;
    let device = match DeviceFactory::new(config.min_feature_level).create_device(driver, target) {
        Ok(device) => device,
        Err(e) => return Ok(Err(e)),
    };
    writeln!(out, "done.")?;
    log::debug!(
        "Device bound to adapter {} at feature level {}",
        device.adapter(),
        device.feature_level()
    );

    write!(out, "Creating buffers ... ")?;
    out.flush()?;
    let desc = match buffer_size(config.element_count, config.element_stride) {
        Ok(size) => BufferDesc::new(size, config.heap_type),
        Err(e) => return Ok(Err(e)),
    };
    let mut buffer = match create_buffer(&device, desc) {
        Ok(buffer) => buffer,
        Err(e) => return Ok(Err(e)),
    };
    writeln!(out, "done.")?;
    log::info!(
        "Allocated {} on {} heap",
        ByteSize::b(buffer.size_bytes()),
        config.heap_type.name()
    );

    buffer.start_state_tracking();
    log::debug!(
        "Tracking from {:?} (initial {:?})",
        buffer.current_state(),
        buffer.initial_state()
    );

    let controller = ResidencyController::new();
    // A run always evicts and re-admits at least once
    let cycles = config.cycles.max(1);
    let reports: Vec<ResidencyReport> = (0..cycles)
        .map(|cycle| {
            let report = controller.evict_then_readmit(&mut buffer);
            log::debug!("Residency cycle {}: {:?}", cycle + 1, report);
            report
        })
        .collect();

    Ok(Ok(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::simulated::{DriverCall, SimulatedDriver};
    use crate::config::{BASIC_RENDER_DRIVER, COMPUTE_ONLY_DRIVER};
    use crate::desc::HeapType;
    use crate::error::ResidencyError;

    fn run_to_string(driver: SimulatedDriver, config: &HarnessConfig) -> (RunOutcome, String) {
        let mut out = Vec::new();
        let outcome = run(driver, config, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn device_work(driver: &SimulatedDriver) -> usize {
        driver
            .calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    DriverCall::CreateDevice { .. } | DriverCall::CreateCommittedResource { .. }
                )
            })
            .count()
    }

    #[test]
    fn test_fallback_scenario() {
        let driver = SimulatedDriver::new(["Some Discrete GPU", BASIC_RENDER_DRIVER]);
        let (outcome, output) = run_to_string(driver.clone(), &HarnessConfig::default());

        let expected = "Found adapters:\n\
                        \x20 Some Discrete GPU\n\
                        \x20 Microsoft Basic Render Driver\n\
                        Creating device on Microsoft Basic Render Driver ... done.\n\
                        Creating buffers ... done.\n\
                        Done.\n";
        assert_eq!(output, expected);

        let RunOutcome::Completed { reports } = outcome else {
            panic!("Expected completed run");
        };
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_clean());

        let calls = driver.calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            DriverCall::CreateCommittedResource { width: 524288, .. }
        )));
        let evict = calls
            .iter()
            .position(|c| matches!(c, DriverCall::Evict { .. }))
            .unwrap();
        let resident = calls
            .iter()
            .position(|c| matches!(c, DriverCall::MakeResident { .. }))
            .unwrap();
        assert!(evict < resident);

        // Everything released, buffer first
        assert_eq!(driver.live_resources(), 0);
        assert_eq!(driver.live_devices(), 0);
        assert_eq!(driver.release_order_violations(), 0);
    }

    #[test]
    fn test_preferred_adapter_selected() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER, COMPUTE_ONLY_DRIVER]);
        let (outcome, output) = run_to_string(driver.clone(), &HarnessConfig::default());
        assert!(output.contains("Creating device on Compute Only Sample Driver ... done."));
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert!(driver.calls().contains(&DriverCall::CreateDevice {
            adapter: COMPUTE_ONLY_DRIVER.to_string(),
            min_feature_level: crate::desc::FeatureLevel::Level11_0,
        }));
    }

    #[test]
    fn test_baseline_missing() {
        let driver = SimulatedDriver::new(["Some Discrete GPU"]);
        let (outcome, output) = run_to_string(driver.clone(), &HarnessConfig::default());
        assert_eq!(
            output,
            "Found adapters:\n  Some Discrete GPU\nMicrosoft Basic Render Driver was not found\n"
        );
        assert!(matches!(outcome, RunOutcome::BaselineMissing { .. }));
        assert_eq!(device_work(&driver), 0);
    }

    #[test]
    fn test_preferred_without_baseline_stops() {
        let driver = SimulatedDriver::new([COMPUTE_ONLY_DRIVER]);
        let (outcome, _) = run_to_string(driver.clone(), &HarnessConfig::default());
        assert!(matches!(outcome, RunOutcome::BaselineMissing { .. }));
        assert_eq!(device_work(&driver), 0);
    }

    #[test]
    fn test_enumeration_unavailable_is_caught() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]).with_factory_unavailable();
        let (outcome, output) = run_to_string(driver, &HarnessConfig::default());
        assert!(output.starts_with("Hit error: Unable to create adapter enumeration factory"));
        assert!(output.ends_with("Done.\n"));
        assert!(matches!(
            outcome,
            RunOutcome::SetupFailed(HarnessError::EnumerationUnavailable(_))
        ));
    }

    #[test]
    fn test_device_failure_is_caught() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]).with_device_creation_failure();
        let (outcome, output) = run_to_string(driver.clone(), &HarnessConfig::default());
        assert!(output.contains("Creating device on Microsoft Basic Render Driver ... Hit error:"));
        assert!(output.ends_with("Done.\n"));
        assert!(!output.contains("Creating buffers"));
        assert!(matches!(
            outcome,
            RunOutcome::SetupFailed(HarnessError::DeviceCreationFailed { .. })
        ));
    }

    #[test]
    fn test_resource_failure_is_caught() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]).with_memory_budget(4096);
        let (outcome, output) = run_to_string(driver.clone(), &HarnessConfig::default());
        assert!(output.contains("Creating buffers ... Hit error:"));
        assert!(output.ends_with("Done.\n"));
        assert!(matches!(
            outcome,
            RunOutcome::SetupFailed(HarnessError::ResourceCreationFailed { size_bytes: 524288, .. })
        ));
        assert_eq!(driver.live_devices(), 0);
    }

    #[test]
    fn test_residency_failures_not_fatal() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER])
            .with_evict_failure()
            .with_make_resident_failure();
        let (outcome, output) = run_to_string(driver, &HarnessConfig::default());
        assert!(output.ends_with("Creating buffers ... done.\nDone.\n"));
        let RunOutcome::Completed { reports } = outcome else {
            panic!("Expected completed run");
        };
        let errors: Vec<&ResidencyError> = reports[0].errors().collect();
        assert!(matches!(errors[0], ResidencyError::EvictFailed(_)));
        assert!(matches!(errors[1], ResidencyError::MakeResidentFailed(_)));
    }

    #[test]
    fn test_multiple_cycles() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]);
        let config = HarnessConfig {
            cycles: 3,
            ..HarnessConfig::default()
        };
        let (outcome, _) = run_to_string(driver.clone(), &config);
        let RunOutcome::Completed { reports } = outcome else {
            panic!("Expected completed run");
        };
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(ResidencyReport::is_clean));
        let evicts = driver
            .calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Evict { .. }))
            .count();
        assert_eq!(evicts, 3);
    }

    #[test]
    fn test_zero_cycles_still_runs_one() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]);
        let config = HarnessConfig {
            cycles: 0,
            ..HarnessConfig::default()
        };
        let (outcome, _) = run_to_string(driver.clone(), &config);
        let RunOutcome::Completed { reports } = outcome else {
            panic!("Expected completed run");
        };
        assert_eq!(reports.len(), 1);
        let calls = driver.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, DriverCall::Evict { .. })).count(), 1);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, DriverCall::MakeResident { .. })).count(),
            1
        );
    }

    #[test]
    fn test_custom_candidates_and_heap() {
        let driver = SimulatedDriver::new(["Adapter X"]);
        let config = HarnessConfig {
            candidates: vec!["Adapter X".to_string()],
            element_count: 16,
            heap_type: HeapType::Readback,
            ..HarnessConfig::default()
        };
        let (outcome, output) = run_to_string(driver.clone(), &config);
        assert!(output.contains("Creating device on Adapter X ... done."));
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert!(driver.calls().iter().any(|c| matches!(
            c,
            DriverCall::CreateCommittedResource { width: 128, .. }
        )));
    }

    #[test]
    fn test_oversized_buffer_is_caught() {
        let driver = SimulatedDriver::new([BASIC_RENDER_DRIVER]);
        let config = HarnessConfig {
            element_count: u64::MAX,
            ..HarnessConfig::default()
        };
        let (outcome, _) = run_to_string(driver, &config);
        assert!(matches!(
            outcome,
            RunOutcome::SetupFailed(HarnessError::InvalidBufferSize { .. })
        ));
    }
}
