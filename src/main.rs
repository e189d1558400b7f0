mod backend;
mod config;
mod desc;
mod driver;
mod error;
mod gpu;
mod harness;

use std::io::Write;

use backend::{BackendKind, SimulatedDriver};
use clap::Parser;
use config::HarnessConfig;
use desc::{FeatureLevel, HeapType};
use driver::GpuDriver;
use gpu::{BufferElement, ResidencyReport};
use harness::RunOutcome;

#[derive(Parser, Debug)]
#[command(author, version, about = "GPU driver residency (paging) probe", long_about = None)]
struct Args {
    /// Adapter description to try, in priority order (repeatable). The last
    /// one must be present for the run to proceed.
    #[arg(short, long = "adapter", value_name = "NAME")]
    adapters: Vec<String>,

    /// Driver backend to run against
    #[arg(short, long, value_enum, default_value_t = BackendKind::default())]
    backend: BackendKind,

    /// Number of 8-byte elements in the probe buffer
    #[arg(short, long, default_value_t = gpu::buffers::REFERENCE_ELEMENT_COUNT)]
    elements: u64,

    /// Heap to allocate the probe buffer from
    #[arg(long, value_enum, default_value_t = HeapType::Default)]
    heap: HeapType,

    /// Minimum feature level requested at device creation
    #[arg(long, value_enum, default_value_t = FeatureLevel::Level11_0)]
    feature_level: FeatureLevel,

    /// Number of evict/make-resident cycles (at least 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    cycles: u32,

    /// List available adapters and exit
    #[arg(long, default_value_t = false)]
    list_adapters: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn harness_config(&self) -> HarnessConfig {
        let defaults = HarnessConfig::default();
        let candidates = if self.adapters.is_empty() {
            defaults.candidates
        } else {
            self.adapters.clone()
        };
        HarnessConfig {
            candidates,
            element_count: self.elements,
            element_stride: std::mem::size_of::<BufferElement>() as u64,
            heap_type: self.heap,
            min_feature_level: self.feature_level,
            cycles: self.cycles,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Parses arguments. Usage errors are reported but still exit 0; help and
/// version output keep clap's behavior.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => e.exit(),
    }
}

fn main() {
    let args = parse_args();
    init_logging(args.verbose);

    if !args.backend.is_available() {
        eprintln!("Error: {:?} backend not compiled.", args.backend);
        if let Some(feature) = args.backend.feature() {
            eprintln!("Build with: cargo build --features {}", feature);
        }
        std::process::exit(0);
    }

    match args.backend {
        #[cfg(all(windows, feature = "d3d12"))]
        BackendKind::D3d12 => probe(backend::D3d12Driver, &args),
        #[cfg(feature = "gpu")]
        BackendKind::Wgpu => probe(backend::WgpuDriver, &args),
        BackendKind::Simulated => probe(SimulatedDriver::reference_system(), &args),
        #[allow(unreachable_patterns)]
        other => unreachable!("{:?} backend is not compiled", other),
    }
}

fn probe<D: GpuDriver>(driver: D, args: &Args) {
    if args.list_adapters {
        list(&driver);
        return;
    }

    let config = args.harness_config();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match harness::run(driver, &config, &mut out) {
        Ok(RunOutcome::Completed { reports }) => {
            let failed = reports.iter().filter(|r| !r.is_clean()).count();
            if failed > 0 {
                let errors = reports.iter().flat_map(ResidencyReport::errors).count();
                log::warn!(
                    "{} of {} residency cycle(s) reported {} failure(s)",
                    failed,
                    reports.len(),
                    errors
                );
            }
        }
        Ok(RunOutcome::BaselineMissing { name }) => {
            log::info!("Baseline adapter \"{}\" absent, nothing probed", name);
        }
        Ok(RunOutcome::SetupFailed(e)) => log::debug!("Setup failed: {:?}", e),
        Err(e) => log::error!("Console output failed: {}", e),
    }
    let _ = out.flush();
}

fn list<D: GpuDriver>(driver: &D) {
    match gpu::list_adapters(driver) {
        Ok(adapters) if adapters.is_empty() => println!("No adapters found."),
        Ok(adapters) => {
            println!("Available adapters ({}):", driver.name());
            for adapter in &adapters {
                println!("  {}", adapter);
            }
        }
        Err(e) => eprintln!("Error listing adapters: {}", e),
    }
}
