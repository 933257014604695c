use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};

use metamage::cli::{parse, validate_arguments, Arguments};
use metamage::config::defs::{PipelineError, RunConfig};
use metamage::pipelines::{assembly, binning, functional, host_removal, metamage as metamage_pipeline, taxonomy};
use metamage::utils::system::detect_cores_and_load;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n metamage\n-------------\n");

    if let Err(e) = validate_arguments(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let (max_cores, cpu_load) = detect_cores_and_load(args.threads).await?;
    debug!("Using up to {} threads per tool; CPU load {}%", max_cores, cpu_load);

    let out_dir = setup_output_dir(&args, &dir)?;
    info!("Working directory for outputs is {:?}", out_dir);

    let module = args.module.clone();
    let manifest_path = args.manifest.as_ref().map(|m| resolve(&dir, m));
    let run_config = Arc::new(RunConfig::new(args, dir, out_dir, max_cores));

    let result = match module.as_str() {
        "metamage" => metamage_pipeline::run(run_config.clone()).await,
        "host_removal" => host_removal::run(run_config.clone()).await,
        "taxonomy" => taxonomy::run(run_config.clone()).await,
        "assembly" => assembly::run(run_config.clone()).await,
        "binning" => binning::run(run_config.clone()).await,
        "functional" => functional::run(run_config.clone()).await,
        _ => Err(PipelineError::InvalidConfig(format!("Invalid module: {}", module))),
    };

    if let Some(path) = manifest_path {
        match run_config.write_manifest(&path) {
            Ok(()) => info!("Manifest written to {:?}", path),
            Err(e) => error!("{}", e),
        }
    }

    if let Err(e) = result {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}

fn resolve(cwd: &PathBuf, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Sets up output directory
/// If `out_dir` is specified from args, uses it;
/// otherwise, creates a directory named `<sample_name>_YYYYMMDD`.
/// Ensures the directory exists.
///
/// # Arguments
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory.
/// # Returns
/// path to the output directory.
fn setup_output_dir(args: &Arguments, cwd: &PathBuf) -> Result<PathBuf> {
    let out_dir = match &args.out_dir {
        Some(out) => resolve(cwd, out),
        None => {
            let timestamp = chrono::Local::now().format("%Y%m%d").to_string();
            cwd.join(format!("{}_{}", args.sample_name, timestamp))
        }
    };
    fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}
