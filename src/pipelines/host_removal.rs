use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::config::defs::{PipelineError, RunConfig, TaskSize, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, FASTP_DIR, FASTP_TAG};
use crate::pipelines::{publish, tool_args};
use crate::utils::command::bowtie2::{Bowtie2BuildConfig, Bowtie2Config, Bowtie2Output};
use crate::utils::command::check_versions;
use crate::utils::command::fastp::FastpConfig;
use crate::utils::file::{clean_host_name, prepare_output_dir, require_input, require_reads};
use crate::utils::process::{run_tool, run_tool_with, ToolStdout};
use crate::utils::storage::{HandleKind, OutputHandle};

/// Trimmed read pair inside a fastp output directory.
pub fn trimmed_pair(trimmed_dir: &OutputHandle, sample: &str) -> (PathBuf, PathBuf) {
    (
        trimmed_dir.join(format!("{}_1.trim.fastq.gz", sample)),
        trimmed_dir.join(format!("{}_2.trim.fastq.gz", sample)),
    )
}

/// Host-depleted read pair written by bowtie2 `--un-conc-gz`.
pub fn unaligned_pair(unaligned_dir: &OutputHandle, sample: &str) -> (PathBuf, PathBuf) {
    (
        unaligned_dir.join(format!("{}_unaligned.fastq.1.gz", sample)),
        unaligned_dir.join(format!("{}_unaligned.fastq.2.gz", sample)),
    )
}

/// Adapter removal and read trimming with fastp
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `read1` - Paired-end read 1.
/// * `read2` - Paired-end read 2.
///
/// # Returns
/// Handle to `fastp_results/`.
pub async fn fastp(config: &RunConfig, read1: PathBuf, read2: PathBuf) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(FASTP_DIR);
    prepare_output_dir(config, &output_dir)?;

    let fastp_config = FastpConfig {
        read1,
        read2,
        output_prefix: output_dir.join(config.sample()),
    };
    let fastp_args = tool_args(FASTP_TAG, config, &fastp_config)?;

    info!("Running fastp to remove low-quality reads");
    let run = run_tool(config, "fastp", FASTP_TAG, fastp_args, TaskSize::Small).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, FASTP_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Builds a bowtie2 index of the host genome, prefixed by the cleaned host name.
pub async fn build_bowtie_index(config: &RunConfig, host_genome: PathBuf) -> Result<OutputHandle, PipelineError> {
    let output_dir_name = format!("{}_btidx", config.sample());
    let output_dir = config.out_dir.join(&output_dir_name);
    prepare_output_dir(config, &output_dir)?;

    let build_config = Bowtie2BuildConfig {
        reference: host_genome,
        index_prefix: output_dir.join(clean_host_name(&config.args.host_name)),
    };
    let build_args = tool_args(BOWTIE2_BUILD_TAG, config, &build_config)?;

    info!("Building bowtie2 index for the host genome");
    let run = run_tool(config, "build_bowtie_index", BOWTIE2_BUILD_TAG, build_args, TaskSize::Large).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, &output_dir_name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Aligns trimmed reads to the host and keeps the pairs that did not align.
pub async fn map_to_host(
    config: &RunConfig,
    host_idx: &OutputHandle,
    read_dir: &OutputHandle,
) -> Result<OutputHandle, PipelineError> {
    let sample = config.sample();
    let output_dir_name = format!("{}_bt_unaligned", sample);
    let output_dir = config.out_dir.join(&output_dir_name);
    prepare_output_dir(config, &output_dir)?;

    let (read1, read2) = trimmed_pair(read_dir, sample);
    let bt2_config = Bowtie2Config {
        index_prefix: host_idx.join(clean_host_name(&config.args.host_name)),
        read1,
        read2,
        output: Bowtie2Output::UnalignedConcordant(output_dir.join(format!("{}_unaligned.fastq.gz", sample))),
    };
    let bt2_args = tool_args(BOWTIE2_TAG, config, &bt2_config)?;

    info!("Aligning to host genome");
    // Without -S bowtie2 writes SAM to stdout; only the unaligned pairs are kept
    let run = run_tool_with(config, "map_to_host", BOWTIE2_TAG, bt2_args, TaskSize::Large, ToolStdout::Discard).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, &output_dir_name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// fastp and the host index build are independent; alignment waits on both.
pub async fn host_removal_wf(
    config: &RunConfig,
    read1: PathBuf,
    read2: PathBuf,
    host_genome: PathBuf,
) -> Result<OutputHandle, PipelineError> {
    let (trimmed, host_idx) = futures::try_join!(
        fastp(config, read1, read2),
        build_bowtie_index(config, host_genome),
    )?;
    map_to_host(config, &host_idx, &trimmed).await
}

/// Run function for the host_removal module.
///
/// `--trimmed-dir` and `--host-index-dir` skip their stages.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let cwd = config.cwd.clone();
    let args = &config.args;

    let trimmed = match &args.trimmed_dir {
        Some(dir) => Some(OutputHandle::external(HandleKind::Dir, require_input("trimmed_dir", Some(dir), &cwd)?)),
        None => None,
    };
    let host_idx = match &args.host_index_dir {
        Some(dir) => Some(OutputHandle::external(HandleKind::Dir, require_input("host_index_dir", Some(dir), &cwd)?)),
        None => None,
    };

    let mut tools = vec![BOWTIE2_TAG];
    if trimmed.is_none() {
        tools.push(FASTP_TAG);
    }
    if host_idx.is_none() {
        tools.push(BOWTIE2_BUILD_TAG);
    }
    check_versions(&config, &tools).await?;

    let trimmed_task = async {
        match &trimmed {
            Some(handle) => Ok::<OutputHandle, PipelineError>(handle.clone()),
            None => {
                let read1 = require_reads("read1", args.read1.as_ref(), &cwd)?;
                let read2 = require_reads("read2", args.read2.as_ref(), &cwd)?;
                fastp(&config, read1, read2).await
            }
        }
    };
    let index_task = async {
        match &host_idx {
            Some(handle) => Ok::<OutputHandle, PipelineError>(handle.clone()),
            None => {
                let host_genome = require_input("host_genome", args.host_genome.as_ref(), &cwd)?;
                build_bowtie_index(&config, host_genome).await
            }
        }
    };
    let (trimmed, host_idx) = futures::try_join!(trimmed_task, index_task)?;

    let unaligned = map_to_host(&config, &host_idx, &trimmed).await?;
    info!("Host-depleted reads: {}", unaligned.remote);
    Ok(())
}
