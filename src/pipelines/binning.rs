use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::config::defs::{
    PipelineError, RunConfig, SamtoolsSubcommand, TaskSize, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, JGI_DEPTHS_TAG,
    METABAT2_TAG, METABAT_DIR, SAMTOOLS_TAG,
};
use crate::pipelines::assembly::contigs_path;
use crate::pipelines::host_removal::unaligned_pair;
use crate::pipelines::{publish, tool_args};
use crate::utils::command::bowtie2::{Bowtie2BuildConfig, Bowtie2Config, Bowtie2Output};
use crate::utils::command::check_versions;
use crate::utils::command::metabat2::{DepthsConfig, Metabat2Config};
use crate::utils::command::samtools::SamtoolsConfig;
use crate::utils::file::{file_path_manipulator, prepare_output_dir, require_input};
use crate::utils::process::run_tool;
use crate::utils::storage::{HandleKind, OutputHandle};

fn sample_file(config: &RunConfig, suffix: &str) -> (PathBuf, String) {
    let path = file_path_manipulator(&PathBuf::from(config.sample()), Some(&config.out_dir), None, Some(suffix), "_");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (path, name)
}

pub async fn bowtie_assembly_build(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let sample = config.sample();
    let output_dir_name = format!("{}_assembly_idx", sample);
    let output_dir = config.out_dir.join(&output_dir_name);
    prepare_output_dir(config, &output_dir)?;

    let build_config = Bowtie2BuildConfig {
        reference: contigs_path(assembly_dir, sample),
        index_prefix: output_dir.join(sample),
    };
    let build_args = tool_args(BOWTIE2_BUILD_TAG, config, &build_config)?;

    let run = run_tool(config, "bowtie_assembly_build", BOWTIE2_BUILD_TAG, build_args, TaskSize::Large).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, &output_dir_name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

pub async fn bowtie_assembly_align(
    config: &RunConfig,
    assembly_idx: &OutputHandle,
    read_dir: &OutputHandle,
) -> Result<OutputHandle, PipelineError> {
    let sample = config.sample();
    let (output, name) = sample_file(config, "assembly_mapped.sam");
    let (read1, read2) = unaligned_pair(read_dir, sample);

    let bt2_config = Bowtie2Config {
        index_prefix: assembly_idx.join(sample),
        read1,
        read2,
        output: Bowtie2Output::Sam(output.clone()),
    };
    let bt2_args = tool_args(BOWTIE2_TAG, config, &bt2_config)?;

    let run = run_tool(config, "bowtie_assembly_align", BOWTIE2_TAG, bt2_args, TaskSize::Large).await?;
    let handle = publish(config, &output, HandleKind::File, &name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

async fn samtools_step(
    config: &RunConfig,
    task: &str,
    subcommand: SamtoolsSubcommand,
    input: &OutputHandle,
    suffix: &str,
) -> Result<OutputHandle, PipelineError> {
    let (output, name) = sample_file(config, suffix);
    let samtools_config = SamtoolsConfig {
        subcommand,
        input: input.local.clone(),
        output: output.clone(),
    };
    let samtools_args = tool_args(SAMTOOLS_TAG, config, &samtools_config)?;

    let run = run_tool(config, task, SAMTOOLS_TAG, samtools_args, TaskSize::Small).await?;
    let handle = publish(config, &output, HandleKind::File, &name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

pub async fn convert_to_bam(config: &RunConfig, assembly_align: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    samtools_step(config, "convert_to_bam", SamtoolsSubcommand::View, assembly_align, "assembly_unsorted.bam").await
}

pub async fn sort_bam(config: &RunConfig, unsorted_bam: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    samtools_step(config, "sort_bam", SamtoolsSubcommand::Sort, unsorted_bam, "assembly_sorted.bam").await
}

/// Per-contig coverage table metabat2 bins on.
pub async fn summarize_contig_depths(config: &RunConfig, assembly_bam: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let (output, name) = sample_file(config, "depths.txt");
    let depths_config = DepthsConfig {
        bam: assembly_bam.local.clone(),
        output: output.clone(),
    };
    let depths_args = tool_args(JGI_DEPTHS_TAG, config, &depths_config)?;

    let run = run_tool(config, "summarize_contig_depths", JGI_DEPTHS_TAG, depths_args, TaskSize::Small).await?;
    let handle = publish(config, &output, HandleKind::File, &name).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

pub async fn metabat2(
    config: &RunConfig,
    assembly_dir: &OutputHandle,
    depth_file: &OutputHandle,
) -> Result<OutputHandle, PipelineError> {
    let sample = config.sample();
    let output_dir = config.out_dir.join(METABAT_DIR);
    prepare_output_dir(config, &output_dir)?;

    let metabat_config = Metabat2Config {
        contigs: contigs_path(assembly_dir, sample),
        depths: depth_file.local.clone(),
        output_prefix: output_dir.join(sample),
    };
    let metabat_args = tool_args(METABAT2_TAG, config, &metabat_config)?;

    info!("Binning contigs with MetaBAT2");
    let run = run_tool(config, "metabat2", METABAT2_TAG, metabat_args, TaskSize::Large).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, METABAT_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Map reads back to the contigs, summarise depths, bin.
pub async fn binning_wf(
    config: &RunConfig,
    assembly_dir: &OutputHandle,
    read_dir: &OutputHandle,
) -> Result<OutputHandle, PipelineError> {
    let assembly_idx = bowtie_assembly_build(config, assembly_dir).await?;
    let sam = bowtie_assembly_align(config, &assembly_idx, read_dir).await?;
    let unsorted = convert_to_bam(config, &sam).await?;
    let sorted = sort_bam(config, &unsorted).await?;
    let depths = summarize_contig_depths(config, &sorted).await?;
    metabat2(config, assembly_dir, &depths).await
}

/// Run function for the binning module; needs `--assembly-dir` and `--unaligned-dir`.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let assembly_dir = OutputHandle::external(
        HandleKind::Dir,
        require_input("assembly_dir", config.args.assembly_dir.as_ref(), &config.cwd)?,
    );
    let read_dir = OutputHandle::external(
        HandleKind::Dir,
        require_input("unaligned_dir", config.args.unaligned_dir.as_ref(), &config.cwd)?,
    );
    check_versions(&config, &[BOWTIE2_BUILD_TAG, BOWTIE2_TAG, SAMTOOLS_TAG, JGI_DEPTHS_TAG, METABAT2_TAG]).await?;

    let bins = binning_wf(&config, &assembly_dir, &read_dir).await?;
    info!("Bins: {}", bins.remote);
    Ok(())
}
