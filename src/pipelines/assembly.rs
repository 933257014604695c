//! Read assembly and evaluation for metagenomics data

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::config::defs::{PipelineError, RunConfig, TaskSize, MEGAHIT_DIR, MEGAHIT_TAG, METAQUAST_DIR, METAQUAST_TAG};
use crate::pipelines::host_removal::unaligned_pair;
use crate::pipelines::{publish, tool_args};
use crate::utils::command::check_versions;
use crate::utils::command::megahit::MegahitConfig;
use crate::utils::command::metaquast::MetaquastConfig;
use crate::utils::file::{file_path_manipulator, require_input};
use crate::utils::process::run_tool;
use crate::utils::storage::{HandleKind, OutputHandle};

/// `<sample>.contigs.fa` inside a MEGAHIT output directory.
pub fn contigs_path(assembly_dir: &OutputHandle, sample: &str) -> PathBuf {
    file_path_manipulator(&PathBuf::from(sample), Some(&assembly_dir.local), None, Some("contigs.fa"), ".")
}

/// MEGAHIT refuses to write into an existing directory, so a leftover
/// `MEGAHIT/` from an earlier run is reported rather than removed.
/// Called before any task starts as well as by `megahit` itself.
pub fn check_assembly_dir_free(config: &RunConfig) -> Result<(), PipelineError> {
    let output_dir = config.out_dir.join(MEGAHIT_DIR);
    if !config.args.dry_run && output_dir.exists() {
        return Err(PipelineError::InvalidConfig(format!(
            "{} already exists; remove it or choose another output directory",
            output_dir.display()
        )));
    }
    Ok(())
}

/// Assemble host-depleted reads with MEGAHIT
pub async fn megahit(config: &RunConfig, read_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    check_assembly_dir_free(config)?;
    let output_dir = config.out_dir.join(MEGAHIT_DIR);

    let (read1, read2) = unaligned_pair(read_dir, config.sample());
    let args = &config.args;
    let megahit_config = MegahitConfig {
        read1,
        read2,
        out_dir: output_dir.clone(),
        out_prefix: config.sample().to_string(),
        min_count: args.min_count,
        k_min: args.k_min,
        k_max: args.k_max,
        k_step: args.k_step,
        min_contig_len: args.min_contig_len,
    };
    let megahit_args = tool_args(MEGAHIT_TAG, config, &megahit_config)?;

    info!("Assembling reads with MEGAHIT");
    let run = run_tool(config, "megahit", MEGAHIT_TAG, megahit_args, TaskSize::Large).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, MEGAHIT_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Evaluate the assembly with MetaQuast, without reference genomes
pub async fn metaquast(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(METAQUAST_DIR);
    let metaquast_config = MetaquastConfig {
        contigs: contigs_path(assembly_dir, config.sample()),
        label: config.sample().to_string(),
        out_dir: output_dir.clone(),
    };
    let metaquast_args = tool_args(METAQUAST_TAG, config, &metaquast_config)?;

    info!("Evaluating assembly with MetaQuast");
    let run = run_tool(config, "metaquast", METAQUAST_TAG, metaquast_args, TaskSize::Small).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, METAQUAST_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Run function for the assembly module; reads come from `--unaligned-dir`.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let read_dir = OutputHandle::external(
        HandleKind::Dir,
        require_input("unaligned_dir", config.args.unaligned_dir.as_ref(), &config.cwd)?,
    );
    check_assembly_dir_free(&config)?;
    check_versions(&config, &[MEGAHIT_TAG, METAQUAST_TAG]).await?;

    let assembly_dir = megahit(&config, &read_dir).await?;
    let report = metaquast(&config, &assembly_dir).await?;
    info!("Assembly: {}", assembly_dir.remote);
    info!("MetaQuast report: {}", report.remote);
    Ok(())
}
