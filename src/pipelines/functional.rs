//! Functional annotation of contigs

use std::sync::Arc;

use log::info;

use crate::config::defs::{
    PipelineError, RunConfig, TaskSize, FARGENE_DIR, FARGENE_TAG, GECCO_DIR, GECCO_TAG, MACREL_DIR, MACREL_TAG,
    PRODIGAL_DIR, PRODIGAL_TAG,
};
use crate::pipelines::assembly::contigs_path;
use crate::pipelines::{publish, tool_args};
use crate::utils::command::check_versions;
use crate::utils::command::fargene::FargeneConfig;
use crate::utils::command::gecco::GeccoConfig;
use crate::utils::command::macrel::MacrelConfig;
use crate::utils::command::prodigal::ProdigalConfig;
use crate::utils::file::{prepare_output_dir, require_input};
use crate::utils::process::run_tool;
use crate::utils::storage::{HandleKind, OutputHandle};

#[derive(Debug, Clone)]
pub struct FunctionalResults {
    pub prodigal: OutputHandle,
    pub macrel: OutputHandle,
    pub fargene: OutputHandle,
    pub gecco: OutputHandle,
}

/// Predict protein-coding genes with prodigal
pub async fn prodigal(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(PRODIGAL_DIR);
    prepare_output_dir(config, &output_dir)?;

    let prodigal_config = ProdigalConfig {
        contigs: contigs_path(assembly_dir, config.sample()),
        format: config.args.prodigal_output_format,
        output_dir: output_dir.clone(),
        sample: config.sample().to_string(),
    };
    let prodigal_args = tool_args(PRODIGAL_TAG, config, &prodigal_config)?;

    info!("Predicting protein-coding genes with prodigal");
    let run = run_tool(config, "prodigal", PRODIGAL_TAG, prodigal_args, TaskSize::Large).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, PRODIGAL_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Detect antimicrobial peptides with Macrel. Macrel creates its own output directory.
pub async fn macrel(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(MACREL_DIR);
    let macrel_config = MacrelConfig {
        contigs: contigs_path(assembly_dir, config.sample()),
        output_dir: output_dir.clone(),
        tag: config.sample().to_string(),
    };
    let macrel_args = tool_args(MACREL_TAG, config, &macrel_config)?;

    info!("Detecting anti-microbial peptides in contigs with Macrel");
    let run = run_tool(config, "macrel", MACREL_TAG, macrel_args, TaskSize::Small).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, MACREL_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Detect antibiotic resistance genes with fARGene
pub async fn fargene(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(FARGENE_DIR);
    let fargene_config = FargeneConfig {
        contigs: contigs_path(assembly_dir, config.sample()),
        model: config.args.fargene_hmm_model,
        output_dir: output_dir.clone(),
    };
    let fargene_args = tool_args(FARGENE_TAG, config, &fargene_config)?;

    info!("Detecting antibiotic resistance genes in contigs with fARGene");
    let run = run_tool(config, "fargene", FARGENE_TAG, fargene_args, TaskSize::Small).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, FARGENE_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Detect biosynthetic gene clusters with GECCO
pub async fn gecco(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let output_dir = config.out_dir.join(GECCO_DIR);
    let gecco_config = GeccoConfig {
        contigs: contigs_path(assembly_dir, config.sample()),
        output_dir: output_dir.clone(),
    };
    let gecco_args = tool_args(GECCO_TAG, config, &gecco_config)?;

    info!("Detecting bacterial gene clusters in contigs with GECCO");
    let run = run_tool(config, "gecco", GECCO_TAG, gecco_args, TaskSize::Small).await?;
    let handle = publish(config, &output_dir, HandleKind::Dir, GECCO_DIR).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// All four annotators read the same contigs and run concurrently.
pub async fn functional_wf(config: &RunConfig, assembly_dir: &OutputHandle) -> Result<FunctionalResults, PipelineError> {
    let (prodigal, macrel, fargene, gecco) = futures::try_join!(
        prodigal(config, assembly_dir),
        macrel(config, assembly_dir),
        fargene(config, assembly_dir),
        gecco(config, assembly_dir),
    )?;
    Ok(FunctionalResults { prodigal, macrel, fargene, gecco })
}

/// Run function for the functional module; contigs come from `--assembly-dir`.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let assembly_dir = OutputHandle::external(
        HandleKind::Dir,
        require_input("assembly_dir", config.args.assembly_dir.as_ref(), &config.cwd)?,
    );
    check_versions(&config, &[PRODIGAL_TAG, MACREL_TAG, FARGENE_TAG, GECCO_TAG]).await?;

    let results = functional_wf(&config, &assembly_dir).await?;
    for handle in [&results.prodigal, &results.macrel, &results.fargene, &results.gecco] {
        info!("Annotation: {}", handle.remote);
    }
    Ok(())
}
