use std::sync::Arc;

use log::info;

use crate::config::defs::{
    PipelineError, RunConfig, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, FARGENE_TAG, FASTP_TAG, GECCO_TAG, JGI_DEPTHS_TAG,
    KAIJU2KRONA_TAG, KAIJU2TABLE_TAG, KAIJU_TAG, KTIMPORTTEXT_TAG, MACREL_TAG, MEGAHIT_TAG, METABAT2_TAG,
    METAQUAST_TAG, PRODIGAL_TAG, SAMTOOLS_TAG,
};
use crate::pipelines::assembly::{check_assembly_dir_free, megahit, metaquast};
use crate::pipelines::binning::binning_wf;
use crate::pipelines::functional::{functional_wf, FunctionalResults};
use crate::pipelines::host_removal::host_removal_wf;
use crate::pipelines::taxonomy::{taxonomy_wf, KaijuReference, TaxonomyResults};
use crate::utils::command::check_versions;
use crate::utils::file::{require_input, require_reads};
use crate::utils::storage::OutputHandle;

pub const METAMAGE_TOOLS: &[&str] = &[
    FASTP_TAG,
    BOWTIE2_BUILD_TAG,
    BOWTIE2_TAG,
    KAIJU_TAG,
    KAIJU2TABLE_TAG,
    KAIJU2KRONA_TAG,
    KTIMPORTTEXT_TAG,
    MEGAHIT_TAG,
    METAQUAST_TAG,
    SAMTOOLS_TAG,
    JGI_DEPTHS_TAG,
    METABAT2_TAG,
    PRODIGAL_TAG,
    MACREL_TAG,
    FARGENE_TAG,
    GECCO_TAG,
];

#[derive(Debug, Clone)]
pub struct MetamageResults {
    pub taxonomy: TaxonomyResults,
    pub metaquast: OutputHandle,
    pub bins: OutputHandle,
    pub functional: FunctionalResults,
}

impl MetamageResults {
    /// Final outputs in reporting order: kaiju table, krona plot, MetaQuast,
    /// bins, then prodigal, macrel, fARGene and GECCO.
    pub fn into_handles(self) -> Vec<OutputHandle> {
        vec![
            self.taxonomy.table,
            self.taxonomy.krona_html,
            self.metaquast,
            self.bins,
            self.functional.prodigal,
            self.functional.macrel,
            self.functional.fargene,
            self.functional.gecco,
        ]
    }
}

/// The whole DAG. Host removal gates everything; after it, taxonomy and the
/// assembly branch run side by side, and the assembly fans out to MetaQuast,
/// binning and functional annotation.
pub async fn metamage_wf(
    config: &RunConfig,
    reference: &KaijuReference,
) -> Result<MetamageResults, PipelineError> {
    let cwd = &config.cwd;
    let args = &config.args;
    let read1 = require_reads("read1", args.read1.as_ref(), cwd)?;
    let read2 = require_reads("read2", args.read2.as_ref(), cwd)?;
    let host_genome = require_input("host_genome", args.host_genome.as_ref(), cwd)?;

    let unaligned = host_removal_wf(config, read1, read2, host_genome).await?;

    let assembly_branch = async {
        let assembly_dir = megahit(config, &unaligned).await?;
        futures::try_join!(
            metaquast(config, &assembly_dir),
            binning_wf(config, &assembly_dir, &unaligned),
            functional_wf(config, &assembly_dir),
        )
    };

    let (taxonomy, (metaquast, bins, functional)) =
        futures::try_join!(taxonomy_wf(config, &unaligned, reference), assembly_branch)?;

    Ok(MetamageResults { taxonomy, metaquast, bins, functional })
}

/// Run function for the full metamage workflow
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let reference = KaijuReference::from_config(&config)?;
    check_assembly_dir_free(&config)?;
    check_versions(&config, METAMAGE_TOOLS).await?;

    let results = metamage_wf(&config, &reference).await?;
    for handle in results.into_handles() {
        info!("Output: {}", handle.remote);
    }
    println!("Finished metamage.");
    Ok(())
}
