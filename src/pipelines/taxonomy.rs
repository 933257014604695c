//! Taxonomic classification of reads with Kaiju and KronaTools

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::config::defs::{
    PipelineError, RunConfig, TaskSize, KAIJU2KRONA_TAG, KAIJU2TABLE_TAG, KAIJU_DIR, KAIJU_TAG, KTIMPORTTEXT_TAG,
};
use crate::pipelines::host_removal::unaligned_pair;
use crate::pipelines::{publish, tool_args};
use crate::utils::command::check_versions;
use crate::utils::command::kaiju::{Kaiju2KronaConfig, Kaiju2TableConfig, KaijuConfig};
use crate::utils::command::krona::KronaConfig;
use crate::utils::file::{file_path_manipulator, prepare_output_dir, require_input};
use crate::utils::process::run_tool;
use crate::utils::storage::{HandleKind, OutputHandle};

#[derive(Debug, Clone)]
pub struct KaijuReference {
    pub db: PathBuf,
    pub nodes: PathBuf,
    pub names: PathBuf,
}

impl KaijuReference {
    pub fn from_config(config: &RunConfig) -> Result<Self, PipelineError> {
        let args = &config.args;
        Ok(KaijuReference {
            db: require_input("kaiju_ref_db", args.kaiju_ref_db.as_ref(), &config.cwd)?,
            nodes: require_input("kaiju_ref_nodes", args.kaiju_ref_nodes.as_ref(), &config.cwd)?,
            names: require_input("kaiju_ref_names", args.kaiju_ref_names.as_ref(), &config.cwd)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TaxonomyResults {
    pub table: OutputHandle,
    pub krona_html: OutputHandle,
}

fn kaiju_output(config: &RunConfig, suffix: &str) -> (PathBuf, String) {
    let dir = config.out_dir.join(KAIJU_DIR);
    let path = file_path_manipulator(&PathBuf::from(config.sample()), Some(&dir), None, Some(suffix), "_");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (path, format!("{}/{}", KAIJU_DIR, name))
}

/// Classify host-depleted reads with Kaiju
pub async fn taxonomy_classification(
    config: &RunConfig,
    read_dir: &OutputHandle,
    reference: &KaijuReference,
) -> Result<OutputHandle, PipelineError> {
    prepare_output_dir(config, &config.out_dir.join(KAIJU_DIR))?;
    let (output, rel) = kaiju_output(config, "kaiju.out");
    let (read1, read2) = unaligned_pair(read_dir, config.sample());

    let kaiju_config = KaijuConfig {
        nodes: reference.nodes.clone(),
        db: reference.db.clone(),
        read1,
        read2,
        output: output.clone(),
    };
    let kaiju_args = tool_args(KAIJU_TAG, config, &kaiju_config)?;

    info!("Classifying reads with Kaiju");
    let run = run_tool(config, "taxonomy_classification", KAIJU_TAG, kaiju_args, TaskSize::Large).await?;
    let handle = publish(config, &output, HandleKind::File, &rel).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Convert Kaiju output to a per-rank TSV summary
pub async fn kaiju2table(
    config: &RunConfig,
    kaiju_out: &OutputHandle,
    reference: &KaijuReference,
) -> Result<OutputHandle, PipelineError> {
    let (output, rel) = kaiju_output(config, "kaiju.tsv");
    let table_config = Kaiju2TableConfig {
        nodes: reference.nodes.clone(),
        names: reference.names.clone(),
        rank: config.args.taxon_rank,
        kaiju_out: kaiju_out.local.clone(),
        output: output.clone(),
    };
    let table_args = tool_args(KAIJU2TABLE_TAG, config, &table_config)?;

    let run = run_tool(config, "kaiju2table", KAIJU2TABLE_TAG, table_args, TaskSize::Small).await?;
    let handle = publish(config, &output, HandleKind::File, &rel).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Convert Kaiju output to Krona-readable text
pub async fn kaiju2krona(
    config: &RunConfig,
    kaiju_out: &OutputHandle,
    reference: &KaijuReference,
) -> Result<OutputHandle, PipelineError> {
    let (output, rel) = kaiju_output(config, "kaiju2krona.out");
    let krona_config = Kaiju2KronaConfig {
        nodes: reference.nodes.clone(),
        names: reference.names.clone(),
        kaiju_out: kaiju_out.local.clone(),
        output: output.clone(),
    };
    let krona_args = tool_args(KAIJU2KRONA_TAG, config, &krona_config)?;

    let run = run_tool(config, "kaiju2krona", KAIJU2KRONA_TAG, krona_args, TaskSize::Small).await?;
    let handle = publish(config, &output, HandleKind::File, &rel).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// Make the Krona HTML plot
pub async fn plot_krona(config: &RunConfig, krona_txt: &OutputHandle) -> Result<OutputHandle, PipelineError> {
    let (output, rel) = kaiju_output(config, "krona.html");
    let krona_config = KronaConfig {
        input: krona_txt.local.clone(),
        output: output.clone(),
    };
    let krona_args = tool_args(KTIMPORTTEXT_TAG, config, &krona_config)?;

    let run = run_tool(config, "plot_krona", KTIMPORTTEXT_TAG, krona_args, TaskSize::Small).await?;
    let handle = publish(config, &output, HandleKind::File, &rel).await?;
    config.record_task(run, vec![handle.clone()]);
    Ok(handle)
}

/// kaiju, then the table and the Krona branches side by side.
pub async fn taxonomy_wf(
    config: &RunConfig,
    read_dir: &OutputHandle,
    reference: &KaijuReference,
) -> Result<TaxonomyResults, PipelineError> {
    let kaiju_out = taxonomy_classification(config, read_dir, reference).await?;
    let krona_branch = async {
        let krona_txt = kaiju2krona(config, &kaiju_out, reference).await?;
        plot_krona(config, &krona_txt).await
    };
    let (table, krona_html) = futures::try_join!(kaiju2table(config, &kaiju_out, reference), krona_branch)?;
    Ok(TaxonomyResults { table, krona_html })
}

/// Run function for the taxonomy module; reads come from `--unaligned-dir`.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let read_dir = OutputHandle::external(
        HandleKind::Dir,
        require_input("unaligned_dir", config.args.unaligned_dir.as_ref(), &config.cwd)?,
    );
    let reference = KaijuReference::from_config(&config)?;
    check_versions(&config, &[KAIJU_TAG, KAIJU2TABLE_TAG, KAIJU2KRONA_TAG, KTIMPORTTEXT_TAG]).await?;

    let results = taxonomy_wf(&config, &read_dir, &reference).await?;
    info!("Kaiju table: {}", results.table.remote);
    info!("Krona plot: {}", results.krona_html.remote);
    Ok(())
}
