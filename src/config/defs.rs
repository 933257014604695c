use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use lazy_static::lazy_static;
use log::warn;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cli::Arguments;
use crate::utils::process::ToolRun;
use crate::utils::storage::{OutputHandle, RunManifest, StorageNamespace};

// External software
pub const FASTP_TAG: &str = "fastp";
pub const BOWTIE2_TAG: &str = "bowtie2";
pub const BOWTIE2_BUILD_TAG: &str = "bowtie2-build";
pub const SAMTOOLS_TAG: &str = "samtools";
pub const KAIJU_TAG: &str = "kaiju";
pub const KAIJU2TABLE_TAG: &str = "kaiju2table";
pub const KAIJU2KRONA_TAG: &str = "kaiju2krona";
pub const KTIMPORTTEXT_TAG: &str = "ktImportText";
pub const MEGAHIT_TAG: &str = "megahit";
pub const METAQUAST_TAG: &str = "metaquast.py";
pub const JGI_DEPTHS_TAG: &str = "jgi_summarize_bam_contig_depths";
pub const METABAT2_TAG: &str = "metabat2";
pub const PRODIGAL_TAG: &str = "prodigal";
pub const MACREL_TAG: &str = "macrel";
pub const FARGENE_TAG: &str = "fargene";
pub const GECCO_TAG: &str = "gecco";

lazy_static! {
    /// Flag each tool answers with its version; tools missing here are probed without arguments.
    pub static ref TOOL_VERSION_FLAGS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert(FASTP_TAG, "--version");
        m.insert(BOWTIE2_TAG, "--version");
        m.insert(BOWTIE2_BUILD_TAG, "--version");
        m.insert(SAMTOOLS_TAG, "--version");
        m.insert(KAIJU_TAG, "-h");
        m.insert(KAIJU2TABLE_TAG, "-h");
        m.insert(KAIJU2KRONA_TAG, "-h");
        m.insert(KTIMPORTTEXT_TAG, "-h");
        m.insert(MEGAHIT_TAG, "--version");
        m.insert(METAQUAST_TAG, "--version");
        m.insert(JGI_DEPTHS_TAG, "-h");
        m.insert(METABAT2_TAG, "-h");
        m.insert(PRODIGAL_TAG, "-v");
        m.insert(MACREL_TAG, "--version");
        m.insert(FARGENE_TAG, "--version");
        m.insert(GECCO_TAG, "--version");

        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    View,
    Sort,
}

impl SamtoolsSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamtoolsSubcommand::View => "view",
            SamtoolsSubcommand::Sort => "sort",
        }
    }
}

/// Resource class of a task. Large tasks are gated by `RunConfig::large_task_semaphore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSize {
    Small,
    Large,
}

// Static Thread Counts
pub const FASTP_THREADS: usize = 4;
pub const BOWTIE2_THREADS: usize = 31;
pub const SAMTOOLS_THREADS: usize = 4;
pub const MACREL_THREADS: usize = 8;
pub const FARGENE_THREADS: usize = 8;
pub const GECCO_THREADS: usize = 4;

// Static Parameters
pub const KAIJU_INPUT_MODE: &str = "2";
pub const METAQUAST_MAX_REF_NUMBER: &str = "0";
pub const MAX_KMER: u32 = 255;
pub const MAX_K_STEP: u32 = 28;

// Static Directory Names
pub const FASTP_DIR: &str = "fastp_results";
pub const MEGAHIT_DIR: &str = "MEGAHIT";
pub const METAQUAST_DIR: &str = "MetaQuast";
pub const METABAT_DIR: &str = "METABAT";
pub const PRODIGAL_DIR: &str = "prodigal_results";
pub const MACREL_DIR: &str = "macrel_results";
pub const FARGENE_DIR: &str = "fargene_results";
pub const GECCO_DIR: &str = "gecco_results";
pub const KAIJU_DIR: &str = "kaiju";

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum TaxonRank {
    Superkingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    #[default]
    Species,
}

impl TaxonRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonRank::Superkingdom => "superkingdom",
            TaxonRank::Phylum => "phylum",
            TaxonRank::Class => "class",
            TaxonRank::Order => "order",
            TaxonRank::Family => "family",
            TaxonRank::Genus => "genus",
            TaxonRank::Species => "species",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ProdigalOutput {
    #[default]
    Gbk,
    Gff,
    Sco,
}

impl ProdigalOutput {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProdigalOutput::Gbk => "gbk",
            ProdigalOutput::Gff => "gff",
            ProdigalOutput::Sco => "sco",
        }
    }
}

/// fARGene HMM models. Names are passed verbatim to `--hmm-model`.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum FargeneModel {
    #[default]
    #[value(name = "class_a")]
    ClassA,
    #[value(name = "class_b_1_2")]
    ClassB12,
    #[value(name = "class_b_3")]
    ClassB3,
    #[value(name = "class_c")]
    ClassC,
    #[value(name = "class_d_1")]
    ClassD1,
    #[value(name = "class_d_2")]
    ClassD2,
    #[value(name = "qnr")]
    Qnr,
    #[value(name = "tet_efflux")]
    TetEfflux,
    #[value(name = "tet_rpg")]
    TetRpg,
    #[value(name = "tet_enzyme")]
    TetEnzyme,
    #[value(name = "erm_type_a")]
    ErmTypeA,
    #[value(name = "erm_type_f")]
    ErmTypeF,
    #[value(name = "mph")]
    Mph,
    #[value(name = "aminoglycoside_model_a")]
    AminoglycosideModelA,
    #[value(name = "aminoglycoside_model_b")]
    AminoglycosideModelB,
    #[value(name = "aminoglycoside_model_c")]
    AminoglycosideModelC,
    #[value(name = "aminoglycoside_model_d")]
    AminoglycosideModelD,
    #[value(name = "aminoglycoside_model_e")]
    AminoglycosideModelE,
    #[value(name = "aminoglycoside_model_f")]
    AminoglycosideModelF,
    #[value(name = "aminoglycoside_model_g")]
    AminoglycosideModelG,
    #[value(name = "aminoglycoside_model_h")]
    AminoglycosideModelH,
    #[value(name = "aminoglycoside_model_i")]
    AminoglycosideModelI,
}

impl FargeneModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FargeneModel::ClassA => "class_a",
            FargeneModel::ClassB12 => "class_b_1_2",
            FargeneModel::ClassB3 => "class_b_3",
            FargeneModel::ClassC => "class_c",
            FargeneModel::ClassD1 => "class_d_1",
            FargeneModel::ClassD2 => "class_d_2",
            FargeneModel::Qnr => "qnr",
            FargeneModel::TetEfflux => "tet_efflux",
            FargeneModel::TetRpg => "tet_rpg",
            FargeneModel::TetEnzyme => "tet_enzyme",
            FargeneModel::ErmTypeA => "erm_type_a",
            FargeneModel::ErmTypeF => "erm_type_f",
            FargeneModel::Mph => "mph",
            FargeneModel::AminoglycosideModelA => "aminoglycoside_model_a",
            FargeneModel::AminoglycosideModelB => "aminoglycoside_model_b",
            FargeneModel::AminoglycosideModelC => "aminoglycoside_model_c",
            FargeneModel::AminoglycosideModelD => "aminoglycoside_model_d",
            FargeneModel::AminoglycosideModelE => "aminoglycoside_model_e",
            FargeneModel::AminoglycosideModelF => "aminoglycoside_model_f",
            FargeneModel::AminoglycosideModelG => "aminoglycoside_model_g",
            FargeneModel::AminoglycosideModelH => "aminoglycoside_model_h",
            FargeneModel::AminoglycosideModelI => "aminoglycoside_model_i",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Tool {0} not found. Is it installed and on PATH?")]
    ToolNotFound(String),

    #[error("Tool {tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub storage: StorageNamespace,
    pub large_task_semaphore: Arc<Semaphore>,
    pub max_threads: usize,
    pub manifest: Mutex<RunManifest>,
    pub tools_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(args: Arguments, cwd: PathBuf, out_dir: PathBuf, max_threads: usize) -> Self {
        let storage = StorageNamespace::new(
            &args.storage_scheme,
            &args.workflow_name,
            args.storage_root.as_ref().map(|root| cwd.join(root)),
        );
        let large_task_semaphore = Arc::new(Semaphore::new(args.max_large_tasks.max(1)));
        let manifest = Mutex::new(RunManifest::new(&args.workflow_name, &args.sample_name, args.dry_run));
        let tools_dir = args.tools_dir.as_ref().map(|dir| cwd.join(dir));
        RunConfig {
            cwd,
            out_dir,
            args,
            storage,
            large_task_semaphore,
            max_threads: max_threads.max(1),
            manifest,
            tools_dir,
        }
    }

    /// Executable for a tool tag: `<tools-dir>/<tag>` when present there,
    /// otherwise the bare tag, looked up on PATH.
    pub fn tool_program(&self, tool: &str) -> PathBuf {
        match &self.tools_dir {
            Some(dir) if dir.join(tool).is_file() => dir.join(tool),
            _ => PathBuf::from(tool),
        }
    }

    /// Tool's conventional thread count, capped by the run's thread budget.
    pub fn threads_for(&self, tool_default: usize) -> usize {
        tool_default.min(self.max_threads).max(1)
    }

    pub fn sample(&self) -> &str {
        &self.args.sample_name
    }

    pub fn record_task(&self, run: ToolRun, outputs: Vec<OutputHandle>) {
        match self.manifest.lock() {
            Ok(mut manifest) => manifest.push(run, outputs),
            Err(e) => warn!("Manifest lock poisoned, task not recorded: {}", e),
        }
    }

    pub fn write_manifest(&self, path: &Path) -> anyhow::Result<()> {
        let manifest = self
            .manifest
            .lock()
            .map_err(|e| anyhow::anyhow!("Manifest lock poisoned: {}", e))?;
        manifest.write(path)
    }
}
