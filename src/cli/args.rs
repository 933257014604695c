use clap::Parser;

use crate::config::defs::{FargeneModel, ProdigalOutput, TaxonRank};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "metamage", version, about = "Metagenomic pre-processing, taxonomic classification, assembly, binning and annotation")]
pub struct Arguments {

    #[arg(short, long, default_value = "metamage", help = "One of: metamage, host_removal, taxonomy, assembly, binning, functional")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'i', long = "read1")]
    pub read1: Option<String>,

    #[arg(short = 'I', long = "read2")]
    pub read2: Option<String>,

    #[arg(short = 'o', long = "out", help = "Local working directory for all generated files. If not specified, a directory named '<sample_name>_YYYYMMDD' will be created in the current working directory.")]
    pub out_dir: Option<String>,

    #[arg(long, default_value = "metamage_sample", help = "Sample name (defines output file names)")]
    pub sample_name: String,

    #[arg(short = 'a', long)]  // For host removal
    pub host_genome: Option<String>,

    #[arg(long, default_value = "host")]
    pub host_name: String,

    #[arg(long, help = "Kaiju reference database (FM-index, .fmi)")]
    pub kaiju_ref_db: Option<String>,

    #[arg(long, help = "Kaiju reference nodes (nodes.dmp)")]
    pub kaiju_ref_nodes: Option<String>,

    #[arg(long, help = "Kaiju reference taxon names (names.dmp)")]
    pub kaiju_ref_names: Option<String>,

    #[arg(long, default_value = "species", value_enum)]
    pub taxon_rank: TaxonRank,

    #[arg(long, default_value_t = 2, help = "Minimum multiplicity for filtering (k_min+1)-mers")]
    pub min_count: u32,

    #[arg(long, default_value_t = 21, help = "Must be odd and <=255")]
    pub k_min: u32,

    #[arg(long, default_value_t = 141, help = "Must be odd and <=255")]
    pub k_max: u32,

    #[arg(long, default_value_t = 12, help = "Must be even and <=28")]
    pub k_step: u32,

    #[arg(long, default_value_t = 200)]
    pub min_contig_len: u32,

    #[arg(long, default_value = "gbk", value_enum)]
    pub prodigal_output_format: ProdigalOutput,

    #[arg(long, default_value = "class_a", value_enum)]
    pub fargene_hmm_model: FargeneModel,

    #[arg(long, default_value_t = 32)]
    pub threads: usize,

    #[arg(long, default_value_t = 2, help = "Maximum number of large tasks (index builds, alignment, assembly) running at once")]
    pub max_large_tasks: usize,

    #[arg(long, help = "Directory outputs are published to, laid out as <root>/<workflow>/<sample>/...")]
    pub storage_root: Option<String>,

    #[arg(long, default_value = "latch")]
    pub storage_scheme: String,

    #[arg(long, default_value = "metamage")]
    pub workflow_name: String,

    #[arg(long, help = "Directory searched for tool executables before PATH")]
    pub tools_dir: Option<String>,

    #[arg(long, default_value_t = false, help = "Print each command instead of running it")]
    pub dry_run: bool,

    #[arg(long, help = "Write a JSON manifest of every task and its outputs")]
    pub manifest: Option<String>,

    #[arg(long, help = "fastp output directory (host_removal stage input override)")]
    pub trimmed_dir: Option<String>,

    #[arg(long, help = "Prebuilt host bowtie2 index directory")]
    pub host_index_dir: Option<String>,

    #[arg(long, help = "Directory holding <sample>_unaligned.fastq.{1,2}.gz (taxonomy/assembly/binning input)")]
    pub unaligned_dir: Option<String>,

    #[arg(long, help = "MEGAHIT output directory holding <sample>.contigs.fa (binning/functional input)")]
    pub assembly_dir: Option<String>,
}
