/// Functions and structs for working with creating command-line arguments

use std::any::Any;
use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Result};
use log::info;
use tokio::process::Command;

use crate::config::defs::{
    PipelineError, RunConfig, TOOL_VERSION_FLAGS, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, FARGENE_TAG, FASTP_TAG,
    GECCO_TAG, JGI_DEPTHS_TAG, KAIJU2KRONA_TAG, KAIJU2TABLE_TAG, KAIJU_TAG, KTIMPORTTEXT_TAG, MACREL_TAG,
    MEGAHIT_TAG, METABAT2_TAG, METAQUAST_TAG, PRODIGAL_TAG, SAMTOOLS_TAG,
};


pub mod fastp {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, FASTP_THREADS};

    #[derive(Debug, Clone)]
    pub struct FastpConfig {
        pub read1: PathBuf,
        pub read2: PathBuf,
        /// `<dir>/<sample>`; outputs are named from it.
        pub output_prefix: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, fastp_config: &FastpConfig) -> Vec<String> {
        let prefix = fastp_config.output_prefix.to_string_lossy();
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--in1".to_string());
        args_vec.push(fastp_config.read1.to_string_lossy().to_string());
        args_vec.push("--in2".to_string());
        args_vec.push(fastp_config.read2.to_string_lossy().to_string());
        args_vec.push("--out1".to_string());
        args_vec.push(format!("{}_1.trim.fastq.gz", prefix));
        args_vec.push("--out2".to_string());
        args_vec.push(format!("{}_2.trim.fastq.gz", prefix));
        args_vec.push("--json".to_string());
        args_vec.push(format!("{}.fastp.json", prefix));
        args_vec.push("--html".to_string());
        args_vec.push(format!("{}.fastp.html", prefix));
        args_vec.push("--thread".to_string());
        args_vec.push(config.threads_for(FASTP_THREADS).to_string());
        args_vec.push("--detect_adapter_for_pe".to_string());
        args_vec
    }
}

pub mod bowtie2 {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, BOWTIE2_THREADS};

    #[derive(Debug, Clone)]
    pub struct Bowtie2BuildConfig {
        pub reference: PathBuf,
        pub index_prefix: PathBuf,
    }

    #[derive(Debug, Clone)]
    pub enum Bowtie2Output {
        /// `--un-conc-gz`: pairs that failed to align concordantly, gzipped.
        UnalignedConcordant(PathBuf),
        /// `-S`: SAM alignments.
        Sam(PathBuf),
    }

    #[derive(Debug, Clone)]
    pub struct Bowtie2Config {
        pub index_prefix: PathBuf,
        pub read1: PathBuf,
        pub read2: PathBuf,
        pub output: Bowtie2Output,
    }

    pub fn build_arg_generator(config: &RunConfig, build_config: &Bowtie2BuildConfig) -> Vec<String> {
        vec![
            build_config.reference.to_string_lossy().to_string(),
            build_config.index_prefix.to_string_lossy().to_string(),
            "--threads".to_string(),
            config.threads_for(BOWTIE2_THREADS).to_string(),
        ]
    }

    pub fn arg_generator(config: &RunConfig, bt2_config: &Bowtie2Config) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-x".to_string());
        args_vec.push(bt2_config.index_prefix.to_string_lossy().to_string());
        args_vec.push("-1".to_string());
        args_vec.push(bt2_config.read1.to_string_lossy().to_string());
        args_vec.push("-2".to_string());
        args_vec.push(bt2_config.read2.to_string_lossy().to_string());

        let threads = config.threads_for(BOWTIE2_THREADS).to_string();
        match &bt2_config.output {
            Bowtie2Output::UnalignedConcordant(path) => {
                args_vec.push("--un-conc-gz".to_string());
                args_vec.push(path.to_string_lossy().to_string());
                args_vec.push("--threads".to_string());
                args_vec.push(threads);
            }
            Bowtie2Output::Sam(path) => {
                args_vec.push("--threads".to_string());
                args_vec.push(threads);
                args_vec.push("-S".to_string());
                args_vec.push(path.to_string_lossy().to_string());
            }
        }
        args_vec
    }
}

pub mod samtools {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, SamtoolsSubcommand, SAMTOOLS_THREADS};

    #[derive(Debug, Clone)]
    pub struct SamtoolsConfig {
        pub subcommand: SamtoolsSubcommand,
        pub input: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, samtools_config: &SamtoolsConfig) -> Vec<String> {
        let threads = config.threads_for(SAMTOOLS_THREADS).to_string();
        let input = samtools_config.input.to_string_lossy().to_string();
        let output = samtools_config.output.to_string_lossy().to_string();
        let mut args_vec: Vec<String> = vec![samtools_config.subcommand.as_str().to_string()];
        match samtools_config.subcommand {
            SamtoolsSubcommand::View => {
                args_vec.extend(["-@".to_string(), threads, "-bS".to_string(), input]);
            }
            SamtoolsSubcommand::Sort => {
                args_vec.extend([input, "-@".to_string(), threads]);
            }
        }
        args_vec.push("-o".to_string());
        args_vec.push(output);
        args_vec
    }
}

pub mod kaiju {
    use std::path::PathBuf;
    use crate::config::defs::{TaxonRank, KAIJU_INPUT_MODE};

    #[derive(Debug, Clone)]
    pub struct KaijuConfig {
        pub nodes: PathBuf,
        pub db: PathBuf,
        pub read1: PathBuf,
        pub read2: PathBuf,
        pub output: PathBuf,
    }

    #[derive(Debug, Clone)]
    pub struct Kaiju2TableConfig {
        pub nodes: PathBuf,
        pub names: PathBuf,
        pub rank: TaxonRank,
        pub kaiju_out: PathBuf,
        pub output: PathBuf,
    }

    #[derive(Debug, Clone)]
    pub struct Kaiju2KronaConfig {
        pub nodes: PathBuf,
        pub names: PathBuf,
        pub kaiju_out: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(kaiju_config: &KaijuConfig) -> Vec<String> {
        vec![
            "-t".to_string(),
            kaiju_config.nodes.to_string_lossy().to_string(),
            "-f".to_string(),
            kaiju_config.db.to_string_lossy().to_string(),
            "-i".to_string(),
            kaiju_config.read1.to_string_lossy().to_string(),
            "-j".to_string(),
            kaiju_config.read2.to_string_lossy().to_string(),
            "-z".to_string(),
            KAIJU_INPUT_MODE.to_string(),
            "-o".to_string(),
            kaiju_config.output.to_string_lossy().to_string(),
        ]
    }

    pub fn table_arg_generator(table_config: &Kaiju2TableConfig) -> Vec<String> {
        vec![
            "-t".to_string(),
            table_config.nodes.to_string_lossy().to_string(),
            "-n".to_string(),
            table_config.names.to_string_lossy().to_string(),
            "-r".to_string(),
            table_config.rank.as_str().to_string(),
            "-p".to_string(),
            "-e".to_string(),
            "-o".to_string(),
            table_config.output.to_string_lossy().to_string(),
            table_config.kaiju_out.to_string_lossy().to_string(),
        ]
    }

    pub fn krona_arg_generator(krona_config: &Kaiju2KronaConfig) -> Vec<String> {
        vec![
            "-t".to_string(),
            krona_config.nodes.to_string_lossy().to_string(),
            "-n".to_string(),
            krona_config.names.to_string_lossy().to_string(),
            "-i".to_string(),
            krona_config.kaiju_out.to_string_lossy().to_string(),
            "-o".to_string(),
            krona_config.output.to_string_lossy().to_string(),
        ]
    }
}

pub mod krona {
    use std::path::PathBuf;

    #[derive(Debug, Clone)]
    pub struct KronaConfig {
        pub input: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(krona_config: &KronaConfig) -> Vec<String> {
        vec![
            "-o".to_string(),
            krona_config.output.to_string_lossy().to_string(),
            krona_config.input.to_string_lossy().to_string(),
        ]
    }
}

pub mod megahit {
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use crate::config::defs::{MAX_KMER, MAX_K_STEP};

    #[derive(Debug, Clone)]
    pub struct MegahitConfig {
        pub read1: PathBuf,
        pub read2: PathBuf,
        pub out_dir: PathBuf,
        pub out_prefix: String,
        pub min_count: u32,
        pub k_min: u32,
        pub k_max: u32,
        pub k_step: u32,
        pub min_contig_len: u32,
    }

    /// k-mer sizes must be odd and <= 255, the step even and <= 28.
    pub fn validate_kmers(k_min: u32, k_max: u32, k_step: u32) -> Result<()> {
        for (name, k) in [("k_min", k_min), ("k_max", k_max)] {
            if k % 2 == 0 || k > MAX_KMER {
                return Err(anyhow!("{} must be odd and <={}, got {}", name, MAX_KMER, k));
            }
        }
        if k_min > k_max {
            return Err(anyhow!("k_min ({}) must not exceed k_max ({})", k_min, k_max));
        }
        if k_step % 2 != 0 || k_step > MAX_K_STEP {
            return Err(anyhow!("k_step must be even and <={}, got {}", MAX_K_STEP, k_step));
        }
        Ok(())
    }

    pub fn arg_generator(megahit_config: &MegahitConfig) -> Result<Vec<String>> {
        validate_kmers(megahit_config.k_min, megahit_config.k_max, megahit_config.k_step)?;
        Ok(vec![
            "--min-count".to_string(),
            megahit_config.min_count.to_string(),
            "--k-min".to_string(),
            megahit_config.k_min.to_string(),
            "--k-max".to_string(),
            megahit_config.k_max.to_string(),
            "--k-step".to_string(),
            megahit_config.k_step.to_string(),
            "--out-dir".to_string(),
            megahit_config.out_dir.to_string_lossy().to_string(),
            "--out-prefix".to_string(),
            megahit_config.out_prefix.clone(),
            "--min-contig-len".to_string(),
            megahit_config.min_contig_len.to_string(),
            "-1".to_string(),
            megahit_config.read1.to_string_lossy().to_string(),
            "-2".to_string(),
            megahit_config.read2.to_string_lossy().to_string(),
        ])
    }
}

pub mod metaquast {
    use std::path::PathBuf;
    use crate::config::defs::METAQUAST_MAX_REF_NUMBER;

    #[derive(Debug, Clone)]
    pub struct MetaquastConfig {
        pub contigs: PathBuf,
        pub label: String,
        pub out_dir: PathBuf,
    }

    pub fn arg_generator(metaquast_config: &MetaquastConfig) -> Vec<String> {
        vec![
            "--rna-finding".to_string(),
            "--no-sv".to_string(),
            "--max-ref-number".to_string(),
            METAQUAST_MAX_REF_NUMBER.to_string(),
            "-l".to_string(),
            metaquast_config.label.clone(),
            "-o".to_string(),
            metaquast_config.out_dir.to_string_lossy().to_string(),
            metaquast_config.contigs.to_string_lossy().to_string(),
        ]
    }
}

pub mod metabat2 {
    use std::path::PathBuf;

    #[derive(Debug, Clone)]
    pub struct DepthsConfig {
        pub bam: PathBuf,
        pub output: PathBuf,
    }

    #[derive(Debug, Clone)]
    pub struct Metabat2Config {
        pub contigs: PathBuf,
        pub depths: PathBuf,
        /// Bins are written as `<prefix>.<n>.fa`.
        pub output_prefix: PathBuf,
    }

    pub fn depths_arg_generator(depths_config: &DepthsConfig) -> Vec<String> {
        vec![
            "--outputDepth".to_string(),
            depths_config.output.to_string_lossy().to_string(),
            depths_config.bam.to_string_lossy().to_string(),
        ]
    }

    pub fn arg_generator(metabat_config: &Metabat2Config) -> Vec<String> {
        vec![
            "--saveCls".to_string(),
            "-i".to_string(),
            metabat_config.contigs.to_string_lossy().to_string(),
            "-a".to_string(),
            metabat_config.depths.to_string_lossy().to_string(),
            "-o".to_string(),
            metabat_config.output_prefix.to_string_lossy().to_string(),
        ]
    }
}

pub mod prodigal {
    use std::path::PathBuf;
    use crate::config::defs::ProdigalOutput;

    #[derive(Debug, Clone)]
    pub struct ProdigalConfig {
        pub contigs: PathBuf,
        pub format: ProdigalOutput,
        pub output_dir: PathBuf,
        pub sample: String,
    }

    pub fn arg_generator(prodigal_config: &ProdigalConfig) -> Vec<String> {
        let out = |ext: &str| {
            prodigal_config
                .output_dir
                .join(format!("{}.{}", prodigal_config.sample, ext))
                .to_string_lossy()
                .to_string()
        };
        vec![
            "-i".to_string(),
            prodigal_config.contigs.to_string_lossy().to_string(),
            "-f".to_string(),
            prodigal_config.format.as_str().to_string(),
            "-o".to_string(),
            out(prodigal_config.format.as_str()),
            "-a".to_string(),
            out("faa"),
            "-d".to_string(),
            out("fna"),
            "-s".to_string(),
            out("cds"),
        ]
    }
}

pub mod macrel {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, MACREL_THREADS};

    #[derive(Debug, Clone)]
    pub struct MacrelConfig {
        pub contigs: PathBuf,
        pub output_dir: PathBuf,
        pub tag: String,
    }

    pub fn arg_generator(config: &RunConfig, macrel_config: &MacrelConfig) -> Vec<String> {
        vec![
            "contigs".to_string(),
            "--fasta".to_string(),
            macrel_config.contigs.to_string_lossy().to_string(),
            "--output".to_string(),
            macrel_config.output_dir.to_string_lossy().to_string(),
            "--tag".to_string(),
            macrel_config.tag.clone(),
            "--log-file".to_string(),
            macrel_config
                .output_dir
                .join(format!("{}_log.txt", macrel_config.tag))
                .to_string_lossy()
                .to_string(),
            "--threads".to_string(),
            config.threads_for(MACREL_THREADS).to_string(),
        ]
    }
}

pub mod fargene {
    use std::path::PathBuf;
    use crate::config::defs::{FargeneModel, RunConfig, FARGENE_THREADS};

    #[derive(Debug, Clone)]
    pub struct FargeneConfig {
        pub contigs: PathBuf,
        pub model: FargeneModel,
        pub output_dir: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, fargene_config: &FargeneConfig) -> Vec<String> {
        vec![
            "-i".to_string(),
            fargene_config.contigs.to_string_lossy().to_string(),
            "--hmm-model".to_string(),
            fargene_config.model.as_str().to_string(),
            "-o".to_string(),
            fargene_config.output_dir.to_string_lossy().to_string(),
            "-p".to_string(),
            config.threads_for(FARGENE_THREADS).to_string(),
        ]
    }
}

pub mod gecco {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, GECCO_THREADS};

    #[derive(Debug, Clone)]
    pub struct GeccoConfig {
        pub contigs: PathBuf,
        pub output_dir: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, gecco_config: &GeccoConfig) -> Vec<String> {
        vec![
            "run".to_string(),
            "-g".to_string(),
            gecco_config.contigs.to_string_lossy().to_string(),
            "-o".to_string(),
            gecco_config.output_dir.to_string_lossy().to_string(),
            "-j".to_string(),
            config.threads_for(GECCO_THREADS).to_string(),
            "--force-tsv".to_string(),
        ]
    }
}

fn tool_config<'a, T: 'static>(tool: &str, tool_config: Option<&'a dyn Any>) -> Result<&'a T> {
    tool_config
        .and_then(|c| c.downcast_ref::<T>())
        .ok_or_else(|| anyhow!("{} requires a {}", tool, std::any::type_name::<T>()))
}

/// Builds the argument list for `tool` from its config struct.
///
/// # Arguments
///
/// * `tool` - Tool tag from config::defs.
/// * `config` - RunConfig struct from main.
/// * `tool_config` - The tool's config struct, e.g. `Some(&FastpConfig { .. })`.
///
/// # Returns
/// Vec of arguments, not including the executable.
pub fn generate_cli(tool: &str, config: &RunConfig, tool_config_view: Option<&dyn Any>) -> Result<Vec<String>> {
    let cmd = match tool {
        FASTP_TAG => fastp::arg_generator(config, tool_config(tool, tool_config_view)?),
        BOWTIE2_BUILD_TAG => bowtie2::build_arg_generator(config, tool_config(tool, tool_config_view)?),
        BOWTIE2_TAG => bowtie2::arg_generator(config, tool_config(tool, tool_config_view)?),
        SAMTOOLS_TAG => samtools::arg_generator(config, tool_config(tool, tool_config_view)?),
        KAIJU_TAG => kaiju::arg_generator(tool_config(tool, tool_config_view)?),
        KAIJU2TABLE_TAG => kaiju::table_arg_generator(tool_config(tool, tool_config_view)?),
        KAIJU2KRONA_TAG => kaiju::krona_arg_generator(tool_config(tool, tool_config_view)?),
        KTIMPORTTEXT_TAG => krona::arg_generator(tool_config(tool, tool_config_view)?),
        MEGAHIT_TAG => megahit::arg_generator(tool_config(tool, tool_config_view)?)?,
        METAQUAST_TAG => metaquast::arg_generator(tool_config(tool, tool_config_view)?),
        JGI_DEPTHS_TAG => metabat2::depths_arg_generator(tool_config(tool, tool_config_view)?),
        METABAT2_TAG => metabat2::arg_generator(tool_config(tool, tool_config_view)?),
        PRODIGAL_TAG => prodigal::arg_generator(tool_config(tool, tool_config_view)?),
        MACREL_TAG => macrel::arg_generator(config, tool_config(tool, tool_config_view)?),
        FARGENE_TAG => fargene::arg_generator(config, tool_config(tool, tool_config_view)?),
        GECCO_TAG => gecco::arg_generator(config, tool_config(tool, tool_config_view)?),
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };

    Ok(cmd)
}

/// Probes a tool with its version flag and returns the first line it prints.
pub async fn check_version(tool: &str, program: &Path) -> Result<String, PipelineError> {
    let flag = TOOL_VERSION_FLAGS.get(tool).copied();
    let mut command = Command::new(program);
    if let Some(flag) = flag {
        command.arg(flag);
    }
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::ToolNotFound(tool.to_string()),
            _ => PipelineError::ToolExecution { tool: tool.to_string(), error: e.to_string() },
        })?;

    // Several of these tools print their version or usage on stderr.
    let first_line = [&output.stdout, &output.stderr]
        .iter()
        .flat_map(|bytes| String::from_utf8_lossy(bytes).lines().map(str::to_string).collect::<Vec<_>>())
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    Ok(first_line.trim().to_string())
}

/// Fails fast if any tool a module needs is missing. Skipped for dry runs.
pub async fn check_versions(config: &RunConfig, tools: &[&str]) -> Result<(), PipelineError> {
    if config.args.dry_run {
        return Ok(());
    }
    for tool in tools {
        let version = check_version(tool, &config.tool_program(tool)).await?;
        info!("{}: {}", tool, version);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use clap::Parser;
    use crate::cli::Arguments;
    use crate::config::defs::{FargeneModel, ProdigalOutput, SamtoolsSubcommand, TaxonRank};

    fn config_with_threads(max_threads: usize) -> RunConfig {
        let args = Arguments::parse_from(["metamage", "--sample-name", "s1"]);
        RunConfig::new(args, PathBuf::from("/work"), PathBuf::from("/work/out"), max_threads)
    }

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fastp_paired_trimming() -> Result<()> {
        let config = config_with_threads(64);
        let fastp_config = fastp::FastpConfig {
            read1: PathBuf::from("/in/r1.fq"),
            read2: PathBuf::from("/in/r2.fq"),
            output_prefix: PathBuf::from("/work/out/fastp_results/s1"),
        };
        let args = generate_cli(FASTP_TAG, &config, Some(&fastp_config))?;
        assert_eq!(args, strs(&[
            "--in1", "/in/r1.fq", "--in2", "/in/r2.fq",
            "--out1", "/work/out/fastp_results/s1_1.trim.fastq.gz",
            "--out2", "/work/out/fastp_results/s1_2.trim.fastq.gz",
            "--json", "/work/out/fastp_results/s1.fastp.json",
            "--html", "/work/out/fastp_results/s1.fastp.html",
            "--thread", "4", "--detect_adapter_for_pe",
        ]));
        Ok(())
    }

    #[test]
    fn bowtie2_output_modes_order_threads_differently() -> Result<()> {
        let config = config_with_threads(64);
        let unaligned = bowtie2::Bowtie2Config {
            index_prefix: PathBuf::from("idx/human"),
            read1: PathBuf::from("a_1.fq.gz"),
            read2: PathBuf::from("a_2.fq.gz"),
            output: bowtie2::Bowtie2Output::UnalignedConcordant(PathBuf::from("un/s1_unaligned.fastq.gz")),
        };
        assert_eq!(generate_cli(BOWTIE2_TAG, &config, Some(&unaligned))?, strs(&[
            "-x", "idx/human", "-1", "a_1.fq.gz", "-2", "a_2.fq.gz",
            "--un-conc-gz", "un/s1_unaligned.fastq.gz", "--threads", "31",
        ]));

        let sam = bowtie2::Bowtie2Config { output: bowtie2::Bowtie2Output::Sam(PathBuf::from("s1_assembly_mapped.sam")), ..unaligned };
        let args = generate_cli(BOWTIE2_TAG, &config, Some(&sam))?;
        assert_eq!(&args[6..], &strs(&["--threads", "31", "-S", "s1_assembly_mapped.sam"])[..]);
        Ok(())
    }

    #[test]
    fn thread_counts_respect_budget() -> Result<()> {
        let config = config_with_threads(2);
        let build = bowtie2::Bowtie2BuildConfig {
            reference: PathBuf::from("genome.fa.gz"),
            index_prefix: PathBuf::from("s1_btidx/host"),
        };
        assert_eq!(generate_cli(BOWTIE2_BUILD_TAG, &config, Some(&build))?, strs(&["genome.fa.gz", "s1_btidx/host", "--threads", "2"]));
        Ok(())
    }

    #[test]
    fn samtools_view_and_sort() -> Result<()> {
        let config = config_with_threads(64);
        let view = samtools::SamtoolsConfig {
            subcommand: SamtoolsSubcommand::View,
            input: PathBuf::from("s1_assembly_mapped.sam"),
            output: PathBuf::from("s1_assembly_unsorted.bam"),
        };
        assert_eq!(generate_cli(SAMTOOLS_TAG, &config, Some(&view))?, strs(&[
            "view", "-@", "4", "-bS", "s1_assembly_mapped.sam", "-o", "s1_assembly_unsorted.bam",
        ]));
        let sort = samtools::SamtoolsConfig {
            subcommand: SamtoolsSubcommand::Sort,
            input: PathBuf::from("s1_assembly_unsorted.bam"),
            output: PathBuf::from("s1_assembly_sorted.bam"),
        };
        assert_eq!(generate_cli(SAMTOOLS_TAG, &config, Some(&sort))?, strs(&[
            "sort", "s1_assembly_unsorted.bam", "-@", "4", "-o", "s1_assembly_sorted.bam",
        ]));
        Ok(())
    }

    #[test]
    fn kaiju2table_rank_and_trailing_input() -> Result<()> {
        let config = config_with_threads(8);
        let table = kaiju::Kaiju2TableConfig {
            nodes: PathBuf::from("nodes.dmp"),
            names: PathBuf::from("names.dmp"),
            rank: TaxonRank::Class,
            kaiju_out: PathBuf::from("s1_kaiju.out"),
            output: PathBuf::from("s1_kaiju.tsv"),
        };
        assert_eq!(generate_cli(KAIJU2TABLE_TAG, &config, Some(&table))?, strs(&[
            "-t", "nodes.dmp", "-n", "names.dmp", "-r", "class", "-p", "-e", "-o", "s1_kaiju.tsv", "s1_kaiju.out",
        ]));
        Ok(())
    }

    #[test]
    fn megahit_rejects_even_kmers() {
        let config = config_with_threads(8);
        let mut megahit_config = megahit::MegahitConfig {
            read1: PathBuf::from("u.1.gz"),
            read2: PathBuf::from("u.2.gz"),
            out_dir: PathBuf::from("MEGAHIT"),
            out_prefix: "s1".to_string(),
            min_count: 2,
            k_min: 21,
            k_max: 141,
            k_step: 12,
            min_contig_len: 200,
        };
        let args = generate_cli(MEGAHIT_TAG, &config, Some(&megahit_config)).unwrap();
        assert_eq!(&args[..4], &strs(&["--min-count", "2", "--k-min", "21"])[..]);
        assert_eq!(args.len(), 18);

        megahit_config.k_max = 140;
        assert!(generate_cli(MEGAHIT_TAG, &config, Some(&megahit_config)).is_err());
        assert!(megahit::validate_kmers(21, 141, 30).is_err());
        assert!(megahit::validate_kmers(141, 21, 12).is_err());
        assert!(megahit::validate_kmers(21, 257, 12).is_err());
        assert!(megahit::validate_kmers(21, 255, 28).is_ok());
    }

    #[test]
    fn prodigal_names_outputs_by_sample() -> Result<()> {
        let config = config_with_threads(8);
        let prodigal_config = prodigal::ProdigalConfig {
            contigs: PathBuf::from("MEGAHIT/s1.contigs.fa"),
            format: ProdigalOutput::Gff,
            output_dir: PathBuf::from("prodigal_results"),
            sample: "s1".to_string(),
        };
        assert_eq!(generate_cli(PRODIGAL_TAG, &config, Some(&prodigal_config))?, strs(&[
            "-i", "MEGAHIT/s1.contigs.fa", "-f", "gff",
            "-o", "prodigal_results/s1.gff", "-a", "prodigal_results/s1.faa",
            "-d", "prodigal_results/s1.fna", "-s", "prodigal_results/s1.cds",
        ]));
        Ok(())
    }

    #[test]
    fn fargene_model_name_is_verbatim() -> Result<()> {
        let config = config_with_threads(64);
        let fargene_config = fargene::FargeneConfig {
            contigs: PathBuf::from("c.fa"),
            model: FargeneModel::ClassB12,
            output_dir: PathBuf::from("fargene_results"),
        };
        assert_eq!(generate_cli(FARGENE_TAG, &config, Some(&fargene_config))?, strs(&[
            "-i", "c.fa", "--hmm-model", "class_b_1_2", "-o", "fargene_results", "-p", "8",
        ]));
        Ok(())
    }

    #[test]
    fn wrong_or_missing_config_is_an_error() {
        let config = config_with_threads(8);
        let gecco_config = gecco::GeccoConfig { contigs: PathBuf::from("c.fa"), output_dir: PathBuf::from("g") };
        assert!(generate_cli(FASTP_TAG, &config, Some(&gecco_config)).is_err());
        assert!(generate_cli(GECCO_TAG, &config, None).is_err());
        assert!(generate_cli("blastn", &config, Some(&gecco_config)).is_err());
    }

    #[tokio::test]
    async fn missing_tool_fails_version_check() {
        let err = check_version("metamage-no-such-tool", Path::new("metamage-no-such-tool")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound(_)));
    }
}
