pub mod args;

use clap::Parser;

pub use args::Arguments;

use crate::config::defs::PipelineError;
use crate::utils::command::megahit::validate_kmers;

pub const MODULES: &[&str] = &["metamage", "host_removal", "taxonomy", "assembly", "binning", "functional"];

pub fn parse() -> Arguments {
    Arguments::parse()
}

/// Checks values clap cannot express on its own.
pub fn validate_arguments(args: &Arguments) -> Result<(), PipelineError> {
    if !MODULES.contains(&args.module.as_str()) {
        return Err(PipelineError::InvalidConfig(format!("Invalid module: {}", args.module)));
    }
    let sample = args.sample_name.trim();
    if sample.is_empty() || sample.contains('/') || sample == "." || sample == ".." {
        return Err(PipelineError::InvalidConfig(format!("Invalid sample name: '{}'", args.sample_name)));
    }
    if args.host_name.trim().is_empty() {
        return Err(PipelineError::InvalidConfig("Host name must not be empty".to_string()));
    }
    if args.threads == 0 {
        return Err(PipelineError::InvalidConfig("--threads must be at least 1".to_string()));
    }
    if matches!(args.module.as_str(), "metamage" | "assembly") {
        validate_kmers(args.k_min, args.k_max, args.k_step)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::{FargeneModel, ProdigalOutput, TaxonRank};

    #[test]
    fn defaults_match_workflow_parameters() {
        let args = Arguments::parse_from(["metamage"]);
        assert_eq!(args.module, "metamage");
        assert_eq!(args.sample_name, "metamage_sample");
        assert_eq!(args.host_name, "host");
        assert_eq!(args.taxon_rank, TaxonRank::Species);
        assert_eq!((args.min_count, args.k_min, args.k_max, args.k_step, args.min_contig_len), (2, 21, 141, 12, 200));
        assert_eq!(args.prodigal_output_format, ProdigalOutput::Gbk);
        assert_eq!(args.fargene_hmm_model, FargeneModel::ClassA);
        assert_eq!(args.storage_scheme, "latch");
        assert!(validate_arguments(&args).is_ok());
    }

    #[test]
    fn enum_values_parse_from_tool_names() {
        let args = Arguments::parse_from([
            "metamage",
            "--taxon-rank", "class",
            "--prodigal-output-format", "sco",
            "--fargene-hmm-model", "aminoglycoside_model_i",
        ]);
        assert_eq!(args.taxon_rank, TaxonRank::Class);
        assert_eq!(args.prodigal_output_format, ProdigalOutput::Sco);
        assert_eq!(args.fargene_hmm_model.as_str(), "aminoglycoside_model_i");
        assert!(Arguments::try_parse_from(["metamage", "--fargene-hmm-model", "class-a"]).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        let bad_module = Arguments::parse_from(["metamage", "--module", "consensus"]);
        assert!(validate_arguments(&bad_module).is_err());

        let bad_k = Arguments::parse_from(["metamage", "--k-min", "20"]);
        assert!(validate_arguments(&bad_k).is_err());

        // k-mer settings only matter where MEGAHIT runs
        let functional = Arguments::parse_from(["metamage", "--module", "functional", "--k-step", "13"]);
        assert!(validate_arguments(&functional).is_ok());

        for sample in ["a/b", ".", "..", " "] {
            let bad_sample = Arguments::parse_from(["metamage", "--sample-name", sample]);
            assert!(validate_arguments(&bad_sample).is_err(), "{:?} accepted", sample);
        }
        let dotted = Arguments::parse_from(["metamage", "--sample-name", "crohn.v2"]);
        assert!(validate_arguments(&dotted).is_ok());
    }
}
