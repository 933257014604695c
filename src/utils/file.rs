use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::defs::{PipelineError, RunConfig};

/// Builds an output path from a base name.
///
/// # Arguments
///
/// * `path` - Base path; only its file name is kept when `prefix`/`suffix` are given.
/// * `dir` - Directory to resolve against when `path` is relative.
/// * `prefix` - Optional text placed before the file name.
/// * `suffix` - Optional text placed after the file name.
/// * `delimiter` - Joins prefix, file name and suffix.
///
/// # Returns
/// PathBuf
pub fn file_path_manipulator(
    path: &PathBuf,
    dir: Option<&PathBuf>,
    prefix: Option<&str>,
    suffix: Option<&str>,
    delimiter: &str,
) -> PathBuf {
    let base = match dir {
        Some(d) if path.is_relative() => d.join(path),
        _ => path.clone(),
    };

    if prefix.is_none() && suffix.is_none() {
        return base;
    }

    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut parts: Vec<&str> = Vec::new();
    if let Some(p) = prefix {
        parts.push(p);
    }
    if !name.is_empty() {
        parts.push(&name);
    }
    if let Some(s) = suffix {
        parts.push(s);
    }
    let new_name = parts.join(delimiter);

    match base.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}

/// Resolves a required input path and checks it exists.
pub fn require_input(label: &str, value: Option<&String>, cwd: &PathBuf) -> Result<PathBuf, PipelineError> {
    let raw = value.ok_or_else(|| PipelineError::MissingInput(format!("--{} is required", label.replace('_', "-"))))?;
    let path = file_path_manipulator(&PathBuf::from(raw), Some(cwd), None, None, "");
    if !path.exists() {
        return Err(PipelineError::MissingInput(format!("{} not found: {}", label, path.display())));
    }
    Ok(path)
}

/// True when the file starts with the gzip magic bytes.
pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// require_input for FASTQ reads; a `.gz` name must hold gzip data.
pub fn require_reads(label: &str, value: Option<&String>, cwd: &PathBuf) -> Result<PathBuf, PipelineError> {
    let path = require_input(label, value, cwd)?;
    let named_gz = path.extension().is_some_and(|ext| ext == "gz");
    if named_gz {
        let gzipped = is_gzipped(&path).map_err(|e| PipelineError::IOError(format!("{}: {}", path.display(), e)))?;
        if !gzipped {
            return Err(PipelineError::InvalidConfig(format!(
                "{} {} ends in .gz but is not gzip-compressed",
                label,
                path.display()
            )));
        }
    }
    Ok(path)
}

/// Creates an output directory unless this is a dry run.
pub fn prepare_output_dir(config: &RunConfig, dir: &Path) -> Result<(), PipelineError> {
    if config.args.dry_run {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| PipelineError::IOError(format!("{}: {}", dir.display(), e)))
}

/// Host names become index prefixes: spaces to underscores, lower case.
pub fn clean_host_name(host_name: &str) -> String {
    host_name.replace(' ', "_").to_lowercase()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manipulator_suffix_and_prefix() {
        let out = PathBuf::from("/data/out");
        assert_eq!(
            file_path_manipulator(&PathBuf::from("crohn"), Some(&out), None, Some("kaiju.tsv"), "_"),
            PathBuf::from("/data/out/crohn_kaiju.tsv")
        );
        assert_eq!(
            file_path_manipulator(&PathBuf::from("crohn"), Some(&out), None, Some("contigs.fa"), "."),
            PathBuf::from("/data/out/crohn.contigs.fa")
        );
        assert_eq!(
            file_path_manipulator(&PathBuf::from("/abs/crohn"), Some(&out), Some("x"), None, "-"),
            PathBuf::from("/abs/x-crohn")
        );
        assert_eq!(
            file_path_manipulator(&PathBuf::from("reads.fq"), Some(&out), None, None, ""),
            PathBuf::from("/data/out/reads.fq")
        );
    }

    #[test]
    fn host_name_cleaning() {
        assert_eq!(clean_host_name("Homo Sapiens"), "homo_sapiens");
        assert_eq!(clean_host_name("host"), "host");
    }

    #[test]
    fn require_input_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_path_buf();
        assert!(matches!(require_input("host_genome", None, &cwd), Err(PipelineError::MissingInput(_))));
        let absent = "absent.fa".to_string();
        assert!(matches!(require_input("host_genome", Some(&absent), &cwd), Err(PipelineError::MissingInput(_))));
        std::fs::write(cwd.join("present.fa"), ">c\nACGT\n").unwrap();
        let present = "present.fa".to_string();
        assert_eq!(require_input("host_genome", Some(&present), &cwd).unwrap(), cwd.join("present.fa"));
    }

    #[test]
    fn gzip_detection_from_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_path_buf();
        std::fs::write(cwd.join("reads_1.fastq.gz"), [0x1F, 0x8B, 0x08, 0x00]).unwrap();
        std::fs::write(cwd.join("reads_2.fastq.gz"), "@r1\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(cwd.join("reads.fastq"), "@r1\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(cwd.join("empty.fastq.gz"), "").unwrap();

        assert!(is_gzipped(&cwd.join("reads_1.fastq.gz")).unwrap());
        assert!(!is_gzipped(&cwd.join("empty.fastq.gz")).unwrap());

        let ok = "reads_1.fastq.gz".to_string();
        assert_eq!(require_reads("read1", Some(&ok), &cwd).unwrap(), cwd.join("reads_1.fastq.gz"));
        let plain = "reads.fastq".to_string();
        assert!(require_reads("read1", Some(&plain), &cwd).is_ok());
        let mislabelled = "reads_2.fastq.gz".to_string();
        assert!(matches!(require_reads("read2", Some(&mislabelled), &cwd), Err(PipelineError::InvalidConfig(_))));
    }
}
