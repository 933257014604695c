// src/utils/process.rs: Running external tools

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::config::defs::{PipelineError, RunConfig, TaskSize};

const STDERR_TAIL_LINES: usize = 20;

/// What was run for a task, kept for the run manifest.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub task: String,
    pub tool: String,
    pub args: Vec<String>,
    pub size: TaskSize,
    pub executed: bool,
    pub elapsed_ms: u128,
}

/// Where a tool's standard output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStdout {
    /// Forwarded line by line to the debug log.
    Log,
    /// The tool writes data there (bowtie2 SAM without `-S`); dropped.
    Discard,
}

pub fn format_command(tool: &str, args: &[String]) -> String {
    let mut line = tool.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Runs an external tool to completion inside the run's output directory.
///
/// Large tasks wait for a permit on the run's large-task semaphore. In dry-run
/// mode the command line is printed and nothing is spawned.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `task` - Task name, used in logs and the manifest.
/// * `tool` - Executable name.
/// * `args` - Arguments from `generate_cli`.
/// * `size` - Resource class of the task.
///
/// # Returns
/// ToolRun, or PipelineError::ToolExecution on non-zero exit.
pub async fn run_tool(
    config: &RunConfig,
    task: &str,
    tool: &str,
    args: Vec<String>,
    size: TaskSize,
) -> Result<ToolRun, PipelineError> {
    run_tool_with(config, task, tool, args, size, ToolStdout::Log).await
}

/// run_tool with an explicit policy for the tool's standard output.
pub async fn run_tool_with(
    config: &RunConfig,
    task: &str,
    tool: &str,
    args: Vec<String>,
    size: TaskSize,
    stdout: ToolStdout,
) -> Result<ToolRun, PipelineError> {
    let command_line = format_command(tool, &args);
    let mut run = ToolRun {
        task: task.to_string(),
        tool: tool.to_string(),
        args,
        size,
        executed: false,
        elapsed_ms: 0,
    };

    if config.args.dry_run {
        println!("{}", command_line);
        return Ok(run);
    }

    let _permit = match size {
        TaskSize::Large => {
            debug!("[{}] waiting for large task slot", task);
            Some(
                config
                    .large_task_semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Other(e.into()))?,
            )
        }
        TaskSize::Small => None,
    };

    info!("[{}] Command: {}", task, command_line);
    let start = Instant::now();

    let stdout_stdio = match stdout {
        ToolStdout::Log => Stdio::piped(),
        ToolStdout::Discard => Stdio::null(),
    };
    let mut child = Command::new(config.tool_program(tool))
        .args(&run.args)
        .current_dir(&config.out_dir)
        .stdin(Stdio::null())
        .stdout(stdout_stdio)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => PipelineError::ToolNotFound(tool.to_string()),
            _ => PipelineError::ToolExecution {
                tool: tool.to_string(),
                error: format!("Failed to spawn: {}", e),
            },
        })?;

    let stdout_task = child
        .stdout
        .take()
        .map(|out| tokio::spawn(log_lines(out, tool.to_string())));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(log_lines(err, tool.to_string())));

    let status = child.wait().await.map_err(|e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    })?;

    if let Some(handle) = stdout_task {
        let _ = handle.await;
    }
    let stderr_tail = match stderr_task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    };

    run.elapsed_ms = start.elapsed().as_millis();
    run.executed = true;

    if !status.success() {
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!("{} ({}): {}", status, task, stderr_tail.join(" | ")),
        });
    }

    info!("[{}] finished in {} ms", task, run.elapsed_ms);
    Ok(run)
}

/// Forwards a child's output to the debug log and keeps the last lines.
///
/// Lines are decoded lossily. The pipe is read to the end even when a read
/// fails, so the child never sees a closed pipe.
async fn log_lines<R>(reader: R, tool: String) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r']).to_string();
                debug!("{}: {}", tool, line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                warn!("{}: output unreadable ({}), discarding the rest", tool, e);
                if let Err(e) = tokio::io::copy_buf(&mut reader, &mut tokio::io::sink()).await {
                    warn!("{}: failed to drain output: {}", tool, e);
                }
                break;
            }
        }
    }
    tail.into_iter().collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Arguments;
    use clap::Parser;
    use futures::future::try_join_all;
    use tempfile::TempDir;

    fn test_config(extra: &[&str]) -> (RunConfig, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut argv = vec!["metamage", "--sample-name", "s1"];
        argv.extend_from_slice(extra);
        let args = Arguments::parse_from(argv);
        let config = RunConfig::new(args, dir.path().to_path_buf(), dir.path().to_path_buf(), 4);
        (config, dir)
    }

    #[test]
    fn command_line_formatting() {
        let args = vec!["sort".to_string(), "-o".to_string(), "out.bam".to_string()];
        assert_eq!(format_command("samtools", &args), "samtools sort -o out.bam");
        assert_eq!(format_command("megahit", &[]), "megahit");
    }

    #[tokio::test]
    async fn successful_tool_is_recorded_as_executed() {
        let (config, _dir) = test_config(&[]);
        let run = run_tool(&config, "noop", "true", vec![], TaskSize::Large).await.unwrap();
        assert!(run.executed);
        assert_eq!(run.size, TaskSize::Large);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let (config, _dir) = test_config(&[]);
        let args = vec!["-c".to_string(), "echo index missing >&2; exit 3".to_string()];
        let err = run_tool(&config, "map_to_host", "sh", args, TaskSize::Small).await.unwrap_err();
        match err {
            PipelineError::ToolExecution { tool, error } => {
                assert_eq!(tool, "sh");
                assert!(error.contains("index missing"), "{}", error);
                assert!(error.contains("map_to_host"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_utf8_output_keeps_the_pipe_open() {
        let (config, _dir) = test_config(&[]);
        // A Latin-1 read name followed by enough output to fill the pipe
        let script = "printf 'read\\351name\\n'; head -c 2000000 /dev/zero | tr '\\0' 'A' | fold -w 100";
        let args = vec!["-c".to_string(), script.to_string()];
        let run = run_tool(&config, "map_to_host", "sh", args, TaskSize::Small).await.unwrap();
        assert!(run.executed);
    }

    #[tokio::test]
    async fn non_utf8_stderr_is_kept_in_the_error() {
        let (config, _dir) = test_config(&[]);
        let args = vec!["-c".to_string(), "printf 'bad \\377 read\\n' >&2; exit 4".to_string()];
        let err = run_tool(&config, "fastp", "sh", args, TaskSize::Small).await.unwrap_err();
        match err {
            PipelineError::ToolExecution { error, .. } => assert!(error.contains("bad \u{FFFD} read"), "{}", error),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn discarded_stdout_is_not_read() {
        let (config, _dir) = test_config(&[]);
        let args = vec!["-c".to_string(), "head -c 2000000 /dev/zero | tr '\\0' 'A' | fold -w 100".to_string()];
        let run = run_tool_with(&config, "map_to_host", "sh", args, TaskSize::Small, ToolStdout::Discard)
            .await
            .unwrap();
        assert!(run.executed);
    }

    #[tokio::test]
    async fn large_tasks_respect_the_slot_limit() {
        let (config, dir) = test_config(&["--max-large-tasks", "2"]);
        let script = "echo start >> slots.log; sleep 0.3; echo end >> slots.log";
        let tasks = (0..5).map(|_| {
            let args = vec!["-c".to_string(), script.to_string()];
            run_tool(&config, "megahit", "sh", args, TaskSize::Large)
        });
        try_join_all(tasks).await.unwrap();

        let log = std::fs::read_to_string(dir.path().join("slots.log")).unwrap();
        let mut running = 0;
        let mut peak = 0;
        for line in log.lines() {
            if line == "start" {
                running += 1;
                peak = peak.max(running);
            } else {
                running -= 1;
            }
        }
        assert_eq!(log.lines().count(), 10);
        assert!(peak <= 2, "{} large tasks overlapped", peak);
    }

    #[test]
    fn tools_dir_is_searched_first() {
        let (config, dir) = {
            let dir = tempfile::tempdir().unwrap();
            let bin = dir.path().join("bin");
            std::fs::create_dir(&bin).unwrap();
            let bin_arg = bin.to_string_lossy().to_string();
            let args = Arguments::parse_from(["metamage", "--sample-name", "s1", "--tools-dir", bin_arg.as_str()]);
            let config = RunConfig::new(args, dir.path().to_path_buf(), dir.path().to_path_buf(), 4);
            (config, dir)
        };
        assert_eq!(config.tool_program("sh"), std::path::PathBuf::from("sh"));
        let marker_tool = dir.path().join("bin").join("sh");
        std::fs::write(&marker_tool, "").unwrap();
        assert_eq!(config.tool_program("sh"), marker_tool);
    }

    #[tokio::test]
    async fn missing_binary_is_tool_not_found() {
        let (config, _dir) = test_config(&[]);
        let err = run_tool(&config, "gecco", "metamage-no-such-tool", vec![], TaskSize::Small)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound(t) if t == "metamage-no-such-tool"));
    }

    #[tokio::test]
    async fn dry_run_spawns_nothing() {
        let (config, _dir) = test_config(&["--dry-run"]);
        let run = run_tool(&config, "gecco", "metamage-no-such-tool", vec!["run".to_string()], TaskSize::Small)
            .await
            .unwrap();
        assert!(!run.executed);
        assert_eq!(run.args, vec!["run".to_string()]);
    }

    #[tokio::test]
    async fn runs_inside_output_directory() {
        let (config, dir) = test_config(&[]);
        let args = vec!["-c".to_string(), "touch marker".to_string()];
        run_tool(&config, "touch", "sh", args, TaskSize::Small).await.unwrap();
        assert!(dir.path().join("marker").is_file());
    }
}
