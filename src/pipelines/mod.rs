pub mod assembly;
pub mod binning;
pub mod functional;
pub mod host_removal;
pub mod metamage;
pub mod taxonomy;

use std::any::Any;
use std::path::Path;

use crate::config::defs::{PipelineError, RunConfig};
use crate::utils::command::generate_cli;
use crate::utils::storage::{HandleKind, OutputHandle};

/// generate_cli with the error mapped to the failing tool.
pub(crate) fn tool_args(tool: &str, config: &RunConfig, tool_config: &dyn Any) -> Result<Vec<String>, PipelineError> {
    generate_cli(tool, config, Some(tool_config)).map_err(|e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    })
}

/// Publishes a task output under the run's sample in the storage namespace.
pub(crate) async fn publish(
    config: &RunConfig,
    local: &Path,
    kind: HandleKind,
    rel: &str,
) -> Result<OutputHandle, PipelineError> {
    config
        .storage
        .publish(local, kind, config.sample(), rel, config.args.dry_run)
        .await
}
