//! Build artifact discovery

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::config::ArtifactConfig;

/// List contract names produced by a build under `workspace_root`
///
/// A file counts as an artifact when its name ends in one of the configured
/// suffixes; the suffix is stripped to give the contract name. Names are
/// sorted and de-duplicated. A missing directory yields an empty list.
pub async fn list_artifacts(
    workspace_root: &Path,
    artifacts: &ArtifactConfig,
) -> std::io::Result<Vec<String>> {
    let dir = workspace_root.join(&artifacts.dir);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = BTreeSet::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let contract = artifacts
            .suffixes
            .iter()
            .find_map(|suffix| file_name.strip_suffix(suffix.as_str()))
            .filter(|name| !name.is_empty());
        if let Some(contract) = contract {
            names.insert(contract.to_owned());
        }
    }

    debug!(dir = %dir.display(), count = names.len(), "listed artifacts");
    Ok(names.into_iter().collect())
}
