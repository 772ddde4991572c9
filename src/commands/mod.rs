pub mod import;
pub mod scan;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;
use wpmigrate::{config::Config, wxr::discover_exports};

/// The export to work on: `--file` if given, else the single candidate in
/// `source.dir`.
pub fn resolve_export(config: &Config, file: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = file {
        if !path.is_file() {
            anyhow::bail!("Export file not found: {}", path.display());
        }
        return Ok(path);
    }

    let dir = &config.source.dir;
    let mut candidates = discover_exports(dir)
        .with_context(|| format!("Failed to list exports in {}", dir.display()))?;

    match candidates.len() {
        0 => anyhow::bail!(
            "No WordPress export (*.xml or *.xml.bz2) found in {}",
            dir.display()
        ),
        1 => Ok(candidates.remove(0)),
        _ => {
            let names: Vec<String> = candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            anyhow::bail!(
                "Several exports found in {}; choose one with --file:\n  {}",
                dir.display(),
                names.join("\n  ")
            )
        }
    }
}
