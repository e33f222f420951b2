//! Module discovery and the spawn helper that turns a `Spawn` message
//! into a running process (§4.3, §6).

use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};
use crate::id::Id;

/// One module binary a hub found while scanning its module directory,
/// announced to the session via `ModuleAvailable` (§4.9).
#[derive(Debug, Clone)]
pub struct AvailableModule {
    pub name: String,
    pub path: std::path::PathBuf,
}

/// Scans `dir` for executable module binaries. Real deployments read a
/// package manifest; here every direct child file is treated as a
/// candidate and announced under its file stem.
pub fn scan_module_directory(dir: &std::path::Path) -> Result<Vec<AvailableModule>> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(Error::Io)?;
    for entry in entries {
        let entry = entry.map_err(Error::Io)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        found.push(AvailableModule { name: name.to_string(), path });
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Launches a module process with the CLI contract every module binary
/// expects: `SHMSEGMENT MODULE_ID` (§6).
pub async fn spawn_module(module: &AvailableModule, shm_segment: &str, module_id: Id) -> Result<tokio::process::Child> {
    Command::new(&module.path)
        .arg(shm_segment)
        .arg(module_id.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::Spawn(format!("{}: {}", module.path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanning_an_empty_directory_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let found = scan_module_directory(dir.path()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn each_file_in_the_directory_becomes_an_available_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IsoSurface"), b"").unwrap();
        std::fs::write(dir.path().join("Reader"), b"").unwrap();

        let found = scan_module_directory(dir.path()).unwrap();
        let names: Vec<_> = found.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["IsoSurface", "Reader"]);
    }
}
