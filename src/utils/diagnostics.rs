//! Dumping of player scripts that defeated extraction or evaluation
//!
//! Each failing script is persisted once per distinct source URL so an
//! operator can inspect what upstream changed. The dedup set itself is owned
//! by the caller and shared with the script-load lock.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

/// Writes problematic player scripts to uniquely named files.
#[derive(Debug, Default)]
pub struct ScriptDump {
    dir: Option<PathBuf>,
}

impl ScriptDump {
    /// Dumps into the system temp directory.
    pub fn new() -> Self {
        Self { dir: None }
    }

    /// Dumps into a specific directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    /// Persists `script` once per distinct `source_url`; repeat failures for
    /// an already-dumped URL only log.
    pub fn write(
        &self,
        dumped_urls: &mut HashSet<String>,
        script: &str,
        source_url: &str,
        reason: &str,
    ) {
        if !dumped_urls.insert(source_url.to_string()) {
            debug!(
                "player script {} already dumped (new issue: {})",
                source_url, reason
            );
            return;
        }

        match self.persist(script) {
            Ok(path) => {
                error!(
                    "problematic player script {} detected (issue: {}), dumped to {}",
                    source_url,
                    reason,
                    path.display()
                );
            }
            Err(e) => {
                error!(
                    "failed to dump problematic player script {} (issue: {}): {}",
                    source_url, reason, e
                );
            }
        }
    }

    fn persist(&self, script: &str) -> std::io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("unsig-player-script-").suffix(".js");

        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(script.as_bytes())?;

        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }
}
