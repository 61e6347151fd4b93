use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::debug;

use crate::Result;
use crate::error::CloudError;
use crate::traits::{IsoImage, IsoImageBuilder};

const ISO_TOOLS: [&str; 2] = ["genisoimage", "mkisofs"];
const ENV_FILE: &str = "env";
const ISO_FILE: &str = "env.iso";

/// Builds configuration images with `genisoimage`, falling back to `mkisofs`.
#[derive(Debug, Clone)]
pub struct GenisoimageBuilder {
    tool: Option<PathBuf>,
}

impl GenisoimageBuilder {
    /// Look the tool up on `PATH` on every build.
    #[must_use]
    pub fn new() -> Self {
        Self { tool: None }
    }

    #[must_use]
    pub fn with_tool(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: Some(tool.into()),
        }
    }

    fn tool(&self) -> Result<PathBuf> {
        if let Some(tool) = &self.tool {
            return Ok(tool.clone());
        }
        find_on_path(&ISO_TOOLS).ok_or_else(|| {
            CloudError::IsoBuild(format!("none of {} found on PATH", ISO_TOOLS.join(", ")))
        })
    }
}

impl Default for GenisoimageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IsoImageBuilder for GenisoimageBuilder {
    fn build(&self, env_json: &str) -> Result<IsoImage> {
        let tool = self.tool()?;
        let dir = TempDir::new()?;
        let env_path = dir.path().join(ENV_FILE);
        let iso_path = dir.path().join(ISO_FILE);
        fs::write(&env_path, env_json)?;

        debug!(tool = %tool.display(), iso = %iso_path.display(), "building configuration image");
        let output = Command::new(&tool)
            .arg("-o")
            .arg(&iso_path)
            .arg(&env_path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudError::IsoBuild(format!(
                "{} exited with {}: {}",
                tool.display(),
                output.status,
                stderr.trim()
            )));
        }

        let size = fs::metadata(&iso_path)?.len();
        Ok(IsoImage::new(dir, iso_path, size))
    }
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    names.iter().find_map(|name| {
        env::split_paths(&path)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
