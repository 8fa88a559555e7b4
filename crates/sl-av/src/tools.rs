//! ffmpeg and ffprobe discovery.
//!
//! Tool locations are resolved once at startup into a [`ToolRegistry`];
//! everything that shells out asks the registry instead of touching `PATH`
//! again. The admin API reuses the same registry to report availability and
//! versions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tools the registry resolves at startup.
const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTool {
    /// Bare tool name, `ffmpeg` or `ffprobe`.
    pub name: String,
    /// Absolute path discovery settled on.
    pub path: PathBuf,
}

/// One row of the availability report from [`ToolRegistry::inventory`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolInfo {
    /// Bare tool name.
    pub name: String,
    /// True when discovery located an executable.
    pub available: bool,
    /// First line of `-version` output, when the tool runs.
    pub version: Option<String>,
    /// Where it was found, when available.
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
}

/// Registry of the tools discovery actually found.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    resolved: HashMap<String, ResolvedTool>,
}

impl ToolRegistry {
    /// Resolve every known tool.
    ///
    /// A configured override wins when the file exists; a dangling override
    /// falls back to a `PATH` lookup via [`which::which`], same as no
    /// override at all. Tools found nowhere are left out of the registry and
    /// surface later through [`require`](Self::require) or
    /// [`inventory`](Self::inventory).
    pub fn discover(overrides: &sl_core::config::ToolsConfig) -> Self {
        let mut resolved = HashMap::new();

        for &name in REQUIRED_TOOLS {
            let pinned = match name {
                "ffmpeg" => overrides.ffmpeg_path.as_deref(),
                "ffprobe" => overrides.ffprobe_path.as_deref(),
                _ => None,
            };

            let found = pinned
                .filter(|p| p.exists())
                .map(Path::to_path_buf)
                .or_else(|| which::which(name).ok());

            if let Some(path) = found {
                let entry = ResolvedTool { name: name.to_string(), path };
                resolved.insert(name.to_string(), entry);
            }
        }

        Self { resolved }
    }

    /// Look up a tool that must exist for the caller to proceed.
    pub fn require(&self, name: &str) -> sl_core::Result<&ResolvedTool> {
        self.resolved
            .get(name)
            .ok_or_else(|| sl_core::Error::tool(name, "not found; is it installed and in PATH?"))
    }

    /// Availability report covering every known tool, found or not.
    pub fn inventory(&self) -> Vec<ToolInfo> {
        let mut report = Vec::with_capacity(REQUIRED_TOOLS.len());
        for &name in REQUIRED_TOOLS {
            let mut info =
                ToolInfo { name: name.to_string(), available: false, version: None, path: None };
            if let Some(tool) = self.resolved.get(name) {
                info.available = true;
                info.version = detect_version(&tool.path);
                info.path = Some(tool.path.clone());
            }
            report.push(info);
        }
        report
    }
}

/// First line of `<tool> -version` output, if the tool runs at all.
///
/// Both ffmpeg and ffprobe use the single-dash form.
fn detect_version(path: &Path) -> Option<String> {
    let run = std::process::Command::new(path).arg("-version").output().ok()?;
    if !run.status.success() {
        return None;
    }
    let banner = String::from_utf8_lossy(&run.stdout);
    banner.lines().next().map(str::to_string)
}
