//! Exact-version dependency installation.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::info;

use crate::error::{BisectError, Result};

/// Package manager configuration for installs.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Package manager binary, e.g. `pnpm`.
    pub manager: String,

    /// Dependency to pin, e.g. `next`.
    pub package: String,

    /// Project directory the install runs in (current directory if unset).
    pub project_dir: Option<PathBuf>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        InstallerConfig {
            manager: "pnpm".to_string(),
            package: "next".to_string(),
            project_dir: None,
        }
    }
}

/// Installs one exact release of the dependency at a time.
pub struct PackageInstaller {
    config: InstallerConfig,
}

impl PackageInstaller {
    /// Create an installer.
    pub fn new(config: InstallerConfig) -> Self {
        PackageInstaller { config }
    }

    /// Install `<package>@<tag>` as the project dependency.
    ///
    /// The package manager's own output streams to the terminal. A spawn
    /// failure or non-zero exit is fatal to the whole run; the search never
    /// continues against a stale install.
    pub async fn install(&self, tag: &str) -> Result<()> {
        let spec = format!("{}@{}", self.config.package, tag);

        let mut cmd = Command::new(&self.config.manager);
        cmd.arg("i").arg(&spec);
        if let Some(dir) = &self.config.project_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().await.map_err(|e| BisectError::Install {
            package: self.config.package.clone(),
            version: tag.to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(BisectError::Install {
                package: self.config.package.clone(),
                version: tag.to_string(),
                reason: format!("{} exited with {}", self.config.manager, status),
            });
        }

        info!(package = %self.config.package, version = %tag, "dependency pinned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_success() {
        let installer = PackageInstaller::new(InstallerConfig {
            manager: "true".to_string(),
            package: "left-pad".to_string(),
            project_dir: None,
        });

        installer.install("1.0.0").await.expect("install failed");
    }

    #[tokio::test]
    async fn test_install_failure_is_fatal() {
        let installer = PackageInstaller::new(InstallerConfig {
            manager: "false".to_string(),
            package: "left-pad".to_string(),
            project_dir: None,
        });

        let err = installer.install("1.0.0").await.unwrap_err();
        match err {
            BisectError::Install {
                package, version, ..
            } => {
                assert_eq!(package, "left-pad");
                assert_eq!(version, "1.0.0");
            }
            other => panic!("expected Install error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_install_missing_manager_is_fatal() {
        let installer = PackageInstaller::new(InstallerConfig {
            manager: "nonexistent-package-manager-12345".to_string(),
            package: "left-pad".to_string(),
            project_dir: None,
        });

        assert!(installer.install("1.0.0").await.is_err());
    }

    #[tokio::test]
    async fn test_install_runs_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();

        // `touch i left-pad@1.0.0` stands in for the package manager and
        // leaves a marker file where the install ran.
        let installer = PackageInstaller::new(InstallerConfig {
            manager: "touch".to_string(),
            package: "left-pad".to_string(),
            project_dir: Some(dir.path().to_path_buf()),
        });

        installer.install("1.0.0").await.expect("install failed");
        assert!(dir.path().join("left-pad@1.0.0").exists());
    }
}
