//! AWS CLI v2, installed from the official zip bundle

use super::{existing_paths, remove_paths};
use convergence::{
    ApplyContext, ArtifactSpec, Cleanup, Cmd, ComponentState, Error, ManagedComponent, Result,
    RetryConfig, Signal, Via, fetch_validated,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AwsCli {
    pub rank: u32,
    pub bundle: ArtifactSpec,
    pub install_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub download_dir: PathBuf,
    pub retry: RetryConfig,
}

impl AwsCli {
    fn binary(&self) -> PathBuf {
        self.bin_dir.join("aws")
    }

    fn archive(&self) -> PathBuf {
        self.download_dir.join("awscliv2.zip")
    }

    fn extract_dir(&self) -> PathBuf {
        self.download_dir.join("awscli-bundle")
    }
}

/// Unpack a zip archive, keeping unix permissions
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::ValidationFailed {
        artifact: archive.display().to_string(),
        reason: e.to_string(),
    })?;
    zip.extract(dest)
        .map_err(|e| Error::Other(format!("extracting {}: {e}", archive.display())))
}

/// Version token from `aws --version`, e.g. `aws-cli/2.15.30`
fn parse_version(stdout: &str, stderr: &str) -> Option<String> {
    // v1 printed its version on stderr
    [stdout, stderr]
        .iter()
        .filter_map(|s| s.split_whitespace().next())
        .find(|token| token.starts_with("aws-cli/"))
        .map(ToString::to_string)
}

impl ManagedComponent for AwsCli {
    fn id(&self) -> String {
        "aws-cli".to_string()
    }

    fn description(&self) -> String {
        "AWS CLI v2".to_string()
    }

    fn component_type(&self) -> &'static str {
        "artifact"
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        let out = ctx.run(&Cmd::new(self.binary().display().to_string()).arg("--version"))?;
        match out.signal {
            Signal::CommandNotFound => {
                if ctx.host.path_exists(&self.install_dir) {
                    Ok(ComponentState::invalid(format!(
                        "{} exists but {} is missing",
                        self.install_dir.display(),
                        self.binary().display()
                    )))
                } else {
                    Ok(ComponentState::Absent)
                }
            }
            s if s.is_success() => match parse_version(&out.stdout, &out.stderr) {
                Some(version) => Ok(ComponentState::present_with(version)),
                None => Ok(ComponentState::invalid("unrecognized `aws --version` output")),
            },
            _ => Ok(ComponentState::invalid(format!(
                "`aws --version` failed: {}",
                out.tail(1)
            ))),
        }
    }

    fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
        fs::create_dir_all(&self.download_dir).map_err(|e| Error::io(&self.download_dir, e))?;
        let archive = self.archive();
        fetch_validated(ctx, &self.bundle, &archive, &self.retry)?;

        let extract_dir = self.extract_dir();
        if extract_dir.exists() {
            fs::remove_dir_all(&extract_dir).map_err(|e| Error::io(&extract_dir, e))?;
        }
        extract(&archive, &extract_dir)?;

        let mut installer = Cmd::new(extract_dir.join("aws").join("install").display().to_string())
            .arg("--install-dir")
            .arg(&self.install_dir)
            .arg("--bin-dir")
            .arg(&self.bin_dir)
            .privileged();
        if ctx.host.path_exists(&self.install_dir) {
            installer = installer.arg("--update");
        }
        ctx.run_checked(&installer)?;

        let _ = fs::remove_dir_all(&extract_dir);
        let _ = fs::remove_file(&archive);
        Ok(Via::Primary)
    }

    fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
        ctx.run_checked(
            &Cmd::new("rm")
                .arg("-rf")
                .arg(&self.install_dir)
                .arg(&self.binary())
                .arg(&self.bin_dir.join("aws_completer"))
                .privileged(),
        )?;
        Ok(())
    }

    fn leftovers(&self, ctx: &ApplyContext) -> Vec<String> {
        let completer = self.bin_dir.join("aws_completer");
        let mut found: Vec<String> = [self.archive(), self.extract_dir()]
            .iter()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .collect();
        found.extend(existing_paths(ctx, &[&self.binary(), &completer]));
        found
    }

    /// Download leftovers and dangling launcher links
    fn cleanup(&self, ctx: &mut ApplyContext) -> Cleanup {
        let mut cleanup = Cleanup::default();
        for path in [self.archive(), self.extract_dir()] {
            if !path.exists() {
                continue;
            }
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => cleanup.removed.push(path.display().to_string()),
                Err(e) => cleanup
                    .warnings
                    .push(format!("could not remove {}: {e}", path.display())),
            }
        }
        let completer = self.bin_dir.join("aws_completer");
        remove_paths(ctx, &[&self.binary(), &completer], &mut cleanup);
        cleanup
    }
}
