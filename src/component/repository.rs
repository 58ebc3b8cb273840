//! Third-party apt repository: signing key plus sources list

use super::{apt_update, remove_paths, write_file};
use convergence::{
    ApplyContext, ArtifactSpec, Cleanup, Cmd, ComponentState, Error, FileSignature,
    ManagedComponent, Result, RetryConfig, Via, fetch_validated,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Smallest plausible armored signing key
const MIN_KEY_BYTES: u64 = 64;

/// Distribution part of a sources line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suite {
    /// A fixed suite such as `binary/`
    Fixed(String),
    /// The host's codename (`jammy`, `bookworm`), optionally pinned
    Codename(Option<String>),
}

/// An apt repository registered with a dedicated keyring
#[derive(Debug, Clone)]
pub struct AptRepository {
    pub id: String,
    pub description: String,
    pub rank: u32,
    pub repo_url: String,
    pub key_url: String,
    pub keyring: PathBuf,
    pub list: PathBuf,
    pub suite: Suite,
    /// Trailing sources-line components, e.g. `main`
    pub sections: Option<String>,
    /// Where the key is downloaded before dearmoring
    pub download_dir: PathBuf,
    pub retry: RetryConfig,
}

impl AptRepository {
    fn suite(&self, ctx: &ApplyContext) -> Result<String> {
        match &self.suite {
            Suite::Fixed(suite) => Ok(suite.clone()),
            Suite::Codename(Some(codename)) => Ok(codename.clone()),
            Suite::Codename(None) => {
                let out = ctx.run(&Cmd::new("lsb_release").arg("-cs"))?;
                let codename = out.stdout.trim();
                if out.success() && !codename.is_empty() {
                    Ok(codename.to_string())
                } else {
                    Err(Error::Unavailable {
                        path: self.id.clone(),
                        reason: "could not determine the distribution codename".to_string(),
                    })
                }
            }
        }
    }

    /// The sources line registered in `list`
    pub fn source_line(&self, ctx: &ApplyContext) -> Result<String> {
        let mut line = format!(
            "deb [signed-by={}] {} {}",
            self.keyring.display(),
            self.repo_url,
            self.suite(ctx)?
        );
        if let Some(sections) = &self.sections {
            line.push(' ');
            line.push_str(sections);
        }
        Ok(line)
    }

    fn key_download(&self) -> PathBuf {
        self.download_dir.join(format!("{}.key", self.id))
    }

    /// Detect the registration from the keyring and sources list
    pub fn state(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        let has_keyring = ctx.host.path_exists(&self.keyring);
        let has_list = ctx.host.path_exists(&self.list);

        match (has_keyring, has_list) {
            (false, false) => Ok(ComponentState::Absent),
            (true, false) => Ok(ComponentState::invalid("sources list missing")),
            (false, true) => Ok(ComponentState::invalid("signing keyring missing")),
            (true, true) => {
                let out = ctx.run(&Cmd::new("cat").arg(&self.list))?;
                if out.success() && out.stdout.contains(&self.repo_url) {
                    Ok(ComponentState::present_with(self.repo_url.clone()))
                } else {
                    Ok(ComponentState::invalid(format!(
                        "{} does not reference {}",
                        self.list.display(),
                        self.repo_url
                    )))
                }
            }
        }
    }

    /// Fetch and install the signing key, write the sources list, refresh apt.
    ///
    /// A trust failure surfaces from `apt-get update` as an error whose
    /// category triggers fallback.
    pub fn register(&self, ctx: &mut ApplyContext) -> Result<()> {
        let line = self.source_line(ctx)?;

        fs::create_dir_all(&self.download_dir).map_err(|e| Error::io(&self.download_dir, e))?;
        let key = self.key_download();
        let spec = ArtifactSpec::new(
            format!("{} signing key", self.id),
            &self.key_url,
            FileSignature::PgpArmor,
            MIN_KEY_BYTES,
        );
        fetch_validated(ctx, &spec, &key, &self.retry)?;

        ensure_parent(ctx, &self.keyring)?;
        ctx.run_checked(
            &Cmd::new("gpg")
                .args(["--dearmor", "--batch", "--yes", "-o"])
                .arg(&self.keyring)
                .arg(&key)
                .privileged(),
        )?;
        let _ = fs::remove_file(&key);

        write_file(ctx, &self.list, &format!("{line}\n"), "644")?;
        apt_update(ctx)
    }

    /// Remove the sources list and keyring; refresh apt if anything changed
    pub fn unregister(&self, ctx: &mut ApplyContext) -> Cleanup {
        let mut cleanup = Cleanup::default();
        remove_paths(ctx, &[&self.list, &self.keyring], &mut cleanup);

        let key = self.key_download();
        if key.exists() && fs::remove_file(&key).is_ok() {
            cleanup.removed.push(key.display().to_string());
        }

        if !cleanup.removed.is_empty()
            && let Err(e) = apt_update(ctx)
        {
            cleanup.warnings.push(format!("apt-get update after removal: {e}"));
        }
        cleanup
    }
}

fn ensure_parent(ctx: &ApplyContext, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !ctx.host.path_exists(parent)
    {
        ctx.run_checked(&Cmd::new("install").args(["-d", "-m", "755"]).arg(parent).privileged())?;
    }
    Ok(())
}

impl ManagedComponent for AptRepository {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn component_type(&self) -> &'static str {
        "apt_repository"
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        self.state(ctx)
    }

    fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
        self.register(ctx)?;
        Ok(Via::Primary)
    }

    fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
        let cleanup = self.unregister(ctx);
        for removed in &cleanup.removed {
            ctx.note(format!("removed {removed}"));
        }
        match cleanup.warnings.first() {
            Some(warning) => Err(Error::Other(warning.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::{ErrorCategory, MockHost};
    use std::time::Duration;

    const KEY: &[u8] = b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQINBGQ9GnkBEAC+xhOBeL5xAnBZjG0ph4wGvcL1dYinrnEbTFVAhzF4nA0hGxep\n-----END PGP PUBLIC KEY BLOCK-----\n";

    fn hashicorp(download_dir: &Path) -> AptRepository {
        AptRepository {
            id: "hashicorp-repo".to_string(),
            description: "HashiCorp apt repository".to_string(),
            rank: 40,
            repo_url: "https://apt.releases.hashicorp.com".to_string(),
            key_url: "https://apt.releases.hashicorp.com/gpg".to_string(),
            keyring: PathBuf::from("/usr/share/keyrings/hashicorp-archive-keyring.gpg"),
            list: PathBuf::from("/etc/apt/sources.list.d/hashicorp.list"),
            suite: Suite::Codename(None),
            sections: Some("main".to_string()),
            download_dir: download_dir.to_path_buf(),
            retry: RetryConfig::fixed(3, Duration::from_millis(1)),
        }
    }

    #[test]
    fn test_source_line_uses_detected_codename() {
        let host = MockHost::new();
        host.respond("lsb_release -cs", MockHost::ok("jammy\n"));
        let ctx = ApplyContext::new(&host, false);
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            hashicorp(dir.path()).source_line(&ctx).unwrap(),
            "deb [signed-by=/usr/share/keyrings/hashicorp-archive-keyring.gpg] https://apt.releases.hashicorp.com jammy main"
        );
    }

    #[test]
    fn test_unknown_codename_is_unavailable() {
        let host = MockHost::new();
        host.respond("lsb_release", convergence::CommandOutput::not_found("lsb_release"));
        let ctx = ApplyContext::new(&host, false);
        let dir = tempfile::tempdir().unwrap();
        let err = hashicorp(dir.path()).source_line(&ctx).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }

    #[test]
    fn test_state_detection() {
        let dir = tempfile::tempdir().unwrap();
        let repo = hashicorp(dir.path());
        let host = MockHost::new();
        let ctx = ApplyContext::new(&host, false);
        assert_eq!(repo.state(&ctx).unwrap(), ComponentState::Absent);

        host.add_path(&repo.keyring);
        assert!(matches!(
            repo.state(&ctx).unwrap(),
            ComponentState::PresentButInvalid { .. }
        ));

        host.add_path(&repo.list);
        host.respond(
            &format!("cat {}", repo.list.display()),
            MockHost::ok("deb [signed-by=/usr/share/keyrings/hashicorp-archive-keyring.gpg] https://apt.releases.hashicorp.com jammy main\n"),
        );
        assert!(repo.state(&ctx).unwrap().is_present());
    }

    #[test]
    fn test_register_command_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let repo = hashicorp(dir.path());
        let host = MockHost::new();
        host.add_path("/usr/share/keyrings");
        host.respond("lsb_release -cs", MockHost::ok("bookworm"));
        host.queue_download(&repo.key_url, KEY.to_vec());
        let mut ctx = ApplyContext::new(&host, false);

        repo.register(&mut ctx).unwrap();

        let lines = host.command_lines();
        assert_eq!(lines[0], "lsb_release -cs");
        assert!(lines[1].starts_with(
            "sudo gpg --dearmor --batch --yes -o /usr/share/keyrings/hashicorp-archive-keyring.gpg"
        ));
        assert_eq!(lines[2], "sudo tee /etc/apt/sources.list.d/hashicorp.list");
        assert_eq!(lines[3], "sudo chmod 644 /etc/apt/sources.list.d/hashicorp.list");
        assert_eq!(lines[4], "sudo apt-get update");

        let tee = &host.history()[2];
        let written = String::from_utf8(tee.stdin.clone().unwrap()).unwrap();
        assert!(written.contains("https://apt.releases.hashicorp.com bookworm main"));
        assert!(!repo.key_download().exists());
    }

    #[test]
    fn test_register_trust_failure_triggers_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let repo = hashicorp(dir.path());
        let host = MockHost::new();
        host.add_path("/usr/share/keyrings");
        host.respond("lsb_release -cs", MockHost::ok("jammy"));
        host.respond(
            "apt-get update",
            MockHost::fail(
                100,
                "W: GPG error: https://apt.releases.hashicorp.com jammy InRelease: NO_PUBKEY AA16FCBCA621E701",
            ),
        );
        host.queue_download(&repo.key_url, KEY.to_vec());
        let mut ctx = ApplyContext::new(&host, false);

        let err = repo.register(&mut ctx).unwrap_err();
        assert!(err.triggers_fallback());
    }

    #[test]
    fn test_unregister_on_clean_host_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = hashicorp(dir.path());
        let host = MockHost::new();
        let mut ctx = ApplyContext::new(&host, false);
        let cleanup = repo.unregister(&mut ctx);
        assert!(cleanup.is_empty());
        assert!(host.history().is_empty());
    }
}
