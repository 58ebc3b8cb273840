//! Jenkins service
//!
//! The primary path registers the vendor apt repository and installs the
//! `jenkins` package. When that repository is unusable (its key does not
//! verify, or the package cannot be located) the component installs the
//! standalone WAR with a generated launcher and systemd unit instead.

use super::repository::AptRepository;
use super::{
    PackageStatus, apt_install, apt_purge, existing_paths, package_status, remove_paths,
    service_active, write_file,
};
use convergence::{
    ApplyContext, ArtifactSpec, Cleanup, Cmd, ComponentState, Error, ManagedComponent, Result,
    RetryConfig, Signal, Via, fetch_validated, install_with_fallback,
};
use std::fs;
use std::path::PathBuf;

const PRIMARY_PATH: &str = "jenkins-apt";
const PACKAGE: &str = "jenkins";
const UNIT: &str = "jenkins";

#[derive(Debug, Clone)]
pub struct Jenkins {
    pub rank: u32,
    pub repo: AptRepository,
    pub war: ArtifactSpec,
    /// Standalone install directory holding `jenkins.war`
    pub install_dir: PathBuf,
    pub launcher: PathBuf,
    pub unit: PathBuf,
    pub http_port: u16,
    pub download_dir: PathBuf,
    pub retry: RetryConfig,
}

impl Jenkins {
    fn war_path(&self) -> PathBuf {
        self.install_dir.join("jenkins.war")
    }

    fn launcher_script(&self) -> String {
        format!(
            "#!/bin/sh\n\
             # Generated by toolbench\n\
             exec java -Djava.awt.headless=true -jar {} --httpPort={} \"$@\"\n",
            self.war_path().display(),
            self.http_port
        )
    }

    fn unit_file(&self) -> String {
        format!(
            "[Unit]\n\
             Description=Jenkins (standalone WAR, managed by toolbench)\n\
             After=network.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             DynamicUser=yes\n\
             StateDirectory=jenkins\n\
             Environment=JENKINS_HOME=/var/lib/jenkins\n\
             ExecStart={}\n\
             Restart=on-failure\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            self.launcher.display()
        )
    }

    fn standalone_state(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        let has_war = ctx.host.path_exists(&self.war_path());
        let has_unit = ctx.host.path_exists(&self.unit);
        match (has_war, has_unit) {
            (false, false) => Ok(ComponentState::Absent),
            (true, true) if service_active(ctx, UNIT)? => {
                Ok(ComponentState::present_with("standalone WAR"))
            }
            (true, true) => Ok(ComponentState::invalid("standalone service is not active")),
            _ => Ok(ComponentState::invalid("standalone install is incomplete")),
        }
    }

    fn install_package(&self, ctx: &mut ApplyContext) -> Result<()> {
        let result = self.install_from_repository(ctx);
        if let Err(e) = &result
            && e.triggers_fallback()
        {
            // An abandoned sources list would break every later apt-get update
            let cleanup = self.repo.unregister(ctx);
            for warning in cleanup.warnings {
                ctx.note(warning);
            }
        }
        result
    }

    fn install_from_repository(&self, ctx: &mut ApplyContext) -> Result<()> {
        self.repo.register(ctx)?;

        apt_install(ctx, &[PACKAGE.to_string()]).map_err(|e| match e {
            Error::ActionFailed {
                signal: Signal::NotInstalled,
                ..
            } => Error::Unavailable {
                path: "jenkins apt repository".to_string(),
                reason: e.to_string(),
            },
            other => other,
        })?;

        ctx.run_checked(&Cmd::new("systemctl").args(["enable", "--now", UNIT]).privileged())?;
        Ok(())
    }

    fn install_standalone(&self, ctx: &mut ApplyContext) -> Result<()> {
        fs::create_dir_all(&self.download_dir).map_err(|e| Error::io(&self.download_dir, e))?;
        let download = self.download_dir.join("jenkins.war");
        fetch_validated(ctx, &self.war, &download, &self.retry)?;

        ctx.run_checked(
            &Cmd::new("install")
                .args(["-d", "-m", "755"])
                .arg(&self.install_dir)
                .privileged(),
        )?;
        ctx.run_checked(
            &Cmd::new("install")
                .args(["-m", "644"])
                .arg(&download)
                .arg(&self.war_path())
                .privileged(),
        )?;
        let _ = fs::remove_file(&download);

        write_file(ctx, &self.launcher, &self.launcher_script(), "755")?;
        write_file(ctx, &self.unit, &self.unit_file(), "644")?;
        ctx.run_checked(&Cmd::new("systemctl").arg("daemon-reload").privileged())?;
        ctx.run_checked(&Cmd::new("systemctl").args(["enable", "--now", UNIT]).privileged())?;
        Ok(())
    }
}

impl ManagedComponent for Jenkins {
    fn id(&self) -> String {
        "jenkins".to_string()
    }

    fn description(&self) -> String {
        "Jenkins CI server".to_string()
    }

    fn component_type(&self) -> &'static str {
        "service"
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        match package_status(ctx, PACKAGE)? {
            PackageStatus::Installed { version } => {
                if service_active(ctx, UNIT)? {
                    Ok(ComponentState::present_with(format!("package {version}")))
                } else {
                    Ok(ComponentState::invalid("package installed but service is not active"))
                }
            }
            PackageStatus::Broken { state } => {
                Ok(ComponentState::invalid(format!("package is {state}")))
            }
            PackageStatus::Missing => self.standalone_state(ctx),
        }
    }

    fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
        install_with_fallback(
            ctx,
            PRIMARY_PATH,
            |ctx| self.install_package(ctx),
            |ctx| self.install_standalone(ctx),
        )
    }

    fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
        let stop = ctx.run(&Cmd::new("systemctl").args(["disable", "--now", UNIT]).privileged())?;
        if !stop.success() {
            log::debug!("jenkins: disable failed: {}", stop.tail(1));
        }

        match package_status(ctx, PACKAGE)? {
            PackageStatus::Missing => Ok(()),
            _ => apt_purge(ctx, &[PACKAGE.to_string()]),
        }
    }

    fn leftovers(&self, ctx: &ApplyContext) -> Vec<String> {
        existing_paths(
            ctx,
            &[
                &self.repo.list,
                &self.repo.keyring,
                &self.unit,
                &self.launcher,
                &self.install_dir,
            ],
        )
    }

    /// Repository files, the standalone WAR, launcher and unit
    fn cleanup(&self, ctx: &mut ApplyContext) -> Cleanup {
        let mut cleanup = self.repo.unregister(ctx);
        let unit = self.unit.display().to_string();
        remove_paths(
            ctx,
            &[&self.unit, &self.launcher, &self.install_dir],
            &mut cleanup,
        );

        if cleanup.removed.contains(&unit) {
            let reload = ctx
                .run(&Cmd::new("systemctl").arg("daemon-reload").privileged())
                .and_then(|out| out.check("systemctl daemon-reload"));
            if let Err(e) = reload {
                cleanup.warnings.push(e.to_string());
            }
        }
        cleanup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::dpkg_query;
    use crate::component::repository::Suite;
    use convergence::{FileSignature, MockHost};
    use std::path::Path;
    use std::time::Duration;

    const KEY: &[u8] = b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQINBGQ9GnkBEAC+xhOBeL5xAnBZjG0ph4wGvcL1dYinrnEbTFVAhzF4nA0hGxep\n-----END PGP PUBLIC KEY BLOCK-----\n";

    fn war_bytes() -> Vec<u8> {
        let mut data = b"PK\x03\x04".to_vec();
        data.resize(4096, 0);
        data
    }

    fn jenkins(download_dir: &Path) -> Jenkins {
        let retry = RetryConfig::fixed(3, Duration::from_millis(1));
        Jenkins {
            rank: 30,
            repo: AptRepository {
                id: "jenkins-repo".to_string(),
                description: "Jenkins apt repository".to_string(),
                rank: 30,
                repo_url: "https://pkg.jenkins.io/debian-stable".to_string(),
                key_url: "https://pkg.jenkins.io/debian-stable/jenkins.io-2023.key".to_string(),
                keyring: PathBuf::from("/usr/share/keyrings/jenkins-keyring.gpg"),
                list: PathBuf::from("/etc/apt/sources.list.d/jenkins.list"),
                suite: Suite::Fixed("binary/".to_string()),
                sections: None,
                download_dir: download_dir.to_path_buf(),
                retry: retry.clone(),
            },
            war: ArtifactSpec::new(
                "jenkins.war",
                "https://get.jenkins.io/war-stable/latest/jenkins.war",
                FileSignature::Zip,
                1024,
            ),
            install_dir: PathBuf::from("/opt/jenkins"),
            launcher: PathBuf::from("/usr/local/bin/jenkins-standalone"),
            unit: PathBuf::from("/etc/systemd/system/jenkins.service"),
            http_port: 8080,
            download_dir: download_dir.to_path_buf(),
            retry,
        }
    }

    fn untrusted_repo_host(component: &Jenkins) -> MockHost {
        let host = MockHost::new();
        host.add_path("/usr/share/keyrings");
        host.respond(
            "apt-get update",
            MockHost::fail(
                100,
                "W: GPG error: https://pkg.jenkins.io/debian-stable binary/ Release: \
                 The following signatures couldn't be verified because the public key is not available: \
                 NO_PUBKEY 5BA31D57EF5975CA",
            ),
        );
        host.queue_download(&component.repo.key_url, KEY.to_vec());
        host
    }

    #[test]
    fn test_trust_failure_installs_standalone_war() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = untrusted_repo_host(&component);
        host.queue_download(&component.war.url, war_bytes());
        let mut ctx = ApplyContext::new(&host, false);

        let via = component.install(&mut ctx).unwrap();
        assert_eq!(via, Via::Fallback);
        assert!(ctx.primary_abandoned(PRIMARY_PATH).is_some());

        let lines = host.command_lines();
        assert!(!lines.iter().any(|l| l.contains("apt-get install")));
        assert!(lines.contains(&format!(
            "sudo install -m 644 {} /opt/jenkins/jenkins.war",
            dir.path().join("jenkins.war").display()
        )));
        assert!(lines.contains(&"sudo tee /etc/systemd/system/jenkins.service".to_string()));
        assert_eq!(lines.last().unwrap(), "sudo systemctl enable --now jenkins");
    }

    #[test]
    fn test_abandoned_repository_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = untrusted_repo_host(&component);
        host.queue_download(&component.war.url, war_bytes());
        host.queue_download(&component.war.url, war_bytes());
        let mut ctx = ApplyContext::new(&host, false);

        component.install(&mut ctx).unwrap();
        let via = component.install(&mut ctx).unwrap();
        assert_eq!(via, Via::Fallback);
        assert_eq!(host.run_count("apt-get update"), 1);
        assert_eq!(host.fetch_count(&component.repo.key_url), 1);
    }

    #[test]
    fn test_unlocatable_package_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = MockHost::new();
        host.add_path("/usr/share/keyrings");
        // Written by the registration step
        host.add_path(&component.repo.list);
        host.add_path(&component.repo.keyring);
        host.queue_download(&component.repo.key_url, KEY.to_vec());
        host.queue_download(&component.war.url, war_bytes());
        host.respond(
            "apt-get install -y --no-install-recommends jenkins",
            MockHost::fail(100, "E: Unable to locate package jenkins"),
        );
        let mut ctx = ApplyContext::new(&host, false);

        assert_eq!(component.install(&mut ctx).unwrap(), Via::Fallback);

        // The abandoned repository is unregistered before the WAR is installed
        let lines = host.command_lines();
        let unregistered = lines
            .iter()
            .position(|l| l == "sudo rm -rf /etc/apt/sources.list.d/jenkins.list")
            .unwrap();
        let war = lines
            .iter()
            .position(|l| l.ends_with("/opt/jenkins/jenkins.war"))
            .unwrap();
        assert!(unregistered < war);
        assert!(lines.contains(&"sudo rm -rf /usr/share/keyrings/jenkins-keyring.gpg".to_string()));
    }

    #[test]
    fn test_leftovers_lists_existing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = MockHost::new();
        let ctx = ApplyContext::new(&host, false);
        assert!(component.leftovers(&ctx).is_empty());

        host.add_path(&component.repo.list);
        host.add_path(&component.launcher);
        assert_eq!(
            component.leftovers(&ctx),
            [
                "/etc/apt/sources.list.d/jenkins.list",
                "/usr/local/bin/jenkins-standalone"
            ]
        );
        assert!(host.history().is_empty());
    }

    #[test]
    fn test_truncated_war_fails_after_bounded_retries() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = untrusted_repo_host(&component);
        for _ in 0..3 {
            host.queue_download(&component.war.url, b"PK\x03\x04short".to_vec());
        }
        let mut ctx = ApplyContext::new(&host, false);

        let err = component.install(&mut ctx).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
        assert_eq!(host.fetch_count(&component.war.url), 3);
    }

    #[test]
    fn test_detect_package_with_stopped_service_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = MockHost::new();
        host.respond(
            &dpkg_query(PACKAGE).command_line(),
            MockHost::ok("install ok installed 2.440.3"),
        );
        host.respond("systemctl is-active jenkins", MockHost::fail(3, ""));
        let ctx = ApplyContext::new(&host, false);
        assert!(matches!(
            component.detect(&ctx).unwrap(),
            ComponentState::PresentButInvalid { .. }
        ));
    }

    #[test]
    fn test_detect_standalone_install() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = MockHost::new();
        host.respond(
            &dpkg_query(PACKAGE).command_line(),
            MockHost::fail(1, "dpkg-query: no packages found matching jenkins"),
        );
        host.respond("systemctl is-active jenkins", MockHost::ok("active\n"));
        host.add_path(component.war_path());
        host.add_path(&component.unit);
        let ctx = ApplyContext::new(&host, false);
        assert_eq!(
            component.detect(&ctx).unwrap(),
            ComponentState::present_with("standalone WAR")
        );
    }

    #[test]
    fn test_cleanup_removes_leftovers_and_reloads_systemd() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        let host = MockHost::new();
        host.add_path(&component.repo.list);
        host.add_path(&component.unit);
        host.add_path(&component.install_dir);
        let mut ctx = ApplyContext::new(&host, false);

        let cleanup = component.cleanup(&mut ctx);
        assert_eq!(cleanup.removed.len(), 3);
        assert!(cleanup.warnings.is_empty());
        let lines = host.command_lines();
        assert!(lines.contains(&"sudo apt-get update".to_string()));
        assert_eq!(lines.last().unwrap(), "sudo systemctl daemon-reload");
    }

    #[test]
    fn test_generated_files_reference_war() {
        let dir = tempfile::tempdir().unwrap();
        let component = jenkins(dir.path());
        assert!(component.launcher_script().contains("-jar /opt/jenkins/jenkins.war --httpPort=8080"));
        assert!(component.unit_file().contains("ExecStart=/usr/local/bin/jenkins-standalone"));
    }
}
