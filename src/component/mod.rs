//! Workstation components managed by toolbench
//!
//! Each component implements [`convergence::ManagedComponent`] and reaches
//! the machine only through the [`convergence::Host`] on its context.

pub mod aws_cli;
pub mod jenkins;
pub mod package;
pub mod repository;
pub mod sandbox;

pub use aws_cli::AwsCli;
pub use jenkins::Jenkins;
pub use package::AptPackage;
pub use repository::AptRepository;
pub use sandbox::SandboxStack;

use convergence::{ApplyContext, Cleanup, Cmd, Error, Result, Signal};
use std::path::Path;

/// Installation status of one dpkg package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageStatus {
    Installed { version: String },
    /// Unknown to dpkg, removed, or only config files left
    Missing,
    /// Half-installed, unpacked, or otherwise not configured
    Broken { state: String },
}

/// `dpkg-query` invocation for one package
pub fn dpkg_query(package: &str) -> Cmd {
    Cmd::new("dpkg-query").args(["-W", "-f=${Status} ${Version}", package])
}

/// Query dpkg for a package's status
pub fn package_status(ctx: &ApplyContext, package: &str) -> Result<PackageStatus> {
    let out = ctx.run(&dpkg_query(package))?;
    match out.signal {
        s if s.is_success() => Ok(parse_dpkg_status(&out.stdout)),
        Signal::NotInstalled => Ok(PackageStatus::Missing),
        Signal::CommandNotFound => Err(Error::Other(
            "dpkg-query not found; only Debian-based hosts are supported".to_string(),
        )),
        _ => Err(Error::from_output("dpkg-query", &out)),
    }
}

/// Parse `${Status} ${Version}`, e.g. `install ok installed 2.440.3`
fn parse_dpkg_status(line: &str) -> PackageStatus {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let state = fields.get(2).copied().unwrap_or_default();
    let version = fields.get(3).copied().unwrap_or_default();
    match state {
        "installed" | "triggers-awaited" | "triggers-pending" => PackageStatus::Installed {
            version: version.to_string(),
        },
        "not-installed" | "config-files" | "" => PackageStatus::Missing,
        other => PackageStatus::Broken {
            state: other.to_string(),
        },
    }
}

fn apt_get() -> Cmd {
    Cmd::new("apt-get")
        .env("DEBIAN_FRONTEND", "noninteractive")
        .privileged()
}

pub fn apt_update(ctx: &ApplyContext) -> Result<()> {
    ctx.run_checked(&apt_get().arg("update"))?;
    Ok(())
}

pub fn apt_install(ctx: &ApplyContext, packages: &[String]) -> Result<()> {
    ctx.run_checked(
        &apt_get()
            .args(["install", "-y", "--no-install-recommends"])
            .args(packages),
    )?;
    Ok(())
}

/// Purge packages; packages that are already gone are not an error.
///
/// A not-installed complaint from apt only counts once dpkg agrees that
/// every package is missing.
pub fn apt_purge(ctx: &ApplyContext, packages: &[String]) -> Result<()> {
    let out = ctx.run(&apt_get().args(["purge", "-y"]).args(packages))?;
    if out.success() {
        return Ok(());
    }
    if out.signal == Signal::NotInstalled {
        let mut all_missing = true;
        for package in packages {
            if package_status(ctx, package)? != PackageStatus::Missing {
                all_missing = false;
                break;
            }
        }
        if all_missing {
            return Ok(());
        }
    }
    Err(Error::from_output("apt-get purge", &out))
}

/// Whether a systemd unit is active
pub fn service_active(ctx: &ApplyContext, unit: &str) -> Result<bool> {
    let out = ctx.run(&Cmd::new("systemctl").args(["is-active", unit]))?;
    match out.signal {
        Signal::CommandNotFound => Err(Error::Other("systemctl not found".to_string())),
        _ => Ok(out.exit_code == Some(0) && out.stdout.trim() == "active"),
    }
}

/// Write `content` to a root-owned file through `tee`
pub fn write_file(ctx: &ApplyContext, path: &Path, content: &str, mode: &str) -> Result<()> {
    ctx.run_checked(
        &Cmd::new("tee")
            .arg(path)
            .stdin(content.as_bytes().to_vec())
            .privileged(),
    )?;
    ctx.run_checked(&Cmd::new("chmod").args([mode]).arg(path).privileged())?;
    Ok(())
}

/// The given paths that exist on the host
pub fn existing_paths(ctx: &ApplyContext, paths: &[&Path]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| ctx.host.path_exists(p))
        .map(|p| p.display().to_string())
        .collect()
}

/// Remove auxiliary paths that exist, recording what happened
pub fn remove_paths(ctx: &ApplyContext, paths: &[&Path], cleanup: &mut Cleanup) {
    for path in paths {
        if !ctx.host.path_exists(path) {
            continue;
        }
        let result = ctx
            .run(&Cmd::new("rm").arg("-rf").arg(*path).privileged())
            .and_then(|out| out.check("rm"));
        match result {
            Ok(_) => cleanup.removed.push(path.display().to_string()),
            Err(e) => cleanup
                .warnings
                .push(format!("could not remove {}: {e}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::MockHost;
    use std::path::PathBuf;

    #[test]
    fn test_parse_dpkg_status() {
        assert_eq!(
            parse_dpkg_status("install ok installed 2.440.3"),
            PackageStatus::Installed {
                version: "2.440.3".to_string()
            }
        );
        assert_eq!(
            parse_dpkg_status("deinstall ok config-files 2.440.3"),
            PackageStatus::Missing
        );
        assert_eq!(
            parse_dpkg_status("install reinstreq half-installed 1.0"),
            PackageStatus::Broken {
                state: "half-installed".to_string()
            }
        );
    }

    #[test]
    fn test_package_status_unknown_package() {
        let host = MockHost::new();
        host.respond(
            "dpkg-query",
            MockHost::fail(1, "dpkg-query: no packages found matching terraform"),
        );
        let ctx = ApplyContext::new(&host, false);
        assert_eq!(package_status(&ctx, "terraform").unwrap(), PackageStatus::Missing);
    }

    #[test]
    fn test_package_status_without_dpkg_is_inconclusive() {
        let host = MockHost::new();
        host.respond("dpkg-query", convergence::CommandOutput::not_found("dpkg-query"));
        let ctx = ApplyContext::new(&host, false);
        assert!(package_status(&ctx, "terraform").is_err());
    }

    #[test]
    fn test_purge_of_missing_package_succeeds() {
        let host = MockHost::new();
        host.respond(
            "apt-get",
            MockHost::fail(100, "E: Unable to locate package terraform"),
        );
        host.respond(
            "dpkg-query",
            MockHost::fail(1, "dpkg-query: no packages found matching terraform"),
        );
        let ctx = ApplyContext::new(&host, false);
        assert!(apt_purge(&ctx, &["terraform".to_string()]).is_ok());
        assert_eq!(
            host.command_lines(),
            [
                "sudo apt-get purge -y terraform",
                "dpkg-query -W -f=${Status} ${Version} terraform"
            ]
        );
    }

    #[test]
    fn test_purge_not_installed_claim_checked_against_dpkg() {
        let host = MockHost::new();
        host.respond(
            "apt-get",
            MockHost::fail(100, "E: Unable to locate package jenkins"),
        );
        host.respond("dpkg-query", MockHost::ok("install ok installed 2.440.3"));
        let ctx = ApplyContext::new(&host, false);
        assert!(apt_purge(&ctx, &["jenkins".to_string()]).is_err());
    }

    #[test]
    fn test_purge_maintainer_script_error_fails() {
        let host = MockHost::new();
        host.respond(
            "apt-get",
            MockHost::fail(
                100,
                "dpkg: error processing package jenkins (--purge):\n \
                 installed jenkins package post-removal script subprocess returned error exit status 1\n\
                 /usr/sbin/deluser: No such file or directory\n\
                 E: Sub-process /usr/bin/dpkg returned an error code (1)",
            ),
        );
        let ctx = ApplyContext::new(&host, false);
        let err = apt_purge(&ctx, &["jenkins".to_string()]).unwrap_err();
        assert!(err.diagnostics().unwrap().contains("deluser"));
        assert_eq!(host.history().len(), 1);
    }

    #[test]
    fn test_remove_paths_skips_missing_and_records_failures() {
        let host = MockHost::new();
        let present = PathBuf::from("/etc/apt/sources.list.d/jenkins.list");
        let stuck = PathBuf::from("/usr/share/keyrings/jenkins-keyring.gpg");
        host.add_path(&present);
        host.add_path(&stuck);
        host.respond(
            &format!("rm -rf {}", stuck.display()),
            MockHost::fail(1, "rm: cannot remove: Operation not permitted"),
        );
        let ctx = ApplyContext::new(&host, false);

        let mut cleanup = Cleanup::default();
        remove_paths(
            &ctx,
            &[&present, &stuck, Path::new("/opt/not-there")],
            &mut cleanup,
        );
        assert_eq!(cleanup.removed, [present.display().to_string()]);
        assert_eq!(cleanup.warnings.len(), 1);
        assert_eq!(host.history().len(), 2);
    }
}
