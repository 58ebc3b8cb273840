//! apt package component

use super::{PackageStatus, apt_install, apt_purge, package_status};
use convergence::{ApplyContext, ComponentState, ManagedComponent, Result, Via};

/// One or more apt packages installed and removed together
#[derive(Debug, Clone)]
pub struct AptPackage {
    pub id: String,
    pub description: String,
    pub packages: Vec<String>,
    pub rank: u32,
}

impl AptPackage {
    pub fn new(id: &str, description: &str, packages: &[&str], rank: u32) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            packages: packages.iter().map(ToString::to_string).collect(),
            rank,
        }
    }

    pub fn from_list(id: &str, description: &str, packages: Vec<String>, rank: u32) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            packages,
            rank,
        }
    }
}

impl ManagedComponent for AptPackage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn component_type(&self) -> &'static str {
        "apt_package"
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    /// Present when every package is installed.
    ///
    /// A partially installed set counts as Absent: `apt-get install` over it
    /// is additive, so no removal is needed first.
    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        let mut versions = Vec::new();
        let mut missing = 0;
        for package in &self.packages {
            match package_status(ctx, package)? {
                PackageStatus::Installed { version } => versions.push(format!("{package} {version}")),
                PackageStatus::Missing => missing += 1,
                PackageStatus::Broken { state } => {
                    return Ok(ComponentState::invalid(format!("{package} is {state}")));
                }
            }
        }

        if missing > 0 {
            Ok(ComponentState::Absent)
        } else if versions.len() == 1 {
            Ok(ComponentState::present_with(versions.remove(0)))
        } else {
            Ok(ComponentState::present_with(format!("{} packages", versions.len())))
        }
    }

    fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
        apt_install(ctx, &self.packages)?;
        Ok(Via::Primary)
    }

    fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
        apt_purge(ctx, &self.packages)
    }
}
