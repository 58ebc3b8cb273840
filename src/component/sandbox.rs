//! Developer sandbox stack, delegated to terraform
//!
//! The stack's resources are declared in a terraform configuration
//! directory. This component only decides between `apply` and `destroy`;
//! resource semantics belong to terraform.

use convergence::{
    ApplyContext, Cmd, ComponentState, Error, ManagedComponent, Result, Signal, Via,
};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SandboxStack {
    pub rank: u32,
    pub dir: PathBuf,
    pub var_file: Option<PathBuf>,
}

impl SandboxStack {
    fn terraform(&self, subcommand: &str) -> Cmd {
        Cmd::new("terraform")
            .arg(format!("-chdir={}", self.dir.display()))
            .arg(subcommand)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
    }

    fn with_vars(&self, cmd: Cmd) -> Cmd {
        match &self.var_file {
            Some(file) => cmd.arg(format!("-var-file={}", file.display())),
            None => cmd,
        }
    }

    fn ensure_dir(&self, ctx: &ApplyContext) -> Result<()> {
        if ctx.host.path_exists(&self.dir) {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "sandbox configuration directory {} does not exist",
                self.dir.display()
            )))
        }
    }
}

impl ManagedComponent for SandboxStack {
    fn id(&self) -> String {
        "sandbox".to_string()
    }

    fn description(&self) -> String {
        format!("Sandbox stack in {}", self.dir.display())
    }

    fn component_type(&self) -> &'static str {
        "iac_stack"
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn requires_privilege(&self) -> bool {
        false
    }

    /// Present when terraform state tracks at least one resource
    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
        if !ctx.host.path_exists(&self.dir.join(".terraform")) {
            return Ok(ComponentState::Absent);
        }

        let out = ctx.run(&self.terraform("state").arg("list"))?;
        match out.signal {
            Signal::CommandNotFound => Ok(ComponentState::Absent),
            s if s.is_success() => {
                let resources = out.stdout.lines().filter(|l| !l.trim().is_empty()).count();
                if resources == 0 {
                    Ok(ComponentState::Absent)
                } else {
                    Ok(ComponentState::present_with(format!("{resources} resources")))
                }
            }
            _ => Err(Error::from_output("terraform state list", &out)),
        }
    }

    fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
        self.ensure_dir(ctx)?;
        ctx.run_checked(&self.terraform("init"))?;
        ctx.run_checked(&self.with_vars(self.terraform("apply").arg("-auto-approve")))?;
        Ok(Via::Primary)
    }

    fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
        self.ensure_dir(ctx)?;
        ctx.run_checked(&self.with_vars(self.terraform("destroy").arg("-auto-approve")))?;
        Ok(())
    }
}
