//! The workstation component catalog
//!
//! Builds the ranked component list from configuration. Ranks leave gaps so
//! the order stays readable: dependencies sit on lower ranks than the
//! components that need them.

use crate::component::repository::Suite;
use crate::component::{AptPackage, AptRepository, AwsCli, Jenkins, SandboxStack};
use crate::config::{ToolbenchConfig, expand_path};
use convergence::{ArtifactSpec, BoxedComponent, Direction, FileSignature};
use std::path::PathBuf;

pub const RANK_PREREQUISITES: u32 = 10;
pub const RANK_JAVA: u32 = 20;
pub const RANK_JENKINS: u32 = 30;
pub const RANK_HASHICORP_REPO: u32 = 40;
pub const RANK_TERRAFORM: u32 = 41;
pub const RANK_ANSIBLE: u32 = 50;
pub const RANK_AWS_CLI: u32 = 60;
pub const RANK_SANDBOX: u32 = 90;

/// Every enabled component for a run in `direction`.
///
/// Shared prerequisites stay installed on rollback unless
/// `components.remove_prerequisites` is set.
pub fn build(config: &ToolbenchConfig, direction: Direction) -> Vec<BoxedComponent> {
    let enabled = &config.components;
    let download_dir = expand_path(&config.general.download_dir);
    let retry = config.retry_config();
    let mut components: Vec<BoxedComponent> = Vec::new();

    let keep_prerequisites = direction == Direction::Rollback && !enabled.remove_prerequisites;
    if enabled.prerequisites && !keep_prerequisites {
        components.push(Box::new(AptPackage::from_list(
            "prerequisites",
            "Base tools (curl, gnupg, unzip)",
            config.general.prerequisites.clone(),
            RANK_PREREQUISITES,
        )));
    }

    if enabled.java {
        components.push(Box::new(AptPackage::from_list(
            "java",
            "Java runtime",
            vec![config.general.java_package.clone()],
            RANK_JAVA,
        )));
    }

    if enabled.jenkins {
        let jenkins = &config.jenkins;
        let repo = AptRepository {
            id: "jenkins-repo".to_string(),
            description: "Jenkins apt repository".to_string(),
            rank: RANK_JENKINS,
            repo_url: jenkins.repo_url.clone(),
            key_url: jenkins.key_url.clone(),
            keyring: PathBuf::from("/usr/share/keyrings/jenkins-keyring.gpg"),
            list: PathBuf::from("/etc/apt/sources.list.d/jenkins.list"),
            suite: Suite::Fixed("binary/".to_string()),
            sections: None,
            download_dir: download_dir.clone(),
            retry: retry.clone(),
        };
        components.push(Box::new(Jenkins {
            rank: RANK_JENKINS,
            repo,
            // A WAR is a zip archive
            war: ArtifactSpec::new(
                "jenkins.war",
                &jenkins.war_url,
                FileSignature::Zip,
                jenkins.min_war_bytes,
            ),
            install_dir: expand_path(&jenkins.install_dir),
            launcher: PathBuf::from("/usr/local/bin/jenkins-standalone"),
            unit: PathBuf::from("/etc/systemd/system/jenkins.service"),
            http_port: jenkins.http_port,
            download_dir: download_dir.clone(),
            retry: retry.clone(),
        }));
    }

    if enabled.terraform {
        let terraform = &config.terraform;
        components.push(Box::new(AptRepository {
            id: "hashicorp-repo".to_string(),
            description: "HashiCorp apt repository".to_string(),
            rank: RANK_HASHICORP_REPO,
            repo_url: terraform.repo_url.clone(),
            key_url: terraform.key_url.clone(),
            keyring: PathBuf::from("/usr/share/keyrings/hashicorp-archive-keyring.gpg"),
            list: PathBuf::from("/etc/apt/sources.list.d/hashicorp.list"),
            suite: Suite::Codename(terraform.codename.clone()),
            sections: Some("main".to_string()),
            download_dir: download_dir.clone(),
            retry: retry.clone(),
        }));
        components.push(Box::new(AptPackage::new(
            "terraform",
            "Terraform",
            &["terraform"],
            RANK_TERRAFORM,
        )));
    }

    if enabled.ansible {
        components.push(Box::new(AptPackage::new(
            "ansible",
            "Ansible",
            &["ansible"],
            RANK_ANSIBLE,
        )));
    }

    if enabled.aws_cli {
        let aws = &config.aws_cli;
        components.push(Box::new(AwsCli {
            rank: RANK_AWS_CLI,
            bundle: ArtifactSpec::new("awscliv2.zip", &aws.url, FileSignature::Zip, aws.min_bytes),
            install_dir: expand_path(&aws.install_dir),
            bin_dir: expand_path(&aws.bin_dir),
            download_dir: download_dir.clone(),
            retry: retry.clone(),
        }));
    }

    if enabled.sandbox {
        let sandbox = &config.sandbox;
        components.push(Box::new(SandboxStack {
            rank: RANK_SANDBOX,
            dir: expand_path(&sandbox.dir),
            var_file: sandbox.var_file.as_deref().map(expand_path),
        }));
    }

    components
}
