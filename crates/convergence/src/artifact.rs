//! Downloaded artifact validation
//!
//! Artifacts fetched directly over HTTPS (rather than through a package
//! manager) are checked by file-type signature and a minimum size. A file
//! that exists but fails either check is `PresentButInvalid`.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::retry::{LogCallback, RetryConfig, with_retry};
use crate::types::ComponentState;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Expected file-type signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSignature {
    /// `PK\x03\x04` (zip, jar, war)
    Zip,
    /// `\x1f\x8b`
    Gzip,
    /// `\x7fELF`
    Elf,
    /// ASCII-armored PGP key
    PgpArmor,
    /// No signature check
    Any,
}

impl FileSignature {
    fn magic(&self) -> &'static [u8] {
        match self {
            Self::Zip => b"PK\x03\x04",
            Self::Gzip => b"\x1f\x8b",
            Self::Elf => b"\x7fELF",
            Self::PgpArmor => b"-----BEGIN PGP PUBLIC KEY BLOCK-----",
            Self::Any => b"",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "zip archive",
            Self::Gzip => "gzip archive",
            Self::Elf => "ELF executable",
            Self::PgpArmor => "armored PGP key",
            Self::Any => "any",
        }
    }

    /// Check the leading bytes of a file
    pub fn matches(&self, head: &[u8]) -> bool {
        head.starts_with(self.magic())
    }
}

/// A downloadable artifact and its integrity policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub name: String,
    pub url: String,
    pub signature: FileSignature,
    /// Files smaller than this are treated as truncated
    pub min_bytes: u64,
}

impl ArtifactSpec {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        signature: FileSignature,
        min_bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            signature,
            min_bytes,
        }
    }

    /// Validate a file on disk against this spec, returning its size.
    pub fn validate(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        let size = metadata.len();

        let mut head = vec![0u8; self.signature.magic().len()];
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let read = file.read(&mut head).map_err(|e| Error::io(path, e))?;
        head.truncate(read);

        if !self.signature.matches(&head) {
            return Err(Error::ValidationFailed {
                artifact: self.name.clone(),
                reason: format!("not a {}", self.signature.name()),
            });
        }

        if size < self.min_bytes {
            return Err(Error::ValidationFailed {
                artifact: self.name.clone(),
                reason: format!("{size} bytes, expected at least {}", self.min_bytes),
            });
        }

        Ok(size)
    }

    /// Detect the state of a previously downloaded copy.
    pub fn inspect(&self, path: &Path) -> ComponentState {
        if !path.exists() {
            return ComponentState::Absent;
        }
        match self.validate(path) {
            Ok(size) => ComponentState::present_with(format!("{size} bytes")),
            Err(e) => ComponentState::invalid(e.to_string()),
        }
    }
}

/// Fetch an artifact to `dest`, validating each attempt.
///
/// An invalid file is deleted before the next attempt. Every attempt is
/// recorded on the context.
pub fn fetch_validated(
    ctx: &mut ApplyContext,
    spec: &ArtifactSpec,
    dest: &Path,
    retry: &RetryConfig,
) -> Result<u64> {
    let host = ctx.host;
    with_retry(retry, Some(&LogCallback), |attempt| {
        ctx.record_fetch_attempt();
        if dest.exists() {
            fs::remove_file(dest).map_err(|e| Error::io(dest, e))?;
        }

        log::info!("fetching {} (attempt {attempt})", spec.url);
        host.fetch(&spec.url, dest)?;

        match spec.validate(dest) {
            Ok(size) => Ok(size),
            Err(e) => {
                let _ = fs::remove_file(dest);
                Err(e)
            }
        }
    })
    .inspect_err(|e| ctx.note(format!("{} not fetched: {e}", spec.name)))
}
