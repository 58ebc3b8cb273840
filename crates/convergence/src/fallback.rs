//! Primary/fallback installation paths

use crate::context::ApplyContext;
use crate::error::Result;
use crate::types::Via;

/// Install through `primary`, switching to `fallback` when the primary path
/// is unavailable or fails trust verification.
///
/// `key` names the primary path. Once abandoned it stays abandoned for the
/// rest of the run, so later calls with the same key go straight to the
/// fallback. Errors from the primary path that do not trigger a fallback
/// are returned unchanged.
pub fn install_with_fallback<P, F>(
    ctx: &mut ApplyContext,
    key: &str,
    primary: P,
    fallback: F,
) -> Result<Via>
where
    P: FnOnce(&mut ApplyContext) -> Result<()>,
    F: FnOnce(&mut ApplyContext) -> Result<()>,
{
    if let Some(reason) = ctx.primary_abandoned(key) {
        log::debug!("{key}: primary path already abandoned ({reason}), using fallback");
        fallback(ctx)?;
        return Ok(Via::Fallback);
    }

    match primary(ctx) {
        Ok(()) => Ok(Via::Primary),
        Err(e) if e.triggers_fallback() => {
            log::warn!("{key}: primary path abandoned: {e}; falling back");
            ctx.note(format!("primary path abandoned: {e}"));
            ctx.abandon_primary(key, e.to_string());
            fallback(ctx)?;
            Ok(Via::Fallback)
        }
        Err(e) => Err(e),
    }
}
