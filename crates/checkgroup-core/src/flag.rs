//! Mark the caller's own check-run as suppressed under a flag.

use tracing::info;

use crate::domain::CheckRunUpdate;
use crate::error::{CheckGroupError, Result};
use crate::markers::{encode_suppression, is_suppressed};
use crate::ports::CheckRunApi;

/// Append the suppression marker for `flag` to the check named `self_name`.
///
/// The newest check with that name is updated by read-modify-write: its
/// title and summary are kept and the marker is appended to its text. A
/// check that already carries the marker is left untouched. Returns the id
/// of the flagged check.
pub async fn set_flag(
    checks: &dyn CheckRunApi,
    git_ref: &str,
    self_name: &str,
    flag: &str,
) -> Result<u64> {
    let all = checks.list_for_ref(git_ref).await?;
    let target = all
        .iter()
        .filter(|c| c.name == self_name)
        .max_by_key(|c| c.id)
        .ok_or_else(|| CheckGroupError::CheckRunNotFound {
            name: self_name.to_string(),
            git_ref: git_ref.to_string(),
        })?;

    if is_suppressed(target.text(), &[flag]) {
        info!(check_run_id = target.id, flag, "check already flagged");
        return Ok(target.id);
    }

    let update = CheckRunUpdate {
        title: target.output.title.clone().unwrap_or_else(|| target.name.clone()),
        summary: target.summary().to_string(),
        text: Some(format!("{}{}", target.text(), encode_suppression(flag))),
    };
    checks.update(target.id, &update).await?;
    info!(check_run_id = target.id, flag, "flagged check");
    Ok(target.id)
}
