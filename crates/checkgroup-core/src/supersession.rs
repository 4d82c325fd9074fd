//! Latest-attempt selection for re-run check-runs.

use std::collections::HashMap;

use crate::domain::CheckRun;
use crate::error::{CheckGroupError, Result};

/// Keep, for every distinct name, only the check-run with the highest id.
///
/// Output order follows the first appearance of each name in `checks`.
/// Identifiers are unique per host; a repeated id is reported as
/// [`CheckGroupError::DuplicateCheckRunId`] instead of being resolved.
pub fn latest_per_name(checks: &[CheckRun]) -> Result<Vec<&CheckRun>> {
    let mut seen_ids: HashMap<u64, &str> = HashMap::with_capacity(checks.len());
    let mut slot_by_name: HashMap<&str, usize> = HashMap::new();
    let mut latest: Vec<&CheckRun> = Vec::new();

    for check in checks {
        if let Some(first) = seen_ids.insert(check.id, check.name.as_str()) {
            return Err(CheckGroupError::DuplicateCheckRunId {
                id: check.id,
                first: first.to_string(),
                second: check.name.clone(),
            });
        }

        match slot_by_name.get(check.name.as_str()) {
            Some(&slot) => {
                if check.id > latest[slot].id {
                    latest[slot] = check;
                }
            }
            None => {
                slot_by_name.insert(check.name.as_str(), latest.len());
                latest.push(check);
            }
        }
    }

    Ok(latest)
}
