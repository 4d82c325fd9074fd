//! Opaque markers embedded in check-run output text.
//!
//! Two kinds exist:
//!
//! - suppression: `<!--CHECKGROUP_FLAG-{flag}-->`, written by a producer to
//!   exempt its check from failing the aggregate
//! - correlation: `<!--{job_identifier}-{run_id}-->`, written by the
//!   self-reporter so the rerun collaborator can find the run behind it
//!
//! Both are HTML comments so they stay invisible in rendered check output.

use regex::Regex;

const SUPPRESSION_PREFIX: &str = "<!--CHECKGROUP_FLAG-";
const MARKER_SUFFIX: &str = "-->";

/// Suppression marker for `flag`.
pub fn encode_suppression(flag: &str) -> String {
    format!("{SUPPRESSION_PREFIX}{flag}{MARKER_SUFFIX}")
}

/// `true` when `text` carries the suppression marker of any of `flags`.
pub fn is_suppressed<S: AsRef<str>>(text: &str, flags: &[S]) -> bool {
    flags
        .iter()
        .any(|flag| text.contains(&encode_suppression(flag.as_ref())))
}

/// Correlation marker linking a self check back to workflow run `run_id`.
pub fn encode_correlation(job_identifier: &str, run_id: u64) -> String {
    format!("<!--{job_identifier}-{run_id}{MARKER_SUFFIX}")
}

/// Extract the run id from a correlation marker written for `job_identifier`.
///
/// The whole of `text` must be the marker; a marker embedded in other text,
/// or one written for a different job identifier, yields `None`.
pub fn decode_correlation_run_id(text: &str, job_identifier: &str) -> Option<u64> {
    let pattern = format!(r"^<!--{}-(\d+)-->$", regex::escape(job_identifier));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
