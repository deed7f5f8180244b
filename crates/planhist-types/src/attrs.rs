//! Attribute naming conventions for work-breakdown nodes.
//!
//! Node attributes are plain strings. Time-related attributes follow a
//! suffix convention keyed by a team member's initials, e.g. `ab-Time` holds
//! the time assigned to the member with initials `ab`.

use crate::error::{TypeError, TypeResult};
use crate::node::NodeContent;

/// Reserved attribute holding the node's display name inside [`NodeContent`].
pub const NODE_NAME_ATTR: &str = "@Name";

/// Aggregate whole-node time estimate.
pub const TEAM_TIME_ATTR: &str = "Time";

/// Internal marker set when the aggregate time is an explicit top-down value
/// rather than a bottom-up sum.
pub const EXPLICIT_TIME_FLAG: &str = "Time@Explicit";

/// Identifies the individual who created a node during a synchronized edit.
pub const SYNC_AUTHOR_ATTR: &str = "Added By (Sync)";

/// Synthesized column listing the members with nonzero time on a task.
pub const ASSIGNED_TO_ATTR: &str = "Assigned To";

/// Pseudo column recording moves of a node between parents.
pub const PARENT_PATH_ATTR: &str = "@Parent Path";

pub const INDIV_TIME_SUFFIX: &str = "-Time";
pub const SYNC_TIME_SUFFIX: &str = "-SyncTime";
pub const ZERO_ASSIGNED_SUFFIX: &str = "-Assigned_With_Zero";

/// Tolerance used for every numeric time comparison.
pub const TIME_EPSILON: f64 = 1e-4;

/// What an attribute name means to the history engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrKind<'a> {
    NodeName,
    TeamTime,
    ExplicitTimeFlag,
    SyncAuthor,
    /// `<initials>-Time`
    IndividualTime(&'a str),
    /// `<initials>-SyncTime`
    SyncTime(&'a str),
    /// `<initials>-Assigned_With_Zero`
    ZeroAssigned(&'a str),
    Other,
}

/// Classify an attribute name by the naming conventions above.
pub fn classify(attr: &str) -> AttrKind<'_> {
    match attr {
        NODE_NAME_ATTR => AttrKind::NodeName,
        TEAM_TIME_ATTR => AttrKind::TeamTime,
        EXPLICIT_TIME_FLAG => AttrKind::ExplicitTimeFlag,
        SYNC_AUTHOR_ATTR => AttrKind::SyncAuthor,
        _ => {
            if let Some(initials) = non_empty_prefix(attr, SYNC_TIME_SUFFIX) {
                AttrKind::SyncTime(initials)
            } else if let Some(initials) = non_empty_prefix(attr, ZERO_ASSIGNED_SUFFIX) {
                AttrKind::ZeroAssigned(initials)
            } else if let Some(initials) = non_empty_prefix(attr, INDIV_TIME_SUFFIX) {
                AttrKind::IndividualTime(initials)
            } else {
                AttrKind::Other
            }
        }
    }
}

fn non_empty_prefix<'a>(attr: &'a str, suffix: &str) -> Option<&'a str> {
    attr.strip_suffix(suffix).filter(|prefix| !prefix.is_empty())
}

pub fn indiv_time_attr(initials: &str) -> String {
    format!("{initials}{INDIV_TIME_SUFFIX}")
}

pub fn sync_time_attr(initials: &str) -> String {
    format!("{initials}{SYNC_TIME_SUFFIX}")
}

pub fn zero_assigned_attr(initials: &str) -> String {
    format!("{initials}{ZERO_ASSIGNED_SUFFIX}")
}

/// Parse a string-encoded numeric attribute value.
pub fn parse_number(attr: &str, value: &str) -> TypeResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TypeError::InvalidNumber {
            attr: attr.to_string(),
            value: value.to_string(),
        })
}

/// Read a numeric attribute from node content. Absent attributes are `None`.
pub fn number_attr(content: &NodeContent, attr: &str) -> TypeResult<Option<f64>> {
    content
        .get(attr)
        .map(|value| parse_number(attr, value))
        .transpose()
}

/// Render a number with at most two decimals and no trailing zeros.
pub fn format_number(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Equality within [`TIME_EPSILON`].
pub fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < TIME_EPSILON
}

/// Returns `true` when two string-encoded numbers are equal within tolerance.
/// Identical strings compare equal without parsing.
pub fn numbers_match(attr: &str, a: &str, b: &str) -> TypeResult<bool> {
    if a == b {
        return Ok(true);
    }
    Ok(nearly_equal(parse_number(attr, a)?, parse_number(attr, b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reserved_names() {
        assert_eq!(classify(NODE_NAME_ATTR), AttrKind::NodeName);
        assert_eq!(classify(TEAM_TIME_ATTR), AttrKind::TeamTime);
        assert_eq!(classify(EXPLICIT_TIME_FLAG), AttrKind::ExplicitTimeFlag);
        assert_eq!(classify(SYNC_AUTHOR_ATTR), AttrKind::SyncAuthor);
    }

    #[test]
    fn classify_member_attributes() {
        assert_eq!(classify("ab-Time"), AttrKind::IndividualTime("ab"));
        assert_eq!(classify("ab-SyncTime"), AttrKind::SyncTime("ab"));
        assert_eq!(classify("ab-Assigned_With_Zero"), AttrKind::ZeroAssigned("ab"));
        assert_eq!(classify("-Time"), AttrKind::Other);
        assert_eq!(classify("Notes"), AttrKind::Other);
    }

    #[test]
    fn attribute_names_round_trip_through_classify() {
        assert_eq!(classify(&indiv_time_attr("xy")), AttrKind::IndividualTime("xy"));
        assert_eq!(classify(&sync_time_attr("xy")), AttrKind::SyncTime("xy"));
        assert_eq!(classify(&zero_assigned_attr("xy")), AttrKind::ZeroAssigned("xy"));
    }

    #[test]
    fn parse_number_rejects_garbage() {
        assert_eq!(parse_number("Time", " 2.5 ").unwrap(), 2.5);
        let err = parse_number("Time", "lots").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidNumber {
                attr: "Time".into(),
                value: "lots".into()
            }
        );
        assert!(parse_number("Time", "NaN").is_err());
    }

    #[test]
    fn format_number_trims() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
        assert_eq!(format_number(-0.0001), "0");
        assert_eq!(format_number(10.10), "10.1");
    }

    #[test]
    fn tolerance_comparison() {
        assert!(nearly_equal(1.0, 1.00005));
        assert!(!nearly_equal(1.0, 1.001));
        assert!(numbers_match("ab-Time", "4", "4.00001").unwrap());
        assert!(numbers_match("ab-Time", "x", "x").unwrap());
        assert!(numbers_match("ab-Time", "x", "4").is_err());
    }

    #[test]
    fn number_attr_absent_is_none() {
        let mut content = NodeContent::new();
        assert_eq!(number_attr(&content, "Time").unwrap(), None);
        content.insert("Time".into(), "7".into());
        assert_eq!(number_attr(&content, "Time").unwrap(), Some(7.0));
    }
}
