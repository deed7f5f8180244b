use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use planhist_diff::ProjectDiff;
use planhist_history::{VersionHistory, VersionId, VersionInfo};
use planhist_types::{ReportContext, TreeKind};

use crate::data::BlameData;
use crate::engine::BlameEngine;
use crate::error::BlameResult;

/// What a blame scan covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameOptions {
    /// Changes at or before this instant are treated as the baseline. When
    /// unset, the oldest version is the baseline.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default = "default_trees")]
    pub trees: Vec<TreeKind>,
}

fn default_trees() -> Vec<TreeKind> {
    vec![TreeKind::Wbs]
}

impl Default for BlameOptions {
    fn default() -> Self {
        Self {
            since: None,
            trees: default_trees(),
        }
    }
}

/// Runs the [`BlameEngine`] over a version history, oldest to newest.
pub struct BlameScanner<'a> {
    options: BlameOptions,
    context: &'a ReportContext,
}

impl<'a> BlameScanner<'a> {
    pub fn new(options: BlameOptions, context: &'a ReportContext) -> Self {
        Self { options, context }
    }

    /// Build blame for every transition after the baseline.
    ///
    /// Versions at the old end whose snapshots were pruned are skipped, and
    /// the first retained snapshot becomes the baseline. A missing snapshot
    /// after that ends the scan; everything attributed up to that point is
    /// returned.
    pub fn scan<H: VersionHistory + ?Sized>(&self, history: &H) -> BlameResult<BlameData> {
        let versions = history.versions_oldest_first()?;
        let since = match self.options.since {
            Some(since) => versions
                .iter()
                .rposition(|v| v.timestamp <= since)
                .unwrap_or(0),
            None => 0,
        };
        let baseline = first_retained(history, &versions, since)?;

        let engine = BlameEngine::new(self.context.columns());
        let mut data = BlameData::new();
        let mut prior: Option<ProjectDiff> = None;
        let mut applied = 0usize;

        'versions: for pair in versions.get(baseline..).unwrap_or_default().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            for kind in &self.options.trees {
                let diff = match ProjectDiff::compute(history, a, b, *kind, prior.as_ref()) {
                    Ok(diff) => diff,
                    Err(e) if e.is_not_found() => {
                        warn!(from = %a.id, to = %b.id, error = %e, "history ends here; stopping scan");
                        break 'versions;
                    }
                    Err(e) => return Err(e.into()),
                };
                data = engine.attribute(&diff, data)?;
                prior = Some(diff);
            }
            applied += 1;
        }

        info!(transitions = applied, "blame scan complete");
        Ok(data)
    }
}

/// Index of the baseline version at or after `start`, skipping a leading
/// run of pruned snapshots. A single missing oldest version stays the
/// baseline, as an empty project.
fn first_retained<H: VersionHistory + ?Sized>(
    history: &H,
    versions: &[VersionInfo],
    start: usize,
) -> BlameResult<usize> {
    let mut index = start;
    while index + 1 < versions.len() && is_pruned(history, &versions[index].id)? {
        if index > 0 || is_pruned(history, &versions[index + 1].id)? {
            index += 1;
        } else {
            break;
        }
    }
    if index > start {
        warn!(skipped = index - start, baseline = %versions[index].id, "skipping pruned history");
    }
    Ok(index)
}

fn is_pruned<H: VersionHistory + ?Sized>(history: &H, version: &VersionId) -> BlameResult<bool> {
    match history.snapshot_bytes(version) {
        Ok(_) => Ok(false),
        Err(e) if e.is_not_found() => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planhist_history::InMemoryHistory;
    use planhist_types::attrs::{NODE_NAME_ATTR, TEAM_TIME_ATTR};
    use planhist_types::{NodeId, ProjectSnapshot, SnapshotBuilder, TeamMember, TeamRoster};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, 9, 0, 0).unwrap()
    }

    fn snapshot(hours: &str) -> ProjectSnapshot {
        let wbs = SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, "Task")
            .attr(1, "ab-Time", hours)
            .build()
            .unwrap();
        ProjectSnapshot::new(
            TeamRoster::new(vec![TeamMember::new("ab", "Alice Brown")]),
            wbs,
        )
    }

    fn history() -> InMemoryHistory {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1), &snapshot("1")).unwrap();
        history.record("bob", at(2), &snapshot("2")).unwrap();
        history.record("carl", at(3), &snapshot("3")).unwrap();
        history
    }

    fn time_authors(data: &BlameData) -> Vec<String> {
        data.values(TreeKind::Wbs, NodeId::new(1), TEAM_TIME_ATTR)
            .map(|values| {
                values
                    .entries()
                    .iter()
                    .skip(1)
                    .map(|e| e.point.authors().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn scans_every_transition_in_order() {
        let context = ReportContext::default();
        let data = BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history())
            .unwrap();
        assert_eq!(time_authors(&data), vec!["bob", "carl"]);
    }

    #[test]
    fn since_moves_the_baseline() {
        let context = ReportContext::default();
        let options = BlameOptions {
            since: Some(at(2)),
            ..BlameOptions::default()
        };
        let data = BlameScanner::new(options, &context).scan(&history()).unwrap();
        assert_eq!(time_authors(&data), vec!["carl"]);
        let values = data.values(TreeKind::Wbs, NodeId::new(1), TEAM_TIME_ATTR).unwrap();
        assert_eq!(values.initial_value(), Some("2"));
    }

    #[test]
    fn missing_snapshot_stops_gracefully() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1), &snapshot("1")).unwrap();
        history.record("bob", at(2), &snapshot("2")).unwrap();
        history.record_raw("carl", at(3), None);
        history.record("dana", at(4), &snapshot("4")).unwrap();

        let context = ReportContext::default();
        let data = BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history)
            .unwrap();
        assert_eq!(time_authors(&data), vec!["bob"]);
    }

    #[test]
    fn pruned_old_versions_are_skipped() {
        let mut history = InMemoryHistory::new();
        history.record_raw("alice", at(1), None);
        history.record_raw("alice", at(2), None);
        history.record("bob", at(3), &snapshot("1")).unwrap();
        history.record("carl", at(4), &snapshot("2")).unwrap();
        history.record("dana", at(5), &snapshot("3")).unwrap();

        let context = ReportContext::default();
        let data = BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history)
            .unwrap();
        assert_eq!(time_authors(&data), vec!["carl", "dana"]);
        let values = data.values(TreeKind::Wbs, NodeId::new(1), TEAM_TIME_ATTR).unwrap();
        assert_eq!(values.initial_value(), Some("1"));
    }

    #[test]
    fn malformed_snapshot_fails_the_scan() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1), &snapshot("1")).unwrap();
        history.record_raw("bob", at(2), Some(b"{".to_vec()));
        history.record("carl", at(3), &snapshot("3")).unwrap();

        let context = ReportContext::default();
        assert!(BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history)
            .is_err());
    }

    #[test]
    fn scans_each_requested_tree() {
        let project = |hours: &str, step: &str| {
            let flows = SnapshotBuilder::new(TreeKind::Workflows.root_name())
                .node(NodeId::ROOT, 1, step)
                .build()
                .unwrap();
            snapshot(hours).with_workflows(flows)
        };
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1), &project("1", "Plan")).unwrap();
        history.record("bob", at(2), &project("2", "Plan")).unwrap();
        history.record("carl", at(3), &project("2", "Plan v2")).unwrap();

        let context = ReportContext::default();
        let options = BlameOptions {
            trees: TreeKind::ALL.to_vec(),
            ..BlameOptions::default()
        };
        let data = BlameScanner::new(options, &context).scan(&history).unwrap();

        assert_eq!(time_authors(&data), vec!["bob"]);
        let renamed = data
            .values(TreeKind::Workflows, NodeId::new(1), NODE_NAME_ATTR)
            .unwrap();
        assert_eq!(renamed.initial_value(), Some("Plan"));
        let latest = renamed.latest_change().unwrap();
        assert_eq!(latest.value.as_deref(), Some("Plan v2"));
        assert_eq!(latest.point.authors().to_string(), "carl");

        let wbs_only = BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history)
            .unwrap();
        assert!(wbs_only.model(TreeKind::Workflows).is_none());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: BlameOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BlameOptions::default());
        let options: BlameOptions =
            serde_json::from_str(r#"{"trees": ["wbs", "workflows"]}"#).unwrap();
        assert_eq!(options.trees, TreeKind::ALL.to_vec());
    }
}
