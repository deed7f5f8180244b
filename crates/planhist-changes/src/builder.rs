use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use planhist_diff::ProjectDiff;
use planhist_history::{VersionHistory, VersionInfo};
use planhist_types::{ReportContext, TreeKind};

use crate::change::ProjectChange;
use crate::error::ChangeResult;
use crate::factory::ChangeListFactory;

/// What a change-list scan covers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeListOptions {
    /// Ignore versions saved after this instant.
    pub on_or_before: Option<DateTime<Utc>>,
    /// Stop once at least this many changes are collected. Zero scans the
    /// whole history.
    pub min_changes: usize,
    /// Keep scanning past `min_changes` until the current day is complete.
    pub force_full_days: bool,
    /// Diff across runs of versions saved by one author on one day as if
    /// they were a single save.
    pub merge_consecutive: bool,
    /// Offset of the local time zone, used to decide where days begin.
    pub utc_offset_minutes: i32,
}

impl ChangeListOptions {
    fn day_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        timestamp.with_timezone(&offset).date_naive()
    }

    fn same_run(&self, a: &VersionInfo, b: &VersionInfo) -> bool {
        a.author == b.author && self.day_of(a.timestamp) == self.day_of(b.timestamp)
    }
}

/// The result of a change-list scan, newest changes first.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProjectChangeList {
    changes: Vec<ProjectChange>,
    /// Where a follow-up scan should resume (as its `on_or_before`), if the
    /// scan stopped early.
    followup_timestamp: Option<DateTime<Utc>>,
}

impl ProjectChangeList {
    pub fn changes(&self) -> &[ProjectChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<ProjectChange> {
        self.changes
    }

    pub fn followup_timestamp(&self) -> Option<DateTime<Utc>> {
        self.followup_timestamp
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectChange> {
        self.changes.iter()
    }
}

/// Scans a version history, newest first, into a [`ProjectChangeList`].
pub struct ChangeListBuilder<'a> {
    options: ChangeListOptions,
    context: &'a ReportContext,
}

impl<'a> ChangeListBuilder<'a> {
    pub fn new(options: ChangeListOptions, context: &'a ReportContext) -> Self {
        Self { options, context }
    }

    /// Build the change list.
    ///
    /// A missing snapshot ends the scan; the changes collected so far are
    /// returned. The final change is flagged as the last one in range.
    pub fn build<H: VersionHistory + ?Sized>(&self, history: &H) -> ChangeResult<ProjectChangeList> {
        let versions = history.versions_oldest_first()?;
        let mut result = ProjectChangeList::default();
        let mut prior: Option<ProjectDiff> = None;
        let mut last_day: Option<NaiveDate> = None;
        let mut i = versions.len();

        while i > 1 {
            i -= 1;
            let version = &versions[i];
            if self
                .options
                .on_or_before
                .is_some_and(|cutoff| version.timestamp > cutoff)
            {
                continue;
            }

            let day = self.options.day_of(version.timestamp);
            let min = self.options.min_changes;
            if min > 0
                && result.changes.len() >= min
                && !(self.options.force_full_days && last_day == Some(day))
            {
                result.followup_timestamp = Some(version.timestamp);
                break;
            }

            let mut prev = i - 1;
            if self.options.merge_consecutive {
                while prev > 0 && self.options.same_run(&versions[prev], version) {
                    prev -= 1;
                }
            }

            let diff = match ProjectDiff::compute(
                history,
                &versions[prev],
                version,
                TreeKind::Wbs,
                prior.as_ref(),
            ) {
                Ok(diff) => diff,
                Err(e) if e.is_not_found() => {
                    info!(from = %versions[prev].id, to = %version.id, "history ends here; stopping scan");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let changes = ChangeListFactory::new(&diff, self.context).changes()?;
            debug!(version = %version.id, merged = i - prev, changes = changes.len(), "listed changes");
            result.changes.extend(changes);

            prior = Some(diff);
            last_day = Some(day);
            i = prev + 1;
        }

        if let Some(last) = result.changes.last_mut() {
            last.set_last_change(true);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planhist_history::InMemoryHistory;
    use planhist_types::{NodeId, ProjectSnapshot, SnapshotBuilder, TeamMember, TeamRoster};
    use proptest::prelude::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, hour, 0, 0).unwrap()
    }

    /// One task per entry; each entry is that task's time for `ab`.
    fn snapshot(times: &[u32]) -> ProjectSnapshot {
        let mut builder = SnapshotBuilder::new("WBS");
        for (i, time) in times.iter().enumerate() {
            let id = i as i32 + 1;
            builder = builder
                .node(NodeId::ROOT, id, format!("Task {id}"))
                .attr(id, "ab-Time", time.to_string());
        }
        let team = TeamRoster::new(vec![TeamMember::new("ab", "Alice Brown")]);
        ProjectSnapshot::new(team, builder.build().unwrap())
    }

    fn context() -> ReportContext {
        ReportContext::default()
    }

    fn build(history: &InMemoryHistory, options: ChangeListOptions) -> ProjectChangeList {
        ChangeListBuilder::new(options, &context()).build(history).unwrap()
    }

    fn authors(list: &ProjectChangeList) -> Vec<&str> {
        list.iter().map(ProjectChange::author).collect()
    }

    #[test]
    fn lists_newest_first_and_flags_the_last() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1, 1])).unwrap();
        history.record("bob", at(2, 9), &snapshot(&[2, 1])).unwrap();
        history.record("carl", at(3, 9), &snapshot(&[2, 5])).unwrap();

        let list = build(&history, ChangeListOptions::default());
        assert_eq!(authors(&list), vec!["carl", "bob"]);
        assert!(!list.changes()[0].is_last_change());
        assert!(list.changes()[1].is_last_change());
        assert_eq!(list.followup_timestamp(), None);
    }

    #[test]
    fn on_or_before_skips_newer_versions() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1])).unwrap();
        history.record("bob", at(2, 9), &snapshot(&[2])).unwrap();
        history.record("carl", at(3, 9), &snapshot(&[3])).unwrap();

        let options = ChangeListOptions {
            on_or_before: Some(at(2, 12)),
            ..Default::default()
        };
        assert_eq!(authors(&build(&history, options)), vec!["bob"]);
    }

    #[test]
    fn min_changes_sets_followup() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1])).unwrap();
        history.record("bob", at(2, 9), &snapshot(&[2])).unwrap();
        history.record("carl", at(3, 9), &snapshot(&[3])).unwrap();

        let options = ChangeListOptions {
            min_changes: 1,
            ..Default::default()
        };
        let list = build(&history, options);
        assert_eq!(authors(&list), vec!["carl"]);
        assert_eq!(list.followup_timestamp(), Some(at(2, 9)));
        assert!(list.changes()[0].is_last_change());
    }

    #[test]
    fn full_days_keep_scanning_the_same_day() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1])).unwrap();
        history.record("bob", at(2, 9), &snapshot(&[2])).unwrap();
        history.record("carl", at(3, 9), &snapshot(&[3])).unwrap();
        history.record("dana", at(3, 15), &snapshot(&[4])).unwrap();

        let options = ChangeListOptions {
            min_changes: 1,
            force_full_days: true,
            ..Default::default()
        };
        let list = build(&history, options);
        assert_eq!(authors(&list), vec!["dana", "carl"]);
        assert_eq!(list.followup_timestamp(), Some(at(2, 9)));
    }

    #[test]
    fn day_boundaries_follow_the_offset() {
        let options = ChangeListOptions {
            utc_offset_minutes: -300,
            ..Default::default()
        };
        assert_eq!(
            options.day_of(at(3, 2)),
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
        );
    }

    #[test]
    fn merged_run_equals_single_transition() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1, 1])).unwrap();
        history.record("bob", at(2, 9), &snapshot(&[2, 1])).unwrap();
        history.record("bob", at(2, 10), &snapshot(&[3, 4])).unwrap();

        let options = ChangeListOptions {
            merge_consecutive: true,
            ..Default::default()
        };
        let merged = build(&history, options);

        let mut direct = InMemoryHistory::new();
        direct.record("alice", at(1, 9), &snapshot(&[1, 1])).unwrap();
        direct.record("bob", at(2, 10), &snapshot(&[3, 4])).unwrap();
        let expected = build(&direct, ChangeListOptions::default());

        assert_eq!(merged, expected);
        assert_eq!(authors(&merged), vec!["bob"]);
    }

    #[test]
    fn missing_snapshot_stops_gracefully() {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1, 9), &snapshot(&[1])).unwrap();
        history.record_raw("bob", at(2, 9), None);
        history.record("carl", at(3, 9), &snapshot(&[3])).unwrap();
        history.record("dana", at(4, 9), &snapshot(&[4])).unwrap();

        let list = build(&history, ChangeListOptions::default());
        assert_eq!(authors(&list), vec!["dana"]);
        assert!(list.changes()[0].is_last_change());
        assert_eq!(list.followup_timestamp(), None);
    }

    proptest! {
        #[test]
        fn rescanning_is_deterministic(
            steps in prop::collection::vec(prop::collection::vec(0u32..4, 3), 2..6),
            merge in any::<bool>(),
        ) {
            let mut history = InMemoryHistory::new();
            for (day, times) in steps.iter().enumerate() {
                let author = if day % 2 == 0 { "alice" } else { "bob" };
                history.record(author, at(day as u32 + 1, 9), &snapshot(times)).unwrap();
            }
            let options = ChangeListOptions { merge_consecutive: merge, ..Default::default() };

            let first = serde_json::to_string(&build(&history, options.clone())).unwrap();
            let second = serde_json::to_string(&build(&history, options)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
