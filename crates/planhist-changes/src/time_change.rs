use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use planhist_diff::ProjectDiff;
use planhist_types::attrs::{format_number, nearly_equal};
use planhist_types::{NodeId, TypeResult};

use crate::change::{ChangeRow, NodeRef};

/// How one person's time on a node changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeCategory {
    Added,
    Deleted,
    Changed,
    Unchanged,
    /// Assigned before and after, with zero time.
    Zero,
}

impl TimeCategory {
    fn icon(self) -> &'static str {
        match self {
            Self::Added => "person-added",
            Self::Deleted => "person-removed",
            Self::Changed => "time-changed",
            Self::Unchanged | Self::Zero => "person",
        }
    }
}

/// One person's time on a node before and after a transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndivTime {
    pub initials: String,
    pub name: String,
    pub old_time: Option<f64>,
    pub new_time: Option<f64>,
    pub category: TimeCategory,
}

impl IndivTime {
    /// Returns `None` when the person held no time before or after.
    pub fn new(
        initials: impl Into<String>,
        name: impl Into<String>,
        old_time: Option<f64>,
        new_time: Option<f64>,
    ) -> Option<Self> {
        let category = match (old_time, new_time) {
            (None, None) => return None,
            (None, Some(_)) => TimeCategory::Added,
            (Some(_), None) => TimeCategory::Deleted,
            (Some(old), Some(new)) if nearly_equal(old, new) => {
                if nearly_equal(old, 0.0) {
                    TimeCategory::Zero
                } else {
                    TimeCategory::Unchanged
                }
            }
            (Some(_), Some(_)) => TimeCategory::Changed,
        };
        Some(Self {
            initials: initials.into(),
            name: name.into(),
            old_time,
            new_time,
            category,
        })
    }
}

impl fmt::Display for IndivTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |t: Option<f64>| format_number(t.unwrap_or(0.0));
        match self.category {
            TimeCategory::Added => write!(f, "{} ({})", self.name, show(self.new_time)),
            TimeCategory::Changed => write!(
                f,
                "{} ({} -> {})",
                self.name,
                show(self.old_time),
                show(self.new_time)
            ),
            _ => write!(f, "{} ({})", self.name, show(self.old_time)),
        }
    }
}

/// A change to the time estimates of one node, or a summary of the
/// changes to several of its descendants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectTimeChange {
    pub node: NodeRef,
    /// Everyone credited with the change, comma separated.
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub is_last_change: bool,
    pub old_total: f64,
    pub new_total: f64,
    /// Ordered by initials.
    pub times: Vec<IndivTime>,
    /// The changes this record summarizes; empty for a single node.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<ProjectTimeChange>,
    pub description: String,
    #[serde(skip)]
    authors: BTreeSet<String>,
}

impl ProjectTimeChange {
    /// Describe the time change of one edited node.
    ///
    /// Added and deleted assignments are credited to the version author. A
    /// changed time is credited to the member whose time it is when the new
    /// value matches their synchronized time.
    pub fn from_edit(node: NodeRef, diff: &ProjectDiff, label: &str) -> TypeResult<Self> {
        let id = node.id;
        let old = diff.base().member_times(id)?;
        let new = diff.modified().member_times(id)?;
        let initials: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

        let mut authors = BTreeSet::new();
        let mut times = Vec::new();
        for initials in initials {
            let Some(time) = IndivTime::new(
                initials.as_str(),
                diff.member_name(initials),
                old.get(initials).copied(),
                new.get(initials).copied(),
            ) else {
                continue;
            };
            match time.category {
                TimeCategory::Added | TimeCategory::Deleted => {
                    authors.insert(diff.author().to_string());
                }
                TimeCategory::Changed => {
                    if diff.modified().is_synchronized(id, initials)? {
                        authors.insert(time.name.clone());
                    } else {
                        authors.insert(diff.author().to_string());
                    }
                }
                TimeCategory::Unchanged | TimeCategory::Zero => {}
            }
            times.push(time);
        }
        if authors.is_empty() {
            authors.insert(diff.author().to_string());
        }

        let old_total = total(&old, diff.base().total_time(id)?);
        let new_total = total(&new, diff.modified().total_time(id)?);
        Ok(Self::assemble(
            node,
            diff.timestamp(),
            authors,
            times,
            (old_total, new_total),
            Vec::new(),
            label,
        ))
    }

    /// Combine the changes of several descendants into one record at `node`.
    pub fn summarize(node: NodeRef, subtasks: Vec<ProjectTimeChange>, label: &str) -> Self {
        let mut sums: BTreeMap<String, (String, Option<f64>, Option<f64>)> = BTreeMap::new();
        let mut authors = BTreeSet::new();
        let (mut old_total, mut new_total) = (0.0, 0.0);
        let mut timestamp = DateTime::<Utc>::MIN_UTC;

        for change in &subtasks {
            for time in &change.times {
                let entry = sums
                    .entry(time.initials.clone())
                    .or_insert_with(|| (time.name.clone(), None, None));
                entry.1 = add_time(entry.1, time.old_time);
                entry.2 = add_time(entry.2, time.new_time);
            }
            authors.extend(change.authors.iter().cloned());
            old_total += change.old_total;
            new_total += change.new_total;
            timestamp = timestamp.max(change.timestamp);
        }

        let times = sums
            .into_iter()
            .filter_map(|(initials, (name, old, new))| IndivTime::new(initials, name, old, new))
            .collect();
        Self::assemble(
            node,
            timestamp,
            authors,
            times,
            (old_total, new_total),
            subtasks,
            label,
        )
    }

    fn assemble(
        node: NodeRef,
        timestamp: DateTime<Utc>,
        authors: BTreeSet<String>,
        times: Vec<IndivTime>,
        (old_total, new_total): (f64, f64),
        subtasks: Vec<ProjectTimeChange>,
        label: &str,
    ) -> Self {
        let description = describe(&times, old_total, new_total, !subtasks.is_empty(), label);
        Self {
            node,
            author: authors.iter().cloned().collect::<Vec<_>>().join(", "),
            timestamp,
            is_last_change: false,
            old_total,
            new_total,
            times,
            subtasks,
            description,
            authors,
        }
    }

    /// Credit this record to the authors of a change it already accounts for.
    pub(crate) fn credit(&mut self, other: &ProjectTimeChange) {
        self.authors.extend(other.authors.iter().cloned());
        self.author = self.authors.iter().cloned().collect::<Vec<_>>().join(", ");
        self.timestamp = self.timestamp.max(other.timestamp);
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn authors(&self) -> &BTreeSet<String> {
        &self.authors
    }

    pub fn is_summary(&self) -> bool {
        !self.subtasks.is_empty()
    }

    pub fn rows(&self) -> Vec<ChangeRow> {
        let group = Some(self.node.id);
        let mut rows = vec![ChangeRow {
            indent: 0,
            icon: Some("time".to_string()),
            message: format!("{}: {}", self.node.path, self.description),
            group,
        }];
        rows.extend(
            self.times
                .iter()
                .filter(|t| t.category != TimeCategory::Unchanged)
                .map(|t| ChangeRow {
                    indent: 1,
                    icon: Some(t.category.icon().to_string()),
                    message: t.to_string(),
                    group,
                }),
        );
        rows
    }
}

/// The larger of the summed individual times and the node's aggregate.
fn total(times: &BTreeMap<String, f64>, aggregate: f64) -> f64 {
    times.values().sum::<f64>().max(aggregate)
}

fn add_time(sum: Option<f64>, time: Option<f64>) -> Option<f64> {
    match (sum, time) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

fn in_categories<'a>(times: &'a [IndivTime], categories: &[TimeCategory]) -> Vec<&'a IndivTime> {
    times
        .iter()
        .filter(|t| categories.contains(&t.category))
        .collect()
}

fn join(times: &[&IndivTime]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(
    times: &[IndivTime],
    old_total: f64,
    new_total: f64,
    summary: bool,
    label: &str,
) -> String {
    let of = |categories: &[TimeCategory]| in_categories(times, categories);
    let added = of(&[TimeCategory::Added]);
    let deleted = of(&[TimeCategory::Deleted]);
    let changed = of(&[TimeCategory::Changed]);
    let unchanged = of(&[TimeCategory::Unchanged]);
    let subject = if summary { "subtasks " } else { "" };

    let mut parts = Vec::new();
    match (added.is_empty(), deleted.is_empty()) {
        (true, true) => {}
        (false, true) => parts.push(format!("{subject}assigned to {}.", join(&added))),
        (true, false) => parts.push(format!("{subject}unassigned from {}.", join(&deleted))),
        (false, false) => parts.push(format!(
            "{subject}reassigned from {} to {}.",
            join(&deleted),
            join(&added)
        )),
    }

    if let [only] = changed.as_slice() {
        parts.push(format!(
            "{label} for {} changed from {} to {}.",
            only.name,
            format_number(only.old_time.unwrap_or(0.0)),
            format_number(only.new_time.unwrap_or(0.0))
        ));
    } else if changed.len() > 1 && unchanged.is_empty() {
        let active = of(&[TimeCategory::Added, TimeCategory::Changed, TimeCategory::Zero]);
        parts.push(format!(
            "{label} changed from {} to {}: {}.",
            format_number(old_total),
            format_number(new_total),
            join(&active)
        ));
    } else if changed.len() > 1 {
        parts.push(format!("{label}s changed {}.", join(&changed)));
    } else if parts.is_empty() && !nearly_equal(old_total, new_total) {
        parts.push(format!(
            "{label} changed from {} to {}.",
            format_number(old_total),
            format_number(new_total)
        ));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(initials: &str, old: Option<f64>, new: Option<f64>) -> IndivTime {
        IndivTime::new(initials, initials.to_uppercase(), old, new).unwrap()
    }

    #[test]
    fn categories() {
        assert!(IndivTime::new("ab", "AB", None, None).is_none());
        assert_eq!(time("ab", None, Some(2.0)).category, TimeCategory::Added);
        assert_eq!(time("ab", Some(2.0), None).category, TimeCategory::Deleted);
        assert_eq!(time("ab", Some(2.0), Some(3.0)).category, TimeCategory::Changed);
        assert_eq!(time("ab", Some(2.0), Some(2.0)).category, TimeCategory::Unchanged);
        assert_eq!(time("ab", Some(0.0), Some(0.0)).category, TimeCategory::Zero);
    }

    #[test]
    fn display_shows_relevant_values() {
        assert_eq!(time("ab", None, Some(2.0)).to_string(), "AB (2)");
        assert_eq!(time("ab", Some(2.0), Some(3.5)).to_string(), "AB (2 -> 3.5)");
        assert_eq!(time("ab", Some(4.0), None).to_string(), "AB (4)");
    }

    #[test]
    fn describes_reassignment() {
        let times = vec![time("ab", Some(3.0), None), time("cd", None, Some(3.0))];
        assert_eq!(
            describe(&times, 3.0, 3.0, false, "time estimate"),
            "reassigned from AB (3) to CD (3)."
        );
        assert_eq!(
            describe(&times, 3.0, 3.0, true, "time estimate"),
            "subtasks reassigned from AB (3) to CD (3)."
        );
    }

    #[test]
    fn describes_single_and_multiple_time_changes() {
        let one = vec![time("ab", Some(2.0), Some(4.0)), time("cd", Some(1.0), Some(1.0))];
        assert_eq!(
            describe(&one, 3.0, 5.0, false, "time estimate"),
            "time estimate for AB changed from 2 to 4."
        );

        let all = vec![time("ab", Some(2.0), Some(4.0)), time("cd", Some(1.0), Some(2.0))];
        assert_eq!(
            describe(&all, 3.0, 6.0, false, "Plan Time"),
            "Plan Time changed from 3 to 6: AB (2 -> 4), CD (1 -> 2)."
        );

        let mut some = all.clone();
        some.push(time("ef", Some(5.0), Some(5.0)));
        assert_eq!(
            describe(&some, 8.0, 11.0, false, "time estimate"),
            "time estimates changed AB (2 -> 4), CD (1 -> 2)."
        );
    }

    #[test]
    fn describes_bare_total_change() {
        assert_eq!(
            describe(&[], 10.0, 12.0, false, "time estimate"),
            "time estimate changed from 10 to 12."
        );
    }

    #[test]
    fn summary_sums_subtasks() {
        let node = |id: i32| NodeRef {
            id: NodeId::new(id),
            name: format!("N{id}"),
            path: format!("/N{id}"),
            position: vec![id as usize],
        };
        let at = DateTime::<Utc>::MIN_UTC;
        let child = |id: i32, author: &str, old: f64, new: f64| {
            ProjectTimeChange::assemble(
                node(id),
                at,
                BTreeSet::from([author.to_string()]),
                vec![time("ab", Some(old), Some(new))],
                (old, new),
                Vec::new(),
                "time estimate",
            )
        };

        let summary = ProjectTimeChange::summarize(
            node(1),
            vec![child(2, "bob", 2.0, 4.0), child(3, "Alice Brown", 1.0, 2.0)],
            "time estimate",
        );
        assert!(summary.is_summary());
        assert_eq!(summary.author, "Alice Brown, bob");
        assert_eq!((summary.old_total, summary.new_total), (3.0, 6.0));
        assert_eq!(summary.times.len(), 1);
        assert_eq!(summary.times[0].new_time, Some(6.0));
        assert_eq!(
            summary.description,
            "time estimate for AB changed from 3 to 6."
        );
    }
}
