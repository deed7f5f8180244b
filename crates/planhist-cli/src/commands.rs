use std::fmt::Write as _;

use colored::Colorize;

use planhist_blame::{BlameData, BlameNodeData, BlameOptions, BlameScanner};
use planhist_changes::{ChangeListBuilder, ChangeListOptions, ChangeRow, ProjectChangeList};
use planhist_history::{DirectoryHistory, VersionHistory};
use planhist_types::{NodeId, ProjectSnapshot, TreeKind};

use crate::cli::*;
use crate::config::Config;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Changes(ref args) => cmd_changes(&cli, args),
        Command::Blame(ref args) => cmd_blame(&cli, args),
    }
}

fn cmd_changes(cli: &Cli, args: &ChangesArgs) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref(), &args.dir)?;
    let history = DirectoryHistory::open(&args.dir)?;
    let options = changes_options(config.changes.clone(), args);
    let context = config.context();
    let list = ChangeListBuilder::new(options, &context).build(&history)?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list)?),
        OutputFormat::Text => print!("{}", render_changes(&list)),
    }
    Ok(())
}

fn cmd_blame(cli: &Cli, args: &BlameArgs) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref(), &args.dir)?;
    let history = DirectoryHistory::open(&args.dir)?;
    let options = blame_options(config.blame.clone(), args);
    let context = config.context();
    let data = BlameScanner::new(options, &context).scan(&history)?;
    let node = args.node.map(NodeId::new);

    match cli.format {
        OutputFormat::Json => match node {
            Some(id) => {
                let nodes: Vec<(TreeKind, Option<&BlameNodeData>)> = TreeKind::ALL
                    .iter()
                    .map(|kind| (*kind, data.node(*kind, id)))
                    .filter(|(_, found)| found.is_some())
                    .collect();
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            }
            None => println!("{}", serde_json::to_string_pretty(&data)?),
        },
        OutputFormat::Text => {
            let latest = latest_snapshot(&history);
            print!("{}", render_blame(&data, latest.as_ref(), node));
        }
    }
    Ok(())
}

fn changes_options(mut options: ChangeListOptions, args: &ChangesArgs) -> ChangeListOptions {
    if let Some(min) = args.min {
        options.min_changes = min;
    }
    if let Some(before) = args.before {
        options.on_or_before = Some(before);
    }
    if let Some(offset) = args.utc_offset {
        options.utc_offset_minutes = offset;
    }
    options.force_full_days |= args.full_days;
    options.merge_consecutive |= args.merge;
    options
}

fn blame_options(mut options: BlameOptions, args: &BlameArgs) -> BlameOptions {
    if let Some(since) = args.since {
        options.since = Some(since);
    }
    if args.workflows && !options.trees.contains(&TreeKind::Workflows) {
        options.trees.push(TreeKind::Workflows);
    }
    options
}

/// The newest retained snapshot, used only to label nodes.
fn latest_snapshot<H: VersionHistory>(history: &H) -> Option<ProjectSnapshot> {
    let versions = history.versions_oldest_first().ok()?;
    versions
        .iter()
        .rev()
        .find_map(|v| history.fetch_snapshot(&v.id).ok())
}

fn render_row(row: &ChangeRow) -> String {
    let indent = "  ".repeat(row.indent + 1);
    let marker = match row.icon.as_deref() {
        Some("node-added" | "person-added") => "+".green(),
        Some("node-deleted" | "person-removed") => "-".red(),
        Some("node-moved" | "node-renamed" | "time-changed") => "~".yellow(),
        _ => " ".normal(),
    };
    if row.indent == 0 {
        format!("{indent}{}", row.message.bold())
    } else {
        format!("{indent}{marker} {}", row.message)
    }
}

pub fn render_changes(list: &ProjectChangeList) -> String {
    let mut out = String::new();
    if list.is_empty() {
        out.push_str("No changes.\n");
        return out;
    }
    for change in list.iter() {
        let when = change.timestamp().format("%Y-%m-%d %H:%M");
        let _ = writeln!(out, "{} {}", when.to_string().dimmed(), change.author().yellow());
        for row in change.rows() {
            let _ = writeln!(out, "{}", render_row(&row));
        }
    }
    if let Some(next) = list.followup_timestamp() {
        let _ = writeln!(
            out,
            "\nMore changes available: rerun with {}",
            format!("--before {}", next.to_rfc3339()).cyan()
        );
    }
    out
}

pub fn render_blame(
    data: &BlameData,
    latest: Option<&ProjectSnapshot>,
    only: Option<NodeId>,
) -> String {
    let mut out = String::new();
    for kind in TreeKind::ALL {
        let Some(model) = data.model(kind) else {
            continue;
        };
        for (id, node) in model.iter() {
            if only.is_some_and(|wanted| wanted != id) || node.is_empty() {
                continue;
            }
            let path = latest
                .map(|s| s.tree(kind))
                .filter(|tree| tree.contains(id))
                .map(|tree| tree.path(id))
                .unwrap_or_default();
            let _ = writeln!(out, "{} {} {}", kind.to_string().dimmed(), id.to_string().yellow(), path.bold());
            render_node(&mut out, node);
        }
    }
    if out.is_empty() {
        out.push_str("No blame recorded.\n");
    }
    out
}

fn render_node(out: &mut String, node: &BlameNodeData) {
    if let Some(point) = node.added_by() {
        let _ = writeln!(out, "  {} {point}", "added by".green());
    }
    for (child, deleted) in node.deleted_children() {
        let _ = writeln!(
            out,
            "  {} {} ({child}) {}",
            "deleted".red(),
            deleted.name,
            deleted.point
        );
    }
    for (attr, values) in node.attributes() {
        let _ = writeln!(out, "  {}", attr.cyan());
        for entry in values.entries() {
            let value = entry.value.as_deref().unwrap_or("(none)");
            let _ = writeln!(out, "    {value}  {}", entry.point.to_string().dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use planhist_history::InMemoryHistory;
    use planhist_types::{ReportContext, SnapshotBuilder, TeamMember, TeamRoster};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, 9, 0, 0).unwrap()
    }

    fn snapshot(extra: bool, hours: &str) -> ProjectSnapshot {
        let mut builder = SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, "Design")
            .attr(1, "ab-Time", hours);
        if extra {
            builder = builder.node(NodeId::ROOT, 2, "Review");
        }
        let team = TeamRoster::new(vec![TeamMember::new("ab", "Alice Brown")]);
        ProjectSnapshot::new(team, builder.build().unwrap())
    }

    fn history() -> InMemoryHistory {
        let mut history = InMemoryHistory::new();
        history.record("alice", at(1), &snapshot(false, "1")).unwrap();
        history.record("bob", at(2), &snapshot(true, "3")).unwrap();
        history
    }

    #[test]
    fn renders_change_rows() {
        colored::control::set_override(false);
        let context = ReportContext::default();
        let list = ChangeListBuilder::new(ChangeListOptions::default(), &context)
            .build(&history())
            .unwrap();
        let text = render_changes(&list);

        assert!(text.contains("2024-08-02 09:00 bob"));
        assert!(text.contains("+ added Review"));
        assert!(text.contains("time estimate for Alice Brown changed from 1 to 3."));
    }

    #[test]
    fn renders_blame_for_one_node() {
        colored::control::set_override(false);
        let context = ReportContext::default();
        let history = history();
        let data = BlameScanner::new(BlameOptions::default(), &context)
            .scan(&history)
            .unwrap();
        let latest = latest_snapshot(&history);
        let text = render_blame(&data, latest.as_ref(), Some(NodeId::new(2)));

        assert!(text.contains("wbs #2 /Review"));
        assert!(text.contains("added by bob @ 2024-08-02 09:00"));
        assert!(!text.contains("#1"));
    }

    #[test]
    fn flags_override_config() {
        let config = ChangeListOptions {
            min_changes: 5,
            utc_offset_minutes: 60,
            ..Default::default()
        };
        let args = ChangesArgs {
            dir: "hist".into(),
            min: Some(2),
            full_days: true,
            merge: false,
            before: None,
            utc_offset: None,
        };
        let options = changes_options(config, &args);
        assert_eq!(options.min_changes, 2);
        assert_eq!(options.utc_offset_minutes, 60);
        assert!(options.force_full_days);
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(render_changes(&ProjectChangeList::default()), "No changes.\n");
    }
}
