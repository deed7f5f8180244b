use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attrs::indiv_time_attr;

/// A member of the project team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Stable identity; survives changes to the member's initials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub initials: String,
    pub name: String,
}

impl TeamMember {
    pub fn new(initials: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            initials: initials.into(),
            name: name.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The name of this member's individual time attribute.
    pub fn time_attr(&self) -> String {
        indiv_time_attr(&self.initials)
    }
}

/// The team list of one project version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamRoster {
    members: Vec<TeamMember>,
}

impl TeamRoster {
    pub fn new(members: Vec<TeamMember>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn by_initials(&self, initials: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.initials == initials)
    }

    pub fn is_member(&self, initials: &str) -> bool {
        self.by_initials(initials).is_some()
    }

    /// Individual time attribute names for every member.
    pub fn time_attrs(&self) -> BTreeSet<String> {
        self.members.iter().map(TeamMember::time_attr).collect()
    }

    /// Display name for the given initials, falling back to the initials.
    pub fn display_name(&self, initials: &str) -> String {
        self.by_initials(initials)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| initials.to_string())
    }

    /// Resolve a person reference that may be either initials or a full name.
    pub fn resolve_person(&self, who: &str) -> String {
        let who = who.trim();
        match self.by_initials(who) {
            Some(member) => member.name.clone(),
            None => who.to_string(),
        }
    }

    /// Initials that changed between `older` and this roster, for members
    /// matched by stable id. Maps old initials to new initials.
    pub fn initials_changes(&self, older: &TeamRoster) -> BTreeMap<String, String> {
        let current: BTreeMap<&str, &str> = self
            .members
            .iter()
            .filter_map(|m| m.id.as_deref().map(|id| (id, m.initials.as_str())))
            .collect();

        older
            .members
            .iter()
            .filter_map(|old| {
                let id = old.id.as_deref()?;
                let new_initials = current.get(id)?;
                (old.initials != *new_initials)
                    .then(|| (old.initials.clone(), new_initials.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> TeamRoster {
        TeamRoster::new(vec![
            TeamMember::new("ab", "Alice Brown").with_id("m1"),
            TeamMember::new("cd", "Carl Diaz").with_id("m2"),
        ])
    }

    #[test]
    fn lookup_by_initials() {
        let team = roster();
        assert_eq!(team.display_name("ab"), "Alice Brown");
        assert_eq!(team.display_name("zz"), "zz");
        assert!(team.is_member("cd"));
        assert!(!team.is_member("Carl Diaz"));
    }

    #[test]
    fn resolve_person_accepts_names() {
        let team = roster();
        assert_eq!(team.resolve_person("cd"), "Carl Diaz");
        assert_eq!(team.resolve_person("Someone Else"), "Someone Else");
    }

    #[test]
    fn time_attrs_follow_initials() {
        let attrs = roster().time_attrs();
        assert!(attrs.contains("ab-Time"));
        assert!(attrs.contains("cd-Time"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn initials_changes_matched_by_id() {
        let older = roster();
        let newer = TeamRoster::new(vec![
            TeamMember::new("abr", "Alice Brown").with_id("m1"),
            TeamMember::new("cd", "Carl Diaz").with_id("m2"),
            TeamMember::new("ef", "Eve Fox"),
        ]);
        let changes = newer.initials_changes(&older);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("ab").map(String::as_str), Some("abr"));
    }

    #[test]
    fn serde_as_plain_list() {
        let json = r#"[{"initials":"ab","name":"Alice Brown"}]"#;
        let team: TeamRoster = serde_json::from_str(json).unwrap();
        assert_eq!(team.members().len(), 1);
        assert_eq!(team.members()[0].id, None);
    }
}
