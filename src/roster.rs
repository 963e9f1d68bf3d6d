//! Roster of monitored accounts, grouped by group and project.
//!
//! The roster is loaded once from `roster.toml` and is read-only for the rest
//! of the run. Groups and projects are keyed by short identifiers and carry a
//! human-readable display name used in alerts.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

/// Longest login GitHub accepts.
const MAX_USERNAME_LEN: usize = 39;

/// The full group → project → usernames hierarchy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    /// Groups keyed by their identifier, in file order.
    #[serde(default)]
    pub groups: IndexMap<String, GroupEntry>,
}

/// A named group of projects.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupEntry {
    /// Display name used in alerts.
    pub name: String,

    /// Projects keyed by their identifier, in file order.
    #[serde(default)]
    pub projects: IndexMap<String, ProjectEntry>,
}

/// A named project with the accounts that belong to it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEntry {
    /// Display name used in alerts.
    pub name: String,

    /// GitHub logins, in roster order.
    #[serde(alias = "Github Username")]
    pub github_usernames: Vec<String>,
}

/// One place a username appears in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Membership {
    /// Group display name.
    pub group: String,
    /// Project display name.
    pub project: String,
}

impl Roster {
    /// Parse a roster from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML, lacks required fields,
    /// or fails validation.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let roster: Roster = toml::from_str(toml_str).context("failed to parse roster")?;
        roster.validate()?;
        Ok(roster)
    }

    /// Reject rosters that cannot be reconciled safely.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending group, project or username.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.groups.is_empty(), "roster defines no groups");
        for (group_key, group) in &self.groups {
            anyhow::ensure!(
                !group.name.trim().is_empty(),
                "group '{group_key}' has an empty name"
            );
            for (project_key, project) in &group.projects {
                anyhow::ensure!(
                    !project.name.trim().is_empty(),
                    "project '{group_key}.{project_key}' has an empty name"
                );
                for username in &project.github_usernames {
                    anyhow::ensure!(
                        is_valid_username(username),
                        "project '{group_key}.{project_key}' lists invalid GitHub username '{username}'"
                    );
                }
            }
        }
        Ok(())
    }

    /// Iterate every (group, project, username) triple in roster order.
    pub fn entries(&self) -> impl Iterator<Item = (&GroupEntry, &ProjectEntry, &str)> + '_ {
        self.groups.values().flat_map(|group| {
            group.projects.values().flat_map(move |project| {
                project
                    .github_usernames
                    .iter()
                    .map(move |username| (group, project, username.as_str()))
            })
        })
    }

    /// Distinct usernames in first-seen order.
    pub fn usernames(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries()
            .filter(|(_, _, username)| seen.insert(*username))
            .map(|(_, _, username)| username.to_owned())
            .collect()
    }

    /// Map each username to every (group, project) pair that lists it.
    pub fn memberships(&self) -> HashMap<String, Vec<Membership>> {
        let mut map: HashMap<String, Vec<Membership>> = HashMap::new();
        for (group, project, username) in self.entries() {
            map.entry(username.to_owned()).or_default().push(Membership {
                group: group.name.clone(),
                project: project.name.clone(),
            });
        }
        map
    }

    /// Total number of project entries across all groups.
    pub fn project_count(&self) -> usize {
        self.groups.values().map(|g| g.projects.len()).sum()
    }
}

/// Load and validate a roster from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_roster(path: &Path) -> anyhow::Result<Roster> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster at {}", path.display()))?;
    Roster::from_toml(&contents).with_context(|| format!("invalid roster at {}", path.display()))
}

/// Whether `username` is a syntactically valid GitHub login.
///
/// Logins are alphanumerics separated by single hyphens, at most 39 characters.
pub fn is_valid_username(username: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").ok());
    username.len() <= MAX_USERNAME_LEN && pattern.as_ref().is_some_and(|re| re.is_match(username))
}
