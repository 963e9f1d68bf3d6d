//! Concurrent fan-out of probes over the roster and fold into suspensions.
//!
//! Every distinct username is probed exactly once on a bounded pool of
//! tasks. Aggregation starts only after all probes have finished, so the
//! resulting [`SuspendedTree`] never depends on completion order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::probe::{AccountStatus, ProbeResult, StatusProbe};
use crate::roster::Roster;

/// Latest probe result per username for one run.
pub type ResultIndex = HashMap<String, ProbeResult>;

/// Suspended usernames grouped by group and project display names.
///
/// Groups and projects keep the order in which the roster walk first
/// produced a suspension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuspendedTree {
    groups: Vec<SuspendedGroup>,
}

/// Suspended accounts within one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedGroup {
    /// Group display name.
    pub name: String,
    /// Projects with at least one suspension.
    pub projects: Vec<SuspendedProject>,
}

/// Suspended accounts within one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedProject {
    /// Project display name.
    pub name: String,
    /// Suspended usernames in roster order.
    pub usernames: Vec<String>,
}

impl SuspendedTree {
    /// Whether no suspension was recorded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in insertion order.
    pub fn groups(&self) -> &[SuspendedGroup] {
        &self.groups
    }

    /// Append `username` under `group`/`project`, creating either on first use.
    pub fn insert(&mut self, group: &str, project: &str, username: &str) {
        let group_idx = match self.groups.iter().position(|g| g.name == group) {
            Some(idx) => idx,
            None => {
                self.groups.push(SuspendedGroup {
                    name: group.to_owned(),
                    projects: Vec::new(),
                });
                self.groups.len().saturating_sub(1)
            }
        };
        let Some(entry) = self.groups.get_mut(group_idx) else {
            return;
        };

        match entry.projects.iter_mut().find(|p| p.name == project) {
            Some(existing) => existing.usernames.push(username.to_owned()),
            None => entry.projects.push(SuspendedProject {
                name: project.to_owned(),
                usernames: vec![username.to_owned()],
            }),
        }
    }

    /// Usernames recorded under `group`/`project`.
    pub fn get(&self, group: &str, project: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.name == group)?
            .projects
            .iter()
            .find(|p| p.name == project)
            .map(|p| p.usernames.as_slice())
    }

    /// Number of (project, username) entries in the tree.
    pub fn entry_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.projects.iter())
            .map(|p| p.usernames.len())
            .sum()
    }
}

impl Serialize for SuspendedTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.name, &ProjectsView(&group.projects))?;
        }
        map.end()
    }
}

struct ProjectsView<'a>(&'a [SuspendedProject]);

impl Serialize for ProjectsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for project in self.0 {
            map.serialize_entry(&project.name, &project.usernames)?;
        }
        map.end()
    }
}

/// Everything one reconciliation pass produced.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Result per distinct username.
    pub results: ResultIndex,
    /// Suspensions folded back into the roster shape.
    pub suspended: SuspendedTree,
}

/// Per-status counts over a [`ResultIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Accounts classified active.
    pub active: usize,
    /// Accounts classified suspended.
    pub suspended: usize,
    /// Accounts with no definitive answer.
    pub errored: usize,
}

impl RunSummary {
    /// Count statuses in `results`.
    pub fn from_results(results: &ResultIndex) -> Self {
        let count = |status: AccountStatus| results.values().filter(|r| r.status == status).count();
        Self {
            active: count(AccountStatus::Active),
            suspended: count(AccountStatus::Suspended),
            errored: count(AccountStatus::Error),
        }
    }
}

impl Reconciliation {
    /// Per-status counts for this pass.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.results)
    }

    /// Usernames that ended in `Error`, sorted.
    pub fn errored_usernames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .results
            .values()
            .filter(|r| r.status == AccountStatus::Error)
            .map(|r| r.username.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// Drives probes for a whole roster.
pub struct Reconciler {
    probe: Arc<StatusProbe>,
    workers: usize,
}

impl Reconciler {
    /// Create a reconciler running at most `workers` probes at once.
    pub fn new(probe: StatusProbe, workers: usize) -> Self {
        Self {
            probe: Arc::new(probe),
            workers: workers.max(1),
        }
    }

    /// Probe every distinct username once and wait for all of them.
    ///
    /// The returned index has an entry for every roster username. A probe
    /// task that dies without a result is recorded as `Error`.
    pub async fn probe_all(&self, roster: &Roster) -> ResultIndex {
        let usernames = roster.usernames();
        let semaphore = Arc::new(Semaphore::new(self.workers));

        info!(
            usernames = usernames.len(),
            workers = self.workers,
            "probing accounts"
        );

        let handles: Vec<(String, JoinHandle<ProbeResult>)> = usernames
            .into_iter()
            .map(|username| {
                let probe = Arc::clone(&self.probe);
                let semaphore = Arc::clone(&semaphore);
                let task_username = username.clone();
                let handle = tokio::spawn(async move {
                    // Never closed, so acquire cannot fail.
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = probe.probe(&task_username).await;
                    debug!(
                        username = %result.username,
                        status = %result.status,
                        attempts = result.attempts,
                        "probe complete"
                    );
                    result
                });
                (username, handle)
            })
            .collect();

        let mut index = ResultIndex::with_capacity(handles.len());
        for (username, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(username = %username, error = %e, "probe task failed");
                    ProbeResult {
                        username: username.clone(),
                        status: AccountStatus::Error,
                        attempts: 0,
                    }
                }
            };
            index.insert(username, result);
        }
        index
    }

    /// Run one full pass and keep the per-username results.
    pub async fn run(&self, roster: &Roster) -> Reconciliation {
        let results = self.probe_all(roster).await;
        let suspended = fold_suspended(roster, &results);
        Reconciliation { results, suspended }
    }

    /// Run one full pass and return only the suspensions.
    pub async fn reconcile(&self, roster: &Roster) -> SuspendedTree {
        self.run(roster).await.suspended
    }
}

/// Walk the roster and collect every entry whose username is suspended.
///
/// Usernames missing from `results` are treated as unknown, never suspended.
pub fn fold_suspended(roster: &Roster, results: &ResultIndex) -> SuspendedTree {
    let mut tree = SuspendedTree::default();
    for (group, project, username) in roster.entries() {
        let suspended = results
            .get(username)
            .is_some_and(|r| r.status == AccountStatus::Suspended);
        if suspended {
            tree.insert(&group.name, &project.name, username);
        }
    }
    tree
}
