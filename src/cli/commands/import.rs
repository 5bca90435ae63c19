//! Implementation of the `annotask import` command.
//!
//! Loads collaborator data from a YAML file:
//!
//! ```yaml
//! projects:
//!   - title: Sentiment
//! tags:
//!   - slug: medical
//!     name: Medical
//! workers:
//!   - email: ann@example.com
//!     status: approved
//!     grants:
//!       - tag: medical
//!         status: verified
//! tasks:
//!   - project: Sentiment
//!     count: 5
//! memberships:
//!   - project: Sentiment
//!     worker: ann@example.com
//! ```
//!
//! Projects are referenced by title and workers by email. The reactor is
//! suspended for the load and each touched project gets one top-up at the end.
//! Every touched project is also recorded as an `updated` pool change.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::domain::models::{
    ApprovalStatus, Config, ExperienceTier, ExpertiseGrant, ExpertiseTag, GrantStatus, PoolMembership, Project,
    Task, Worker,
};
use crate::domain::ports::{DirectoryStore, PoolChangeLog};
use crate::services::{MembershipChange, TopUpOutcome};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// YAML file to load
    pub file: PathBuf,

    /// Load data without running assignment top-ups
    #[arg(long)]
    pub no_assign: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportFile {
    pub projects: Vec<ProjectEntry>,
    pub tags: Vec<TagEntry>,
    pub workers: Vec<WorkerEntry>,
    pub tasks: Vec<TaskEntry>,
    pub memberships: Vec<MembershipEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectEntry {
    pub id: Option<Uuid>,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct TagEntry {
    pub slug: String,
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct WorkerEntry {
    pub id: Option<Uuid>,
    pub email: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_tier")]
    pub tier: String,
    #[serde(default)]
    pub grants: Vec<GrantEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GrantEntry {
    pub tag: String,
    #[serde(default = "default_grant_status")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    pub project: String,
    #[serde(default = "default_count")]
    pub count: u32,
    pub required_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipEntry {
    pub project: String,
    pub worker: String,
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn default_status() -> String {
    "approved".to_string()
}

fn default_tier() -> String {
    "novice".to_string()
}

fn default_grant_status() -> String {
    "verified".to_string()
}

fn default_count() -> u32 {
    1
}

impl ImportFile {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ImportOutput {
    pub projects: usize,
    pub tags: usize,
    pub workers: usize,
    pub grants: usize,
    pub tasks: usize,
    pub memberships: usize,
    pub project_ids: HashMap<String, Uuid>,
    pub top_ups: Vec<TopUpOutcome>,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Imported {} projects, {} tags, {} workers, {} grants, {} tasks, {} memberships",
            self.projects, self.tags, self.workers, self.grants, self.tasks, self.memberships
        )];
        for (title, id) in &self.project_ids {
            lines.push(format!("  {title}: {id}"));
        }
        if !self.top_ups.is_empty() {
            let mut t = table(["PROJECT", "STATUS", "CREATED", "ERROR"]);
            for o in &self.top_ups {
                t.add_row(vec![
                    short_id(&o.project_id),
                    o.status.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    o.created_count.to_string(),
                    o.error.clone().unwrap_or_default(),
                ]);
            }
            lines.push(t.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Write the file's contents through `directory`. Returns the counts and
/// the set of projects whose pool or tasks changed.
pub async fn load<D: DirectoryStore>(directory: &D, file: &ImportFile) -> Result<(ImportOutput, BTreeSet<Uuid>)> {
    let mut out = ImportOutput::default();
    let mut touched = BTreeSet::new();

    for entry in &file.projects {
        let mut project = Project::new(&entry.title);
        if let Some(id) = entry.id {
            project.id = id;
        }
        directory.upsert_project(&project).await?;
        out.project_ids.insert(entry.title.clone(), project.id);
        out.projects += 1;
    }

    for entry in &file.tags {
        let mut tag = ExpertiseTag::new(&entry.slug, entry.name.as_deref().unwrap_or(&entry.slug));
        tag.active = entry.active;
        directory.upsert_tag(&tag).await?;
        out.tags += 1;
    }

    let mut worker_ids: HashMap<String, Uuid> = HashMap::new();
    for entry in &file.workers {
        let status = ApprovalStatus::from_str(&entry.status)
            .ok_or_else(|| anyhow!("Invalid status '{}' for worker {}", entry.status, entry.email))?;
        let tier = ExperienceTier::from_str(&entry.tier)
            .ok_or_else(|| anyhow!("Invalid tier '{}' for worker {}", entry.tier, entry.email))?;

        let existing = directory.find_worker_by_email(&entry.email).await?;
        let mut worker = Worker::new(&entry.email, status).with_tier(tier);
        if let Some(id) = entry.id.or_else(|| existing.as_ref().map(|w| w.id)) {
            worker.id = id;
        }
        if let Some(existing) = existing {
            worker.created_at = existing.created_at;
        }
        directory.upsert_worker(&worker).await?;
        worker_ids.insert(entry.email.clone(), worker.id);
        out.workers += 1;

        for grant in &entry.grants {
            let grant_status = GrantStatus::from_str(&grant.status)
                .ok_or_else(|| anyhow!("Invalid grant status '{}' for {}", grant.status, entry.email))?;
            let grant = match grant_status {
                GrantStatus::Verified => ExpertiseGrant::verified(worker.id, &grant.tag),
                GrantStatus::Pending => ExpertiseGrant::pending(worker.id, &grant.tag),
            };
            directory
                .upsert_grant(&grant)
                .await
                .with_context(|| format!("Failed to grant '{}' to {}", grant.tag, entry.email))?;
            out.grants += 1;
        }
    }

    for entry in &file.tasks {
        let project_id = lookup(&out.project_ids, &entry.project, "project")?;
        for _ in 0..entry.count {
            let mut task = Task::new(project_id);
            if let Some(tag) = &entry.required_tag {
                task = task.requiring(tag);
            }
            directory
                .insert_task(&task)
                .await
                .with_context(|| format!("Failed to add task to {}", entry.project))?;
            out.tasks += 1;
        }
        touched.insert(project_id);
    }

    for entry in &file.memberships {
        let project_id = lookup(&out.project_ids, &entry.project, "project")?;
        let worker_id = match worker_ids.get(&entry.worker) {
            Some(id) => *id,
            None => directory
                .find_worker_by_email(&entry.worker)
                .await?
                .map(|w| w.id)
                .ok_or_else(|| anyhow!("Unknown worker: {}", entry.worker))?,
        };
        let mut membership = PoolMembership::new(project_id, worker_id);
        if let Some(joined_at) = entry.joined_at {
            membership = membership.joined_at(joined_at);
        }
        membership.active = entry.active;
        directory.upsert_membership(&membership).await?;
        out.memberships += 1;
        touched.insert(project_id);
    }

    Ok((out, touched))
}

fn lookup(ids: &HashMap<String, Uuid>, key: &str, kind: &str) -> Result<Uuid> {
    match ids.get(key) {
        Some(id) => Ok(*id),
        None => match Uuid::parse_str(key) {
            Ok(id) => Ok(id),
            Err(_) => bail!("Unknown {kind}: {key}"),
        },
    }
}

pub async fn execute(args: ImportArgs, config: &Config, json_mode: bool) -> Result<()> {
    let file = ImportFile::from_path(&args.file).await?;
    let ctx = AppContext::open(config).await?;
    let directory = ctx.directory();
    let reactor = ctx.reactor()?;

    reactor.suspend();
    let (mut out, touched) = load(&directory, &file).await?;
    record_changes(ctx.pool_change_log().as_ref(), &touched).await?;

    if !args.no_assign {
        for project_id in &touched {
            reactor.top_up(*project_id).await?;
        }
    }
    out.top_ups = reactor.resume().await;

    output(&out, json_mode);
    Ok(())
}

/// One `updated` change per touched project.
pub async fn record_changes<L: PoolChangeLog>(log: &L, touched: &BTreeSet<Uuid>) -> Result<()> {
    let now = Utc::now();
    for project_id in touched {
        log.append_pool_change(*project_id, None, MembershipChange::Updated, now)
            .await
            .with_context(|| format!("Failed to record pool change for project {project_id}"))?;
    }
    Ok(())
}
