//! The campaign pipeline: prepare → build → finalize, plus merge-time
//! promotion.
//!
//! All I/O goes through the port traits, so the pipeline is testable
//! against stubs and embeddable without a CLI. The filesystem lock is held
//! from prepare until finalize and released on every exit path: the
//! [`LockGuard`] drop covers abandonment, `finalize` releases explicitly.

use crate::lock::{LockError, LockGuard};
use crate::ports::{GitPort, HostPort, LaunchPort, LaunchSpec, WritePort};
use crate::settings::CampaignSettings;
use crate::snapshot::{load_snapshot, save_snapshot};
use anyhow::Context;
use camino::Utf8PathBuf;
use chrono::Utc;
use synthflow_domain::{
    discover_projects, ChangeSet, Fingerprinter, FingerprintMap, FsRepoView, HistoryView,
    ProjectDecl, VersionAllocator,
};
use synthflow_monitor::{watch, LivenessProbe, MonitorVerdict};
use synthflow_render::{render_report_md, render_status_md};
use synthflow_types::event::MergeEvent;
use synthflow_types::project::{ProjectRecord, ProjectState};
use synthflow_types::report::RunReport;
use synthflow_types::snapshot::RunSnapshot;
use synthflow_types::version::VersionTag;
use tracing::{debug, info, warn};

/// Fatal campaign failures. Per-project build errors are not here: they are
/// recorded in the project's terminal state and never abort siblings.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// A required directory is absent. Raised before lock acquisition.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("cannot resolve reference {0}")]
    BranchResolution(String),

    #[error("merging {source_branch} into {target_branch} conflicts")]
    MergeConflict {
        source_branch: String,
        target_branch: String,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Stable numeric code reported back to the host.
    pub fn code(&self) -> i32 {
        match self {
            CampaignError::Precondition(_) => -1,
            CampaignError::BranchResolution(_) => -2,
            CampaignError::MergeConflict { .. } => -3,
            CampaignError::Lock(_) | CampaignError::Internal(_) => -4,
        }
    }
}

/// Outcome of `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// At least one project queued; `build` should run.
    Ready,
    /// Every project fingerprint is unchanged; approve and stop.
    NothingToDo,
}

/// Exit codes of a whole campaign.
pub const CODE_SUCCESS: i32 = 0;
pub const CODE_NOTHING_TO_DO: i32 = 1;
pub const CODE_BUILD_FAILED: i32 = 2;

/// Aggregate root for one campaign over one merge-request event.
pub struct WorkflowRun {
    settings: CampaignSettings,
    event: MergeEvent,
    report: RunReport,
    /// Declared file sets, index-aligned with `report.projects`.
    decls: Vec<ProjectDecl>,
    tag: Option<VersionTag>,
    lock: Option<LockGuard>,
}

impl WorkflowRun {
    pub fn new(settings: CampaignSettings, event: MergeEvent) -> Self {
        let report = RunReport::new(
            event.request_id,
            &event.source_branch,
            &event.target_branch,
            Utc::now().to_rfc3339(),
        );
        Self {
            settings,
            event,
            report,
            decls: Vec::new(),
            tag: None,
            lock: None,
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn tag(&self) -> Option<&VersionTag> {
        self.tag.as_ref()
    }

    /// Check preconditions, take the lock, integrate the branches, compute
    /// the to-do set and allocate the version tag.
    pub fn prepare(
        &mut self,
        git: &dyn GitPort,
        history: &dyn HistoryView,
        host: &dyn HostPort,
    ) -> Result<Prepared, CampaignError> {
        for (label, dir) in [
            ("repository", &self.settings.repo_root),
            ("revision working area", &self.settings.revision_root),
            ("archive", &self.settings.archive_root),
        ] {
            if !dir.is_dir() {
                return Err(CampaignError::Precondition(format!(
                    "{label} directory {dir} is missing"
                )));
            }
        }

        self.lock = Some(LockGuard::acquire(
            &self.settings.revision_root,
            &self.settings.lock,
        )?);

        git.fetch()?;
        let source_ref = format!("origin/{}", self.event.source_branch);
        let target_ref = format!("origin/{}", self.event.target_branch);
        let Some(baseline_sha) = git.resolve_ref(&target_ref)? else {
            return Err(CampaignError::BranchResolution(target_ref));
        };
        let Some(source_sha) = git.resolve_ref(&source_ref)? else {
            return Err(CampaignError::BranchResolution(source_ref));
        };

        // Dry runs never touch the working tree; the unmerged source tip
        // stands in for the merged revision.
        let head_rev = if self.event.dry_run() {
            info!("dry run, skipping reset and merge");
            source_sha
        } else {
            git.checkout(&self.event.target_branch)?;
            git.reset_hard(&target_ref)?;
            if !git.merge(&source_ref)? {
                return Err(CampaignError::MergeConflict {
                    source_branch: self.event.source_branch.clone(),
                    target_branch: self.event.target_branch.clone(),
                });
            }
            git.head_sha()?
        };

        let repo = FsRepoView::new(self.settings.repo_root.clone());
        let decls = discover_projects(&repo, &self.settings.projects_dir)?;

        let fingerprinter = Fingerprinter::new(history);
        let mut baseline = FingerprintMap::new();
        let mut head = FingerprintMap::new();
        for decl in &decls {
            baseline.insert(
                decl.name.clone(),
                fingerprinter.fingerprint(&baseline_sha, decl)?,
            );
            head.insert(decl.name.clone(), fingerprinter.fingerprint(&head_rev, decl)?);
        }
        let todo = ChangeSet::compare(&baseline, &head);
        debug!(projects = decls.len(), todo = todo.len(), "change set computed");

        for decl in decls {
            let mut record = ProjectRecord::new(&decl.name, decl.path.clone());
            record.fingerprint_before = baseline.get(&decl.name).cloned().flatten();
            record.fingerprint_after = head.get(&decl.name).cloned().flatten();
            record.state = if todo.contains(&decl.name) {
                ProjectState::Queued
            } else {
                ProjectState::Skipped
            };
            self.report.projects.push(record);
            self.decls.push(decl);
        }

        if todo.is_empty() {
            info!(request_id = self.event.request_id, "no relevant projects");
            host.post_note(
                self.event.request_id,
                "No relevant projects changed; nothing to build.",
            )?;
            return Ok(Prepared::NothingToDo);
        }

        let tag =
            VersionAllocator::allocate_from(history, self.event.bump_level(), self.event.request_id)?;
        // The provisional tag goes into history right away: the next campaign
        // for this request must see it and take the following trial number.
        if self.event.dry_run() {
            info!(%tag, "dry run, provisional tag not written");
        } else {
            git.create_annotated_tag(
                &tag.to_string(),
                &format!("Trial build {tag} for !{}", self.event.request_id),
            )?;
        }
        self.report.tag = Some(tag.to_string());
        host.post_note(
            self.event.request_id,
            &format!(
                "Queued {} project(s) for trial build `{}`: {}",
                todo.len(),
                tag,
                todo.join(", ")
            ),
        )?;
        self.tag = Some(tag);

        Ok(Prepared::Ready)
    }

    /// Build every queued project sequentially. Per-project failures land in
    /// that project's terminal state; only infrastructure failures (notes,
    /// status writes) abort.
    pub fn build(
        &mut self,
        launch: &dyn LaunchPort,
        probe: &dyn LivenessProbe,
        host: &dyn HostPort,
        write: &dyn WritePort,
    ) -> Result<(), CampaignError> {
        let tag = self
            .tag
            .clone()
            .context("build called before a tag was allocated")?;

        for idx in 0..self.report.projects.len() {
            if self.report.projects[idx].state != ProjectState::Queued {
                continue;
            }
            self.report.projects[idx].state = ProjectState::Running;
            let name = self.report.projects[idx].name.clone();
            let project_dir = self.settings.repo_root.join(&self.decls[idx].path);

            let state = if self.event.dry_run() {
                self.report
                    .notes
                    .push(format!("{name}: dry run, success synthesized"));
                ProjectState::Success
            } else {
                self.build_one(&name, &project_dir, &tag, launch, probe, write)
            };

            self.report.projects[idx].state = state;
            host.post_note(
                self.event.request_id,
                &format!("`{name}`: {}", state.label()),
            )?;
        }

        Ok(())
    }

    fn build_one(
        &mut self,
        name: &str,
        project_dir: &Utf8PathBuf,
        tag: &VersionTag,
        launch: &dyn LaunchPort,
        probe: &dyn LivenessProbe,
        write: &dyn WritePort,
    ) -> ProjectState {
        let mut args = self.settings.synth_args.clone();
        if self.event.no_timestamp() {
            args.push(self.settings.no_timestamp_flag.clone());
        }
        let spec = LaunchSpec {
            program: self.settings.synth_program.clone(),
            args,
            cwd: project_dir.clone(),
        };
        match launch.launch(&spec) {
            Ok(0) => {}
            Ok(code) => {
                warn!(%name, code, "synthesis tool refused the launch");
                self.report
                    .notes
                    .push(format!("{name}: tool exited with code {code} at launch"));
                return ProjectState::ErrorLaunch;
            }
            Err(err) => {
                warn!(%name, error = %err, "could not start synthesis tool");
                self.report.notes.push(format!("{name}: launch failed: {err:#}"));
                return ProjectState::ErrorLaunch;
            }
        }

        let run_dir = project_dir.join(&self.settings.run_subdir);
        let status_path = self
            .settings
            .revision_root
            .join(format!("{name}.status.md"));
        let verdict = watch(&run_dir, &self.settings.monitor, probe, |observations| {
            let status = render_status_md(observations);
            if let Err(err) = write.write_file(&status_path, status.as_bytes()) {
                warn!(path = %status_path, error = %err, "status document write failed");
            }
        });
        match verdict {
            Ok(MonitorVerdict::AllDone) => {}
            Ok(MonitorVerdict::RetriesExhausted) => {
                self.report
                    .notes
                    .push(format!("{name}: monitor gave up after retry budget"));
                return ProjectState::ErrorBuild;
            }
            Err(err) => {
                self.report
                    .notes
                    .push(format!("{name}: marker scan failed: {err}"));
                return ProjectState::ErrorBuild;
            }
        }

        let archive_dir = self.settings.archive_root.join(tag.to_string());
        match synthflow_artifacts::collect(
            &run_dir,
            &archive_dir,
            name,
            &tag.to_string(),
            &self.settings.artifacts,
        ) {
            Ok(collected) => {
                self.report.metrics.extend(collected.metrics);
                self.report.notes.extend(collected.notes);
                ProjectState::Success
            }
            Err(err) => {
                warn!(%name, error = %err, "artifact collection failed");
                self.report.notes.push(format!("{name}: {err}"));
                ProjectState::ErrorArtifact
            }
        }
    }

    /// Aggregate the verdicts, persist report and snapshot, approve on
    /// success and release the lock.
    pub fn finalize(
        &mut self,
        host: &dyn HostPort,
        write: &dyn WritePort,
    ) -> Result<i32, CampaignError> {
        self.report.ended_at = Some(Utc::now().to_rfc3339());
        let report_md = render_report_md(&self.report);

        let report_path = self
            .settings
            .revision_root
            .join(format!("report_mr{}.md", self.event.request_id));
        write.write_file(&report_path, report_md.as_bytes())?;

        if let Some(tag) = &self.tag {
            let mut snapshot = RunSnapshot::new(
                self.event.request_id,
                &self.event.source_branch,
                &self.event.target_branch,
                self.event.bump_level(),
                tag.clone(),
                Utc::now().to_rfc3339(),
            );
            snapshot.projects = self.report.projects.clone();
            snapshot.report_md = report_md.clone();
            save_snapshot(&self.settings.revision_root, &snapshot)?;
        }

        host.post_note(self.event.request_id, &report_md)?;

        let queued_any = self.tag.is_some();
        let all_green = self.report.all_green();
        if all_green {
            host.approve(self.event.request_id)?;
        }

        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }

        Ok(if !queued_any {
            CODE_NOTHING_TO_DO
        } else if all_green {
            CODE_SUCCESS
        } else {
            CODE_BUILD_FAILED
        })
    }
}

/// Drive one trial-build campaign end to end.
///
/// Fatal errors surface one failure note before propagating; the lock, if
/// held, is released by the run's drop.
#[allow(clippy::too_many_arguments)]
pub fn run_campaign(
    settings: CampaignSettings,
    event: MergeEvent,
    git: &dyn GitPort,
    history: &dyn HistoryView,
    host: &dyn HostPort,
    launch: &dyn LaunchPort,
    probe: &dyn LivenessProbe,
    write: &dyn WritePort,
) -> Result<i32, CampaignError> {
    let request_id = event.request_id;
    let mut run = WorkflowRun::new(settings, event);

    let outcome = (|| {
        // An all-skipped report is all-green, so `finalize` approves the
        // nothing-to-do case itself.
        if run.prepare(git, history, host)? == Prepared::Ready {
            run.build(launch, probe, host, write)?;
        }
        run.finalize(host, write)
    })();

    if let Err(err) = &outcome {
        let _ = host.post_note(
            request_id,
            &format!("Campaign aborted (code {}): {err}", err.code()),
        );
    }
    outcome
}

/// Merge-time promotion: reload the trial snapshot, create the official
/// annotated tag and publish the release. Idempotent: if the official tag
/// already exists nothing is created again.
pub fn promote(
    settings: &CampaignSettings,
    event: &MergeEvent,
    git: &dyn GitPort,
    host: &dyn HostPort,
) -> Result<VersionTag, CampaignError> {
    let snapshot = load_snapshot(&settings.revision_root, event.request_id)?;
    let official = snapshot.tag.promoted();
    let name = official.to_string();

    git.fetch()?;
    if git.resolve_ref(&name)?.is_some() {
        info!(tag = %name, "official tag already exists, promotion is a no-op");
        return Ok(official);
    }

    git.checkout(&snapshot.target_branch)?;
    git.reset_hard(&format!("origin/{}", snapshot.target_branch))?;
    git.create_annotated_tag(
        &name,
        &format!(
            "Release {name} from !{} ({} -> {})",
            snapshot.request_id, snapshot.source_branch, snapshot.target_branch
        ),
    )?;

    relabel_archive(settings, &snapshot.tag, &official)?;

    host.create_release(&name, &snapshot.report_md)?;
    host.post_note(
        event.request_id,
        &format!("Promoted trial `{}` to official `{name}`.", snapshot.tag),
    )?;
    Ok(official)
}

/// Rename the trial archive directory and its versioned files to the
/// official tag. Skipped when already relabelled or never archived.
fn relabel_archive(
    settings: &CampaignSettings,
    trial: &VersionTag,
    official: &VersionTag,
) -> anyhow::Result<()> {
    let from = settings.archive_root.join(trial.to_string());
    let to = settings.archive_root.join(official.to_string());
    if !from.is_dir() || to.exists() {
        return Ok(());
    }

    fs_err::rename(&from, &to).with_context(|| format!("rename archive {from} to {to}"))?;
    let trial_str = trial.to_string();
    let official_str = official.to_string();
    for entry in fs_err::read_dir(&to).with_context(|| format!("list archive {to}"))? {
        let entry = entry.with_context(|| format!("list archive {to}"))?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.contains(&trial_str) {
            let renamed = to.join(file_name.replace(&trial_str, &official_str));
            fs_err::rename(to.join(&file_name), &renamed)
                .with_context(|| format!("relabel {file_name}"))?;
        }
    }
    info!(%from, %to, "archive relabelled to official tag");
    Ok(())
}
