mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use fs_err as fs;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use synthflow_core::adapters::{FsWritePort, LogHost, ProcessLauncher, ShellGitPort};
use synthflow_core::pipeline::{promote, run_campaign};
use synthflow_core::settings::CampaignSettings;
use synthflow_domain::VersionAllocator;
use synthflow_monitor::{scan_run_dir, MarkerNames, SignalProbe};
use synthflow_render::render_status_md;
use synthflow_types::event::MergeEvent;
use synthflow_types::version::BumpLevel;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "synthflow",
    version,
    about = "Merge-request driven build campaigns for firmware projects."
)]
struct Cli {
    /// Path to synthflow.toml (default: ./synthflow.toml if present).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume one merge-request event and run a trial-build campaign.
    Run(RunArgs),
    /// Promote a trial build to an official release tag at merge time.
    Promote(PromoteArgs),
    /// Watch a spool directory for event files; one worker per event.
    Watch(WatchArgs),
    /// Render a run directory's status document once.
    Status(StatusArgs),
    /// Preview the tag the next campaign would allocate.
    NextVersion(NextVersionArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Event payload file (merge-request hook JSON).
    #[arg(long)]
    event: Utf8PathBuf,

    /// Take the campaign lock even if its marker exists (crash recovery).
    #[arg(long, default_value_t = false)]
    force_lock: bool,

    /// Run the campaign even if the event does not qualify for a trial.
    #[arg(long, default_value_t = false)]
    ignore_qualification: bool,
}

#[derive(Debug, Parser)]
struct PromoteArgs {
    /// Event payload file (merge-request hook JSON).
    #[arg(long)]
    event: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct WatchArgs {
    /// Spool directory to poll for `*.json` event files.
    #[arg(long)]
    spool: Utf8PathBuf,

    /// Seconds between spool sweeps.
    #[arg(long, default_value_t = 10)]
    sweep_secs: u64,

    /// Process one sweep and exit instead of looping.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    /// Run directory to scan.
    #[arg(long)]
    run_dir: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct NextVersionArgs {
    /// Bump level to preview.
    #[arg(long, value_enum, default_value = "patch")]
    level: LevelArg,

    /// Merge-request id the tag would belong to.
    #[arg(long)]
    request_id: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LevelArg {
    Patch,
    Minor,
    Major,
}

impl From<LevelArg> for BumpLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Patch => BumpLevel::Patch,
            LevelArg::Minor => BumpLevel::Minor,
            LevelArg::Major => BumpLevel::Major,
        }
    }
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<u8> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref()).context("load synthflow.toml")?;
    match cli.cmd {
        Command::Run(args) => cmd_run(config.into_settings(args.force_lock), args),
        Command::Promote(args) => cmd_promote(config.into_settings(false), args),
        Command::Watch(args) => cmd_watch(config.into_settings(false), args),
        Command::Status(args) => cmd_status(args),
        Command::NextVersion(args) => cmd_next_version(config.into_settings(false), args),
    }
}

fn read_event(path: &Utf8Path) -> anyhow::Result<MergeEvent> {
    let payload = fs::read_to_string(path).with_context(|| format!("read event {}", path))?;
    MergeEvent::from_hook_json(&payload).with_context(|| format!("parse event {}", path))
}

fn cmd_run(settings: CampaignSettings, args: RunArgs) -> anyhow::Result<u8> {
    let event = read_event(&args.event)?;
    if !args.ignore_qualification
        && !event.qualifies_for_trial(&settings.protected_branch, &settings.automation_user)
    {
        info!(
            request_id = event.request_id,
            "event does not qualify for a trial build"
        );
        return Ok(0);
    }

    let git = ShellGitPort::new(settings.repo_root.clone());
    let code = run_campaign(
        settings,
        event,
        &git,
        &git,
        &LogHost,
        &ProcessLauncher,
        &SignalProbe,
        &FsWritePort,
    )
    .map_err(|e| anyhow::anyhow!(e))?;
    Ok(code as u8)
}

fn cmd_promote(settings: CampaignSettings, args: PromoteArgs) -> anyhow::Result<u8> {
    let event = read_event(&args.event)?;
    if !event.qualifies_for_promotion(&settings.protected_branch) {
        info!(
            request_id = event.request_id,
            "event does not qualify for promotion"
        );
        return Ok(0);
    }

    let git = ShellGitPort::new(settings.repo_root.clone());
    let official = promote(&settings, &event, &git, &LogHost).map_err(|e| anyhow::anyhow!(e))?;
    println!("{official}");
    Ok(0)
}

fn cmd_watch(settings: CampaignSettings, args: WatchArgs) -> anyhow::Result<u8> {
    if !args.spool.is_dir() {
        anyhow::bail!("spool directory {} does not exist", args.spool);
    }
    info!(spool = %args.spool, "watching for event files");

    let mut workers: Vec<thread::JoinHandle<()>> = Vec::new();
    loop {
        for event_path in spool_entries(&args.spool)? {
            let event = match read_event(&event_path) {
                Ok(event) => event,
                Err(err) => {
                    warn!(path = %event_path, error = %err, "skipping malformed event file");
                    let _ = fs::remove_file(&event_path);
                    continue;
                }
            };
            fs::remove_file(&event_path)
                .with_context(|| format!("consume event {}", event_path))?;

            let worker_settings = settings.clone();
            workers.push(thread::spawn(move || handle_event(worker_settings, event)));
        }

        workers.retain(|w| !w.is_finished());

        if args.once {
            break;
        }
        thread::sleep(Duration::from_secs(args.sweep_secs));
    }

    for worker in workers {
        if worker.join().is_err() {
            warn!("event worker panicked");
        }
    }
    Ok(0)
}

/// One event, one worker: campaigns for different events run concurrently
/// and serialize on the revision lock.
fn handle_event(settings: CampaignSettings, event: MergeEvent) {
    let request_id = event.request_id;
    let git = ShellGitPort::new(settings.repo_root.clone());

    if event.qualifies_for_trial(&settings.protected_branch, &settings.automation_user) {
        match run_campaign(
            settings,
            event,
            &git,
            &git,
            &LogHost,
            &ProcessLauncher,
            &SignalProbe,
            &FsWritePort,
        ) {
            Ok(code) => info!(request_id, code, "campaign finished"),
            Err(err) => error!(request_id, error = %err, "campaign failed"),
        }
    } else if event.qualifies_for_promotion(&settings.protected_branch) {
        match promote(&settings, &event, &git, &LogHost) {
            Ok(tag) => info!(request_id, %tag, "promoted"),
            Err(err) => error!(request_id, error = %err, "promotion failed"),
        }
    } else {
        info!(request_id, "event qualifies for neither trial nor promotion");
    }
}

fn spool_entries(spool: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(spool).with_context(|| format!("list spool {}", spool))? {
        let entry = entry.with_context(|| format!("list spool {}", spool))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".json") {
            entries.push(spool.join(name));
        }
    }
    entries.sort();
    Ok(entries)
}

fn cmd_status(args: StatusArgs) -> anyhow::Result<u8> {
    let observations = scan_run_dir(&args.run_dir, &MarkerNames::default())
        .with_context(|| format!("scan {}", args.run_dir))?;
    print!("{}", render_status_md(&observations));
    Ok(0)
}

fn cmd_next_version(settings: CampaignSettings, args: NextVersionArgs) -> anyhow::Result<u8> {
    let git = ShellGitPort::new(settings.repo_root);
    let tag = VersionAllocator::allocate_from(&git, args.level.into(), args.request_id)?;
    println!("{tag}");
    Ok(0)
}
