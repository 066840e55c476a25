//! Execute a session script against a runtime.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;

use action_core::{ActionStatus, Tag};
use runtime::{Event, PeerState, ReplicationEvent, Runtime, RuntimeConfig, RuntimeHandle, Topic};

use super::load_content;
use crate::script::{self, Expectation, Step};

/// Execute a session script
#[derive(Parser)]
pub struct RunScript {
    /// Script file (see `scripts/` for examples)
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Data directory with `session.toml` and `actions/` (defaults to embedded content)
    #[arg(short, long, value_name = "DIR", env = "ACTIONSIM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Override the number of replicas at start
    #[arg(long, value_name = "N")]
    replicas: Option<usize>,

    /// Override link latency in ticks
    #[arg(long, value_name = "TICKS")]
    latency: Option<u32>,

    /// Also print replication traffic
    #[arg(long)]
    trace_replication: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// One human-readable line per event
    Text,
    /// One JSON object per line
    Json,
}

impl RunScript {
    pub async fn execute(self) -> Result<()> {
        let (mut config, catalog) = load_content(self.data_dir.as_ref())?;
        if let Some(replicas) = self.replicas {
            config.replicas = replicas;
        }
        if let Some(latency) = self.latency {
            config.latency_ticks = latency;
        }

        crate::setup_logging(config.log_filter.as_deref())?;

        let source = std::fs::read_to_string(&self.script)
            .with_context(|| format!("Failed to read script {}", self.script.display()))?;
        let steps = script::parse(&source)?;
        info!(script = %self.script.display(), steps = steps.len(), "script loaded");

        let runtime = Runtime::builder()
            .config(RuntimeConfig::from(config))
            .catalog(catalog)
            .build()
            .await?;
        let handle = runtime.handle();

        let mut printer = Printer {
            format: self.format,
            actions: handle.subscribe(Topic::Action),
            replication: self
                .trace_replication
                .then(|| handle.subscribe(Topic::Replication)),
        };

        let outcome = run_steps(&handle, &mut printer, &steps).await;

        drop(printer);
        drop(handle);
        runtime.shutdown().await?;
        outcome
    }
}

async fn run_steps(
    handle: &RuntimeHandle,
    printer: &mut Printer,
    steps: &[script::ScriptLine],
) -> Result<()> {
    let mut tick = 0;
    for line in steps {
        let context = || format!("script line {}", line.line);
        match &line.step {
            Step::Press { peer, input } => {
                let dispatch = handle.press(*peer, input.as_str()).await.with_context(context)?;
                printer.note(tick, &format!("{} press {}: {}", peer, input, dispatch));
            }
            Step::Dispatch { peer, kind, action } => {
                let dispatch = match kind {
                    action_core::RequestKind::Start => {
                        handle.start_action(*peer, action.clone()).await
                    }
                    action_core::RequestKind::Stop => {
                        handle.stop_action(*peer, action.clone()).await
                    }
                }
                .with_context(context)?;
                printer.note(tick, &format!("{} {} {}: {}", peer, kind, action, dispatch));
            }
            Step::Tick(count) => {
                tick = handle.step(*count).await.with_context(context)?;
            }
            Step::Settle(max) => {
                let before = tick;
                tick = before + handle.settle(*max).await.with_context(context)?;
            }
            Step::Join => {
                let peer = handle.join_replica().await.with_context(context)?;
                printer.note(tick, &format!("{} joined", peer));
            }
            Step::Show(Some(peer)) => {
                let state = handle.query_peer(*peer).await.with_context(context)?;
                printer.state(&state)?;
            }
            Step::Show(None) => {
                let snapshot = handle.query_snapshot().await.with_context(context)?;
                for state in &snapshot.peers {
                    printer.state(state)?;
                }
            }
            Step::Expect(expectation) => check(handle, expectation)
                .await
                .with_context(context)?,
        }
        printer.drain(tick)?;
    }
    Ok(())
}

async fn check(handle: &RuntimeHandle, expectation: &Expectation) -> Result<()> {
    match expectation {
        Expectation::Running { peer, action } | Expectation::Idle { peer, action } => {
            let want_running = matches!(expectation, Expectation::Running { .. });
            let state = handle.query_peer(*peer).await?;
            let running = state
                .actions
                .iter()
                .find(|status| &status.name == action)
                .is_some_and(|status: &ActionStatus| status.run_state.is_running);
            if running != want_running {
                bail!(
                    "expected {} to be {} on {}",
                    action,
                    if want_running { "running" } else { "idle" },
                    peer
                );
            }
        }
        Expectation::Converged => {
            let snapshot = handle.query_snapshot().await?;
            if let Some(diverged) = snapshot.divergent() {
                bail!(
                    "{} diverged: running [{}] with {}",
                    diverged.peer,
                    names(diverged.running()),
                    diverged.active_tags
                );
            }
        }
    }
    Ok(())
}

struct Printer {
    format: OutputFormat,
    actions: broadcast::Receiver<Event>,
    replication: Option<broadcast::Receiver<Event>>,
}

impl Printer {
    /// Prints everything published since the last drain. Events are published
    /// before the worker replies, so nothing from the last command is missed.
    fn drain(&mut self, tick: u64) -> Result<()> {
        let mut pending = Vec::new();
        collect(&mut self.actions, &mut pending);
        if let Some(replication) = &mut self.replication {
            collect(replication, &mut pending);
        }

        for event in pending {
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
                OutputFormat::Text => println!("[tick {:>4}] {}", tick, describe(&event)),
            }
        }
        Ok(())
    }

    fn note(&self, tick: u64, message: &str) {
        if self.format == OutputFormat::Text {
            println!("[tick {:>4}] > {}", tick, message);
        }
    }

    fn state(&self, state: &PeerState) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(state)?),
            OutputFormat::Text => {
                println!(
                    "  {:<10} {} tags={} running=[{}]",
                    state.peer.to_string(),
                    state.time,
                    state.active_tags,
                    names(state.running())
                );
            }
        }
        Ok(())
    }
}

fn names<'a>(tags: impl Iterator<Item = &'a Tag>) -> String {
    tags.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn collect(rx: &mut broadcast::Receiver<Event>, into: &mut Vec<Event>) {
    loop {
        match rx.try_recv() {
            Ok(event) => into.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event output lagged");
            }
            Err(_) => break,
        }
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::Action(record) => format!(
            "{:<10} {} {} (by {}, t={})",
            record.peer.to_string(),
            record.event.kind,
            record.event.action,
            record.event.instigator,
            record.event.time
        ),
        Event::Replication(ReplicationEvent::UpdateApplied {
            peer,
            update,
            outcome,
        }) => format!(
            "{:<10} update {} rev {} running={} -> {}",
            peer.to_string(),
            update.action,
            update.revision,
            update.run_state.is_running,
            outcome
        ),
        Event::Replication(ReplicationEvent::RequestHandled {
            from,
            request,
            admitted,
        }) => format!(
            "authority  request from {}: {} {} -> {}",
            from,
            request.kind,
            request.action,
            if *admitted { "admitted" } else { "refused" }
        ),
        Event::Replication(ReplicationEvent::ReplicaJoined { peer, actions }) => {
            format!("{:<10} joined, snapshot of {} actions", peer.to_string(), actions)
        }
    }
}
