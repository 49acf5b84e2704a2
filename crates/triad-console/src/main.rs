//! Operator CLI for the triad console
//!
//! Runs the console components against an in-memory world seeded from a TOML
//! fixture. State lives for one invocation; `watch` shows the reconciliation
//! loop reacting to writes made in the same process.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use triad_console::{
    ConsoleApi, FlowEvalRequest, SaveRequest, SeatMutateRequest, ValidateRequest, WorldFixture,
};
use triad_core::{
    ConsoleConfig, Direction, DomainId, IdentityId, Layer, OperatorContext, PolicyScope,
    SeatState,
};
use triad_sync::{Freshness, TriadView};

#[derive(Parser)]
#[command(name = "triad-console")]
#[command(about = "Triad authority console - seats, policies and flow decisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// World fixture (TOML); an empty world when omitted
    #[arg(short, long, global = true)]
    world: Option<PathBuf>,

    /// Console config file (TOML); defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Identity recorded as the actor on receipts
    #[arg(long, global = true)]
    actor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an identity's triad
    Triad {
        /// Identity id
        identity: String,
    },

    /// CAS write to one seat
    Mutate {
        /// Identity id
        identity: String,
        /// terra, numen or lima
        layer: Layer,
        /// EMPTY, ASSIGNED, OCCUPIED or FROZEN
        state: SeatState,
        /// Version to write against; the current version when omitted
        #[arg(long)]
        expected_cas: Option<u64>,
    },

    /// Print a domain's local or inherited policy
    Policy {
        /// Domain id
        domain: String,
        /// local or inherited
        #[arg(long, default_value = "local")]
        mode: PolicyScope,
    },

    /// Validate a candidate local policy against the domain's stack
    Validate {
        /// Domain id
        domain: String,
        /// File holding the candidate
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
        /// Candidate text
        #[arg(long)]
        content: Option<String>,
    },

    /// Validate and commit a domain's local policy
    Save {
        /// Domain whose local policy is written
        domain: String,
        /// Committing domain; the routed authority when omitted
        #[arg(long)]
        target: Option<String>,
        /// File holding the candidate
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
        /// Candidate text
        #[arg(long)]
        content: Option<String>,
    },

    /// Evaluate an action for an identity in a domain
    Eval {
        /// Acting identity
        identity: String,
        /// Domain whose effective policy applies
        domain: String,
        /// Action name
        action: String,
        /// upward, downward or lateral
        #[arg(long, default_value = "lateral")]
        direction: Direction,
        /// Parent domain approved the action
        #[arg(long)]
        parent_approved: bool,
        /// Evaluator context as JSON
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the illustrative flow scenarios
    Preview,

    /// Follow an identity's triad through the reconciliation loop
    Watch {
        /// Identity id
        identity: String,
        /// How long to watch
        #[arg(long, default_value = "3000")]
        for_ms: u64,
        /// Seat writes applied once the view is live, e.g. `lima=FROZEN`
        #[arg(long = "then", value_parser = parse_seat_write)]
        then: Vec<(Layer, SeatState)>,
    },
}

fn parse_seat_write(raw: &str) -> Result<(Layer, SeatState), String> {
    let (layer, state) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LAYER=STATE, got '{raw}'"))?;
    let layer = layer.parse::<Layer>().map_err(|e| e.to_string())?;
    let state = state.parse::<SeatState>().map_err(|e| e.to_string())?;
    Ok((layer, state))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::default(),
    };
    let fixture = match &cli.world {
        Some(path) => WorldFixture::load(path)?,
        None => WorldFixture::default(),
    };
    let world = fixture.materialize();
    let api = ConsoleApi::new(world.handlers(), config);
    let mut ctx = OperatorContext::new_session();
    if let Some(actor) = &cli.actor {
        ctx = ctx.with_identity(actor.as_str());
    }

    match cli.command {
        Commands::Triad { identity } => {
            print_json(&api.get_triad(&IdentityId::new(identity)).await?)?;
        }

        Commands::Mutate {
            identity,
            layer,
            state,
            expected_cas,
        } => {
            let identity = IdentityId::new(identity);
            let seat_id = api.seat_for(&identity, layer).await?;
            let expected_cas = match expected_cas {
                Some(version) => version,
                None => current_version(&api, &identity, layer).await?,
            };
            let outcome = api
                .seat_mutate(
                    &ctx,
                    SeatMutateRequest {
                        seat_id,
                        expected_cas,
                        new_state: state,
                    },
                )
                .await?;
            print_json(&outcome)?;
            if !outcome.ok {
                bail!("seat changed since version {expected_cas}; re-read before writing");
            }
        }

        Commands::Policy { domain, mode } => {
            println!("{}", api.policy_get(&DomainId::new(domain), mode).await?);
        }

        Commands::Validate {
            domain,
            file,
            content,
        } => {
            let content = candidate(file, content)?;
            let report = api
                .policy_validate(&DomainId::new(domain), ValidateRequest { content })
                .await?;
            print_json(&report)?;
        }

        Commands::Save {
            domain,
            target,
            file,
            content,
        } => {
            let domain = DomainId::new(domain);
            let content = candidate(file, content)?;
            let target = match target {
                Some(target) => DomainId::new(target),
                None => api.routed_target(&domain).await?,
            };
            let response = api
                .policy_save(
                    &ctx,
                    &target,
                    SaveRequest {
                        content,
                        domain_id: domain,
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Commands::Eval {
            identity,
            domain,
            action,
            direction,
            parent_approved,
            context,
        } => {
            let context = context
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--context must be JSON")?;
            let response = api
                .flow_eval(
                    &ctx,
                    FlowEvalRequest {
                        identity_id: IdentityId::new(identity),
                        domain_id: DomainId::new(domain),
                        action,
                        direction,
                        action_domain: None,
                        seat_domain: None,
                        parent_approved,
                        context,
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Commands::Preview => {
            print_json(&api.flow_preview())?;
        }

        Commands::Watch {
            identity,
            for_ms,
            then,
        } => {
            watch(&api, &ctx, IdentityId::new(identity), for_ms, then).await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn candidate(file: Option<PathBuf>, content: Option<String>) -> Result<String> {
    match (file, content) {
        (Some(path), _) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read candidate {}", path.display())),
        (None, Some(content)) => Ok(content),
        (None, None) => bail!("pass the candidate with --file or --content"),
    }
}

async fn current_version(api: &ConsoleApi, identity: &IdentityId, layer: Layer) -> Result<u64> {
    let triad = api.get_triad(identity).await?;
    Ok(triad
        .seats
        .iter()
        .find(|seat| seat.layer == layer)
        .map(|seat| seat.cas_version)
        .unwrap_or(0))
}

async fn watch(
    api: &ConsoleApi,
    ctx: &OperatorContext,
    identity: IdentityId,
    for_ms: u64,
    writes: Vec<(Layer, SeatState)>,
) -> Result<()> {
    let mut session = api.viewer_session();
    let mut views = session.observe(identity.clone()).await;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(for_ms);
    let mut pending = writes.into_iter();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                println!("{}", render_view(&view));
                if view.freshness != Freshness::Live {
                    continue;
                }
                if let Some((layer, state)) = pending.next() {
                    let seat_id = api.seat_for(&identity, layer).await?;
                    let expected_cas = current_version(api, &identity, layer).await?;
                    let outcome = api
                        .seat_mutate(ctx, SeatMutateRequest { seat_id, expected_cas, new_state: state })
                        .await?;
                    println!(
                        "write {layer}={state} at v{expected_cas}: ok={} v{}",
                        outcome.ok, outcome.cas_new
                    );
                }
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    session.close().await;
    Ok(())
}

fn render_view(view: &TriadView) -> String {
    let freshness = match view.freshness {
        Freshness::Connecting => "connecting",
        Freshness::Live => "live",
        Freshness::Stale => "stale",
    };
    let seats = match &view.triad {
        Some(triad) => Layer::ALL
            .iter()
            .map(|layer| {
                let version = triad.slot(*layer).map(|s| s.cas_version).unwrap_or(0);
                format!("{layer}={}(v{version})", triad.state(*layer))
            })
            .collect::<Vec<_>>()
            .join(" "),
        None => "-".to_string(),
    };
    let mut line = format!("[{freshness}] {} {seats}", view.identity_id);
    if let Some(note) = &view.note {
        line.push_str(&format!(" ({note})"));
    }
    for banner in &view.banners {
        line.push_str(&format!(" !{:?}: {}", banner.kind, banner.message));
    }
    line
}
