#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use toolpick::catalog::{EphemeralToolFlags, Role, ToolId};
use toolpick::config::Config;
use toolpick::observability::SelectionTrace;
use toolpick::providers::OpenAiCompatibleClient;
use toolpick::selection::{FastMatcher, PolicySnapshot, SelectionPipeline, TurnRequest};
use toolpick::stores::StoreFixture;

#[derive(Parser)]
#[command(
    name = "toolpick",
    version,
    about = "Per-turn automatic tool selection for conversational agents"
)]
struct Cli {
    /// Config file path (default: ~/.toolpick/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run the deterministic trigger table against a message
    #[command(long_about = "\
Dry-run the deterministic trigger table against a message.

Runs only the fast-path stage: no stores, no classifier call. Use it to
check which triggers a message fires before shipping new rules.

Examples:
  toolpick match 'draw a cat sitting on a windowsill'
  toolpick match 'search the web for rust news' --tool web_search")]
    Match {
        /// Message text to match
        message: String,
        /// Restrict the candidate pool (repeatable). Default: full catalog.
        #[arg(long = "tool")]
        tools: Vec<ToolId>,
    },

    /// Run the full selection pipeline once
    #[command(long_about = "\
Run the full selection pipeline once and print the outcome as JSON.

Stores are in-memory, loaded from --fixture when given. Without an agent
or conversation reference the run is an ephemeral turn over the full
catalog. The fallback classifier uses the [classifier] config section;
when it is not configured, fast-path misses select nothing.

Examples:
  toolpick select 'draw a cat' --tool web_search --tool dalle
  toolpick select 'summarize my notes' --fixture fixtures.toml --agent agent-1
  toolpick select 'hello' --fixture fixtures.toml --conversation conv-7 --role org_admin")]
    Select {
        /// Message text for the turn
        message: String,
        /// Requester role (user, admin, org_admin)
        #[arg(long, default_value = "user")]
        role: Role,
        /// TOML fixture with [[agents]], [[conversations]], [[policies]]
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Select as this persisted agent id
        #[arg(long)]
        agent: Option<String>,
        /// Resolve the agent through this conversation id
        #[arg(long)]
        conversation: Option<String>,
        /// Toggle a tool on for an ephemeral turn (repeatable)
        #[arg(long = "tool")]
        tools: Vec<ToolId>,
        /// Force an ephemeral turn even with no tools toggled
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show the effective per-role tool view of a policy fixture
    #[command(long_about = "\
Show the effective per-role tool view of a policy fixture.

Prints, for every catalog tool, whether the given role may use it under
the fixture's [[policies]] records. Tools without a record are allowed
for every role.

Examples:
  toolpick policy --fixture fixtures.toml --role user
  toolpick policy --fixture fixtures.toml --role org_admin")]
    Policy {
        /// TOML fixture containing [[policies]] records
        #[arg(long)]
        fixture: PathBuf,
        /// Role to evaluate (user, admin, org_admin)
        #[arg(long, default_value = "user")]
        role: Role,
    },

    /// Print the configuration JSON schema
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Match { message, tools } => run_match(&config, &message, &tools),
        Command::Select {
            message,
            role,
            fixture,
            agent,
            conversation,
            tools,
            ephemeral,
        } => {
            run_select(
                &config,
                cli.config.as_deref(),
                &message,
                role,
                fixture.as_deref(),
                agent,
                conversation,
                &tools,
                ephemeral,
            )
            .await
        }
        Command::Policy { fixture, role } => run_policy(&fixture, role),
        Command::Schema => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn candidate_pool(tools: &[ToolId]) -> std::collections::BTreeSet<ToolId> {
    if tools.is_empty() {
        ToolId::catalog_set()
    } else {
        tools.iter().copied().collect()
    }
}

fn run_match(config: &Config, message: &str, tools: &[ToolId]) -> Result<()> {
    let matcher = FastMatcher::with_rules(&config.selection.rules);
    let result = matcher.quick_match(message, &candidate_pool(tools));

    if result.matched_by_fast_path {
        for tool in &result.selected {
            println!("{tool}");
        }
    } else {
        println!("(no trigger fired)");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_select(
    config: &Config,
    config_path: Option<&Path>,
    message: &str,
    role: Role,
    fixture: Option<&Path>,
    agent: Option<String>,
    conversation: Option<String>,
    tools: &[ToolId],
    force_ephemeral: bool,
) -> Result<()> {
    let fixture = match fixture {
        Some(path) => StoreFixture::load(path)?,
        None => StoreFixture::default(),
    };
    let (agents, conversations, policies) = fixture.into_stores();

    let client = Arc::new(OpenAiCompatibleClient::new(
        &config.classifier.base_url,
        config.classifier.api_key.as_deref(),
        std::time::Duration::from_millis(config.classifier.timeout_ms),
    ));
    let trace = Arc::new(SelectionTrace::from_config(
        &config.observability,
        &trace_base_dir(config_path)?,
    ));
    let pipeline = SelectionPipeline::new(
        Arc::new(agents),
        Arc::new(conversations),
        Arc::new(policies),
        client,
        config,
    )
    .with_trace(trace);

    let mut request = TurnRequest::text(message, role);
    request.agent_id = agent;
    request.conversation_id = conversation;
    if !tools.is_empty() || force_ephemeral {
        let mut flags = EphemeralToolFlags::default();
        for tool in tools {
            flags.tools.insert(*tool, true);
        }
        request.ephemeral = Some(flags);
    }

    let outcome = pipeline.run(&request).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run_policy(fixture: &Path, role: Role) -> Result<()> {
    let fixture = StoreFixture::load(fixture)?;
    let snapshot = PolicySnapshot::from_policies(fixture.policies);

    println!("configured policies (admin display order):");
    for policy in snapshot.ordered() {
        let roles: Vec<String> = policy.allowed_roles.iter().map(ToString::to_string).collect();
        println!(
            "  {:<20} enabled={:<5} roles=[{}]",
            policy.tool.to_string(),
            policy.enabled,
            roles.join(", ")
        );
    }

    println!("\neffective tool view for {role}:");
    for tool in ToolId::catalog() {
        let verdict = if snapshot.allows(*tool, role) {
            "allowed"
        } else {
            "hidden"
        };
        println!("  {:<20} {verdict}", tool.as_str());
    }
    Ok(())
}

/// Trace files default to living next to the active config file.
fn trace_base_dir(config_path: Option<&Path>) -> Result<PathBuf> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    Ok(config_file
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf))
}
