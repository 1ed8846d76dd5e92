use std::path::Path;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use flowsmith::config::Config;
use flowsmith::remote::{EngineClient, OutboundCallParams, RagDeployParams, RagQueryParams};
use flowsmith::telemetry::{init_logging, LogConfig};
use flowsmith::workflow::{
    format_node_summary, format_validation_errors, parse_document_file, validate_workflow,
    WorkflowConfig,
};

#[derive(Parser)]
#[command(name = "flowsmith")]
#[command(about = "Validate voice-agent workflows and manage them on the execution engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow file (JSON or YAML)
    Validate {
        /// Path to workflow file
        file: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and import workflow files into the engine
    Import {
        /// Workflow files
        #[arg(required = true)]
        files: Vec<String>,
        /// Make the imported version active
        #[arg(long)]
        activate: bool,
        /// Send all files in a single bulk request
        #[arg(long)]
        bulk: bool,
    },
    /// Export an agent's active workflow
    Export {
        /// Agent ID
        agent_id: String,
        /// Output file path
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Drop the engine's cached copy of an agent
    RefreshCache {
        /// Agent ID
        agent_id: String,
    },
    /// Knowledge base operations
    Rag {
        #[command(subcommand)]
        action: RagActions,
    },
    /// Outbound calls and call inspection
    Calls {
        #[command(subcommand)]
        action: CallActions,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum RagActions {
    /// Query an agent's knowledge base
    Query {
        /// Agent ID
        agent_id: String,
        /// Query text
        query: String,
        /// Number of chunks to return (1-50)
        #[arg(short = 'k', long, default_value = "5")]
        top_k: u32,
    },
    /// Index documents from an S3 bucket
    Deploy {
        /// Agent ID
        agent_id: String,
        /// S3 bucket name
        #[arg(long)]
        bucket: String,
        /// Key prefix inside the bucket
        #[arg(long)]
        prefix: Option<String>,
        /// Target collection
        #[arg(long)]
        collection: Option<String>,
    },
    /// Show the progress of a deployment
    Status {
        /// Deployment ID
        deployment_id: String,
    },
}

#[derive(Subcommand)]
enum CallActions {
    /// Place an outbound call
    Start {
        /// Agent ID
        agent_id: String,
        /// Number to call, E.164 (e.g. +14155550123)
        to: String,
        /// Caller ID, E.164
        #[arg(long)]
        from: Option<String>,
        /// Workflow variables (key=value)
        #[arg(short, long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Show call status
    Status {
        /// Call ID
        call_id: String,
    },
    /// Show the debug trace of a call
    Trace {
        /// Call ID
        call_id: String,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid variable format '{}'. Expected key=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::default());

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file, json } => cmd_validate(&file, json)?,
        Commands::Import {
            files,
            activate,
            bulk,
        } => cmd_import(&files, activate, bulk).await?,
        Commands::Export { agent_id, output } => cmd_export(&agent_id, output.as_deref()).await?,
        Commands::RefreshCache { agent_id } => cmd_refresh_cache(&agent_id).await?,
        Commands::Rag { action } => match action {
            RagActions::Query {
                agent_id,
                query,
                top_k,
            } => cmd_rag_query(&agent_id, &query, top_k).await?,
            RagActions::Deploy {
                agent_id,
                bucket,
                prefix,
                collection,
            } => cmd_rag_deploy(agent_id, bucket, prefix, collection).await?,
            RagActions::Status { deployment_id } => cmd_rag_status(&deployment_id).await?,
        },
        Commands::Calls { action } => match action {
            CallActions::Start {
                agent_id,
                to,
                from,
                vars,
            } => cmd_calls_start(agent_id, to, from, vars).await?,
            CallActions::Status { call_id } => cmd_calls_status(&call_id).await?,
            CallActions::Trace { call_id } => cmd_calls_trace(&call_id).await?,
        },
        Commands::Completions { shell } => {
            cmd_completions(shell)?;
        }
    }

    Ok(())
}

/// Shell completion variants
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompletionShell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completions
fn cmd_completions(shell: CompletionShell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

fn engine_client() -> anyhow::Result<EngineClient> {
    let config = Config::load();
    if !config.engine.is_configured() {
        anyhow::bail!(
            "Engine connection is not configured. Set FLOWSMITH_ENGINE_URL and \
             FLOWSMITH_ENGINE_API_KEY, or add an [engine] section to {}",
            Config::config_dir().join("config.toml").display()
        );
    }
    Ok(EngineClient::new(config.engine))
}

// ============================================================================
// Workflow Commands
// ============================================================================

/// Load and validate one file. Prints the report and returns the config only
/// when it has no errors.
fn load_valid_workflow(file: &str) -> anyhow::Result<Option<WorkflowConfig>> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("File not found: {}", file);
    }

    let raw = parse_document_file(path)?;
    let outcome = validate_workflow(&raw);

    if !outcome.report.errors.is_empty() || !outcome.report.warnings.is_empty() {
        eprintln!("{}:", file);
        eprint!("{}", format_validation_errors(&outcome.report));
    }

    Ok(outcome.into_valid_config())
}

fn cmd_validate(file: &str, json: bool) -> anyhow::Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("File not found: {}", file);
    }

    let raw = parse_document_file(path)?;
    let outcome = validate_workflow(&raw);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let text = format_validation_errors(&outcome.report);
        println!("{}", text.trim_end());
        if let Some(config) = outcome.config.as_ref().filter(|_| outcome.report.is_valid()) {
            println!();
            println!("  Agent: {}", config.agent.name);
            println!("  Nodes: {}", config.workflow.nodes.len());
            println!("  Initial node: {}", config.workflow.initial_node);
            if !config.workflow.global_intents.is_empty() {
                println!("  Global intents: {}", config.workflow.global_intents.len());
            }
            println!();
            print!("{}", format_node_summary(&config.workflow));
        }
    }

    if !outcome.is_valid() {
        anyhow::bail!(
            "Workflow '{}' failed validation with {} error(s)",
            file,
            outcome.report.errors.len()
        );
    }

    Ok(())
}

async fn cmd_import(files: &[String], activate: bool, bulk: bool) -> anyhow::Result<()> {
    let mut configs = Vec::with_capacity(files.len());
    let mut invalid = 0;
    for file in files {
        match load_valid_workflow(file)? {
            Some(config) => configs.push(config),
            None => invalid += 1,
        }
    }
    if invalid > 0 {
        anyhow::bail!(
            "{} of {} workflow file(s) failed validation; nothing was imported",
            invalid,
            files.len()
        );
    }

    let client = engine_client()?;

    if bulk {
        let response = client.bulk_import_agent_configs(&configs, activate).await?;
        for item in &response.results {
            let label = item
                .name
                .as_deref()
                .or(item.agent_id.as_deref())
                .unwrap_or("?");
            if item.success {
                println!(
                    "✓ {} imported (agent {}, version {})",
                    label,
                    item.agent_id.as_deref().unwrap_or("-"),
                    item.version.map_or("-".to_string(), |v| v.to_string())
                );
            } else {
                println!("✗ {}: {}", label, item.error.as_deref().unwrap_or("failed"));
            }
        }
        println!();
        println!(
            "{} succeeded, {} failed",
            response.succeeded(),
            response.failed()
        );
        if activate {
            client
                .refresh_agent_caches_best_effort(
                    response
                        .results
                        .iter()
                        .filter(|item| item.success)
                        .filter_map(|item| item.agent_id.as_deref()),
                )
                .await;
        }
    } else {
        // Successful imports are refreshed inside the client before any
        // failure is reported here.
        let results = client
            .import_agent_configs_concurrently(&configs, activate)
            .await;
        for (config, result) in configs.iter().zip(&results) {
            match result {
                Ok(imported) => {
                    println!(
                        "✓ {} imported (agent {}, version {}){}",
                        config.agent.name,
                        imported.agent_id,
                        imported.version.map_or("-".to_string(), |v| v.to_string()),
                        if imported.activated { ", active" } else { "" }
                    );
                    for warning in &imported.warnings {
                        println!("    warning: {}", warning);
                    }
                }
                Err(e) => println!("✗ {}: {}", config.agent.name, e),
            }
        }
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            anyhow::bail!("{} of {} import(s) failed", failed, results.len());
        }
    }

    Ok(())
}

async fn cmd_export(agent_id: &str, output: Option<&str>) -> anyhow::Result<()> {
    let client = engine_client()?;
    let export = client.export_agent_config(agent_id).await?;
    let definition = serde_json::to_string_pretty(&export.config)?;

    match output {
        Some(path) => {
            let path = Path::new(path);

            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            std::fs::write(path, format!("{}\n", definition))?;
            println!("✓ Exported '{}' to {}", agent_id, path.display());
        }
        None => println!("{}", definition),
    }

    Ok(())
}

async fn cmd_refresh_cache(agent_id: &str) -> anyhow::Result<()> {
    let client = engine_client()?;
    client.refresh_agent_cache(agent_id).await?;
    println!("✓ Cache refreshed for agent '{}'", agent_id);
    Ok(())
}

// ============================================================================
// RAG Commands
// ============================================================================

async fn cmd_rag_query(agent_id: &str, query: &str, top_k: u32) -> anyhow::Result<()> {
    let client = engine_client()?;
    let mut params = RagQueryParams::new(agent_id, query);
    params.top_k = top_k;

    let response = client.query_rag(&params).await?;
    if response.results.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (i, chunk) in response.results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}",
            i + 1,
            chunk.score,
            chunk.source.as_deref().unwrap_or("-")
        );
        println!("   {}", chunk.content.replace('\n', "\n   "));
    }

    Ok(())
}

async fn cmd_rag_deploy(
    agent_id: String,
    bucket: String,
    prefix: Option<String>,
    collection: Option<String>,
) -> anyhow::Result<()> {
    let client = engine_client()?;
    let params = RagDeployParams {
        agent_id,
        bucket,
        prefix,
        collection,
    };

    let deployment = client.deploy_rag_from_s3(&params).await?;
    println!("✓ Deployment {} started", deployment.deployment_id);
    println!();
    println!(
        "Check progress with: flowsmith rag status {}",
        deployment.deployment_id
    );
    Ok(())
}

async fn cmd_rag_status(deployment_id: &str) -> anyhow::Result<()> {
    let client = engine_client()?;
    let deployment = client.get_rag_deployment_status(deployment_id).await?;

    println!("Deployment: {}", deployment.deployment_id);
    println!("Status:     {:?}", deployment.status);
    if let Some(processed) = deployment.documents_processed {
        match deployment.documents_total {
            Some(total) => println!("Documents:  {}/{}", processed, total),
            None => println!("Documents:  {}", processed),
        }
    }
    if let Some(updated) = deployment.updated_at {
        println!("Updated:    {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(error) = &deployment.error {
        println!("Error:      {}", error);
    }
    Ok(())
}

// ============================================================================
// Call Commands
// ============================================================================

async fn cmd_calls_start(
    agent_id: String,
    to: String,
    from: Option<String>,
    vars: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let client = engine_client()?;
    let mut params = OutboundCallParams::new(agent_id, to);
    params.from_number = from;
    params.variables = vars.into_iter().collect();

    let call = client.initiate_outbound_call(&params).await?;
    println!("✓ Call {} placed ({:?})", call.call_id, call.status);
    Ok(())
}

async fn cmd_calls_status(call_id: &str) -> anyhow::Result<()> {
    let client = engine_client()?;
    let status = client.get_call_status(call_id).await?;

    println!("Call:     {}", status.call_id);
    println!("Status:   {:?}", status.status);
    if let Some(node) = &status.current_node {
        println!("Node:     {}", node);
    }
    if let Some(started) = status.started_at {
        println!("Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(ended) = status.ended_at {
        println!("Ended:    {}", ended.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(duration) = status.duration_seconds {
        println!("Duration: {}s", duration);
    }
    Ok(())
}

async fn cmd_calls_trace(call_id: &str) -> anyhow::Result<()> {
    let client = engine_client()?;
    let trace = client.get_call_debug_trace(call_id).await?;

    if trace.events.is_empty() {
        println!("No trace events recorded for call '{}'.", trace.call_id);
        return Ok(());
    }

    println!("{:<20} {:<20} {:<20}", "TIME", "EVENT", "NODE");
    println!("{}", "-".repeat(62));
    for event in &trace.events {
        println!(
            "{:<20} {:<20} {:<20}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.event_type,
            event.node_id.as_deref().unwrap_or("-")
        );
        if !event.detail.is_null() {
            println!("    {}", event.detail);
        }
    }
    Ok(())
}
