//! Parley CLI binary entry point.

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley::cli::Cli;
use parley::config::{AppConfig, ProviderConfig};
use parley::error::ParleyError;
use parley::mcp;
use parley::models::ModelSpec;
use parley::session::{Session, SessionOptions};
use parley::tools::{builtin, ServerFilter, ToolFilter, ToolPipeline};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PARLEY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), ParleyError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;

    let mut providers = ProviderConfig::from_env();
    providers.merge_file_entries(&config.providers);

    let pipeline = ToolPipeline::new(mcp::default_connector())
        .with_local_tools(builtin::all_tools())
        .with_servers(config.mcp.servers.clone())
        .with_server_filter(ServerFilter::new(
            config.mcp.use_servers.clone(),
            config.mcp.skip_servers.clone(),
        ))
        .with_filter(ToolFilter::new(
            config.tools.allowed.clone(),
            config.tools.rejected.clone(),
        ))
        .skip_mcp(config.mcp.skip);
    let report = pipeline.load().await;

    for failed in &report.connection.failed {
        eprintln!("MCP server '{}' unavailable: {}", failed.name, failed.error);
    }
    for warning in &report.warnings {
        eprintln!("Warning: {warning}");
    }

    let specs = ModelSpec::from_entries(&config.models);
    let options = SessionOptions::from_config(&config);
    let mut session = match Session::new(specs, providers, options) {
        Ok(session) => session.with_tools(report).with_tool_pipeline(pipeline),
        Err(e) => {
            let mut report = report;
            report.connection.shutdown().await;
            return Err(e);
        }
    };

    for warning in session.startup_warnings() {
        eprintln!("Skipped model {warning}");
    }

    if let Some(prompt) = cli.prompt.as_deref() {
        print_response(&mut session, prompt).await;
    }

    if cli.chat {
        chat_loop(&mut session).await?;
    }

    session.shutdown().await;
    Ok(())
}

async fn print_response(session: &mut Session, input: &str) {
    let response = session.handle_input(input).await;
    println!("{}", response.content);
    if let Some(metrics) = response.metrics {
        for m in metrics {
            tracing::info!(
                model = %m.model_id,
                input_tokens = m.input_tokens,
                output_tokens = m.output_tokens,
                "Token usage"
            );
        }
    }
}

/// Read prompts line by line until EOF or `//exit`.
async fn chat_loop(session: &mut Session) -> Result<(), ParleyError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "//exit" | "//quit") {
            return Ok(());
        }
        print_response(session, line).await;
    }
}
