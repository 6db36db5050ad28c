//! screeps-api - issue a single call through the gateway.
//!
//! Useful for checking credentials and inspecting raw payloads. The
//! response body is printed to stdout; cache, rate-limit and loop notes go
//! to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use reqwest::Method;
use serde_json::Value;
use tracing::error;
use tracing_subscriber::EnvFilter;

use screeps_gateway::{ApiClient, CallOptions, GatewayConfig, build_endpoint_with_query};

/// Call a Screeps Web API endpoint.
#[derive(Parser)]
#[command(name = "screeps-api")]
#[command(version = screeps_gateway::PKG_VERSION)]
#[command(about = "Call a Screeps Web API endpoint through the gateway")]
struct Args {
    /// Endpoint path, e.g. /game/room-terrain
    endpoint: String,

    /// Query parameter as key=value (repeatable, order preserved).
    #[arg(short, long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request body (JSON text).
    #[arg(short, long)]
    body: Option<String>,

    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sign in with email/password before calling.
    #[arg(long, env = "SCREEPS_EMAIL", requires = "password")]
    email: Option<String>,

    #[arg(long, env = "SCREEPS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "call failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load(args.config.as_deref())?;
    let client = ApiClient::new(config);

    if let (Some(email), Some(password)) = (&args.email, &args.password) {
        client.sign_in(email, password).await?;
    }

    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())?;
    let mut options = CallOptions::get().method(method);
    options.body = args.body;

    let endpoint = build_endpoint_with_query(
        &args.endpoint,
        args.query.into_iter().map(|(k, v)| (k, Value::String(v))),
    );
    let reply = client.call(&endpoint, &options).await?;

    println!("{}", serde_json::to_string_pretty(&reply.data)?);
    for note in reply.meta.notes() {
        eprintln!("note: {note}");
    }
    Ok(())
}
