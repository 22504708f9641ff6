use clap::{Parser, Subcommand};
use serde_json::Value;

use request_trace::format::interpolate;
use request_trace::http::{CorrelationContext, IdGenerator};
use request_trace::outbound::{CorrelationHook, HttpStrategy, OutboundHooks, TracedClient};

#[derive(Parser)]
#[command(name = "trace-cli")]
#[command(about = "Client for exercising the request-trace service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call the echo endpoint as part of an existing trace
    Echo {
        /// Request id to continue from (generated when omitted)
        #[arg(long)]
        request_id: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
    },
    /// Ask the service to relay to its upstream
    Relay {
        /// Use the tower client instead of reqwest
        #[arg(long)]
        tower: bool,
    },
    /// Render a message template against a JSON context
    Render {
        template: String,
        #[arg(default_value = "{}")]
        context: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let hooks = OutboundHooks::new();
    hooks.install(HttpStrategy::Reqwest, CorrelationHook::shared());
    let client = TracedClient::with_hooks(reqwest::Client::new(), hooks);

    match cli.command {
        Commands::Echo {
            request_id,
            correlation_id,
        } => {
            let mut ctx = CorrelationContext::new(
                request_id.unwrap_or_else(|| IdGenerator::default().generate()),
            );
            if let Some(correlation_id) = correlation_id {
                ctx.correlation_id = correlation_id;
            }
            let url = format!("{}/", cli.url);
            let res = ctx.scope(async { client.get(&url).send().await }).await?;
            print_response(res).await?;
        }
        Commands::Relay { tower } => {
            let path = if tower { "relay/tower" } else { "relay" };
            let res = client.get(&format!("{}/{}", cli.url, path)).send().await?;
            print_response(res).await?;
        }
        Commands::Render { template, context } => {
            let context: Value = serde_json::from_str(&context)?;
            println!("{}", interpolate(&template, &context));
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
