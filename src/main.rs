use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use runway::api::{ApiError, goal_from_plan, load_plan, run_http_server, simulate_plan};

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Year-by-year household retirement projection with bear/bull stress tests"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Project a plan and print years, summary and conflict warnings.
    Simulate {
        #[arg(long, help = "Plan JSON file; defaults to the built-in household")]
        plan: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Solve the savings needed to reach the plan's target net worth.
    Goal {
        #[arg(long, help = "Plan JSON file; defaults to the built-in household")]
        plan: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("runway=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve { port } => run_http_server(port).await.map_err(|e| e.to_string()),
        Command::Simulate { plan, pretty } => load_plan(plan.as_deref())
            .map(|plan| simulate_plan(&plan))
            .and_then(|response| print_json(&response, pretty))
            .map_err(|e| e.to_string()),
        Command::Goal { plan, pretty } => load_plan(plan.as_deref())
            .map(|plan| goal_from_plan(&plan))
            .and_then(|result| print_json(&result, pretty))
            .map_err(|e| e.to_string()),
    };

    if let Err(msg) = result {
        error!("{msg}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), ApiError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
