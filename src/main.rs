use anyhow::Result;
use bizplan::api::{ProjectionArgs, project_from_args, render_report, run_http_server};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bizplan",
    about = "Monthly P&L projection with target operating margin gap analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON projection API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one projection and print the report
    Project {
        #[command(flatten)]
        args: ProjectionArgs,
        #[arg(long, help = "Print the JSON document served by the API instead")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Project { args, json } => {
            let response = project_from_args(&args).map_err(anyhow::Error::msg)?;
            info!(
                months = response.months,
                target_met = response.gap.target_met(),
                "projection complete"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_report(&response));
            }
        }
    }
    Ok(())
}
