mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Plan and apply cloud resource changes across API versions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the schemas and field traits of every resource kind
    CheckSchema,
    /// Show the rate limits in effect
    Limits {
        /// Rate limit file (defaults to CONVERGE_RATE_LIMITS, ./rate-limits.kdl, then the config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Diff a desired resource against an observed one and list the actions
    Plan {
        /// Desired resource as GA JSON
        #[arg(short, long)]
        desired: PathBuf,
        /// Observed resource as JSON; absent means the resource does not exist
        #[arg(short, long)]
        observed: Option<PathBuf>,
        /// API version of the observed JSON (ga, alpha, beta)
        #[arg(long, default_value = "ga")]
        observed_version: String,
        /// Resource kind (healthChecks, backendServices)
        #[arg(short, long, default_value = "healthChecks")]
        kind: String,
        /// Project the resource lives in
        #[arg(short, long, env = "CONVERGE_PROJECT", default_value = "default")]
        project: String,
        /// Run the actions against an in-memory API seeded with the observed resource
        #[arg(long)]
        apply: bool,
        /// Rate limit file used with --apply
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match cli.command {
        Commands::CheckSchema => commands::check_schema::handle(),
        Commands::Limits { config } => commands::limits::handle(config.as_deref()),
        Commands::Plan {
            desired,
            observed,
            observed_version,
            kind,
            project,
            apply,
            config,
        } => {
            commands::plan::handle(commands::plan::PlanArgs {
                desired,
                observed,
                observed_version,
                kind,
                project,
                apply,
                config,
            })
            .await
        }
    }
}
