use colored::Colorize;
use converge_api::{Key, ResourceId, Version};
use converge_ratelimit::RateLimitConfig;
use converge_rnode::{ActionSummary, ActionType, Executor, FakeCompute, KindRegistry};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct PlanArgs {
    pub desired: PathBuf,
    pub observed: Option<PathBuf>,
    pub observed_version: String,
    pub kind: String,
    pub project: String,
    pub apply: bool,
    pub config: Option<PathBuf>,
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_version(s: &str) -> anyhow::Result<Version> {
    match s.to_ascii_lowercase().as_str() {
        "ga" | "v1" => Ok(Version::Ga),
        "alpha" => Ok(Version::Alpha),
        "beta" => Ok(Version::Beta),
        other => Err(anyhow::anyhow!("unknown API version: {}", other)),
    }
}

pub async fn handle(args: PlanArgs) -> anyhow::Result<()> {
    let registry = KindRegistry::builtin()?;
    let kind = registry
        .get(&args.kind)
        .ok_or_else(|| anyhow::anyhow!("unknown resource kind: {}", args.kind))?;
    let observed_version = parse_version(&args.observed_version)?;

    let desired = read_json(&args.desired)?;
    let name = desired
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("{}: missing \"name\"", args.desired.display()))?;
    let id = ResourceId::new(&args.project, kind.resource, Key::global(name));

    let observed = args.observed.as_deref().map(read_json).transpose()?;

    let mut want = kind.desired(id.clone(), desired)?;
    let got = match &observed {
        Some(value) => kind.observed(id.clone(), observed_version, value.clone())?,
        None => kind.absent(id.clone())?,
    };

    want.update_plan(&*got)?;
    println!("{} {}", "Resource:".bold(), id.to_string().cyan());
    if let Some(details) = want.plan().details() {
        println!(
            "{} {} ({})",
            "Plan:".bold(),
            details.operation.to_string().yellow().bold(),
            details.why
        );
        if let Some(diff) = &details.diff {
            for line in diff.to_string().lines() {
                println!("  {}", line);
            }
        }
    }

    let actions = want.actions(&*got)?;
    println!();
    println!("{}", "Actions:".bold());
    for action in &actions {
        let label = match action.action_type {
            ActionType::Create => action.action_type.to_string().green(),
            ActionType::Update => action.action_type.to_string().yellow(),
            ActionType::Delete => action.action_type.to_string().red(),
            ActionType::NoOp => action.action_type.to_string().dimmed(),
        };
        println!("  {} {} [{}]", label, action.resource, action.version);
    }
    println!();
    println!("{}", ActionSummary::of(&actions));

    if !args.apply {
        return Ok(());
    }

    let api = Arc::new(FakeCompute::new());
    if let Some(value) = observed {
        api.insert(id.clone(), value).await;
    }
    let limiter = Arc::new(RateLimitConfig::load_or_standard(args.config.as_deref())?.build()?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let executor = Executor::new(api, limiter).with_cancel(cancel);
    println!();
    println!("{}", "Applying (in-memory API)...".blue().bold());
    match executor.execute(&actions).await {
        Ok(results) => {
            for result in results {
                println!("  {} {}", "✓".green(), result.message);
            }
            println!("{}", "Apply complete".green().bold());
            Ok(())
        }
        Err(err) => {
            for result in err.completed() {
                println!("  {} {}", "✓".green(), result.message);
            }
            println!("  {} {}", "✗".red(), err);
            Err(err.into())
        }
    }
}
