use colored::Colorize;
use converge_ratelimit::RateLimitConfig;
use std::path::Path;

pub fn handle(config: Option<&Path>) -> anyhow::Result<()> {
    let composite = RateLimitConfig::load_or_standard(config)?.build()?;

    println!("{}", "Rate limits:".bold());
    for (service, operation, limiter) in composite.entries() {
        let operation = if operation.is_empty() { "*" } else { operation };
        println!("  {}.{} → {:?}", service.cyan(), operation, limiter);
    }
    println!("  {} → {:?}", "default".cyan(), composite.default_limiter());
    Ok(())
}
