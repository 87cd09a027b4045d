use colored::Colorize;
use converge_rnode::KindRegistry;

pub fn handle() -> anyhow::Result<()> {
    let registry = KindRegistry::builtin()?;
    for kind in registry.kinds() {
        println!("{} {} ({})", "✓".green(), kind.resource.bold(), kind.service);
    }
    println!("{}", "All resource kinds are valid".green());
    Ok(())
}
