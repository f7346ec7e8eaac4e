use anyhow::{Context, Result};
use todo_core::config::ClientConfig;
use todo_infrastructure::ConfigService;

pub fn path(service: &ConfigService) -> Result<()> {
    let path = service.config_path().context("Failed to resolve config path")?;
    println!("{}", path.display());
    Ok(())
}

pub fn show(config: &ClientConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
