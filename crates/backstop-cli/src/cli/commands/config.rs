//! `backstop config` – show config location and effective settings.

use anyhow::Result;
use backstop_core::config::{self, BackstopConfig};
use backstop_core::logging;

pub fn run_config(cfg: &BackstopConfig) -> Result<()> {
    println!("config: {}", config::config_path()?.display());
    match logging::log_path() {
        Ok(path) => println!("log:    {}", path.display()),
        Err(_) => println!("log:    stderr"),
    }

    let effective = BackstopConfig {
        retry: Some(cfg.retry_settings()),
        fetch: Some(cfg.fetch_settings()),
        ..cfg.clone()
    };
    println!();
    print!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}
