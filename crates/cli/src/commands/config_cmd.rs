//! `concierge config` — Configuration management commands.

use concierge_config::AppConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No model API key set (ANTHROPIC_API_KEY)");
            }
            if config.search.valueserp_api_key.is_none() {
                warnings.push("No place search key set (VALUESERP_API_KEY); restaurant search is disabled");
            }
            if config.search.youcom_api_key.is_none() {
                warnings.push("No web search key set (YOUCOM_API_KEY); web search is disabled");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Model:      {}", config.model);
            println!("   Iterations: {}", config.agent.max_iterations);
            println!("   Gateway:    {}:{}", config.gateway.host, config.gateway.port);
            println!("   Threads:    {:?}", config.store.conversations);
            println!(
                "   Records:    {}",
                config.store.database_url.as_deref().unwrap_or("in-memory")
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{config:#?}");
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn default() {
    print!("{}", AppConfig::default_toml());
}
