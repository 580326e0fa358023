use anyhow::Result;

use pagebrief_core::providers::ProviderRegistry;
use pagebrief_core::AppConfig;

pub fn run(config: &AppConfig, set_default: Option<&str>) -> Result<()> {
    let registry = ProviderRegistry::with_endpoint_overrides(&config.ai.endpoints);

    if let Some(model) = set_default {
        let mut config = config.clone();
        config.set_default_model(&registry, model)?;
        config.save()?;
        println!("Default model set to {} ({}).", model, AppConfig::config_path().display());
        return Ok(());
    }

    for provider in registry.all() {
        println!("{} ({})", provider.display_name, provider.id);
        for model in &provider.models {
            let marker = if *model == config.ai.default_model { " (default)" } else { "" };
            println!("  {}{}", model, marker);
        }
        println!();
    }

    Ok(())
}
