use crate::core::config::Config;

pub fn list_providers(config: &Config) {
    print!("{}", render_provider_table(config));
}

pub fn render_provider_table(config: &Config) -> String {
    if config.providers.is_empty() {
        return if std::env::var("OPENAI_API_KEY").is_ok() {
            "No providers configured; using OPENAI_API_KEY from the environment.\n".to_string()
        } else {
            "No providers configured.\n".to_string()
        };
    }

    let mut table = String::from("Configured Providers:\n\n");
    table.push_str("| Provider | Protocol | Model | URL |\n");
    table.push_str("|---|---|---|---|\n");

    for provider in &config.providers {
        let is_default = config
            .default_provider
            .as_ref()
            .is_some_and(|default| default.eq_ignore_ascii_case(&provider.id));
        let id = if is_default {
            format!("{}*", provider.id)
        } else {
            provider.id.clone()
        };
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            id, provider.protocol, provider.model, provider.base_url
        ));
    }

    if config.default_provider.is_some() {
        table.push_str("\n* = default provider\n");
    }
    table
}
