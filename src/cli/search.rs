use std::error::Error;

use crate::core::config::Config;
use crate::core::search::{SearchProvider, SearchResult};

pub async fn run_search(config: &Config, query: &str) -> Result<(), Box<dyn Error>> {
    let query = query.trim();
    if query.is_empty() {
        return Err("Usage: chatgate search <query>".into());
    }
    let backend = config
        .search_backend()
        .ok_or("No search backend configured. Add a [[search.backends]] entry to the config file.")?;

    let provider = SearchProvider::new(reqwest::Client::new(), backend.clone());
    let results = provider.search(query, &config.search_limits()).await?;
    print!("{}", render_results(provider.name(), &results));
    Ok(())
}

pub fn render_results(provider: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results from {provider}.\n");
    }
    let mut out = format!("Results from {provider}:\n");
    for (index, result) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   {}\n", index + 1, result.title, result.url));
        let content = result.content.trim();
        if !content.is_empty() {
            out.push_str(&format!("   {content}\n"));
        }
    }
    out
}
