use std::collections::HashSet;

use url::Url;

use super::ServerConfig;
use crate::core::tools::HttpToolConfig;

/// Run every validation against a merged configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_reply_deadline(config.reply_deadline_ms)?;
    validate_barge_in(config.barge_in_min_words)?;
    validate_tools(&config.tools)?;
    if let Some(base_url) = &config.openai_base_url {
        Url::parse(base_url).map_err(|e| format!("Invalid OPENAI_BASE_URL '{base_url}': {e}"))?;
    }
    Ok(())
}

/// The reply deadline must leave room for at least one model round-trip
pub fn validate_reply_deadline(reply_deadline_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    if reply_deadline_ms == 0 {
        return Err("REPLY_DEADLINE_MS must be greater than zero".into());
    }
    Ok(())
}

pub fn validate_barge_in(min_words: usize) -> Result<(), Box<dyn std::error::Error>> {
    if min_words == 0 {
        return Err("BARGE_IN_MIN_WORDS must be at least 1".into());
    }
    Ok(())
}

/// Validate tool declarations
///
/// Validates that:
/// - names are non-empty and unique
/// - URLs parse and use http or https
/// - the parameter schema is a JSON object
pub fn validate_tools(tools: &[HttpToolConfig]) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen = HashSet::new();
    for tool in tools {
        if tool.name.trim().is_empty() {
            return Err("Tool name cannot be empty".into());
        }
        if !seen.insert(tool.name.as_str()) {
            return Err(format!("Duplicate tool name: {}", tool.name).into());
        }

        let url = Url::parse(&tool.url)
            .map_err(|e| format!("Tool '{}' has an invalid url '{}': {e}", tool.name, tool.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Tool '{}' url must use http or https, got '{}'",
                tool.name,
                url.scheme()
            )
            .into());
        }

        if !tool.parameters.is_object() {
            return Err(format!("Tool '{}' parameters must be a JSON schema object", tool.name).into());
        }
    }
    Ok(())
}
