//! System prompt construction
//!
//! The model learns about its tools only through the system prompt, so the
//! prompt sent with every call is the tool listing followed by either the
//! configured prompt or [`default_system_prompt`].

use crate::config::SessionConfig;
use crate::protocol::Markers;
use crate::tools::ToolRegistry;

/// Tool descriptions longer than this are cut off in the listing
const MAX_DESCRIPTION_CHARS: usize = 150;

/// List the registry's tools for the model
///
/// Returns an empty string for an empty registry.
pub fn tools_description(registry: &ToolRegistry, markers: &Markers) -> String {
    if registry.is_empty() {
        return String::new();
    }

    let mut desc = String::from("You can use the following tools:\n");
    for tool in registry.list() {
        let text = tool.description.trim();
        let text = if text.is_empty() { "No description" } else { text };
        desc.push_str(&format!("- {}: {}\n", tool.signature(), truncate(text, MAX_DESCRIPTION_CHARS)));
    }

    desc.push_str(&format!(
        "\nUsage example: {}tool_name{}param1{}param2\n",
        markers.command_start, markers.command_separator, markers.command_separator,
    ));
    if registry.list().iter().any(|tool| tool.handle.binds_by_name()) {
        desc.push_str(&format!(
            "Parameters of mcp_ tools may also be given by name: {}mcp_tool{}param2=value\n",
            markers.command_start, markers.command_separator,
        ));
    }
    desc
}

/// Instructions used when the preset has no `system_prompt`
pub fn default_system_prompt(markers: &Markers) -> String {
    format!(
        r#"You are an assistant that can call tools to act on the user's behalf.

## Response mode

- When the user asks for an operation (query, search, file work, ...), reply with exactly one line of the form
  {start}tool_name{sep}param1{sep}param2
  and nothing else.
- When the user asks for content, asks a question, or is just talking, reply with the content itself and no tool call.
- When the user says "continue", reply with the next {start} line only.

## Intent

- A statement of fact ("I live in Jinan") is not a request; answer it directly.
- Only an explicit request ("save this to my desktop") calls for a tool.

## Tool calls

- Only call tools from the list above.
- Check that every required parameter is present and has the right type (number, string, boolean).
- Parameters go in the listed order.
- The result of each call is sent back to you; use it to continue or to answer.

## Never

- Put any text before or after a {start} line.
- Plan several steps the user did not ask for, or merge several operations into one line.
- Answer with filler such as "I'll", "let me", "now" or "then".

If an operation fails, say "Operation failed" or wait for the user's next instruction."#,
        start = markers.command_start,
        sep = markers.command_separator,
    )
}

/// The full system prompt for a session
pub fn compose(config: &SessionConfig, registry: &ToolRegistry) -> String {
    let markers = config.markers();
    let base = match &config.system_prompt {
        Some(prompt) if !prompt.trim().is_empty() => prompt.clone(),
        _ => default_system_prompt(&markers),
    };

    let tools = tools_description(registry, &markers);
    if tools.is_empty() {
        base
    } else {
        format!("{}\n\n{}", tools, base)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{LocalProvider, ParamSpec, ParamType};

    async fn registry(description: &str) -> ToolRegistry {
        let provider = LocalProvider::new("test").function(
            "add",
            description,
            vec![
                ParamSpec::required("a", ParamType::Number),
                ParamSpec::required("b", ParamType::Number),
            ],
            |_| Ok(String::new()),
        );
        ToolRegistry::builder().provider(provider).build().await.unwrap()
    }

    #[tokio::test]
    async fn test_tools_description_lists_signatures() {
        let registry = registry("Add two numbers").await;
        let desc = tools_description(&registry, &Markers::new("CMD:", "|"));

        assert!(desc.starts_with("You can use the following tools:\n"));
        assert!(desc.contains("- add(a: number, b: number): Add two numbers\n"));
        assert!(desc.contains("Usage example: CMD:tool_name|param1|param2"));
        assert!(!desc.contains("given by name"));
    }

    #[tokio::test]
    async fn test_long_descriptions_are_truncated() {
        let long = "é".repeat(200);
        let registry = registry(&long).await;
        let desc = tools_description(&registry, &Markers::default());

        let expected = format!("{}...", "é".repeat(150));
        assert!(desc.contains(&expected));
        assert!(!desc.contains(&"é".repeat(151)));
    }

    #[tokio::test]
    async fn test_compose() {
        let empty = ToolRegistry::default();
        let config = SessionConfig {
            system_prompt: Some("Be brief.".into()),
            ..Default::default()
        };
        assert_eq!(compose(&config, &empty), "Be brief.");

        let registry = registry("Add two numbers").await;
        let prompt = compose(&SessionConfig::default(), &registry);
        assert!(prompt.starts_with("You can use the following tools:"));
        assert!(prompt.contains("YLDEXECUTE:tool_name￥|param1￥|param2"));
    }
}
