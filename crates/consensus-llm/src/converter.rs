use serde_json::{json, Value};

use consensus_core::messages::Message;
use consensus_core::tools::ToolDefinition;

/// Build the streaming chat request body for one turn.
pub fn build_request_body(model: &str, messages: &[Message], tools: &[ToolDefinition]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": true,
    });

    if !tools.is_empty() {
        body["tools"] = json!(convert_tools(tools));
    }

    body
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema,
                }
            })
        })
        .collect()
}
