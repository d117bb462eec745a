use serde::{Deserialize, Serialize};

/// Name of the function a model calls to declare agreement.
pub const PROPOSE_CONSENSUS: &str = "propose_consensus";

/// Function definition sent to the model as part of the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

impl ToolDefinition {
    /// The consensus capability: one required `summary` string.
    pub fn propose_consensus() -> Self {
        Self {
            name: PROPOSE_CONSENSUS.to_string(),
            description: "Propose that the debate has reached a consensus. Call this only \
                          when you genuinely agree with the other participant, and summarise \
                          the position you both hold."
                .to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "One or two sentences stating the agreed position."
                    }
                },
                "required": ["summary"]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propose_consensus_schema_requires_summary() {
        let def = ToolDefinition::propose_consensus();
        assert_eq!(def.name, PROPOSE_CONSENSUS);
        assert_eq!(def.parameters_schema["type"], "object");
        assert_eq!(def.parameters_schema["properties"]["summary"]["type"], "string");
        assert_eq!(def.parameters_schema["required"], serde_json::json!(["summary"]));
    }
}
