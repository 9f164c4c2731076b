use serde::Deserialize;
use std::collections::HashSet;

/// One upstream agent, keyed by the model name clients see.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub model: String,
    pub agent_id: String,
    pub api_key: String,
    #[serde(default)]
    pub description: String,
}

/// Immutable model-name -> agent mapping, loaded once at startup.
/// Declaration order is preserved for `/v1/models`.
#[derive(Debug, Clone)]
pub struct AgentTable {
    agents: Vec<AgentConfig>,
}

impl AgentTable {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let agents: Vec<AgentConfig> = serde_json::from_str(raw)
            .map_err(|err| format!("agent table parse failed: {err}"))?;
        Self::from_entries(agents)
    }

    pub fn from_entries(agents: Vec<AgentConfig>) -> Result<Self, String> {
        if agents.is_empty() {
            return Err("agent table is empty".to_string());
        }
        let mut seen = HashSet::new();
        for agent in &agents {
            if agent.model.trim().is_empty() {
                return Err("agent entry has an empty model name".to_string());
            }
            if !seen.insert(agent.model.as_str()) {
                return Err(format!("duplicate model name '{}'", agent.model));
            }
        }
        Ok(Self { agents })
    }

    pub fn lookup(&self, model: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.model == model)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|agent| agent.model.as_str())
    }

    pub fn first_model(&self) -> Option<&str> {
        self.agents.first().map(|agent| agent.model.as_str())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Pacing knobs for the pseudo-stream emitter. A fixed global setting, not
/// adaptive to text length or client backpressure.
#[derive(Debug, Clone, Copy)]
pub struct StreamTuning {
    pub chunk_size: usize,
    pub delay_ms: u64,
}

impl StreamTuning {
    pub fn new(chunk_size: usize, delay_ms: u64) -> Self {
        Self {
            // A zero chunk size would never make progress.
            chunk_size: chunk_size.max(1),
            delay_ms,
        }
    }
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self::new(3, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(model: &str) -> AgentConfig {
        AgentConfig {
            model: model.to_string(),
            agent_id: format!("agent-{model}"),
            api_key: "k".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn preserves_declaration_order() {
        let table =
            AgentTable::from_entries(vec![entry("b-model"), entry("a-model"), entry("c-model")])
                .unwrap();
        let names: Vec<&str> = table.model_names().collect();
        assert_eq!(names, vec!["b-model", "a-model", "c-model"]);
        assert_eq!(table.first_model(), Some("b-model"));
    }

    #[test]
    fn rejects_duplicate_model_names() {
        let err = AgentTable::from_entries(vec![entry("same"), entry("same")]).unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn rejects_empty_table_and_empty_names() {
        assert!(AgentTable::from_entries(Vec::new()).is_err());
        assert!(AgentTable::from_entries(vec![entry("  ")]).is_err());
    }

    #[test]
    fn parses_json_array() {
        let table = AgentTable::from_json(
            r#"[{"model":"Sonar Pro","agent_id":"a1","api_key":"k1","description":"fast"}]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("Sonar Pro").unwrap().agent_id, "a1");
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(
            AgentTable::from_json(r#"[{"model":"m","agent_id":"a","api_key":"k","extra":1}]"#)
                .is_err()
        );
    }

    #[test]
    fn chunk_size_is_clamped_to_one() {
        assert_eq!(StreamTuning::new(0, 0).chunk_size, 1);
        assert_eq!(StreamTuning::new(8, 10).chunk_size, 8);
    }
}
