use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Color given to agents created through `/create`.
pub const COMMAND_AGENT_COLOR: &str = "#6b7280";
/// Default color for agents created programmatically.
pub const CUSTOM_AGENT_COLOR: &str = "#6366f1";

/// A persona: a named system-prompt fragment plus the keywords that can
/// silently activate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn is_builtin(&self) -> bool {
        !self.custom
    }

    /// Number of keywords found in `lower_text`, which must already be lowercased.
    pub fn keyword_matches(&self, lower_text: &str) -> usize {
        self.keywords
            .iter()
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty() && lower_text.contains(keyword.as_str()))
            .count()
    }

    pub fn summary(&self) -> String {
        format!("{} {} ({}) - {}", self.icon, self.name, self.id, self.description)
    }
}

struct BuiltinAgent {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    prompt: &'static str,
    icon: &'static str,
    keywords: &'static [&'static str],
    color: &'static str,
}

const BUILTIN_AGENTS: [BuiltinAgent; 5] = [
    BuiltinAgent {
        id: "code-master",
        name: "Code Master",
        description: "Programming and software development specialist",
        prompt: "You are an expert in programming, software architecture and best practices. Answer in a technical and precise way.",
        icon: "💻",
        keywords: &["código", "programar", "debug", "arquitetura", "algoritmo"],
        color: "#2563eb",
    },
    BuiltinAgent {
        id: "creative-writer",
        name: "Creative Writer",
        description: "Creative writing and storytelling specialist",
        prompt: "You are a talented creative writer. Create engaging stories, creative texts and captivating content.",
        icon: "✍️",
        keywords: &["história", "criativo", "narrativa", "poema", "roteiro"],
        color: "#dc2626",
    },
    BuiltinAgent {
        id: "data-analyst",
        name: "Data Analyst",
        description: "Data analysis and insights specialist",
        prompt: "You are an experienced data analyst. Provide data-driven insights, statistical analysis and visualizations.",
        icon: "📊",
        keywords: &["dados", "análise", "estatística", "gráfico", "insight"],
        color: "#059669",
    },
    BuiltinAgent {
        id: "business-strategist",
        name: "Business Strategist",
        description: "Business strategy specialist",
        prompt: "You are a business strategist. Give advice on business, growth strategies and decision making.",
        icon: "💼",
        keywords: &["negócio", "estratégia", "marketing", "vendas", "crescimento"],
        color: "#7c3aed",
    },
    BuiltinAgent {
        id: "science-explainer",
        name: "Science Explainer",
        description: "Science and technical explanations specialist",
        prompt: "You are a science communicator. Explain complex concepts clearly and accessibly without losing precision.",
        icon: "🔬",
        keywords: &["ciência", "física", "química", "biologia", "tecnologia"],
        color: "#0891b2",
    },
];

pub fn builtin_agents() -> Vec<Agent> {
    BUILTIN_AGENTS
        .iter()
        .map(|builtin| Agent {
            id: builtin.id.to_string(),
            name: builtin.name.to_string(),
            description: builtin.description.to_string(),
            prompt: builtin.prompt.to_string(),
            icon: builtin.icon.to_string(),
            keywords: builtin.keywords.iter().map(|k| k.to_string()).collect(),
            color: builtin.color.to_string(),
            custom: false,
            created_at: None,
        })
        .collect()
}

pub fn is_builtin_id(id: &str) -> bool {
    BUILTIN_AGENTS.iter().any(|builtin| builtin.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_not_custom() {
        let agents = builtin_agents();
        assert_eq!(agents.len(), 5);
        assert!(agents.iter().all(Agent::is_builtin));
        assert!(is_builtin_id("science-explainer"));
        assert!(!is_builtin_id("foo"));
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let code = builtin_agents().remove(0);
        assert_eq!(code.keyword_matches(&"Ajude a DEBUGAR este CÓDIGO".to_lowercase()), 2);
        assert_eq!(code.keyword_matches("me ajude"), 0);
    }

    #[test]
    fn blank_keywords_never_match() {
        let agent = Agent {
            id: "x".into(),
            name: "X".into(),
            description: String::new(),
            prompt: "p".into(),
            icon: String::new(),
            keywords: vec!["".into(), "  ".into(), "rust".into()],
            color: String::new(),
            custom: true,
            created_at: None,
        };
        assert_eq!(agent.keyword_matches("anything"), 0);
        assert_eq!(agent.keyword_matches("i like rust"), 1);
    }
}
