use super::agent::{Agent, CUSTOM_AGENT_COLOR, builtin_agents, is_builtin_id};
use super::commands::create_command_registry;
use super::outcome::Outcome;
use super::registry::CommandRegistry;
use super::store::KeyValueStore;
use crate::core::error::AgoraError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const AGENTS_KEY: &str = "agents";
pub const ACTIVE_AGENT_KEY: &str = "active_agent";
pub const HISTORY_KEY: &str = "agent_history";

pub const MAX_HISTORY: usize = 50;
const SILENT_ACTIVATION_THRESHOLD: usize = 2;
const MAX_SUGGESTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub context: String,
}

/// Export/import format for the whole agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub history: Vec<ActivationRecord>,
    #[serde(default)]
    pub active_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion<'a> {
    pub agent: &'a Agent,
    pub relevance: usize,
}

/// Persona catalog and the state machine driven by user input.
///
/// At most one agent is active at a time. Every mutation is written through
/// to the store immediately.
pub struct AgentService {
    store: Box<dyn KeyValueStore>,
    commands: Arc<CommandRegistry>,
    agents: Vec<Agent>,
    active: Option<String>,
    history: Vec<ActivationRecord>,
}

impl AgentService {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let mut service = Self {
            store,
            commands: Arc::new(create_command_registry()),
            agents: builtin_agents(),
            active: None,
            history: Vec::new(),
        };
        service.load();
        service
    }

    fn load(&mut self) {
        if let Some(saved) = self.read_json::<Vec<Agent>>(AGENTS_KEY) {
            for agent in saved {
                self.merge_custom(agent);
            }
        }

        if let Some(mut history) = self.read_json::<Vec<ActivationRecord>>(HISTORY_KEY) {
            cap_history(&mut history);
            self.history = history;
        }

        match self.store.get(ACTIVE_AGENT_KEY) {
            Ok(Some(id)) if self.find_agent(&id).is_some() => self.active = Some(id),
            Ok(Some(id)) => {
                tracing::debug!("Saved active agent '{}' no longer exists", id);
                if let Err(e) = self.store.remove(ACTIVE_AGENT_KEY) {
                    tracing::warn!("Could not clear active agent: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not read active agent: {}", e),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Could not read '{}': {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding corrupt '{}' entry: {}", key, e);
                None
            }
        }
    }

    /// Adds or replaces a custom agent. Built-ins always come from code.
    fn merge_custom(&mut self, mut agent: Agent) -> bool {
        if is_builtin_id(&agent.id) {
            return false;
        }
        agent.custom = true;
        match self.agents.iter_mut().find(|existing| existing.id == agent.id) {
            Some(existing) => *existing = agent,
            None => self.agents.push(agent),
        }
        true
    }

    fn save_agents(&self) -> Result<(), AgoraError> {
        let custom: Vec<&Agent> = self.custom_agents();
        self.store.set(AGENTS_KEY, &serde_json::to_string(&custom)?)
    }

    fn save_history(&self) -> Result<(), AgoraError> {
        self.store
            .set(HISTORY_KEY, &serde_json::to_string(&self.history)?)
    }

    fn save_active(&self) -> Result<(), AgoraError> {
        match &self.active {
            Some(id) => self.store.set(ACTIVE_AGENT_KEY, id),
            None => self.store.remove(ACTIVE_AGENT_KEY),
        }
    }

    /// Runs a slash command, performs a silent activation, or passes the
    /// input through with the active agent's prompt.
    pub fn interpret(&mut self, raw: &str) -> Outcome {
        let commands = Arc::clone(&self.commands);
        if let Some((handler, args)) = commands.find(raw) {
            return handler
                .execute(self, args)
                .unwrap_or_else(|e| Outcome::Error(e.to_string()));
        }

        if let Some(agent) = self.detect_keyword_activation(raw) {
            if self.active.as_deref() != Some(agent.id.as_str()) {
                tracing::debug!(agent = %agent.id, "silent activation");
                self.active = Some(agent.id.clone());
                if let Err(e) = self.save_active() {
                    tracing::warn!("Could not persist active agent: {}", e);
                }
                return Outcome::SilentActivation(agent);
            }
        }

        Outcome::PassThrough {
            agent_prompt: self.agent_prompt().map(str::to_string),
        }
    }

    /// The agent whose keyword count is at least the threshold and strictly
    /// above every other agent's count.
    pub fn detect_keyword_activation(&self, text: &str) -> Option<Agent> {
        let lower = text.to_lowercase();
        let mut best: Option<(&Agent, usize)> = None;
        let mut tied = false;

        for agent in &self.agents {
            let matches = agent.keyword_matches(&lower);
            match best {
                Some((_, count)) if matches == count => tied = true,
                Some((_, count)) if matches < count => {}
                _ => {
                    best = Some((agent, matches));
                    tied = false;
                }
            }
        }

        match best {
            Some((agent, count)) if !tied && count >= SILENT_ACTIVATION_THRESHOLD => {
                Some(agent.clone())
            }
            _ => None,
        }
    }

    pub fn activate_agent(&mut self, id: &str) -> Result<Agent, AgoraError> {
        let agent = self
            .find_agent(id)
            .cloned()
            .ok_or_else(|| AgoraError::Input(format!("Agent '{}' not found", id)))?;

        let mut history = self.history.clone();
        history.push(ActivationRecord {
            agent_id: agent.id.clone(),
            timestamp: Utc::now(),
            context: "manual-activation".to_string(),
        });
        cap_history(&mut history);

        // Both keys are written before any in-memory state changes.
        self.store.set(ACTIVE_AGENT_KEY, &agent.id)?;
        if let Err(e) = self
            .store
            .set(HISTORY_KEY, &serde_json::to_string(&history)?)
        {
            if let Err(restore) = self.save_active() {
                tracing::warn!("Could not restore active agent: {}", restore);
            }
            return Err(e);
        }

        self.active = Some(agent.id.clone());
        self.history = history;
        Ok(agent)
    }

    pub fn deactivate_agent(&mut self) -> Result<(), AgoraError> {
        self.active = None;
        self.save_active()
    }

    pub fn active_agent(&self) -> Option<&Agent> {
        self.active.as_deref().and_then(|id| self.find_agent(id))
    }

    pub fn agent_prompt(&self) -> Option<&str> {
        self.active_agent().map(|agent| agent.prompt.as_str())
    }

    pub fn find_agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn all_agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|agent| agent.name.as_str()).collect()
    }

    pub fn custom_agents(&self) -> Vec<&Agent> {
        self.agents.iter().filter(|agent| agent.custom).collect()
    }

    pub fn history(&self) -> &[ActivationRecord] {
        &self.history
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.get_command_names()
    }

    pub fn command_usages(&self) -> Vec<&'static str> {
        self.commands.usages()
    }

    /// Adds a custom agent parsed from `/create`. Built-in ids are refused.
    pub fn insert_custom_agent(&mut self, agent: Agent) -> Result<(), AgoraError> {
        if !self.merge_custom(agent.clone()) {
            return Err(AgoraError::Input(format!(
                "'{}' is a built-in agent",
                agent.id
            )));
        }
        self.save_agents()
    }

    pub fn create_custom_agent(
        &mut self,
        name: &str,
        prompt: &str,
        color: Option<&str>,
    ) -> Result<Agent, AgoraError> {
        let agent = Agent {
            id: format!("custom-{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            description: format!("Custom agent: {}", name),
            prompt: prompt.to_string(),
            icon: "🤖".to_string(),
            keywords: Vec::new(),
            color: color.unwrap_or(CUSTOM_AGENT_COLOR).to_string(),
            custom: true,
            created_at: Some(Utc::now()),
        };
        self.insert_custom_agent(agent.clone())?;
        Ok(agent)
    }

    /// Returns false for built-ins and unknown ids. Deleting the active agent
    /// deactivates it.
    pub fn delete_custom_agent(&mut self, id: &str) -> Result<bool, AgoraError> {
        let Some(index) = self
            .agents
            .iter()
            .position(|agent| agent.id == id && agent.custom)
        else {
            return Ok(false);
        };

        self.agents.remove(index);
        self.save_agents()?;
        if self.active.as_deref() == Some(id) {
            self.deactivate_agent()?;
        }
        Ok(true)
    }

    /// Up to two agents with at least one keyword in `input`, most relevant first.
    pub fn suggest_agents(&self, input: &str) -> Vec<Suggestion<'_>> {
        let lower = input.to_lowercase();
        let mut suggestions: Vec<Suggestion<'_>> = self
            .agents
            .iter()
            .map(|agent| Suggestion {
                agent,
                relevance: agent.keyword_matches(&lower),
            })
            .filter(|suggestion| suggestion.relevance > 0)
            .collect();
        suggestions.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }

    pub fn export_data(&self) -> AgentSnapshot {
        AgentSnapshot {
            agents: self.agents.clone(),
            history: self.history.clone(),
            active_agent: self.active.clone(),
        }
    }

    /// Replaces custom agents, history and the active pointer. Built-ins in
    /// the snapshot are ignored; an active id that does not resolve clears
    /// the active agent.
    pub fn import_data(&mut self, snapshot: AgentSnapshot) -> Result<(), AgoraError> {
        self.agents = builtin_agents();
        for agent in snapshot.agents.into_iter().filter(|agent| agent.custom) {
            self.merge_custom(agent);
        }

        self.history = snapshot.history;
        cap_history(&mut self.history);

        self.active = snapshot
            .active_agent
            .filter(|id| self.find_agent(id).is_some());

        self.save_agents()?;
        self.save_history()?;
        self.save_active()
    }

    /// Appends the active agent's fragment to `base`.
    pub fn merge_system_prompt(&self, base: &str) -> String {
        let Some(agent) = self.active_agent() else {
            return base.to_string();
        };
        let fragment = format!("You are acting as: {}\n{}", agent.name, agent.prompt);
        if base.trim().is_empty() {
            fragment
        } else {
            format!("{}\n\n{}", base, fragment)
        }
    }
}

fn cap_history(history: &mut Vec<ActivationRecord>) {
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}
