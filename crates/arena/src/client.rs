use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};
use url::Url;

use crate::auth::AuthContext;
use crate::config::ClientConfig;
use crate::errors::{ArenaError, ArenaResult};
use crate::models::citation::Citation;
use crate::models::message::ChatMessage;
use crate::slots::{SlotId, SlotLayout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Public identifier the backend uses in votes and persistence
    pub id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Agents drawn for a session by the bootstrap endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub status: Option<String>,
    pub agents: Vec<RosterEntry>,
    pub session_id: String,
}

impl Roster {
    pub fn agent(&self, slot: SlotId) -> Option<&RosterEntry> {
        self.agents.get(slot.index())
    }

    /// `{"agentA": id, "agentB": id, ...}` as the question endpoint expects
    pub fn selected_agents(&self, layout: SlotLayout) -> Value {
        let selected: Map<String, Value> = layout
            .slots()
            .filter_map(|slot| {
                self.agent(slot)
                    .map(|entry| (slot.to_string(), Value::String(entry.id.clone())))
            })
            .collect();
        Value::Object(selected)
    }
}

/// Body of one question round
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRequest {
    pub question: String,
    /// Prior turns per slot, not including this question
    pub conversations: BTreeMap<SlotId, Vec<ChatMessage>>,
    pub selected_agents: Option<Value>,
}

impl QuestionRequest {
    pub fn new<S: Into<String>>(question: S, layout: SlotLayout) -> Self {
        QuestionRequest {
            question: question.into(),
            conversations: layout.slots().map(|slot| (slot, Vec::new())).collect(),
            selected_agents: None,
        }
    }

    pub fn with_history(mut self, slot: SlotId, history: Vec<ChatMessage>) -> Self {
        self.conversations.insert(slot, history);
        self
    }

    pub fn with_selected_agents(mut self, selected_agents: Value) -> Self {
        self.selected_agents = Some(selected_agents);
        self
    }

    pub fn to_body(&self) -> ArenaResult<Value> {
        let mut body = Map::new();
        body.insert("question".to_string(), Value::String(self.question.clone()));
        for (slot, history) in &self.conversations {
            body.insert(slot.lower_key("conversation"), serde_json::to_value(history)?);
        }
        if let Some(selected) = &self.selected_agents {
            body.insert("selected_agents".to_string(), selected.clone());
        }
        Ok(Value::Object(body))
    }
}

/// The user's verdict on a two-agent round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize)]
pub enum Choice {
    #[strum(serialize = "choice1")]
    #[serde(rename = "choice1")]
    ABetter,
    #[strum(serialize = "choice2")]
    #[serde(rename = "choice2")]
    BBetter,
    #[strum(serialize = "choice3")]
    #[serde(rename = "choice3")]
    Tie,
    #[strum(serialize = "choice4")]
    #[serde(rename = "choice4")]
    BothBad,
}

impl Choice {
    pub fn label(&self) -> &'static str {
        match self {
            Choice::ABetter => "Agent A is better",
            Choice::BBetter => "Agent B is better",
            Choice::Tie => "Tie",
            Choice::BothBad => "Both are bad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceRequest {
    pub choice: Choice,
    pub question: String,
    pub conversation_a: Vec<ChatMessage>,
    pub conversation_b: Vec<ChatMessage>,
    pub selected_agents: Vec<RosterEntry>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevealedAgent {
    pub name: String,
}

/// Agent identities revealed once a choice is recorded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChoiceReveal {
    #[serde(rename = "AgentA", default)]
    pub agent_a: Option<RevealedAgent>,
    #[serde(rename = "AgentB", default)]
    pub agent_b: Option<RevealedAgent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanVote {
    pub vote: VoteDirection,
    pub highlighted_text: String,
    pub agent_uuid: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepVote {
    pub vote: VoteDirection,
    pub step_text: String,
    pub agent_uuid: String,
    pub session_id: String,
}

/// One agent's finalized answer as stored by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub slot: SlotId,
    pub id: String,
    pub name: String,
    pub response: String,
    pub intermediate_steps: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub session_id: String,
    pub question: String,
    pub agents: Vec<AgentRecord>,
}

impl ConversationRecord {
    pub fn to_body(&self) -> ArenaResult<Value> {
        let mut body = Map::new();
        for agent in &self.agents {
            let slot = agent.slot;
            body.insert(slot.record_key("id"), json!(agent.id));
            body.insert(slot.record_key("name"), json!(agent.name));
            body.insert(slot.record_key("response"), json!(agent.response));
            body.insert(
                slot.record_key("intermediate_steps"),
                json!(agent.intermediate_steps),
            );
            // The backend stores citations as a JSON string column
            body.insert(
                slot.record_key("citations"),
                Value::String(serde_json::to_string(&agent.citations)?),
            );
        }
        body.insert("session_id".to_string(), json!(self.session_id));
        body.insert("question".to_string(), json!(self.question));
        Ok(Value::Object(body))
    }
}

/// HTTP client for the arena backend
#[derive(Debug, Clone)]
pub struct ArenaClient {
    client: Client,
    base_url: Url,
}

impl ArenaClient {
    pub fn new(config: &ClientConfig, auth: AuthContext) -> ArenaResult<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth.headers().clone())
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ArenaResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Draw the agents for a new session
    pub async fn bootstrap(&self) -> ArenaResult<Roster> {
        let response = self
            .client
            .get(self.endpoint("api/deepresearch-agents")?)
            .send()
            .await?;
        let roster: Roster = ensure_success(response).await?.json().await?;
        tracing::info!(
            session_id = %roster.session_id,
            agents = roster.agents.len(),
            "Bootstrapped arena session"
        );
        Ok(roster)
    }

    /// Submit a question. The returned response body is the newline-delimited answer stream.
    pub async fn open_question_stream(&self, request: &QuestionRequest) -> ArenaResult<Response> {
        let response = self
            .client
            .post(self.endpoint("api/deepresearch-question")?)
            .json(&request.to_body()?)
            .send()
            .await?;
        ensure_success(response).await
    }

    pub async fn submit_choice(&self, request: &ChoiceRequest) -> ArenaResult<ChoiceReveal> {
        let value = self.post_json("api/deepresearch-choice", &serde_json::to_value(request)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn vote_span(&self, vote: &SpanVote) -> ArenaResult<()> {
        self.post_json("api/answer-span-vote", &serde_json::to_value(vote)?).await?;
        Ok(())
    }

    pub async fn vote_step(&self, vote: &StepVote) -> ArenaResult<()> {
        self.post_json("api/intermediate-step-vote", &serde_json::to_value(vote)?).await?;
        Ok(())
    }

    pub async fn save_conversation(&self, record: &ConversationRecord) -> ArenaResult<()> {
        self.post_json("api/save-conversation", &record.to_body()?).await?;
        tracing::info!(session_id = %record.session_id, "Saved conversation");
        Ok(())
    }

    /// Whether the backend is reachable and accepts this client's credentials
    pub async fn probe_credentials(&self) -> ArenaResult<bool> {
        let reachable = self
            .client
            .get(self.endpoint("api/deepresearch-agents")?)
            .send()
            .await?;
        if !reachable.status().is_success() {
            tracing::warn!(status = %reachable.status(), "Cannot reach the backend");
            return Ok(false);
        }

        let mut url = self.endpoint("api/conversation-history")?;
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("page_size", "1");
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => {
                tracing::warn!(%status, "Unexpected status while checking credentials");
                Ok(false)
            }
        }
    }

    async fn post_json(&self, path: &str, payload: &Value) -> ArenaResult<Value> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(payload)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&text)?;
        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(ArenaError::Backend(message));
        }
        Ok(value)
    }
}

async fn ensure_success(response: Response) -> ArenaResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ArenaError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}
