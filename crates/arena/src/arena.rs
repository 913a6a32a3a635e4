use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthContext;
use crate::client::{
    AgentRecord, ArenaClient, Choice, ChoiceRequest, ChoiceReveal, ConversationRecord,
    QuestionRequest, Roster, SpanVote, StepVote, VoteDirection,
};
use crate::config::ClientConfig;
use crate::conversation::ConversationState;
use crate::errors::{ArenaError, ArenaResult};
use crate::slots::{SlotId, SlotLayout};
use crate::stream::{FinalizedRound, RoundPersistence, RoundReport, Snapshot, StreamingSession};

/// One arena session: a roster of agents, their conversations and the rounds asked of them
pub struct Arena {
    client: ArenaClient,
    roster: Roster,
    conversation: ConversationState,
    session: StreamingSession,
    last_question: Option<String>,
}

impl Arena {
    /// Connect and draw a roster from the backend
    pub async fn start(config: &ClientConfig, auth: AuthContext) -> ArenaResult<Self> {
        let client = ArenaClient::new(config, auth)?;
        let roster = client.bootstrap().await?;
        if roster.agents.len() < config.slots.len() {
            tracing::warn!(
                agents = roster.agents.len(),
                slots = config.slots.len(),
                "Backend drew fewer agents than slots"
            );
        }
        Ok(Self::with_roster(client, roster, config.slots))
    }

    pub fn with_roster(client: ArenaClient, roster: Roster, layout: SlotLayout) -> Self {
        let archive = ConversationArchive {
            client: client.clone(),
            roster: roster.clone(),
        };
        let session = StreamingSession::new(client.clone(), layout).with_persistence(Box::new(archive));

        Arena {
            client,
            roster,
            conversation: ConversationState::new(layout),
            session,
            last_question: None,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn session_id(&self) -> &str {
        &self.roster.session_id
    }

    pub fn layout(&self) -> SlotLayout {
        self.conversation.layout()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn client(&self) -> &ArenaClient {
        &self.client
    }

    /// Ask every agent a question and stream their answers into the conversation.
    ///
    /// `on_update` sees each snapshot together with the conversation it was
    /// just written into.
    pub async fn ask<F>(
        &mut self,
        question: &str,
        cancel: CancellationToken,
        mut on_update: F,
    ) -> ArenaResult<RoundReport>
    where
        F: FnMut(&Snapshot, &ConversationState),
    {
        let layout = self.layout();
        let request = self
            .conversation
            .histories()
            .into_iter()
            .fold(QuestionRequest::new(question, layout), |request, (slot, history)| {
                request.with_history(slot, history)
            })
            .with_selected_agents(self.roster.selected_agents(layout));

        let handle = self.conversation.begin_round(question);
        self.last_question = Some(question.to_string());

        let conversation = &mut self.conversation;
        self.session
            .run_round(&request, cancel, |snapshot| {
                conversation.apply_snapshot(handle, snapshot);
                on_update(snapshot, conversation);
            })
            .await
    }

    /// Record the user's verdict on the last round. Only two-agent arenas have one.
    pub async fn choose(&self, choice: Choice) -> ArenaResult<ChoiceReveal> {
        if self.layout() != SlotLayout::pair() {
            return Err(ArenaError::InvalidSlotCount(self.layout().len()));
        }
        let request = ChoiceRequest {
            choice,
            question: self.last_question.clone().unwrap_or_default(),
            conversation_a: self.conversation.history(SlotId::A).to_vec(),
            conversation_b: self.conversation.history(SlotId::B).to_vec(),
            selected_agents: self.roster.agents.iter().take(2).cloned().collect(),
            session_id: self.roster.session_id.clone(),
        };
        self.client.submit_choice(&request).await
    }

    /// Vote on a highlighted span of one agent's answer
    pub async fn vote_span(&self, slot: SlotId, vote: VoteDirection, highlighted_text: &str) -> ArenaResult<()> {
        let vote = SpanVote {
            vote,
            highlighted_text: highlighted_text.to_string(),
            agent_uuid: self.agent_uuid(slot)?,
            session_id: self.roster.session_id.clone(),
        };
        self.client.vote_span(&vote).await
    }

    /// Vote on one of an agent's intermediate steps
    pub async fn vote_step(&self, slot: SlotId, vote: VoteDirection, step_text: &str) -> ArenaResult<()> {
        let vote = StepVote {
            vote,
            step_text: step_text.to_string(),
            agent_uuid: self.agent_uuid(slot)?,
            session_id: self.roster.session_id.clone(),
        };
        self.client.vote_step(&vote).await
    }

    fn agent_uuid(&self, slot: SlotId) -> ArenaResult<String> {
        self.roster
            .agent(slot)
            .map(|entry| entry.id.clone())
            .ok_or(ArenaError::UnassignedSlot(slot))
    }
}

/// Saves every finalized round through the backend's conversation store
struct ConversationArchive {
    client: ArenaClient,
    roster: Roster,
}

impl ConversationArchive {
    fn record(&self, round: &FinalizedRound) -> ConversationRecord {
        let agents = round
            .agents
            .iter()
            .map(|agent| {
                let entry = self.roster.agent(agent.slot);
                AgentRecord {
                    slot: agent.slot,
                    id: entry
                        .map(|e| e.agent_id.clone().unwrap_or_else(|| e.id.clone()))
                        .unwrap_or_default(),
                    name: entry
                        .and_then(|e| e.name.clone())
                        .unwrap_or_else(|| agent.slot.display_name()),
                    response: agent.content.clone(),
                    intermediate_steps: agent.intermediate.clone(),
                    citations: agent.citations.clone(),
                }
            })
            .collect();

        ConversationRecord {
            session_id: self.roster.session_id.clone(),
            question: round.question.clone(),
            agents,
        }
    }
}

#[async_trait]
impl RoundPersistence for ConversationArchive {
    async fn persist(&self, round: &FinalizedRound) -> ArenaResult<()> {
        self.client.save_conversation(&self.record(round)).await
    }
}
