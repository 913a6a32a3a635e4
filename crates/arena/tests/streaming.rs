use arena::arena::Arena;
use arena::auth::AuthContext;
use arena::citations::renumber;
use arena::client::{ArenaClient, Roster, RosterEntry};
use arena::config::ClientConfig;
use arena::slots::{SlotId, SlotLayout};
use arena::stream::decoder::ChunkDecoder;
use arena::stream::{RoundOutcome, Snapshot};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn roster(count: usize) -> Roster {
    Roster {
        status: Some("success".to_string()),
        agents: (1..=count)
            .map(|n| RosterEntry {
                id: format!("u-{n}"),
                agent_id: Some(format!("agent-{n}")),
                name: Some(format!("Agent {n}")),
            })
            .collect(),
        session_id: "session-1".to_string(),
    }
}

fn ndjson(lines: &[Value]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/deepresearch-question"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(server)
        .await;
}

fn arena_with(server: &MockServer, layout: SlotLayout) -> Arena {
    let client = ArenaClient::new(&ClientConfig::new(server.uri()), AuthContext::anonymous())
        .expect("client");
    Arena::with_roster(client, roster(layout.len()), layout)
}

#[tokio::test]
async fn two_agents_stream_to_completion_and_persist_once() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        ndjson(&[
            json!({"agentA_final_report": "Hello"}),
            json!({"agentB_final_report": "Hi"}),
            json!({"agentA_is_complete": true, "agentB_is_complete": true, "final": true}),
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/save-conversation"))
        .and(body_partial_json(json!({
            "session_id": "session-1",
            "question": "Say hello",
            "agent_a_response": "Hello",
            "agent_b_response": "Hi",
            "agent_a_id": "agent-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut arena = arena_with(&server, SlotLayout::pair());
    let mut snapshots: Vec<Snapshot> = Vec::new();
    let report = arena
        .ask("Say hello", CancellationToken::new(), |snapshot, _| {
            snapshots.push(snapshot.clone())
        })
        .await
        .expect("round");

    assert_eq!(report.outcome, RoundOutcome::Finalized);
    assert_eq!(snapshots.len(), 3);

    let last = snapshots.last().unwrap();
    assert!(last.is_final);
    let a = last.agent(SlotId::A).unwrap();
    let b = last.agent(SlotId::B).unwrap();
    assert_eq!((a.content.as_str(), a.is_complete), ("Hello", true));
    assert_eq!((b.content.as_str(), b.is_complete), ("Hi", true));

    let history = arena.conversation().history(SlotId::B);
    assert_eq!(history[1].text(), "Hi");
    assert!(history[1].is_complete());
    // MockServer verifies the save-conversation expectation on drop
}

#[tokio::test]
async fn state_at_each_callback_is_the_union_of_lines_so_far() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        ndjson(&[
            json!({"metadata": {"passages_a": [{"title": "p"}], "agentA_type": "perplexity"}}),
            json!({"agentA_intermediate_steps": "Searching|||---|||Reading", "agentA_is_intermediate": true}),
            json!({"heartbeat": true, "timestamp": 1718000000.0}),
            json!({"agentA_final_report": "```markdown\nSee [1] and [3]\n```", "agentA_is_intermediate": false}),
            json!({"agentA_citations": ["https://a.example", "https://b.example", "https://a.example"]}),
            json!({"agentA_is_complete": true, "agentB_is_complete": true, "final": true}),
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/save-conversation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .mount(&server)
        .await;

    let mut arena = arena_with(&server, SlotLayout::pair());
    let mut snapshots: Vec<Snapshot> = Vec::new();
    arena
        .ask("q", CancellationToken::new(), |snapshot, _| snapshots.push(snapshot.clone()))
        .await
        .expect("round");

    assert_eq!(snapshots.len(), 5);

    let a: Vec<_> = snapshots.iter().map(|s| s.agent(SlotId::A).unwrap().clone()).collect();
    assert_eq!(a[0].passages, vec![json!({"title": "p"})]);
    assert_eq!(a[1].intermediate, "Searching|||---|||Reading");
    assert!(a[1].is_intermediate);
    assert_eq!(a[2].content, "See [1] and [3]");
    assert_eq!(a[2].intermediate, "Searching|||---|||Reading");
    assert!(!a[2].is_intermediate);
    assert_eq!(a[3].content, "See [1] and [3]");
    assert_eq!(a[3].citations.len(), 3);
    assert!(a[4].is_complete);
    assert_eq!(snapshots[4].metadata.agent_type(SlotId::A), Some("perplexity"));

    let rendered = renumber(&a[4].content, &a[4].citations);
    assert_eq!(rendered.text, "See [1] and [1]");
    assert_eq!(rendered.visible_citations(a[4].is_complete).len(), 2);
}

#[tokio::test]
async fn backend_error_line_ends_the_round() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        ndjson(&[
            json!({"agentA_final_report": "partial"}),
            json!({"error": "boom"}),
            json!({"agentA_final_report": "ignored", "final": true}),
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/save-conversation"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut arena = arena_with(&server, SlotLayout::trio());
    let mut snapshots: Vec<Snapshot> = Vec::new();
    let report = arena
        .ask("q", CancellationToken::new(), |snapshot, _| snapshots.push(snapshot.clone()))
        .await
        .expect("round");

    assert_eq!(report.outcome, RoundOutcome::BackendError("boom".to_string()));
    assert_eq!(snapshots.len(), 2);
    let terminal = &snapshots[1];
    assert!(terminal.is_final);
    assert_eq!(terminal.message.as_deref(), Some("Error: boom"));
    assert_eq!(terminal.agents.len(), 3);

    for slot in SlotLayout::trio().slots() {
        assert_eq!(arena.conversation().history(slot)[1].text(), "Error: boom");
    }
}

#[tokio::test]
async fn malformed_lines_produce_no_callback_and_change_nothing() {
    let server = MockServer::start().await;
    let body = [
        json!({"agentA_final_report": "Hello", "agentA_citations": ["https://a.example"]}).to_string(),
        "{not json}".to_string(),
        "[1,2]".to_string(),
        "\"agentA_final_report\"".to_string(),
        json!({"agentB_final_report": "Hi"}).to_string(),
        "{\"agentA_final_report\": \"trunc".to_string(),
        json!({"final": true}).to_string(),
    ]
    .iter()
    .map(|line| format!("{}\n", line))
    .collect::<String>();
    mount_stream(&server, body).await;
    Mock::given(method("POST"))
        .and(path("/api/save-conversation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut arena = arena_with(&server, SlotLayout::pair());
    let mut snapshots: Vec<Snapshot> = Vec::new();
    let report = arena
        .ask("q", CancellationToken::new(), |snapshot, _| snapshots.push(snapshot.clone()))
        .await
        .expect("round");

    assert_eq!(report.outcome, RoundOutcome::Finalized);
    assert_eq!(report.delivered, 3);
    assert_eq!(snapshots.len(), 3);

    let a_after_first = snapshots[0].agent(SlotId::A).unwrap().clone();
    let a_after_second = snapshots[1].agent(SlotId::A).unwrap();
    assert_eq!(a_after_second.content, a_after_first.content);
    assert_eq!(a_after_second.citations, a_after_first.citations);
    assert!(!a_after_second.updated);
    assert_eq!(snapshots[1].agent(SlotId::B).unwrap().content, "Hi");

    let last = snapshots.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.agent(SlotId::A).unwrap().content, "Hello");
    assert_eq!(last.agent(SlotId::B).unwrap().content, "Hi");
}

#[test]
fn fragments_split_mid_line_are_reassembled() {
    let body = ndjson(&[
        json!({"agentA_final_report": "caf\u{e9} au lait"}),
        json!({"final": true}),
    ]);

    let mut decoder = ChunkDecoder::new();
    let mut objects = Vec::new();
    for fragment in body.as_bytes().chunks(3) {
        objects.extend(decoder.push(fragment));
    }
    decoder.finish();

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["agentA_final_report"], "caf\u{e9} au lait");
    assert_eq!(objects[1]["final"], true);
}
