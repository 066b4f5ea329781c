//! End-to-end turn tests: a real `QuranClient` against a mocked reference API,
//! driven through the tool executor and agent by a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use noor::agent::Agent;
use noor::models::message::Message;
use noor::models::tool::{ToolCall, ToolPayload};
use noor::providers::mock::MockProvider;
use noor::quran::client::{QuranApi, QuranClient};
use noor::retry::RetryPolicy;
use noor::tools::ToolExecutor;

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        multiplier: 2,
    }
}

async fn mock_quran_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "mercy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search": {
                "results": [{
                    "verse_key": "39:53",
                    "text": "Allah certainly forgives all sins",
                    "translations": [{"text": "Do not despair of the mercy of Allah", "resource_name": "The Clear Quran"}]
                }]
            }
        })))
        .mount(&server)
        .await;
    server
}

fn agent_against(server: &MockServer, provider: MockProvider) -> Agent {
    let client =
        QuranClient::with_settings(&server.uri(), Duration::from_millis(200), quick_retry())
            .unwrap();
    let api: Arc<dyn QuranApi> = Arc::new(client);
    Agent::new(Arc::new(provider), ToolExecutor::new(api))
}

#[tokio::test]
async fn a_full_turn_flows_from_model_to_api_and_back() {
    let server = mock_quran_api().await;
    let provider = MockProvider::new(vec![
        Message::assistant().with_tool_request(
            "call_1",
            Ok(ToolCall::new("search_verse", json!({"query": "mercy"}))),
        ),
        Message::assistant().with_text("Surah 39, verse 53 speaks of mercy."),
    ]);
    let agent = agent_against(&server, provider);

    let outcome = agent
        .reply(
            &[Message::user().with_text("What does the Quran say about mercy?")],
            "en",
        )
        .await
        .unwrap();

    assert_eq!(outcome.text, "Surah 39, verse 53 speaks of mercy.");
    assert_eq!(outcome.tool_outcomes.len(), 1);
    match &outcome.tool_outcomes[0].payload {
        ToolPayload::SearchResults { results } => {
            assert_eq!(results[0].verse_key, "39:53");
            assert_eq!(results[0].surah, 39);
            assert_eq!(results[0].ayah, 53);
        }
        other => panic!("expected search results, got {other:?}"),
    }
    // One search request reached the wire.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_surah_from_the_model_never_reaches_the_network() {
    let server = MockServer::start().await;
    let provider = MockProvider::new(vec![
        Message::assistant().with_tool_request(
            "call_1",
            Ok(ToolCall::new(
                "get_ayah_details",
                json!({"surah_number": 200, "ayah_number": 1}),
            )),
        ),
        Message::assistant().with_text("That chapter does not exist."),
    ]);
    let agent = agent_against(&server, provider);

    let outcome = agent
        .reply(&[Message::user().with_text("show surah 200 verse 1")], "en")
        .await
        .unwrap();

    assert!(outcome.tool_outcomes[0].is_error());
    assert!(server.received_requests().await.unwrap().is_empty());
    // The turn still ends in a user-visible answer.
    assert_eq!(outcome.text, "That chapter does not exist.");
}

#[tokio::test]
async fn concurrent_tool_calls_pair_back_to_their_requests() {
    let server = mock_quran_api().await;
    Mock::given(method("GET"))
        .and(path("/chapters/39"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chapter": {
                "id": 39,
                "name_simple": "Az-Zumar",
                "name_arabic": "الزمر",
                "revelation_place": "makkah",
                "verses_count": 75,
                "translated_name": {"name": "The Groups"}
            }
        })))
        .mount(&server)
        .await;

    let provider = MockProvider::new(vec![
        Message::assistant()
            .with_tool_request(
                "call_1",
                Ok(ToolCall::new("search_verse", json!({"query": "mercy"}))),
            )
            .with_tool_request(
                "call_2",
                Ok(ToolCall::new("get_surah_info", json!({"surah_number": 39}))),
            ),
        Message::assistant().with_text("Here is the chapter and a matching verse."),
    ]);
    let agent = agent_against(&server, provider);

    let outcome = agent
        .reply(&[Message::user().with_text("tell me about surah 39")], "en")
        .await
        .unwrap();

    assert_eq!(outcome.tool_outcomes.len(), 2);
    assert_eq!(outcome.tool_outcomes[0].name, "search_verse");
    assert_eq!(outcome.tool_outcomes[1].name, "get_surah_info");
    match &outcome.tool_outcomes[1].payload {
        ToolPayload::Surah { surah } => assert_eq!(surah.name_simple, "Az-Zumar"),
        other => panic!("expected surah metadata, got {other:?}"),
    }
}
