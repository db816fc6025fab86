//! Session gateway against mocked OAuth token and Dialogflow detectIntent endpoints.

use lib::config::DialogflowSettings;
use lib::error::BridgeError;
use lib::normalize::normalize;
use lib::session::{IntentBackend, SessionGateway};
use mockito::Matcher;
use serde_json::json;

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/service_account_key.pem");
const PROJECT: &str = "autosales-1";

fn gateway_for(server: &mockito::Server) -> SessionGateway {
    let key = json!({
        "type": "service_account",
        "project_id": PROJECT,
        "private_key_id": "k1",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "bridge@autosales-1.iam.gserviceaccount.com",
        "token_uri": format!("{}/token", server.url()),
    });
    SessionGateway::new(DialogflowSettings {
        project_id: Some(PROJECT.to_string()),
        credentials_json: Some(key.to_string()),
        credentials_error: None,
        language_code: "en".to_string(),
        api_base: server.url(),
    })
}

async fn mock_token(server: &mut mockito::Server, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".to_string(),
            "urn:ietf:params:oauth:grant-type:jwt-bearer".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "ya29.test", "expires_in": 3600, "token_type": "Bearer" }).to_string())
        .expect(hits)
        .create_async()
        .await
}

fn detect_path(user: &str) -> String {
    format!("/v2/projects/{}/agent/sessions/{}:detectIntent", PROJECT, user)
}

#[tokio::test]
async fn query_sends_session_text_and_default_language() {
    let mut server = mockito::Server::new_async().await;
    let token = mock_token(&mut server, 1).await;
    let detect = server
        .mock("POST", detect_path("1001").as_str())
        .match_header("authorization", "Bearer ya29.test")
        .match_body(Matcher::Json(json!({
            "queryInput": { "text": { "text": "is my car ready?", "languageCode": "en" } }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "responseId": "r-1",
                "queryResult": {
                    "queryText": "is my car ready?",
                    "fulfillmentText": "Yes!",
                    "fulfillmentMessages": [
                        { "text": { "text": ["Yes!", "Pick it up at 5."] } }
                    ],
                    "intent": { "displayName": "order.status" }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    assert!(!gateway.is_connected());
    let result = gateway.query("1001", "is my car ready?", None).await.unwrap();
    assert!(gateway.is_connected());

    let normalized = normalize(&result);
    assert_eq!(normalized.messages.len(), 1);
    assert_eq!(normalized.messages[0].text, "Yes!\nPick it up at 5.");
    assert_eq!(normalized.intent.as_deref(), Some("order.status"));

    token.assert_async().await;
    detect.assert_async().await;
}

#[tokio::test]
async fn explicit_language_is_forwarded() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token(&mut server, 1).await;
    let detect = server
        .mock("POST", detect_path("42").as_str())
        .match_body(Matcher::PartialJson(json!({
            "queryInput": { "text": { "languageCode": "de" } }
        })))
        .with_status(200)
        .with_body(json!({ "queryResult": { "fulfillmentText": "Hallo" } }).to_string())
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    let result = gateway.query("42", "hallo", Some("de")).await.unwrap();
    assert_eq!(result.fulfillment_text.as_deref(), Some("Hallo"));
    detect.assert_async().await;
}

#[tokio::test]
async fn concurrent_first_queries_share_one_client_and_token() {
    let mut server = mockito::Server::new_async().await;
    let token = mock_token(&mut server, 1).await;
    let detect = server
        .mock("POST", Matcher::Regex(r"^/v2/projects/autosales-1/agent/sessions/.+:detectIntent$".to_string()))
        .with_status(200)
        .with_body(json!({ "queryResult": { "fulfillmentText": "ok" } }).to_string())
        .expect(3)
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    let (a, b) = tokio::join!(
        gateway.query("alice", "hi", None),
        gateway.query("bob", "hi", None)
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert!(gateway.query("alice", "again", None).await.is_ok());

    token.assert_async().await;
    detect.assert_async().await;
}

#[tokio::test]
async fn api_error_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token(&mut server, 1).await;
    let _detect = server
        .mock("POST", detect_path("u").as_str())
        .with_status(500)
        .with_body("internal")
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    let err = gateway.query("u", "hi", None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Backend(_)), "got {:?}", err);
}

#[tokio::test]
async fn rejected_token_exchange_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    let _token = server
        .mock("POST", "/token")
        .with_status(401)
        .with_body(json!({ "error": "invalid_grant" }).to_string())
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    let err = gateway.query("u", "hi", None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Backend(_)), "got {:?}", err);
}

#[tokio::test]
async fn missing_query_result_normalizes_to_placeholder() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token(&mut server, 1).await;
    let _detect = server
        .mock("POST", detect_path("u").as_str())
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let gateway = gateway_for(&server);
    let result = gateway.query("u", "hi", None).await.unwrap();
    assert_eq!(normalize(&result).messages[0].text, "…");
}
