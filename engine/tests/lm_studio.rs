//! Talks to a mocked LM Studio server.

use lm_studio_engine::{
    ClientConfig, LmStudioComponent,
    llm::{
        LLM, ResponseFragment,
        lm_studio::{LmStudio, LmStudioError},
    },
};
use reqwest::StatusCode;
use tokio_stream::StreamExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/v1/chat/completions";

fn sse_body(contents: &[&str]) -> String {
    let mut body = String::new();
    for content in contents {
        let chunk = serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "created": 1717000000,
            "model": "test-model",
            "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }],
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        url: format!("{}{CHAT_PATH}", server.uri()),
        model: "test-model".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn sends_payload_and_decodes_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": "Always answer in rhymes." },
                { "role": "user", "content": "Introduce yourself." },
            ],
            "temperature": 0.7,
            "max_tokens": 128,
            "stream": true,
        })))
        .respond_with(sse_response(sse_body(&["I am ", "a bot, ", "not a lot."])))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let client = LmStudio::try_new(&cfg).unwrap();
    let decoded = client.send_request(cfg.request()).await.unwrap();

    assert_eq!(decoded.text, "I am a bot, not a lot.");
    assert!(decoded.failures.is_empty());
}

#[tokio::test]
async fn malformed_frames_are_collected() {
    let server = MockServer::start().await;

    let body = format!(
        "data: {{bad json}}\n\n{}",
        sse_body(&["still ", "here"])
    );
    Mock::given(method("POST"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let cfg = config(&server);
    let decoded = LmStudio::try_new(&cfg)
        .unwrap()
        .send_request(cfg.request())
        .await
        .unwrap();

    assert_eq!(decoded.text, "still here");
    assert_eq!(decoded.failures.len(), 1);
    assert_eq!(decoded.failures[0].segment, "{bad json}");
}

#[tokio::test]
async fn error_status_is_a_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let cfg = config(&server);
    let err = LmStudio::try_new(&cfg)
        .unwrap()
        .send_request(cfg.request())
        .await
        .unwrap_err();

    match &err {
        LmStudioError::Transport { status, message } => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert_eq!(message, "model not loaded");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.to_string(), "Error: 404 - model not loaded");
}

#[tokio::test]
async fn unreachable_server_is_an_http_error() {
    let cfg = ClientConfig {
        url: "http://127.0.0.1:9/v1/chat/completions".into(),
        model: "test-model".into(),
        ..Default::default()
    };

    let err = LmStudio::try_new(&cfg)
        .unwrap()
        .send_request(cfg.request())
        .await
        .unwrap_err();
    assert!(matches!(err, LmStudioError::Http(_)), "{err:?}");
}

#[tokio::test]
async fn streams_fragments() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse_response(sse_body(&["Hel", "", "lo"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = LmStudio::try_new(&config(&server)).unwrap();
    let request = config(&server).request();
    let fragments: Vec<ResponseFragment> = client
        .send_request_stream(request)
        .collect::<Result<_, _>>()
        .await
        .unwrap();

    let deltas: Vec<&str> = fragments
        .iter()
        .filter_map(|f| match f {
            ResponseFragment::TextDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, ["Hel", "lo"]);

    let Some(ResponseFragment::MessageComplete(output)) = fragments.last() else {
        panic!("stream didn't end with a complete message: {fragments:?}");
    };
    assert_eq!(output.text, "Hello");
    assert_eq!(output.fragments, 2);
    assert_eq!(output.failures, 0);
}

#[tokio::test]
async fn streaming_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut client = LmStudio::try_new(&config(&server)).unwrap();
    let request = config(&server).request();
    let mut stream = client.send_request_stream(request);

    let err = stream.next().await.unwrap().unwrap_err();
    let err = err.downcast_ref::<LmStudioError>().unwrap();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn component_runs_on_start() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(sse_response(sse_body(&["Hi ", "there"])))
        .expect(2)
        .mount(&server)
        .await;

    let mut component = LmStudioComponent::try_new(config(&server)).unwrap();

    let mut seen = vec![];
    let ran = component
        .start(&mut |output: &str| seen.push(output.to_string()))
        .await
        .unwrap();
    assert!(ran);
    assert_eq!(seen, ["Hi there"]);
    assert_eq!(component.output(), "Hi there");

    assert_eq!(component.send_request().await.unwrap(), "Hi there");
}

#[tokio::test]
async fn component_keeps_output_empty_on_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut component = LmStudioComponent::try_new(config(&server)).unwrap();
    assert!(component.send_request().await.is_err());
    assert_eq!(component.output(), "");
}
