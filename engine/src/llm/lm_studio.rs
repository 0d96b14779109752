use async_stream::try_stream;
use color_eyre::eyre::Context;
use log::{debug, error, info};
use reqwest::{
    Client, Response,
    header::{self, HeaderValue},
};
use serde::Serialize;
use tokio_stream::StreamExt;

use super::{InputMessage, LLM, LLMStream, OutputMessage, Request, ResponseFragment};
use crate::config::ClientConfig;

mod error;
pub use error::{ConfigError, FrameParseError, LmStudioError};

pub mod stream_decoder;
pub use stream_decoder::{Decoded, FrameEvent, Parser, decode};

/// Client for the OpenAI-compatible chat endpoint of a local LM Studio server
#[derive(Debug, Clone)]
pub struct LmStudio {
    client: Client,
    url: String,
    model: String,
}

impl LmStudio {
    /// Fails if url or model are blank, without touching the network
    pub fn try_new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            url: config.url.trim().to_string(),
            model: config.model.trim().to_string(),
        })
    }

    /// Sends `req`, waits for the complete body and decodes it in one go
    pub async fn send_request(&self, req: Request) -> Result<Decoded, LmStudioError> {
        let body = self.chat_request(req);
        let res = post(&self.client, &self.url, &body).await?;
        let raw = res.text().await?;
        debug!("raw response:\n{raw}");

        Ok(decode(&raw))
    }

    fn chat_request(&self, req: Request) -> ChatRequest {
        let Request {
            system,
            messages,
            max_tokens,
            temperature,
        } = req;

        ChatRequest {
            model: self.model.clone(),
            messages: system
                .map(InputMessage::system)
                .into_iter()
                .chain(messages)
                .collect(),
            temperature,
            max_tokens,
            stream: true,
        }
    }
}

impl LLM for LmStudio {
    fn send_request_stream(&mut self, req: Request) -> LLMStream<'_> {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = self.chat_request(req);

        Box::pin(try_stream! {
            let res = post(&client, &url, &body).await.context("chat request")?;
            let mut stream = res.bytes_stream();
            let mut parser = Parser::default();
            let mut output = OutputMessage::default();
            let mut finished = false;

            while !finished {
                let events = match stream.next().await {
                    Some(chunk) => parser.process(chunk.context("response chunk")?),
                    None => {
                        finished = true;
                        parser.finish()
                    }
                };

                for ev in events {
                    match ev {
                        FrameEvent::Text(text) => {
                            output.fragments += 1;
                            output.text.push_str(&text);
                            yield ResponseFragment::TextDelta(text);
                        }
                        FrameEvent::Done => debug!("received end of stream marker"),
                        // logged by the parser
                        FrameEvent::Failed(_) => output.failures += 1,
                    }
                }
            }

            yield ResponseFragment::MessageComplete(output);
        })
    }

    fn clone(&self) -> Box<dyn LLM + Send + 'static> {
        Box::new(Clone::clone(self))
    }
}

async fn post(client: &Client, url: &str, body: &ChatRequest) -> Result<Response, LmStudioError> {
    debug!(
        "Json-data: {}",
        serde_json::to_string(body).unwrap_or_default()
    );
    for msg in &body.messages {
        debug!("{}: {}", msg.role, msg.content);
    }
    info!("Sending request...");

    let res = client
        .post(url)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
        .json(body)
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let message = res.text().await.unwrap_or_default();
        error!("Error: {} - {message}", status.as_u16());
        return Err(LmStudioError::Transport { status, message });
    }

    Ok(res)
}

//
// ===== wire types =====
//

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<InputMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: usize,
    stream: bool,
}
