//! Thin client for the OpenAI Responses endpoint
//!
//! Both the dialogue brain and the Responses-path transcription use this
//! endpoint, so the request/reply plumbing lives here.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    input: Vec<InputItem<'a>>,
}

#[derive(Serialize)]
struct InputItem<'a> {
    role: &'a str,
    content: Vec<InputContent<'a>>,
}

#[derive(Serialize)]
struct InputContent<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for Responses-endpoint calls
pub struct ResponsesClient {
    client: reqwest::Client,
    api_key: String,
}

impl ResponsesClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    /// Send a system + user prompt pair and return the concatenated text output
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API reports an error status
    pub async fn respond(
        &self,
        model: &str,
        temperature: Option<f32>,
        system: Option<&str>,
        user: &str,
    ) -> Result<String> {
        let mut input = Vec::with_capacity(2);
        if let Some(system) = system {
            input.push(InputItem {
                role: "system",
                content: vec![InputContent {
                    kind: "input_text",
                    text: system,
                }],
            });
        }
        input.push(InputItem {
            role: "user",
            content: vec![InputContent {
                kind: "input_text",
                text: user,
            }],
        });

        let request = ResponsesRequest {
            model,
            temperature,
            input,
        };

        let response = self
            .client
            .post(RESPONSES_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, model, "responses request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "responses API error");
            return Err(Error::Dialogue(format!(
                "responses API error {status}: {body}"
            )));
        }

        let reply: ResponsesReply = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse responses reply");
            e
        })?;

        Ok(extract_output_text(&reply))
    }
}

/// Concatenate the `output_text` chunks of a reply
fn extract_output_text(reply: &ResponsesReply) -> String {
    reply
        .output
        .iter()
        .flat_map(|item| &item.content)
        .filter(|content| content.kind == "output_text")
        .map(|content| content.text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_output_text_chunks() {
        let reply: ResponsesReply = serde_json::from_str(
            r#"{
                "output": [
                    {
                        "content": [
                            {"type": "output_text", "text": "hello "},
                            {"type": "reasoning", "text": "ignored"},
                            {"type": "output_text", "text": "world"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(extract_output_text(&reply), "hello world");
    }

    #[test]
    fn tolerates_missing_output() {
        let reply: ResponsesReply = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_output_text(&reply), "");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(ResponsesClient::new(String::new()).is_err());
    }
}
