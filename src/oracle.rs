//! HTTP oracle backed by an OpenAI-compatible chat completions endpoint.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::traits::Oracle;

#[derive(Debug, Clone)]
pub struct HttpOracle {
    config: OracleConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let api_key = config.api_key.clone().ok_or(OracleError::MissingApiKey)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint)
    }
}

impl Oracle for HttpOracle {
    fn complete(&self, instructions: &str, context_document: &str) -> Result<String, OracleError> {
        let body = json!({
            "model": &self.config.model,
            "messages": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": context_document}
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json()?;
        let content = first_content(completion)?;
        debug!(model = %self.config.model, bytes = content.len(), "oracle completion received");
        Ok(content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

fn first_content(completion: ChatCompletion) -> Result<String, OracleError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(OracleError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<String, OracleError> {
        first_content(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_missing_api_key() {
        let err = HttpOracle::new(OracleConfig::default()).unwrap_err();
        assert!(matches!(err, OracleError::MissingApiKey));
    }

    #[test]
    fn test_completions_url() {
        let oracle = HttpOracle::new(OracleConfig {
            endpoint: "http://localhost:8080/v1".to_string(),
            api_key: Some("sk-test".to_string()),
            ..OracleConfig::default()
        })
        .unwrap();
        assert_eq!(oracle.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_first_choice_content() {
        let content = parse(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"type\": \"APPROVED\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(content, r#"{"type": "APPROVED"}"#);
    }

    #[test]
    fn test_empty_completion() {
        assert!(matches!(parse(r#"{"choices": []}"#), Err(OracleError::EmptyCompletion)));
        assert!(matches!(
            parse(r#"{"choices": [{"message": {"content": null}}]}"#),
            Err(OracleError::EmptyCompletion)
        ));
    }
}
