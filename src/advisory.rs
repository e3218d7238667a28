use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Upper bound on one external generation call. The advisory path is the
/// only operation in the binary with real network latency.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

const FALLBACK_PREFIX: &str = "[Strategic Simulation] ";

/// Pre-written directives served when the external service cannot answer.
const FALLBACK_DIRECTIVES: [&str; 3] = [
    "Projected surge detected. Recommendation: Redirect 15% of mobile units from low-demand rural sectors to high-pressure urban clusters for the next 14 days.",
    "Anomaly detected in student biometric updates. Strategic Directive: Initiate coordinated audit of local school-level registration camps to verify data integrity.",
    "Forecast stability confirmed. Infrastructure load is within nominal parameters. No immediate staff redistribution required for the upcoming cycle.",
];

/// External text-generation collaborator: one bounded prompt in, one
/// advisory string out, or an error the composer absorbs.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiTextGenerator {
    api_key: String,
    model: String,
    http_client: reqwest::Client,
}

impl GeminiTextGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "gemini-flash-latest".to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("failed to send request to the text-generation service")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("text-generation service error ({}): {}", status, error_text);
        }

        let completion: GeminiResponse = response
            .json()
            .await
            .context("failed to parse text-generation response")?;

        completion
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .context("text-generation response carried no candidates")
    }
}

/// Turns one model's prediction into an operational directive. Every
/// failure of the external collaborator resolves to a canned directive,
/// so callers always receive usable text.
pub struct AdvisoryComposer {
    generator: Option<Box<dyn TextGenerator>>,
    timeout: Duration,
}

impl AdvisoryComposer {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            timeout: GENERATION_TIMEOUT,
        }
    }

    /// Composer with no external service configured. Every advisory comes
    /// straight from the fallback pool.
    pub fn offline() -> Self {
        Self {
            generator: None,
            timeout: GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn compose(&self, model_name: &str, volume: &str, confidence: &str) -> String {
        let generator = match self.generator.as_ref() {
            Some(generator) => generator,
            None => return fallback_directive(),
        };

        let prompt = build_prompt(model_name, volume, confidence);
        match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                tracing::warn!("text generation returned an empty advisory, using fallback");
                fallback_directive()
            }
            Ok(Err(err)) => {
                tracing::warn!("text generation failed, using fallback: {err:#}");
                fallback_directive()
            }
            Err(_) => {
                tracing::warn!(
                    "text generation exceeded {:?}, using fallback",
                    self.timeout
                );
                fallback_directive()
            }
        }
    }
}

fn build_prompt(model_name: &str, volume: &str, confidence: &str) -> String {
    format!(
        "ROLE: Senior policy advisor for the national identity registry.\n\
         DATA: The {model_name} model predicts {volume} updates with {confidence} confidence for the next cycle.\n\
         \n\
         TASK: In plain English, explain to a government official:\n\
         1. What this number means for ground operations (staff/capacity).\n\
         2. One specific action to take (e.g., move mobile vans, open more slots).\n\
         \n\
         STYLE: Simple, authoritative, no technical jargon. Max 45 words."
    )
}

fn fallback_directive() -> String {
    let directive = FALLBACK_DIRECTIVES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_DIRECTIVES[0]);
    format!("{FALLBACK_PREFIX}{directive}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("quota exhausted")
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("too late".to_string())
        }
    }

    fn assert_is_fallback(advisory: &str) {
        let directive = advisory
            .strip_prefix(FALLBACK_PREFIX)
            .expect("fallback advisories carry the simulation prefix");
        assert!(FALLBACK_DIRECTIVES.contains(&directive));
    }

    #[tokio::test]
    async fn successful_generation_is_passed_through() {
        let composer = AdvisoryComposer::new(Box::new(CannedGenerator(
            "Deploy two additional enrolment kits to the northern cluster.",
        )));
        let advisory = composer.compose("XGBoost", "1.52M", "0.985").await;
        assert_eq!(
            advisory,
            "Deploy two additional enrolment kits to the northern cluster."
        );
    }

    #[tokio::test]
    async fn failing_generator_falls_back() {
        let composer = AdvisoryComposer::new(Box::new(FailingGenerator));
        let advisory = composer.compose("XGBoost", "1.52M", "0.985").await;
        assert!(!advisory.is_empty());
        assert_is_fallback(&advisory);
    }

    #[tokio::test]
    async fn empty_generation_falls_back() {
        let composer = AdvisoryComposer::new(Box::new(CannedGenerator("   ")));
        let advisory = composer.compose("RandomForest", "1.43M", "0.821").await;
        assert_is_fallback(&advisory);
    }

    #[tokio::test]
    async fn slow_generator_falls_back_within_the_bound() {
        let composer = AdvisoryComposer::new(Box::new(SlowGenerator))
            .with_timeout(Duration::from_millis(50));

        let start = Instant::now();
        let advisory = composer.compose("XGBoost", "1.52M", "0.985").await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_is_fallback(&advisory);
    }

    #[tokio::test]
    async fn offline_composer_serves_the_pool() {
        let composer = AdvisoryComposer::offline();
        let advisory = composer.compose("RandomForest", "1.43M", "0.821").await;
        assert_is_fallback(&advisory);
    }

    #[test]
    fn prompt_carries_the_prediction() {
        let prompt = build_prompt("XGBoost", "1.52M", "0.985");
        assert!(prompt.contains("The XGBoost model"));
        assert!(prompt.contains("predicts 1.52M updates"));
        assert!(prompt.contains("with 0.985 confidence"));
        assert!(prompt.contains("Max 45 words"));
    }

    #[test]
    fn fallback_always_comes_from_the_pool() {
        for _ in 0..20 {
            assert_is_fallback(&fallback_directive());
        }
    }
}
