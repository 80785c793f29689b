//! Small illustrative adapters so the daemon has something to route to.

use std::sync::Arc;

use anyhow::{Context, bail};
use arbiter_kernel::protocol::{AdapterId, ModuleAdapter, ModuleId, SemVer};
use async_trait::async_trait;
use serde_json::{Value, json};

const IDEAS: [&str; 6] = [
    "reframe the finding as a question",
    "pair the trend with a counterexample",
    "open with the smallest concrete number",
    "borrow the structure of a field report",
    "contrast last quarter with this one",
    "end on the decision the reader must make",
];

pub fn all() -> Vec<Arc<dyn ModuleAdapter>> {
    vec![Arc::new(Oracle), Arc::new(Muse), Arc::new(Scribe)]
}

/// Text analysis over `payload.text`.
pub struct Oracle;

#[async_trait]
impl ModuleAdapter for Oracle {
    fn id(&self) -> AdapterId {
        AdapterId::new("oracle.v1")
    }

    fn module(&self) -> ModuleId {
        ModuleId::Oracle
    }

    fn version(&self) -> SemVer {
        SemVer::new(1, 2, 0)
    }

    async fn invoke(
        &self,
        action: &str,
        payload: &Value,
        _seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .context("payload.text is not a string")?;
        let words: Vec<&str> = text.split_whitespace().collect();

        match action {
            "analyze" => Ok(json!({
                "words": words.len(),
                "sentences": text.matches(['.', '!', '?']).count().max(1),
                "longest_word": words.iter().max_by_key(|word| word.len()),
            })),
            "classify" => {
                let lowered = text.to_lowercase();
                let label = if lowered.contains("risk") || lowered.contains("decline") {
                    "cautionary"
                } else if lowered.contains("growth") || lowered.contains("gain") {
                    "positive"
                } else {
                    "neutral"
                };
                Ok(json!({ "label": label }))
            }
            "summarize" => {
                let first = text.split_inclusive(['.', '!', '?']).next().unwrap_or(text);
                Ok(json!({ "summary": first.trim() }))
            }
            other => bail!("oracle cannot {other}"),
        }
    }
}

/// Seeded idea generator; the same seed always yields the same ideas.
pub struct Muse;

#[async_trait]
impl ModuleAdapter for Muse {
    fn id(&self) -> AdapterId {
        AdapterId::new("muse.v1")
    }

    fn module(&self) -> ModuleId {
        ModuleId::Muse
    }

    fn version(&self) -> SemVer {
        SemVer::new(1, 0, 3)
    }

    async fn invoke(
        &self,
        action: &str,
        payload: &Value,
        seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        let seed = seed.context("muse needs a seed")?;
        let count = match action {
            "suggest" => 1,
            "compose" => 2,
            "remix" => 3,
            other => bail!("muse cannot {other}"),
        };
        let ideas: Vec<&str> = (0..count)
            .map(|offset| {
                let slot = seed.wrapping_mul(31).wrapping_add(offset) % IDEAS.len() as u64;
                IDEAS[slot as usize]
            })
            .collect();
        Ok(json!({
            "theme": payload.get("theme").cloned().unwrap_or(Value::Null),
            "ideas": ideas,
        }))
    }
}

/// Renders `payload.context` into text.
pub struct Scribe;

#[async_trait]
impl ModuleAdapter for Scribe {
    fn id(&self) -> AdapterId {
        AdapterId::new("scribe.v1")
    }

    fn module(&self) -> ModuleId {
        ModuleId::Scribe
    }

    fn version(&self) -> SemVer {
        SemVer::new(0, 9, 1)
    }

    async fn invoke(
        &self,
        action: &str,
        payload: &Value,
        _seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        let context = payload.get("context").context("payload.context is missing")?;
        let body = match context {
            Value::String(text) => text.clone(),
            Value::Object(fields) => fields
                .iter()
                .map(|(key, value)| match value {
                    Value::String(text) => format!("{key}: {text}"),
                    other => format!("{key}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            other => bail!("cannot render context of shape {other}"),
        };

        let rendered = match action {
            "format" => body.trim().to_owned(),
            "render" => format!("---\n{body}\n---"),
            "transcribe" => body.to_uppercase(),
            other => bail!("scribe cannot {other}"),
        };
        Ok(json!({ "text": rendered }))
    }
}
