//! Structured-result extraction from agent transcripts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::EngineDeps;
use crate::error::Result;
use crate::model::Job;
use crate::workflow::ParallelDescription;

// Earlier occurrences are typically instructional templates echoed back
// into the transcript; only the last one carries data.
static RESULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<result>(.*?)</result>").expect("static regex"));

/// Element type declared by a `bindResultType` tag such as `List_Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Integer,
    Number,
    Boolean,
    String,
    Opaque,
}

impl ElementKind {
    fn from_tag(tag: &str) -> Self {
        match tag.strip_prefix("List_").unwrap_or(tag) {
            "Integer" => Self::Integer,
            "Number" | "Float" => Self::Number,
            "Boolean" => Self::Boolean,
            "String" => Self::String,
            _ => Self::Opaque,
        }
    }

    fn convert(&self, value: Value) -> Option<Value> {
        match self {
            Self::Integer => value.as_i64().map(Value::from),
            Self::Number => value.as_f64().map(Value::from),
            Self::Boolean => value.as_bool().map(Value::from),
            Self::String => match value {
                Value::String(s) => Some(Value::String(s)),
                other => Some(Value::String(other.to_string())),
            },
            Self::Opaque => Some(value),
        }
    }
}

/// Pulls a typed list out of free-form agent transcript text.
pub struct ResultExtractor {
    deps: EngineDeps,
}

impl ResultExtractor {
    pub fn new(deps: EngineDeps) -> Self {
        Self { deps }
    }

    /// Extract the typed list from the job's transcript.
    ///
    /// On success the canonical JSON array is persisted as `job.result`.
    /// Any parse or shape failure yields an empty list and leaves
    /// `job.result` untouched; callers decide whether that fails the job.
    pub async fn extract(
        &self,
        job: &mut Job,
        parallel: &ParallelDescription,
    ) -> Result<Vec<Value>> {
        let Some(agent_id) = job.agent_id.clone() else {
            return Ok(Vec::new());
        };
        let transcript = self.deps.agent.transcript(&agent_id).await?;

        let Some(content) = last_result_block(&transcript) else {
            warn!(job_id = %job.id, "Transcript contains no result marker");
            return Ok(Vec::new());
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            warn!(job_id = %job.id, "Result marker is empty");
            return Ok(Vec::new());
        }

        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Result content is not valid JSON");
                return Ok(Vec::new());
            }
        };

        let array = match parsed {
            Value::Array(items) => items,
            Value::Object(map) => match bound_array(&map, &parallel.bind_result_type) {
                Some(items) => items,
                None => {
                    warn!(
                        job_id = %job.id,
                        bind_result_type = %parallel.bind_result_type,
                        "Result object carries no array property"
                    );
                    return Ok(Vec::new());
                }
            },
            _ => {
                warn!(job_id = %job.id, "Result content is neither array nor object");
                return Ok(Vec::new());
            }
        };

        let kind = ElementKind::from_tag(&parallel.bind_result_type);
        let mut converted = Vec::with_capacity(array.len());
        for item in array {
            match kind.convert(item) {
                Some(value) => converted.push(value),
                None => {
                    warn!(
                        job_id = %job.id,
                        bind_result_type = %parallel.bind_result_type,
                        "Result element does not match the declared type"
                    );
                    return Ok(Vec::new());
                }
            }
        }
        if converted.is_empty() {
            return Ok(Vec::new());
        }

        job.result = Some(serde_json::to_string(&Value::Array(converted.clone()))?);
        job.touch();
        self.deps.store.save_job(job).await?;
        debug!(job_id = %job.id, count = converted.len(), "Extracted structured result");
        Ok(converted)
    }
}

fn last_result_block(transcript: &str) -> Option<&str> {
    RESULT_RE
        .captures_iter(transcript)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Array under the declared key, else the first array-valued property
/// found depth-first.
fn bound_array(map: &Map<String, Value>, key: &str) -> Option<Vec<Value>> {
    if let Some(Value::Array(items)) = map.get(key) {
        return Some(items.clone());
    }
    first_array_property(map)
}

fn first_array_property(map: &Map<String, Value>) -> Option<Vec<Value>> {
    for value in map.values() {
        match value {
            Value::Array(items) => return Some(items.clone()),
            Value::Object(inner) => {
                if let Some(found) = first_array_property(inner) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::engine::testutil::{
        deps, parallel_description, seed_job, MapReader, ScriptedAgent, StaticParser,
    };
    use crate::store::{InMemoryStore, JobStore};

    async fn extract_from(transcript: &str, bind_result_type: &str) -> (Vec<Value>, Job) {
        let store = Arc::new(InMemoryStore::new());
        let agent = ScriptedAgent::new();
        let description = parallel_description("produce.md", bind_result_type, &[&["child.md"]]);
        let parallel = description.parallel.clone().unwrap();
        let parser = Arc::new(StaticParser {
            description: description.clone(),
        });
        let reader = MapReader::with(&[]);

        let mut job = seed_job(&store, &description).await;
        job.agent_id = Some("agent-1".into());
        store.save_job(&job).await.unwrap();
        agent.set_transcript("agent-1", transcript);

        let extractor = ResultExtractor::new(deps(store.clone(), parser, agent, reader));
        let values = extractor.extract(&mut job, &parallel).await.unwrap();
        let stored = store.find_job(job.id).await.unwrap().unwrap();
        (values, stored)
    }

    #[tokio::test]
    async fn bare_array_is_used_directly() {
        let (values, job) =
            extract_from("agent output...<result>[1,2,3,4]</result>", "List_Integer").await;
        assert_eq!(values, vec![json!(1), json!(2), json!(3), json!(4)]);
        assert_eq!(job.result.as_deref(), Some("[1,2,3,4]"));
    }

    #[tokio::test]
    async fn object_keyed_by_bind_type_is_unwrapped() {
        let (values, job) = extract_from(
            "<result>{\"List_Integer\":[1,2,3,4]}</result>",
            "List_Integer",
        )
        .await;
        assert_eq!(values, vec![json!(1), json!(2), json!(3), json!(4)]);
        assert_eq!(job.result.as_deref(), Some("[1,2,3,4]"));
    }

    #[tokio::test]
    async fn object_without_key_falls_back_to_first_array() {
        let (values, _) = extract_from(
            "<result>{\"meta\":{\"count\":2},\"items\":{\"nested\":[7,8]}}</result>",
            "List_Integer",
        )
        .await;
        assert_eq!(values, vec![json!(7), json!(8)]);
    }

    #[tokio::test]
    async fn last_marker_wins() {
        let transcript =
            "template: <result>[0]</result> ... final answer: <result>[5,6]</result>";
        let (values, _) = extract_from(transcript, "List_Integer").await;
        assert_eq!(values, vec![json!(5), json!(6)]);
    }

    #[tokio::test]
    async fn empty_marker_yields_empty_and_leaves_result_untouched() {
        let (values, job) = extract_from("<result></result>", "List_Integer").await;
        assert!(values.is_empty());
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn missing_marker_yields_empty() {
        let (values, job) = extract_from("no structured output here", "List_Integer").await;
        assert!(values.is_empty());
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn malformed_json_yields_empty() {
        let (values, job) = extract_from("<result>[1,2,</result>", "List_Integer").await;
        assert!(values.is_empty());
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn type_mismatch_yields_empty() {
        let (values, job) =
            extract_from("<result>[\"not\",\"numbers\"]</result>", "List_Integer").await;
        assert!(values.is_empty());
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn string_elements_are_coerced() {
        let (values, _) =
            extract_from("<result>[\"alpha\",\"beta\"]</result>", "List_String").await;
        assert_eq!(values, vec![json!("alpha"), json!("beta")]);
    }

    #[test]
    fn element_kind_from_tag() {
        assert_eq!(ElementKind::from_tag("List_Integer"), ElementKind::Integer);
        assert_eq!(ElementKind::from_tag("List_String"), ElementKind::String);
        assert_eq!(ElementKind::from_tag("List_Custom"), ElementKind::Opaque);
        assert_eq!(ElementKind::from_tag("Integer"), ElementKind::Integer);
    }
}
