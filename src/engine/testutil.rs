//! Shared test doubles for engine unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::AgentClient;
use crate::engine::EngineDeps;
use crate::error::{AgentError, PromptError, WorkflowError};
use crate::model::{AgentState, Job, Prompt, WorkflowKind};
use crate::prompts::{PromptKind, PromptReader};
use crate::store::{InMemoryStore, JobStore};
use crate::workflow::{
    ChildSequence, ParallelDescription, PromptInfo, WorkflowDescription, WorkflowParser,
};

/// Recorded launch call: prompt text, model, repository, create_pr.
pub type LaunchRecord = (String, String, String, bool);

#[derive(Default)]
struct ScriptedState {
    next_id: u32,
    launches: Vec<LaunchRecord>,
    follow_ups: Vec<(String, String)>,
    statuses: HashMap<String, VecDeque<AgentState>>,
    last_status: HashMap<String, AgentState>,
    transcripts: HashMap<String, String>,
    fail_launches: bool,
    fail_follow_ups: bool,
}

/// Scriptable agent client. Status queues pop per call, repeating the
/// final entry; launches hand out `agent-1`, `agent-2`, ...
#[derive(Default)]
pub struct ScriptedAgent {
    state: Mutex<ScriptedState>,
}

impl ScriptedAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_status(&self, agent_id: &str, status: AgentState) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(agent_id.to_string())
            .or_default()
            .push_back(status);
    }

    pub fn set_transcript(&self, agent_id: &str, transcript: &str) {
        self.state
            .lock()
            .unwrap()
            .transcripts
            .insert(agent_id.to_string(), transcript.to_string());
    }

    pub fn fail_launches(&self) {
        self.state.lock().unwrap().fail_launches = true;
    }

    pub fn fail_follow_ups(&self) {
        self.state.lock().unwrap().fail_follow_ups = true;
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn follow_ups(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().follow_ups.clone()
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn launch(
        &self,
        prompt: &str,
        model: &str,
        repository: &str,
        create_pr: bool,
    ) -> Result<String, AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_launches {
            return Err(AgentError::LaunchFailed {
                reason: "scripted failure".into(),
            });
        }
        state.next_id += 1;
        let agent_id = format!("agent-{}", state.next_id);
        state.launches.push((
            prompt.to_string(),
            model.to_string(),
            repository.to_string(),
            create_pr,
        ));
        Ok(agent_id)
    }

    async fn follow_up(&self, agent_id: &str, prompt: &str) -> Result<String, AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_follow_ups {
            return Err(AgentError::FollowUpFailed {
                agent_id: agent_id.to_string(),
                reason: "scripted failure".into(),
            });
        }
        state
            .follow_ups
            .push((agent_id.to_string(), prompt.to_string()));
        Ok(format!("msg-{}", state.follow_ups.len()))
    }

    async fn status(&self, agent_id: &str) -> Result<AgentState, AgentError> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state
            .statuses
            .get_mut(agent_id)
            .and_then(VecDeque::pop_front)
        {
            state.last_status.insert(agent_id.to_string(), status);
            return Ok(status);
        }
        state
            .last_status
            .get(agent_id)
            .copied()
            .ok_or_else(|| AgentError::NotFound {
                agent_id: agent_id.to_string(),
            })
    }

    async fn transcript(&self, agent_id: &str) -> Result<String, AgentError> {
        self.state
            .lock()
            .unwrap()
            .transcripts
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentError::TranscriptFailed {
                agent_id: agent_id.to_string(),
                reason: "no transcript scripted".into(),
            })
    }

    async fn delete(&self, _agent_id: &str) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Parser returning one fixed description for every path.
pub struct StaticParser {
    pub description: WorkflowDescription,
}

#[async_trait]
impl WorkflowParser for StaticParser {
    async fn parse(&self, _path: &Path) -> Result<WorkflowDescription, WorkflowError> {
        Ok(self.description.clone())
    }

    async fn determine_kind(&self, _path: &Path) -> Result<WorkflowKind, WorkflowError> {
        Ok(self.description.kind())
    }
}

/// Prompt reader backed by a name→content map.
#[derive(Default)]
pub struct MapReader {
    files: HashMap<String, String>,
}

impl MapReader {
    pub fn with(files: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            files: files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl PromptReader for MapReader {
    async fn read(&self, _workflow_path: &Path, source_file: &str) -> Result<String, PromptError> {
        self.files
            .get(source_file)
            .cloned()
            .ok_or_else(|| PromptError::NotFound {
                path: PathBuf::from(source_file),
            })
    }
}

pub fn deps(
    store: Arc<InMemoryStore>,
    parser: Arc<StaticParser>,
    agent: Arc<ScriptedAgent>,
    prompts: Arc<MapReader>,
) -> EngineDeps {
    EngineDeps {
        store,
        parser,
        agent,
        prompts,
    }
}

pub fn sequence_description(launch: &str, follow_ups: &[&str]) -> WorkflowDescription {
    WorkflowDescription {
        launch: PromptInfo::new(launch, PromptKind::Markdown),
        follow_ups: follow_ups
            .iter()
            .map(|f| PromptInfo::new(*f, PromptKind::Markdown))
            .collect(),
        model: "test-model".into(),
        repository: "org/repo".into(),
        timeout_millis: None,
        fallback: None,
        parallel: None,
    }
}

pub fn parallel_description(
    producer: &str,
    bind_result_type: &str,
    templates: &[&[&str]],
) -> WorkflowDescription {
    let mut description = sequence_description(producer, &[]);
    description.parallel = Some(ParallelDescription {
        producer: description.launch.clone(),
        bind_result_type: bind_result_type.into(),
        children: templates
            .iter()
            .map(|prompts| ChildSequence {
                prompts: prompts
                    .iter()
                    .map(|p| PromptInfo::new(*p, PromptKind::Markdown).with_bind())
                    .collect(),
            })
            .collect(),
        fallback: None,
    });
    description
}

/// Create the job and prompt rows the submission flow would persist.
pub async fn seed_job(store: &InMemoryStore, description: &WorkflowDescription) -> Job {
    let mut job = Job::new(
        PathBuf::from("wf/flow.yaml"),
        description.model.clone(),
        description.repository.clone(),
    )
    .with_kind(description.kind());
    job.timeout_millis = description.timeout_millis;
    store.save_job(&job).await.unwrap();

    let infos = match &description.parallel {
        Some(parallel) => vec![parallel.producer.clone()],
        None => description.sequence_infos(),
    };
    for info in &infos {
        store
            .save_prompt(&Prompt::new(job.id, info.source_file.clone()))
            .await
            .unwrap();
    }
    job
}
