//! Machine-readable description of the invocable workflows.

use serde::Serialize;

use lexcrawl_shared::{DocumentType, LexcrawlError, Result};

use crate::pipeline::Workflow;

/// Default `limit` of the backlog sweep.
pub const DEFAULT_SWEEP_LIMIT: u32 = 100;

/// One workflow as listed by `describe-workflows`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowManifest {
    pub id: &'static str,
    pub number: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub inputs: Vec<WorkflowInput>,
    /// What a successful run leaves behind.
    pub output: &'static str,
}

/// A single input of a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInput {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Url,
    Date,
    Number,
    Select,
    Uuid,
}

impl WorkflowInput {
    fn required(name: &'static str, kind: InputKind, help: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            options: Vec::new(),
            help,
        }
    }

    fn job_id() -> Self {
        Self {
            required: false,
            ..Self::required(
                "job_id",
                InputKind::Uuid,
                "Job id whose terminal status is recorded in background_jobs",
            )
        }
    }
}

/// Manifest entry for one workflow.
pub fn describe(workflow: Workflow) -> WorkflowManifest {
    let (mut inputs, output) = match workflow {
        Workflow::ExtractUrl => (
            vec![WorkflowInput::required(
                "url",
                InputKind::Url,
                "Detail or consolidated-legislation page URL",
            )],
            "One source record with its article chunks",
        ),
        Workflow::DiscoverSources => (
            vec![
                WorkflowInput::required("start_date", InputKind::Date, "First day, YYYY-MM-DD"),
                WorkflowInput::required("end_date", InputKind::Date, "Last day, inclusive"),
                WorkflowInput {
                    options: DocumentType::ALL.iter().map(|t| t.label()).collect(),
                    ..WorkflowInput::required("type", InputKind::Select, "Document type to search")
                },
            ],
            "One source stub per discovered publication, without chunks",
        ),
        Workflow::ProcessUnchunked => (
            vec![WorkflowInput {
                required: false,
                default: Some(DEFAULT_SWEEP_LIMIT.into()),
                ..WorkflowInput::required(
                    "limit",
                    InputKind::Number,
                    "Maximum number of sources to process",
                )
            }],
            "Article chunks for up to `limit` sources that had none",
        ),
        Workflow::RetryExtraction => (
            vec![WorkflowInput::required(
                "source_id",
                InputKind::Uuid,
                "Id of an existing source without chunks",
            )],
            "Chunks appended to the existing source; no source is created",
        ),
    };
    inputs.push(WorkflowInput::job_id());

    WorkflowManifest {
        id: workflow.id(),
        number: workflow.number(),
        name: workflow.name(),
        description: workflow.description(),
        inputs,
        output,
    }
}

/// Every workflow, in number order.
pub fn manifest() -> Vec<WorkflowManifest> {
    Workflow::ALL.into_iter().map(describe).collect()
}

/// The manifest as pretty-printed JSON.
pub fn manifest_json() -> Result<String> {
    serde_json::to_string_pretty(&manifest())
        .map_err(|e| LexcrawlError::parse(format!("manifest serialization: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_all_workflows_in_order() {
        let ids: Vec<&str> = manifest().iter().map(|m| m.id).collect();
        assert_eq!(
            ids,
            vec!["extract-url", "discover-sources", "process-unchunked", "retry-extraction"]
        );
    }

    #[test]
    fn every_workflow_takes_an_optional_job_id() {
        for entry in manifest() {
            let job = entry
                .inputs
                .iter()
                .find(|i| i.name == "job_id")
                .expect("job_id input");
            assert!(!job.required, "{}", entry.id);
        }
    }

    #[test]
    fn json_shape() {
        let json: serde_json::Value = serde_json::from_str(&manifest_json().unwrap()).unwrap();
        let sweep = &json[2];
        assert_eq!(sweep["number"], 3);
        assert_eq!(sweep["inputs"][0]["name"], "limit");
        assert_eq!(sweep["inputs"][0]["type"], "number");
        assert_eq!(sweep["inputs"][0]["default"], 100);

        let discovery = &json[1];
        let options = discovery["inputs"][2]["options"].as_array().unwrap();
        assert_eq!(options.len(), 6);
        assert!(options.contains(&serde_json::json!("Decreto-Lei")));
        assert!(json[0]["inputs"][0].get("options").is_none());
    }
}
