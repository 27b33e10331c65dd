use std::fs;
use std::path::{Path, PathBuf};

use olm_core::errors::OlmError;
use olm_core::hash::stable_hash_string;
use olm_core::serde::{from_json_slice, to_canonical_json_bytes};
use olm_space::{Case, CaseId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collab::{InputArtifact, StepOutput};
use crate::report::RunReport;

fn io_error(code: &str, err: impl ToString) -> OlmError {
    OlmError::io(code, err)
}

/// Persisted state of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseState {
    /// Some steps are still outstanding.
    Pending,
    /// Every step succeeded and was written.
    Complete,
    /// A step failed.
    Failed,
}

/// Contents of `status.json` in a case directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStatus {
    /// Case state.
    pub state: CaseState,
    /// Number of steps written so far.
    pub steps_completed: usize,
    /// Failure message for failed cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hash of the case and its rendered input at the time it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Work directory laid out as `<root>/<case id>/{input,step_<k>.json,status.json}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Creates the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, OlmError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| io_error("work_dir", err))?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one case.
    pub fn case_dir(&self, id: &CaseId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Writes the rendered input of a case.
    pub fn write_input(&self, id: &CaseId, artifact: &InputArtifact) -> Result<(), OlmError> {
        let dir = self.case_dir(id);
        fs::create_dir_all(&dir).map_err(|err| io_error("case_dir", err))?;
        fs::write(dir.join(&artifact.file_name), &artifact.content)
            .map_err(|err| io_error("input_write", err))
    }

    /// Writes the output of one step.
    pub fn write_step(&self, id: &CaseId, step: usize, output: &StepOutput) -> Result<(), OlmError> {
        write_json(self.case_dir(id).join(step_file(step)), output)
    }

    /// Writes the status of a case.
    pub fn write_status(&self, id: &CaseId, status: &CaseStatus) -> Result<(), OlmError> {
        write_json(self.case_dir(id).join("status.json"), status)
    }

    /// Reads the status of a case if one was written.
    pub fn read_status(&self, id: &CaseId) -> Result<Option<CaseStatus>, OlmError> {
        let path = self.case_dir(id).join("status.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(|err| io_error("status_read", err))?;
        from_json_slice(&bytes).map(Some)
    }

    /// Loads every step output of a completed case.
    ///
    /// Returns `None` unless `status.json` says complete, was written for the
    /// same `fingerprint`, and all `steps` files are present. A `None` case
    /// must be run again.
    pub fn load_complete(
        &self,
        id: &CaseId,
        steps: usize,
        fingerprint: &str,
    ) -> Result<Option<Vec<StepOutput>>, OlmError> {
        match self.read_status(id)? {
            Some(status)
                if status.state == CaseState::Complete
                    && status.steps_completed == steps
                    && status.fingerprint.as_deref() == Some(fingerprint) => {}
            Some(_) => {
                debug!(case = %id, "stale or unfinished case in work directory");
                return Ok(None);
            }
            None => return Ok(None),
        }
        let dir = self.case_dir(id);
        let mut outputs = Vec::with_capacity(steps);
        for step in 0..steps {
            let path = dir.join(step_file(step));
            if !path.exists() {
                return Ok(None);
            }
            let bytes = fs::read(path).map_err(|err| io_error("step_read", err))?;
            outputs.push(from_json_slice(&bytes)?);
        }
        Ok(Some(outputs))
    }

    /// Removes step files and status of a case that will be rerun.
    pub fn cleanup_incomplete(&self, id: &CaseId) {
        let dir = self.case_dir(id);
        let Ok(entries) = fs::read_dir(&dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "status.json" || (name.starts_with("step_") && name.ends_with(".json")) {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    /// Writes `run_report.json` at the root.
    pub fn write_report(&self, report: &RunReport) -> Result<(), OlmError> {
        write_json(self.root.join("run_report.json"), report)
    }
}

/// Identifies what a case directory was produced from.
pub fn case_fingerprint(case: &Case, input: &InputArtifact) -> Result<String, OlmError> {
    stable_hash_string(&(case, input))
}

fn step_file(step: usize) -> String {
    format!("step_{step}.json")
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<(), OlmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("case_dir", err))?;
    }
    let bytes = to_canonical_json_bytes(value)?;
    fs::write(path, bytes).map_err(|err| io_error("json_write", err))
}
