use crate::error::SinkError;
use crate::program::Program;
use std::fs;
use std::path::PathBuf;

/// Identifies a program accepted by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub name: String,
    pub location: String,
}

/// Destination for compiled programs, e.g. the workflow engine's deployment API.
pub trait ProgramSink {
    fn submit(&self, program: &Program, name: &str) -> Result<SubmissionHandle, SinkError>;
}

/// Writes each submitted program to `<dir>/<name>.json`.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProgramSink for DirectorySink {
    fn submit(&self, program: &Program, name: &str) -> Result<SubmissionHandle, SinkError> {
        let json = program
            .to_json_pretty()
            .map_err(|e| SinkError::Serialization {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let io_error = |e: std::io::Error| SinkError::Io {
            name: name.to_string(),
            message: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(io_error)?;
        let path = self.dir.join(format!("{}.json", name));
        fs::write(&path, json).map_err(io_error)?;

        tracing::info!(program = %name, path = %path.display(), "program written");
        Ok(SubmissionHandle {
            name: name.to_string(),
            location: path.display().to_string(),
        })
    }
}
