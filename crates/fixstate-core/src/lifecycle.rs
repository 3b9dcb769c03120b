use crate::CoreError;
use std::fmt;

/// Progress of an environment install; each step's completion is a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Start,
    DirectoryStructureCreated,
    IndexEntrypointWritten,
    RunParamsWritten,
    LocalConfigWritten,
    ApplicationInstalled,
    Done,
    Rollback,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallStage::Start => "start",
            InstallStage::DirectoryStructureCreated => "directory-structure-created",
            InstallStage::IndexEntrypointWritten => "index-entrypoint-written",
            InstallStage::RunParamsWritten => "run-params-written",
            InstallStage::LocalConfigWritten => "local-config-written",
            InstallStage::ApplicationInstalled => "application-installed",
            InstallStage::Done => "done",
            InstallStage::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: InstallStage, to: InstallStage) -> Result<(), CoreError> {
    use InstallStage::{
        ApplicationInstalled, DirectoryStructureCreated, Done, IndexEntrypointWritten,
        LocalConfigWritten, Rollback, RunParamsWritten, Start,
    };
    let valid = matches!(
        (from, to),
        (Start, DirectoryStructureCreated)
            | (DirectoryStructureCreated, IndexEntrypointWritten)
            | (IndexEntrypointWritten, RunParamsWritten)
            | (RunParamsWritten, LocalConfigWritten)
            | (LocalConfigWritten, ApplicationInstalled)
            | (ApplicationInstalled, Done)
    ) || (from != Rollback && to == Rollback);

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
