use crate::{
    engine::{Engine, OpResult, Operation, RosterEngine, Workflow},
    error::EngineError,
    linkage::LinkageTable,
    persistence::ProjectGateway,
    roster::Project,
};
use rosterforge_protocol::CommandResponse;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Validation failed; nothing was mutated.
    Rejected(EngineError),
    /// The mutation is applied in memory but the commit failed. Retrying
    /// `commit` is the recovery, not fixing the input.
    NotSaved {
        error: EngineError,
        applied: Vec<OpResult>,
    },
}

impl SessionError {
    pub fn engine_error(&self) -> &EngineError {
        match self {
            Self::Rejected(error) | Self::NotSaved { error, .. } => error,
        }
    }

    pub fn mutation_applied(&self) -> bool {
        matches!(self, Self::NotSaved { .. })
    }

    pub fn response(&self) -> CommandResponse {
        let error = self.engine_error();
        match self {
            Self::Rejected(_) => CommandResponse::failure(error.code.as_str(), &error.message),
            Self::NotSaved { applied, .. } => {
                let mut response = CommandResponse::failure(
                    error.code.as_str(),
                    format!("Change applied in memory but not saved: {}", error.message),
                );
                if let Some(last) = applied.last() {
                    response = response.with_fighter(&last.fighter, last.fighter_internal_id);
                }
                response.mutation_applied = Some(true);
                response
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(e) => write!(f, "{e}"),
            Self::NotSaved { error, .. } => write!(f, "{error} (change applied but not saved)"),
        }
    }
}

impl std::error::Error for SessionError {}

/// One open project: mutations go through the engine and are committed
/// through the gateway as the final step of each call.
#[derive(Debug)]
pub struct ProjectSession<G: ProjectGateway> {
    gateway: G,
    engine: RosterEngine,
    dirty: bool,
}

impl<G: ProjectGateway> ProjectSession<G> {
    /// Claims the project for the session's lifetime, then loads it. A
    /// project already held by another session fails with `OpenFailure`.
    pub fn open(mut gateway: G, linkage: LinkageTable) -> Result<Self, EngineError> {
        gateway.claim()?;
        let project = gateway.open()?;
        Ok(Self::from_project(gateway, project, linkage))
    }

    pub fn from_project(gateway: G, project: Project, linkage: LinkageTable) -> Self {
        Self {
            gateway,
            engine: RosterEngine::with_linkage(project, linkage),
            dirty: false,
        }
    }

    pub fn engine(&self) -> &RosterEngine {
        &self.engine
    }

    pub fn project(&self) -> &Project {
        self.engine.project()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// True when in-memory changes have not been committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn commit(&mut self) -> Result<(), EngineError> {
        self.gateway.commit(self.engine.project())?;
        self.dirty = false;
        Ok(())
    }

    fn commit_if_changed(&mut self, applied: &[OpResult]) -> Result<(), EngineError> {
        if !applied.iter().any(|r| r.changed) {
            debug!("no state change, commit skipped");
            return Ok(());
        }
        self.dirty = true;
        self.commit().inspect_err(|error| {
            warn!(
                location = %self.gateway.location(),
                error = %error,
                "commit failed after in-memory mutation"
            );
        })
    }

    pub fn apply(&mut self, op: Operation) -> Result<OpResult, SessionError> {
        let result = self.engine.apply(op).map_err(SessionError::Rejected)?;
        match self.commit_if_changed(std::slice::from_ref(&result)) {
            Ok(()) => Ok(result),
            Err(error) => Err(SessionError::NotSaved {
                error,
                applied: vec![result],
            }),
        }
    }

    pub fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>, SessionError> {
        let results = self
            .engine
            .apply_workflow(wf)
            .map_err(SessionError::Rejected)?;
        match self.commit_if_changed(&results) {
            Ok(()) => Ok(results),
            Err(error) => Err(SessionError::NotSaved {
                error,
                applied: results,
            }),
        }
    }
}
