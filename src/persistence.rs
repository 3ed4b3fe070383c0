use crate::{
    error::{EngineError, ErrorCode},
    roster::Project,
};
use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions, TryLockError},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Where a project comes from and where commits go.
pub trait ProjectGateway {
    /// Takes exclusive ownership of the project until the gateway is dropped.
    fn claim(&mut self) -> Result<(), EngineError>;
    fn open(&self) -> Result<Project, EngineError>;
    fn commit(&self, project: &Project) -> Result<(), EngineError>;
    fn location(&self) -> String;
}

/// JSON project file on the local filesystem.
#[derive(Debug)]
pub struct ProjectFileStore {
    path: PathBuf,
    claim: Option<ProjectLock>,
}

impl ProjectFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            claim: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut os: OsString = self.path.as_os_str().to_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }
}

impl ProjectGateway for ProjectFileStore {
    fn claim(&mut self) -> Result<(), EngineError> {
        if self.claim.is_none() {
            self.claim = Some(ProjectLock::acquire(self.lock_path(), ErrorCode::OpenFailure)?);
            info!(path = %self.path.display(), "claimed project");
        }
        Ok(())
    }

    fn open(&self) -> Result<Project, EngineError> {
        open_project(&self.path)
    }

    fn commit(&self, project: &Project) -> Result<(), EngineError> {
        let _write_lock = match self.claim {
            Some(_) => None,
            None => Some(ProjectLock::acquire(
                self.lock_path(),
                ErrorCode::PersistenceFailure,
            )?),
        };
        let text = serde_json::to_string_pretty(project)
            .map_err(|e| EngineError::persistence(format!("Could not serialize project: {e}")))?;

        let dir = self.directory();
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
            EngineError::persistence(format!(
                "Could not create temporary file in '{}': {e}",
                dir.display()
            ))
        })?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| {
                EngineError::persistence(format!(
                    "Could not write project data for '{}': {e}",
                    self.path.display()
                ))
            })?;
        tmp.persist(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e.error, "project rename failed");
            EngineError::persistence(format!(
                "Could not replace project file '{}': {}",
                self.path.display(),
                e.error
            ))
        })?;
        sync_directory(&dir).map_err(|e| {
            warn!(dir = %dir.display(), error = %e, "directory sync failed after rename");
            EngineError::persistence(format!(
                "Could not sync directory '{}' after replacing the project file: {e}",
                dir.display()
            ))
        })?;

        info!(
            path = %self.path.display(),
            fighters = project.fighters().len(),
            costumes = project.costume_count(),
            "committed project"
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Makes a completed rename durable.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// OS advisory lock on `<project>.lock`. The lock file itself stays on disk;
/// only a live holder blocks others, and the OS drops the lock with the
/// holding process.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    pub fn acquire(path: PathBuf, code: ErrorCode) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                EngineError::new(
                    code,
                    format!("Could not open lock file '{}': {e}", path.display()),
                )
            })?;
        match file.try_lock() {
            Ok(()) => Ok(Self { file, path }),
            Err(TryLockError::WouldBlock) => {
                warn!(lock = %path.display(), "project is held by another session");
                Err(EngineError::new(
                    code,
                    format!("Project is open in another session ('{}')", path.display()),
                ))
            }
            Err(TryLockError::Error(e)) => Err(EngineError::new(
                code,
                format!("Could not lock '{}': {e}", path.display()),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn open_project(path: &Path) -> Result<Project, EngineError> {
    let text = fs::read_to_string(path).map_err(|e| {
        EngineError::new(
            ErrorCode::OpenFailure,
            format!("Could not read project file '{}': {e}", path.display()),
        )
    })?;
    let mut project: Project = serde_json::from_str(&text).map_err(|e| {
        EngineError::new(
            ErrorCode::OpenFailure,
            format!("Could not parse project file '{}': {e}", path.display()),
        )
    })?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    project.set_root(Some(root));
    info!(
        path = %path.display(),
        fighters = project.fighters().len(),
        "opened project"
    );
    Ok(project)
}
