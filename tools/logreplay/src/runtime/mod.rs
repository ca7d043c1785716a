use crate::errors::ReplayError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait Terminal: Send + Sync {
    fn write_line(&self, line: &str) -> Result<(), ReplayError>;
    fn warn_line(&self, line: &str) -> Result<(), ReplayError>;
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        use std::io::Write;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn warn_line(&self, line: &str) -> Result<(), ReplayError> {
        use std::io::Write;
        let mut err = std::io::stderr().lock();
        writeln!(err, "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    writes: Arc<Mutex<Vec<String>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn warning_lines(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl Terminal for FakeTerminal {
    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        self.writes
            .lock()
            .map_err(|_| ReplayError::Runtime("terminal lock poisoned".to_string()))?
            .push(line.to_string());
        Ok(())
    }

    fn warn_line(&self, line: &str) -> Result<(), ReplayError> {
        self.warnings
            .lock()
            .map_err(|_| ReplayError::Runtime("terminal lock poisoned".to_string()))?
            .push(line.to_string());
        Ok(())
    }
}

/// Answers "may the current user read this file / write into this directory".
pub trait AccessCheck: Send + Sync {
    fn check_readable(&self, path: &Path) -> std::io::Result<()>;
    fn check_writable(&self, dir: &Path) -> std::io::Result<()>;
}

pub struct ProductionAccessCheck;

impl AccessCheck for ProductionAccessCheck {
    fn check_readable(&self, path: &Path) -> std::io::Result<()> {
        std::fs::File::open(path).map(drop)
    }

    // Creating an unnamed file exercises the real permission check for this
    // process, including ACLs and privileged users.
    fn check_writable(&self, dir: &Path) -> std::io::Result<()> {
        tempfile::tempfile_in(dir).map(drop)
    }
}

#[derive(Default, Clone)]
pub struct FakeAccessCheck {
    unreadable: Arc<Mutex<Vec<PathBuf>>>,
    unwritable: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeAccessCheck {
    pub fn deny_read(&self, path: impl Into<PathBuf>) {
        if let Ok(mut denied) = self.unreadable.lock() {
            denied.push(path.into());
        }
    }

    pub fn deny_write(&self, dir: impl Into<PathBuf>) {
        if let Ok(mut denied) = self.unwritable.lock() {
            denied.push(dir.into());
        }
    }

    fn check(list: &Mutex<Vec<PathBuf>>, path: &Path) -> std::io::Result<()> {
        let denied = list
            .lock()
            .map(|denied| denied.iter().any(|entry| entry == path))
            .unwrap_or(false);
        if denied {
            return Err(std::io::Error::from(ErrorKind::PermissionDenied));
        }
        Ok(())
    }
}

impl AccessCheck for FakeAccessCheck {
    fn check_readable(&self, path: &Path) -> std::io::Result<()> {
        Self::check(&self.unreadable, path)
    }

    fn check_writable(&self, dir: &Path) -> std::io::Result<()> {
        Self::check(&self.unwritable, dir)
    }
}

/// Builds the scheduler every replay task shares.
pub fn build_async_runtime() -> Result<tokio::runtime::Runtime, ReplayError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("logreplay")
        .build()
        .map_err(|e| ReplayError::Runtime(e.to_string()))
}

/// Resolves on the first Ctrl-C, or SIGTERM on unix.
pub async fn interrupt_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
