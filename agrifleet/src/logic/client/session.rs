use crate::logic::client::transport::{FleetTransport, HttpTransport};
use crate::logic::config::ClientConfig;
use colored::*;
use std::path::PathBuf;
use std::sync::Mutex;
use std::{fs, io};

/// Durable home for the fleet session id
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, session_id: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Session id kept in a single file, overwritten on every new session
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn save(&self, session_id: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, session_id)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Process-local storage, forgotten on exit
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    session: Mutex<Option<String>>,
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Option<String> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn save(&self, session_id: &str) -> io::Result<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session lock poisoned"))?;
        *guard = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Start a fresh session, replacing any stored one
pub async fn start(config: &ClientConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(config)?;
    let session_id = transport.start_session().await?;
    println!("✓ Session started: {}", session_id.bright_white());
    Ok(())
}

/// Print the stored session id, if any
pub fn show(config: &ClientConfig) -> anyhow::Result<()> {
    let storage = FileSessionStorage::new(config.session_path()?);
    match storage.load() {
        Some(id) => println!("{} {}", "Session:".bright_blue().bold(), id),
        None => println!("{}", "No stored session. One is started on the next request.".yellow()),
    }
    println!("{} {}", "Stored in:".cyan(), storage.path().display());
    Ok(())
}

/// Forget the stored session id
pub async fn clear(config: &ClientConfig) -> anyhow::Result<()> {
    HttpTransport::from_config(config)?.forget_session().await?;
    println!("✓ Session cleared");
    Ok(())
}
