use std::fs::File;
use std::fs::OpenOptions;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::token_data::Session;

const SESSION_FILE: &str = "session.json";

/// Persistence for the access/refresh token pair.
///
/// Both tokens live in one record, so clearing the store always removes them
/// together.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> std::io::Result<Option<Session>>;

    fn save(&self, session: &Session) -> std::io::Result<()>;

    /// Returns `Ok(true)` if a session was removed.
    fn clear(&self) -> std::io::Result<bool>;
}

pub fn get_session_file(lawer_home: &Path) -> PathBuf {
    lawer_home.join(SESSION_FILE)
}

/// Stores the session as `session.json` inside the client home directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    session_file: PathBuf,
}

impl FileSessionStore {
    pub fn new(lawer_home: &Path) -> Self {
        Self {
            session_file: get_session_file(lawer_home),
        }
    }

    pub fn path(&self) -> &Path {
        &self.session_file
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> std::io::Result<Option<Session>> {
        match try_read_session_json(&self.session_file) {
            Ok(session) => Ok(Some(session)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, session: &Session) -> std::io::Result<()> {
        if let Some(parent) = self.session_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_session_json(&self.session_file, session)
    }

    fn clear(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.session_file) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// In-process store for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    fn lock(&self) -> std::io::Result<std::sync::MutexGuard<'_, Option<Session>>> {
        self.session
            .lock()
            .map_err(|_| std::io::Error::other("session store lock poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> std::io::Result<Option<Session>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &Session) -> std::io::Result<()> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> std::io::Result<bool> {
        Ok(self.lock()?.take().is_some())
    }
}

/// Attempt to read and deserialize the session file at the given path.
pub fn try_read_session_json(session_file: &Path) -> std::io::Result<Session> {
    let mut file = File::open(session_file)?;
    let mut contents = String::new();
    use std::io::Read as _;
    file.read_to_string(&mut contents)?;
    let session: Session = serde_json::from_str(&contents)?;
    Ok(session)
}

pub(crate) fn write_session_json(session_file: &Path, session: &Session) -> std::io::Result<()> {
    let json_data = serde_json::to_string_pretty(session)?;
    let mut options = OpenOptions::new();
    options.truncate(true).write(true).create(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(session_file)?;
    use std::io::Write as _;
    file.write_all(json_data.as_bytes())?;
    file.flush()?;
    Ok(())
}
