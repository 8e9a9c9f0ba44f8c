use anyhow::Result;
use mediaconnect_core::{CredentialStore, ServerCredentials, ServerDescriptor};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediaconnect")
}

pub fn get_credentials_path(config_dir: &Path) -> PathBuf {
    config_dir.join("credentials.json")
}

/// Write `content` to `path`, creating parent directories, readable by the
/// owner only.
pub(crate) fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

/// Credential store backed by credentials.json.
///
/// A process-level mutex serializes access from this process. On Unix the
/// read-modify-write of `update_server` also holds an flock on the file, so
/// two CLI invocations cannot interleave.
pub struct JsonCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(get_credentials_path(config_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_from_disk(&self) -> ServerCredentials {
        if !self.path.exists() {
            log::info!("Credentials file not found at {}, starting empty", self.path.display());
            return ServerCredentials::default();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                log::error!("Failed to read credentials file {}: {}", self.path.display(), e);
                return ServerCredentials::default();
            }
        };
        parse_credentials(&content, &self.path)
    }
}

fn parse_credentials(content: &str, path: &Path) -> ServerCredentials {
    if content.trim().is_empty() {
        return ServerCredentials::default();
    }
    serde_json::from_str(content).unwrap_or_else(|e| {
        log::warn!("Failed to parse credentials file {}: {}, starting empty", path.display(), e);
        ServerCredentials::default()
    })
}

impl CredentialStore for JsonCredentialStore {
    fn load(&self) -> ServerCredentials {
        let _guard = self.lock.lock();
        self.read_from_disk()
    }

    fn save(&self, credentials: &ServerCredentials) -> Result<()> {
        let _guard = self.lock.lock();
        let content = serde_json::to_string_pretty(credentials)?;
        write_private(&self.path, &content)
    }

    fn update_server(&self, server: &ServerDescriptor) -> Result<()> {
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            use std::io::{Read, Seek, Write};
            let mut file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.path)?;

            // Exclusive lock, released when `file` is dropped
            unsafe { libc::flock(std::os::unix::io::AsRawFd::as_raw_fd(&file), libc::LOCK_EX) };

            let mut content = String::new();
            file.read_to_string(&mut content)?;
            let mut credentials = parse_credentials(&content, &self.path);
            credentials.update_server(server.clone());

            let new_content = serde_json::to_string_pretty(&credentials)?;
            file.seek(std::io::SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(new_content.as_bytes())?;

            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));
            return Ok(());
        }

        #[cfg(not(unix))]
        {
            let mut credentials = self.read_from_disk();
            credentials.update_server(server.clone());
            let content = serde_json::to_string_pretty(&credentials)?;
            write_private(&self.path, &content)
        }
    }
}
