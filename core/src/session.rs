use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

pub const KEY_LOGGED_IN: &str = "isLoggedIn";
pub const KEY_EMAIL: &str = "userEmail";
pub const KEY_NAME: &str = "userName";
pub const KEY_USER_ID: &str = "userId";
pub const KEY_ACCESS_TOKEN: &str = "authToken";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const KEY_DEMO: &str = "demoMode";

const ALL_KEYS: [&str; 7] = [
    KEY_LOGGED_IN,
    KEY_EMAIL,
    KEY_NAME,
    KEY_USER_ID,
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_DEMO,
];

/// String key-value storage for session values. No expiry.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change.
///
/// A missing file is an empty store. An unreadable one is logged and treated
/// as empty, so a corrupt session file only costs a login.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let values = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %path.display(), "ignoring unreadable session file: {err}");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read session file: {}", path.display())
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    fn persist(&self) -> Result<()> {
        let payload = serde_json::to_vec_pretty(&self.values)?;
        std::fs::write(&self.path, payload)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Who is signed in, read once from the store at start-up and passed
/// explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub logged_in: bool,
    pub demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(skip)]
    pub refresh_token: Option<String>,
}

impl SessionContext {
    pub fn load(store: &dyn SessionStore) -> Result<Self> {
        let non_empty = |key: &str| -> Result<Option<String>> {
            Ok(store.get(key)?.filter(|v| !v.is_empty()))
        };
        Ok(Self {
            logged_in: store.get(KEY_LOGGED_IN)?.as_deref() == Some("true"),
            demo: store.get(KEY_DEMO)?.as_deref() == Some("true"),
            email: non_empty(KEY_EMAIL)?,
            name: non_empty(KEY_NAME)?,
            user_id: non_empty(KEY_USER_ID)?,
            access_token: non_empty(KEY_ACCESS_TOKEN)?,
            refresh_token: non_empty(KEY_REFRESH_TOKEN)?,
        })
    }

    pub fn persist(&self, store: &mut dyn SessionStore) -> Result<()> {
        store.set(KEY_LOGGED_IN, if self.logged_in { "true" } else { "false" })?;
        store.set(KEY_DEMO, if self.demo { "true" } else { "false" })?;
        let optional = [
            (KEY_EMAIL, &self.email),
            (KEY_NAME, &self.name),
            (KEY_USER_ID, &self.user_id),
            (KEY_ACCESS_TOKEN, &self.access_token),
            (KEY_REFRESH_TOKEN, &self.refresh_token),
        ];
        for (key, value) in optional {
            match value {
                Some(v) => store.set(key, v)?,
                None => store.remove(key)?,
            }
        }
        Ok(())
    }

    /// Remove every session key. Used on logout.
    pub fn clear(store: &mut dyn SessionStore) -> Result<()> {
        for key in ALL_KEYS {
            store.remove(key)?;
        }
        Ok(())
    }

    /// Name to greet the user with: the stored name, else the email's local part.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.email.as_deref().and_then(|e| e.split('@').next()))
    }
}
