use std::env;
use std::time::Duration;

pub const DEFAULT_METADATA_FILE: &str = "META-INF/spring-configuration-metadata.json";
pub const DEFAULT_ADDITIONAL_METADATA_FILE: &str =
    "META-INF/additional-spring-configuration-metadata.json";

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Location of the metadata document inside a classpath root.
    pub metadata_file: String,
    /// Optional second document merged after the main one.
    pub additional_metadata_file: Option<String>,
    /// Window in which queued reindex requests are coalesced into one run.
    pub debounce: Duration,
    pub command_buffer: usize,
    pub watch_poll_interval: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            additional_metadata_file: Some(DEFAULT_ADDITIONAL_METADATA_FILE.to_string()),
            debounce: Duration::from_millis(200),
            command_buffer: 16,
            watch_poll_interval: Duration::from_secs(2),
        }
    }
}

impl IndexConfig {
    /// Defaults overridden by `KEYHINT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(path) = env_string("KEYHINT_METADATA_FILE") {
            config.metadata_file = path;
        }
        if let Ok(path) = env::var("KEYHINT_ADDITIONAL_METADATA_FILE") {
            // An empty value switches the additional document off.
            let path = path.trim().to_string();
            config.additional_metadata_file = (!path.is_empty()).then_some(path);
        }
        if let Some(ms) = env_millis("KEYHINT_DEBOUNCE_MS") {
            config.debounce = ms;
        }
        if let Some(ms) = env_millis("KEYHINT_WATCH_POLL_MS") {
            config.watch_poll_interval = ms;
        }

        config
    }

    /// Every metadata document location, main document first.
    #[must_use]
    pub fn metadata_files(&self) -> Vec<&str> {
        let mut files = vec![self.metadata_file.as_str()];
        if let Some(additional) = self.additional_metadata_file.as_deref() {
            files.push(additional);
        }
        files
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = env_string(key)?;
    match raw.parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            log::warn!("Ignoring {key}={raw}: {err}");
            None
        }
    }
}
