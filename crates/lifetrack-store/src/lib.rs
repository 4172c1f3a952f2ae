use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lifetrack_core::{default_document, Document, DocumentKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const REMOTE_FOLDER: &str = "data";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const USER_AGENT: &str = concat!("lifetrack/", env!("CARGO_PKG_VERSION"));
const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Distinguishes a value read back from storage from the built-in fallback
/// substituted when the document was missing or unreadable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    Stored,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub origin: LoadOrigin,
}

impl<T> Loaded<T> {
    #[must_use]
    pub fn stored(value: T) -> Self {
        Self { value, origin: LoadOrigin::Stored }
    }

    #[must_use]
    pub fn fallback(value: T) -> Self {
        Self { value, origin: LoadOrigin::Default }
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.origin == LoadOrigin::Default
    }
}

/// Explicit backend selection; the caller decides the mode once at
/// construction rather than the store sniffing ambient credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Local { dir: PathBuf },
    Remote(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub token: String,
    /// `owner/name` repository slug.
    pub repo: String,
    pub branch: String,
    pub api_base: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Uniform load/save over the five document kinds, hiding whether the
/// backing store is a local directory or a remote file repository.
pub struct Store {
    backend: Backend,
}

enum Backend {
    Local(LocalStore),
    Remote(RemoteStore),
}

impl Store {
    /// Open the configured backend. Local mode creates the storage directory
    /// and seeds any missing document with its default value.
    ///
    /// # Errors
    /// Returns an error when the local directory or seed documents cannot be
    /// created.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let backend = match config {
            StoreConfig::Local { dir } => Backend::Local(LocalStore::open(dir)?),
            StoreConfig::Remote(remote) => Backend::Remote(RemoteStore::new(remote)),
        };
        Ok(Self { backend })
    }

    /// Load the raw JSON document for `kind`. A missing, corrupt, or
    /// unreachable document degrades to the kind's default value tagged with
    /// [`LoadOrigin::Default`]; read failures never surface as errors.
    ///
    /// # Errors
    /// Currently infallible in practice; kept fallible so callers treat
    /// loads and saves uniformly.
    pub fn load_value(&self, kind: DocumentKind) -> Result<Loaded<Value>> {
        match &self.backend {
            Backend::Local(local) => Ok(local.load(kind)),
            Backend::Remote(remote) => Ok(remote.load(kind)),
        }
    }

    /// Persist `document` under `kind`, fully overwriting prior content.
    ///
    /// # Errors
    /// Returns an error when the write fails; remote failures are logged at
    /// warn level and propagated, never silently dropped.
    pub fn save_value(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        match &self.backend {
            Backend::Local(local) => local.save(kind, document),
            Backend::Remote(remote) => remote.save(kind, document),
        }
    }

    /// Typed load. A stored document that no longer matches its schema is
    /// treated the same as a corrupt one: defaults, tagged as such.
    ///
    /// # Errors
    /// See [`Store::load_value`].
    pub fn load<D: Document>(&self) -> Result<Loaded<D>> {
        let raw = self.load_value(D::KIND)?;
        if raw.is_default() {
            return Ok(Loaded::fallback(D::default_value()));
        }
        match serde_json::from_value::<D>(raw.value) {
            Ok(value) => Ok(Loaded::stored(value)),
            Err(err) => {
                tracing::warn!(
                    "stored {} document does not match its schema ({err}), using defaults",
                    D::KIND
                );
                Ok(Loaded::fallback(D::default_value()))
            }
        }
    }

    /// Typed save.
    ///
    /// # Errors
    /// Returns an error when serialization or the underlying write fails.
    pub fn save<D: Document>(&self, document: &D) -> Result<()> {
        let value = serde_json::to_value(document)
            .with_context(|| format!("failed to serialize {} document", D::KIND))?;
        self.save_value(D::KIND, &value)
    }
}

struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create storage directory {}", dir.display()))?;
        let store = Self { dir };
        for kind in DocumentKind::ALL {
            if !store.document_path(kind).exists() {
                store
                    .save(kind, &default_document(kind))
                    .with_context(|| format!("failed to seed default {kind} document"))?;
            }
        }
        Ok(store)
    }

    fn document_path(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn load(&self, kind: DocumentKind) -> Loaded<Value> {
        let path = self.document_path(kind);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{kind} document missing at {}, using defaults", path.display());
                return Loaded::fallback(default_document(kind));
            }
            Err(err) => {
                tracing::warn!(
                    "failed to read {kind} document at {} ({err}), using defaults",
                    path.display()
                );
                return Loaded::fallback(default_document(kind));
            }
        };

        match serde_json::from_str(&body) {
            Ok(value) => Loaded::stored(value),
            Err(err) => {
                tracing::warn!(
                    "{kind} document at {} is not valid JSON ({err}), using defaults",
                    path.display()
                );
                Loaded::fallback(default_document(kind))
            }
        }
    }

    /// Writes to a sibling temp file and renames over the target, so a
    /// crashed save never leaves a torn document behind.
    fn save(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        let target = self.document_path(kind);
        let body = serde_json::to_string_pretty(document)
            .with_context(|| format!("failed to render {kind} document as JSON"))?;
        let staging = self.dir.join(format!(".{}.tmp", kind.file_name()));
        fs::write(&staging, body)
            .with_context(|| format!("failed to write {kind} document to {}", staging.display()))?;
        fs::rename(&staging, &target).with_context(|| {
            format!("failed to move {kind} document into place at {}", target.display())
        })?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteContents {
    content: String,
    sha: String,
}

struct RemoteStore {
    agent: ureq::Agent,
    config: RemoteConfig,
}

impl RemoteStore {
    fn new(config: RemoteConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REMOTE_TIMEOUT).build();
        Self { agent, config }
    }

    fn contents_url(&self, kind: DocumentKind) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base,
            self.config.repo,
            remote_document_path(kind)
        )
    }

    /// `Ok(None)` means the document has no revision yet at that path.
    fn fetch(&self, kind: DocumentKind) -> Result<Option<RemoteContents>> {
        let response = self
            .agent
            .get(&self.contents_url(kind))
            .query("ref", &self.config.branch)
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT)
            .call();

        match response {
            Ok(response) => {
                let contents: RemoteContents = response
                    .into_json()
                    .with_context(|| format!("failed to decode contents response for {kind}"))?;
                Ok(Some(contents))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("contents request failed for {kind}")),
        }
    }

    fn load(&self, kind: DocumentKind) -> Loaded<Value> {
        let contents = match self.fetch(kind) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::debug!("{kind} document not found in remote store, using defaults");
                return Loaded::fallback(default_document(kind));
            }
            Err(err) => {
                tracing::warn!("failed to fetch {kind} document ({err:#}), using defaults");
                return Loaded::fallback(default_document(kind));
            }
        };

        match decode_remote_content(&contents.content) {
            Ok(value) => Loaded::stored(value),
            Err(err) => {
                tracing::warn!("remote {kind} document is unreadable ({err:#}), using defaults");
                Loaded::fallback(default_document(kind))
            }
        }
    }

    fn save(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        let body = serde_json::to_string_pretty(document)
            .with_context(|| format!("failed to render {kind} document as JSON"))?;
        let result = self.upload(kind, &body);
        if let Err(err) = &result {
            tracing::warn!("failed to save {kind} document to remote store: {err:#}");
        }
        result
    }

    /// Updating an existing path requires the prior revision's content hash;
    /// a first write creates the file instead.
    fn upload(&self, kind: DocumentKind, body: &str) -> Result<()> {
        let prior = self
            .fetch(kind)
            .with_context(|| format!("failed to look up prior revision of {kind}"))?;
        let payload =
            upload_payload(kind, body, &self.config.branch, prior.as_ref().map(|c| c.sha.as_str()));

        self.agent
            .put(&self.contents_url(kind))
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT)
            .send_json(payload)
            .with_context(|| format!("failed to upload {kind} document"))?;
        Ok(())
    }
}

fn remote_document_path(kind: DocumentKind) -> String {
    format!("{REMOTE_FOLDER}/{}", kind.file_name())
}

fn commit_message(kind: DocumentKind, update: bool) -> String {
    if update {
        format!("Update {kind}")
    } else {
        format!("Init {kind}")
    }
}

fn upload_payload(kind: DocumentKind, body: &str, branch: &str, prior_sha: Option<&str>) -> Value {
    let mut payload = serde_json::json!({
        "message": commit_message(kind, prior_sha.is_some()),
        "content": BASE64.encode(body.as_bytes()),
        "branch": branch,
    });
    if let (Some(sha), Some(object)) = (prior_sha, payload.as_object_mut()) {
        object.insert("sha".to_string(), Value::String(sha.to_string()));
    }
    payload
}

/// Contents responses carry base64 with embedded line breaks.
fn decode_remote_content(content: &str) -> Result<Value> {
    let compact: String = content.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = BASE64.decode(compact.as_bytes()).context("content is not valid base64")?;
    let body = String::from_utf8(bytes).context("content is not valid UTF-8")?;
    serde_json::from_str(&body).context("content is not valid JSON")
}
