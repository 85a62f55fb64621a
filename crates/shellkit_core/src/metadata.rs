//! Extension metadata declaration, validation and id resolution.
//!
//! # Responsibility
//! - Parse the shell's `metadata.json` for one extension.
//! - Resolve the gettext domain and settings schema ids the extension uses.
//!
//! # Invariants
//! - Metadata returned by `load_metadata`/`from_json_str` is already validated.
//! - An explicit, non-blank id always wins over the metadata value.
//!
//! Locating locale directories or compiled schema files is left to the host.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Metadata key holding the gettext domain.
pub const KEY_GETTEXT_DOMAIN: &str = "gettext-domain";
/// Metadata key holding the settings schema id.
pub const KEY_SETTINGS_SCHEMA: &str = "settings-schema";

/// Declarative extension metadata, as shipped in `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    /// Stable extension id, e.g. `atom-dock@example.org`.
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "gettext-domain",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gettext_domain: Option<String>,
    #[serde(
        rename = "settings-schema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub settings_schema: Option<String>,
    /// Shell releases the extension declares support for.
    #[serde(rename = "shell-version", default)]
    pub shell_version: Vec<String>,
}

impl ExtensionMetadata {
    /// Parses and validates metadata from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(raw).map_err(MetadataError::Parse)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Validates declaration-level metadata invariants.
    pub fn validate(&self) -> Result<(), MetadataValidationError> {
        let uuid = self.uuid.trim();
        if uuid.is_empty() {
            return Err(MetadataValidationError::EmptyUuid);
        }
        if !is_valid_uuid(uuid) {
            return Err(MetadataValidationError::InvalidUuid(self.uuid.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(MetadataValidationError::EmptyName);
        }
        if let Some(domain) = &self.gettext_domain {
            if !is_dotted_identifier(domain.trim()) {
                return Err(MetadataValidationError::InvalidId {
                    key: KEY_GETTEXT_DOMAIN,
                    value: domain.clone(),
                });
            }
        }
        if let Some(schema) = &self.settings_schema {
            if !is_dotted_identifier(schema.trim()) {
                return Err(MetadataValidationError::InvalidId {
                    key: KEY_SETTINGS_SCHEMA,
                    value: schema.clone(),
                });
            }
        }
        for version in &self.shell_version {
            if !is_shell_version(version.trim()) {
                return Err(MetadataValidationError::InvalidShellVersion(
                    version.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the gettext domain to bind translations under.
    ///
    /// # Errors
    /// - `MissingGettextDomain` when neither `explicit` nor the metadata
    ///   declares one.
    pub fn resolve_gettext_domain(&self, explicit: Option<&str>) -> Result<String, MetadataError> {
        resolve_id(explicit, self.gettext_domain.as_deref())
            .ok_or_else(|| MetadataError::MissingGettextDomain(self.uuid.clone()))
    }

    /// Returns the settings schema id to look up.
    ///
    /// # Errors
    /// - `MissingSettingsSchema` when neither `explicit` nor the metadata
    ///   declares one.
    pub fn resolve_settings_schema(&self, explicit: Option<&str>) -> Result<String, MetadataError> {
        resolve_id(explicit, self.settings_schema.as_deref())
            .ok_or_else(|| MetadataError::MissingSettingsSchema(self.uuid.clone()))
    }
}

/// Reads and validates `metadata.json` from disk.
pub fn load_metadata(path: impl AsRef<Path>) -> Result<ExtensionMetadata, MetadataError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|err| MetadataError::Io {
        path: path.display().to_string(),
        source: err,
    })?;
    ExtensionMetadata::from_json_str(&raw)
}

fn resolve_id(explicit: Option<&str>, declared: Option<&str>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| declared.map(str::trim).filter(|value| !value.is_empty()))
        .map(str::to_string)
}

fn is_valid_uuid(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    !local.is_empty()
        && !domain.is_empty()
        && local.chars().all(allowed)
        && domain.chars().all(allowed)
}

fn is_dotted_identifier(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value.split('.').all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

fn is_shell_version(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    (1..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Metadata declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValidationError {
    EmptyUuid,
    InvalidUuid(String),
    EmptyName,
    InvalidId { key: &'static str, value: String },
    InvalidShellVersion(String),
}

impl Display for MetadataValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUuid => write!(f, "metadata uuid must not be empty"),
            Self::InvalidUuid(value) => {
                write!(f, "metadata uuid is invalid: {value} (expected name@domain)")
            }
            Self::EmptyName => write!(f, "metadata name must not be empty"),
            Self::InvalidId { key, value } => write!(f, "metadata `{key}` is invalid: {value}"),
            Self::InvalidShellVersion(value) => {
                write!(f, "metadata shell-version entry is invalid: {value}")
            }
        }
    }
}

impl Error for MetadataValidationError {}

/// Metadata loading and resolution errors.
#[derive(Debug)]
pub enum MetadataError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Validation(MetadataValidationError),
    MissingGettextDomain(String),
    MissingSettingsSchema(String),
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read metadata `{path}`: {source}"),
            Self::Parse(err) => write!(f, "metadata is not valid JSON: {err}"),
            Self::Validation(err) => write!(f, "invalid extension metadata: {err}"),
            Self::MissingGettextDomain(uuid) => write!(
                f,
                "no gettext domain given and `{KEY_GETTEXT_DOMAIN}` missing for extension {uuid}"
            ),
            Self::MissingSettingsSchema(uuid) => write!(
                f,
                "no settings schema given and `{KEY_SETTINGS_SCHEMA}` missing for extension {uuid}"
            ),
        }
    }
}

impl Error for MetadataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::MissingGettextDomain(_) | Self::MissingSettingsSchema(_) => None,
        }
    }
}

impl From<MetadataValidationError> for MetadataError {
    fn from(value: MetadataValidationError) -> Self {
        Self::Validation(value)
    }
}
