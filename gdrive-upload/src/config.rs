use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gdrive_core::ServiceAccountKey;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{self, InputError, Inputs};
use crate::conflict::{ParsePolicyError, ReplacementPolicy};
use crate::folders::FolderPath;
use crate::target::Target;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("credentials are not valid base64")]
    CredentialsEncoding(#[from] base64::DecodeError),
    #[error("credentials are not a service-account key")]
    CredentialsFormat(#[from] serde_json::Error),
    #[error("credentials have an empty {0}")]
    CredentialsField(&'static str),
    #[error(transparent)]
    ReplaceMode(#[from] ParsePolicyError),
    #[error("target file does not exist: {0}")]
    TargetMissing(String),
    #[error("target is a directory, not a file: {0}")]
    TargetIsDirectory(String),
}

/// Validated action inputs.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    pub key: ServiceAccountKey,
    pub parent_folder_id: String,
    pub target: Target,
    pub owner: Option<String>,
    pub child_folder: FolderPath,
    pub policy: ReplacementPolicy,
}

impl ActionConfig {
    pub fn from_inputs(inputs: &Inputs) -> Result<Self, ConfigError> {
        let credentials = inputs.required("credentials")?;
        actions::add_mask(&credentials);
        debug!("credentials: ***");
        let key = decode_credentials(&credentials)?;

        let parent_folder_id = echo("parent_folder_id", inputs.required("parent_folder_id")?);
        let target = echo("target", inputs.required("target")?);
        let owner = echo_optional("owner", inputs.get("owner"));
        let child_folder = echo_optional("child_folder", inputs.get("child_folder"));
        let override_existing = inputs.boolean("override")?;
        debug!("override: {override_existing}");
        let name = echo_optional("name", inputs.get("name"));
        let replace_mode = echo_optional("replace_mode", inputs.get("replace_mode"));

        let mode = match replace_mode.as_deref() {
            Some(value) => value.parse::<ReplacementPolicy>()?,
            None => ReplacementPolicy::default(),
        };
        let policy = mode.with_legacy_override(override_existing);
        if override_existing {
            if policy == mode {
                warn!("input 'override' is ignored because replace_mode is {mode}");
            } else {
                warn!("input 'override' is deprecated; use replace_mode: {policy}");
            }
        }
        info!("Replacement policy: {policy}");

        let target = Target::parse(&target, name.as_deref());
        if let Target::Single { path, .. } = &target {
            validate_single_target(path)?;
        }

        Ok(Self {
            key,
            parent_folder_id,
            target,
            owner,
            child_folder: FolderPath::parse(child_folder.as_deref().unwrap_or_default()),
            policy,
        })
    }
}

/// Decodes the base64 service-account key JSON.
pub fn decode_credentials(encoded: &str) -> Result<ServiceAccountKey, ConfigError> {
    let compact: String = encoded.split_whitespace().collect();
    let json = STANDARD.decode(compact)?;
    let key: ServiceAccountKey = serde_json::from_slice(&json)?;
    if key.client_email.trim().is_empty() {
        return Err(ConfigError::CredentialsField("client_email"));
    }
    if key.private_key.trim().is_empty() {
        return Err(ConfigError::CredentialsField("private_key"));
    }
    Ok(key)
}

fn validate_single_target(path: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(ConfigError::TargetIsDirectory(path.display().to_string())),
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::TargetMissing(path.display().to_string())),
    }
}

fn echo(name: &str, value: String) -> String {
    debug!("{name}: {value}");
    value
}

fn echo_optional(name: &str, value: Option<String>) -> Option<String> {
    debug!("{name}: {}", value.as_deref().unwrap_or_default());
    value
}
