//! Boundary to the CI host: inputs come from `INPUT_*` variables, outputs go
//! to the `GITHUB_OUTPUT` file, and everything else is a workflow command on
//! stdout.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Input required and not supplied: {0}")]
    Missing(String),
    #[error(
        "Input does not meet YAML 1.2 \"Core Schema\" specification: {name}\n\
         Support boolean input list: `true | True | TRUE | false | False | FALSE`"
    )]
    NotBoolean { name: String },
}

/// Snapshot of the action inputs, keyed by their environment variable name.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: HashMap<String, String>,
}

impl Inputs {
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars()
                .filter(|(key, _)| key.starts_with("INPUT_"))
                .collect(),
        }
    }

    /// Builds inputs from `(input name, value)` pairs as written in the
    /// workflow file.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (env_key(name.as_ref()), value.into()))
                .collect(),
        }
    }

    /// Trimmed value, or `None` when unset or blank.
    pub fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(&env_key(name))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String, InputError> {
        self.get(name)
            .ok_or_else(|| InputError::Missing(name.to_string()))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, InputError> {
        match self.get(name).as_deref() {
            None | Some("false" | "False" | "FALSE") => Ok(false),
            Some("true" | "True" | "TRUE") => Ok(true),
            Some(_) => Err(InputError::NotBoolean {
                name: name.to_string(),
            }),
        }
    }
}

fn env_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Escapes a value for use as the message of a workflow command.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Registers a secret so the runner masks it in every later log line.
pub fn add_mask(secret: &str) {
    println!("::add-mask::{}", escape_data(secret));
}

pub fn set_failed(message: &str) {
    println!("::error::{}", escape_data(message));
}

/// The file named by `GITHUB_OUTPUT`, if the runner provides one.
pub fn output_file() -> Option<PathBuf> {
    std::env::var_os("GITHUB_OUTPUT")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Fallback for runners without an output file.
pub fn set_legacy_output(name: &str, value: &str) {
    println!();
    println!("::set-output name={}::{}", escape_property(name), escape_data(value));
}

/// Appends `name=value` to an output file using the heredoc format, which
/// keeps multi-line values intact.
pub fn write_output(path: &Path, name: &str, value: &str) -> io::Result<()> {
    let delimiter = output_delimiter();
    if name.contains(&delimiter) || value.contains(&delimiter) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output '{name}' collides with the delimiter"),
        ));
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{name}<<{delimiter}")?;
    writeln!(file, "{value}")?;
    writeln!(file, "{delimiter}")?;
    Ok(())
}

fn output_delimiter() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("ghadelimiter_{}_{nanos}", std::process::id())
}
