use std::io;
use std::path::Path;

use anyhow::Context;
use gdrive_core::{DriveClient, ServiceAccountAuth};
use tracing::{debug, info};

use crate::actions;
use crate::config::ActionConfig;
use crate::folders::FolderResolver;
use crate::retry::RetryPolicy;
use crate::upload::{BatchReport, Uploader};

pub struct ActionRuntime {
    config: ActionConfig,
    client: DriveClient,
    retry: RetryPolicy,
}

impl ActionRuntime {
    /// Exchanges the service-account key for a token and checks it against
    /// the identity endpoint before any folder or file is touched.
    pub async fn bootstrap(config: ActionConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let auth =
            ServiceAccountAuth::new(config.key.clone()).context("invalid service-account key")?;
        let token = auth
            .fetch_token(config.owner.as_deref())
            .await
            .with_context(|| format!("failed to authenticate as {}", auth.client_email()))?;
        actions::add_mask(&token.access_token);
        let client = DriveClient::new(token.access_token)?;

        let about = client
            .about()
            .await
            .context("authentication check against the drive API failed")?;
        info!(
            "Authenticated as {}",
            about
                .user
                .email_address
                .as_deref()
                .unwrap_or(auth.client_email())
        );

        Ok(Self::with_client(config, client, retry))
    }

    pub fn with_client(config: ActionConfig, client: DriveClient, retry: RetryPolicy) -> Self {
        Self {
            config,
            client,
            retry,
        }
    }

    pub async fn run(&self) -> anyhow::Result<BatchReport> {
        let files = self.config.target.expand()?;
        debug!("{} file(s) to upload", files.len());

        info!("Getting folder id...");
        let folder_id = FolderResolver::new(&self.client, &self.retry)
            .resolve(&self.config.parent_folder_id, &self.config.child_folder)
            .await
            .with_context(|| {
                format!(
                    "failed to resolve folder '{}' under {}",
                    self.config.child_folder, self.config.parent_folder_id
                )
            })?;
        debug!("uploadFolderId: {folder_id}");

        let report = Uploader::new(&self.client, &self.retry, self.config.policy)
            .upload_all(&folder_id, &files)
            .await;
        info!(
            "Uploaded {} of {} file(s)",
            report.success_count(),
            report.outcomes.len()
        );
        Ok(report)
    }
}

/// Writes the batch outputs. Called even when some files failed so the
/// successful uploads stay visible to later steps.
pub fn publish_outputs(report: &BatchReport) -> io::Result<()> {
    match actions::output_file() {
        Some(path) => publish_outputs_to(&path, report),
        None => {
            for (name, value) in output_values(report) {
                actions::set_legacy_output(name, &value);
            }
            Ok(())
        }
    }
}

pub fn publish_outputs_to(path: &Path, report: &BatchReport) -> io::Result<()> {
    for (name, value) in output_values(report) {
        actions::write_output(path, name, &value)?;
    }
    Ok(())
}

fn output_values(report: &BatchReport) -> [(&'static str, String); 5] {
    [
        ("uploaded_count", report.success_count().to_string()),
        ("failed_count", report.failure_count().to_string()),
        ("file_ids", report.ids()),
        ("file_names", report.names()),
        ("web_view_links", report.view_links()),
    ]
}
