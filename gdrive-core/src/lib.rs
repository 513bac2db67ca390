mod auth;
mod client;

pub use auth::{AccessToken, AuthError, DRIVE_SCOPES, ServiceAccountAuth, ServiceAccountKey};
pub use client::{About, DriveClient, DriveError, DriveFile, DriveUser, EntryKind, FOLDER_MIME_TYPE};
