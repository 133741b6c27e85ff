//! Async entry points for hosts running on tokio.
//!
//! The codec is CPU bound and never yields, so each call runs on the blocking
//! pool and the caller's executor stays free.

use {
    crate::{
        error::{Error, Result},
        inject::{self, InjectOptions},
    },
    std::io,
};

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(io::Error::other(e))
}

/// # Errors
/// See [`inject::inject_screenshot`]; a panicked worker is reported as `Error::Io`.
pub async fn inject_screenshot_async(archive: Vec<u8>, image_bytes: Vec<u8>, opts: InjectOptions) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || inject::inject_screenshot(&archive, &image_bytes, &opts))
        .await
        .map_err(join_error)?
}

/// # Errors
/// See [`inject::edit_metadata`]; a panicked worker is reported as `Error::Io`.
pub async fn edit_metadata_async(
    archive: Vec<u8>,
    name: Option<String>,
    description: Option<String>,
    opts: InjectOptions,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        inject::edit_metadata(&archive, name.as_deref(), description.as_deref(), &opts)
    })
    .await
    .map_err(join_error)?
}
