//! File uploads.

use std::path::Path;
use tonic::Status;

/// Write exactly `content` to `dir/name`, replacing any existing file.
///
/// `dir` must already exist.
pub(crate) async fn write_file(dir: &str, name: &str, content: &[u8]) -> Result<(), Status> {
    if name.is_empty() {
        return Err(Status::invalid_argument("filename is required"));
    }

    let target = Path::new(dir).join(name);
    tokio::fs::write(&target, content).await.map_err(|e| {
        Status::internal(format!(
            "file write to {} failed: {}",
            target.display(),
            e
        ))
    })
}
