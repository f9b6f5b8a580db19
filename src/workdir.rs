//! Per-job working directories on the cluster side.

use uuid::Uuid;

use crate::dispatch::{Dispatcher, Operation, Runner};
use crate::error::LavaError;

/// Creates `<working_dir>/<uuid>` through the configured transport and returns its path.
pub async fn create_work_dir<R: Runner + Sync>(
    dispatcher: &Dispatcher<R>,
    working_dir: &str,
) -> Result<String, LavaError> {
    let dir = format!("{}/{}", working_dir.trim_end_matches('/'), Uuid::new_v4());
    dispatcher
        .dispatch(Operation::Shell(&format!("mkdir -p {}", dir)))
        .await?
        .into_stdout()?;
    tracing::info!(dir = %dir, "created working directory");
    Ok(dir)
}
