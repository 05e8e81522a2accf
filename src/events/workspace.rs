// ABOUTME: Scratch directory handed to each handler invocation.
// ABOUTME: Emptied before every run; handlers share no filesystem state.

use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove and recreate the scratch directory, returning its path.
    pub async fn reset(&self) -> io::Result<PathBuf> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&self.root).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.root, std::fs::Permissions::from_mode(0o777)).await?;
        }

        Ok(self.root.clone())
    }
}
