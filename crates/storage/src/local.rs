//! Filesystem object store.
//!
//! Writes go to a temporary sibling first and are renamed into place after
//! `sync_all`, so a reader never sees a partial file.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::object_store::{check_path, join_url, ObjectStore, ObjectStoreError};

pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        check_path(path)?;
        let target = self.root.join(path);
        let write_err = |e: std::io::Error| ObjectStoreError::Write(format!("{}: {e}", target.display()));

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp = target.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        let mut file = tokio::fs::File::create(&tmp).await.map_err(write_err)?;
        let written = async {
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        tokio::fs::rename(&tmp, &target).await.map_err(write_err)?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        join_url(&self.public_base_url, path)
    }
}
