use crate::domain::context::Context;
use crate::domain::entity::Entity;
use crate::domain::ports::PersistenceBackend;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

/// A persistent store that keeps the whole entity set in one JSON file.
///
/// Every save rewrites the file through a temporary sibling that is renamed
/// into place, so readers and crashes only ever observe a complete snapshot.
/// Operations on one store are serialized; blocking file I/O runs on Tokio's
/// blocking pool.
#[derive(Clone)]
pub struct FileSnapshotStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl FileSnapshotStore {
    /// Uses the snapshot at `path`. The file is created on first save.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, ctx: &Context, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        ctx.run(async move {
            tokio::task::spawn_blocking(move || op(&path))
                .await
                .map_err(|e| RegistryError::InternalError(Box::new(e)))?
        })
        .await
    }
}

fn read_snapshot(path: &Path) -> Result<Vec<Entity>> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_snapshot(path: &Path, entities: &[Entity]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut sorted: Vec<&Entity> = entities.iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));

    let tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &sorted)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RegistryError::IoError(e.error))?;
    Ok(())
}

#[async_trait]
impl PersistenceBackend for FileSnapshotStore {
    async fn save(&self, ctx: &Context, entities: &[Entity]) -> Result<()> {
        let entities = entities.to_vec();
        let count = entities.len();
        self.blocking(ctx, move |path| write_snapshot(path, &entities))
            .await?;
        debug!(path = %self.path.display(), count, "snapshot saved");
        Ok(())
    }

    async fn load(&self, ctx: &Context) -> Result<Vec<Entity>> {
        self.blocking(ctx, read_snapshot).await
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(ctx, move |path| {
            let mut entities = read_snapshot(path)?;
            let before = entities.len();
            entities.retain(|entity| entity.id() != id);
            if entities.len() == before {
                return Ok(());
            }
            write_snapshot(path, &entities)
        })
        .await
    }

    async fn clear(&self, ctx: &Context) -> Result<()> {
        self.blocking(ctx, |path| write_snapshot(path, &[])).await
    }
}
