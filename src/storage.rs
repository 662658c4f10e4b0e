//! JSON snapshot files kept under the storage folder.
//!
//! Layout:
//! `<root>/<machineIdentifier>/<libraryKey>/{ownedMovies,recommendedMovies,rssFeed}.json`,
//! `<root>/movieIds.json` and `<root>/gaps.properties`.
//!
//! Reads never fail: a missing or unreadable file yields an empty value. Writes
//! never fail either; problems are logged and the write is abandoned. Every
//! write goes to a sibling `.tmp` file first and is renamed over the target, so
//! an interrupted write leaves the previous snapshot in place.

use crate::models::{GapsProperties, Movie, Payload, Rss};
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const RSS_FEED_JSON_FILE: &str = "rssFeed.json";
pub const PROPERTIES: &str = "gaps.properties";
const MOVIE_IDS: &str = "movieIds.json";
const OWNED_MOVIES: &str = "ownedMovies.json";
const RECOMMENDED_MOVIES: &str = "recommendedMovies.json";

/// Whether a machine identifier can be used as a folder name below the root.
pub fn is_valid_machine_identifier(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    properties_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            properties_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn library_file(&self, machine_identifier: &str, key: u32, file: &str) -> PathBuf {
        self.root
            .join(machine_identifier)
            .join(key.to_string())
            .join(file)
    }

    pub async fn read_owned_movies(&self, machine_identifier: &str, key: u32) -> Vec<Movie> {
        info!("read_owned_movies({}, {})", machine_identifier, key);
        read_json_or_default(&self.library_file(machine_identifier, key, OWNED_MOVIES)).await
    }

    pub async fn write_owned_movies(&self, movies: &[Movie], machine_identifier: &str, key: u32) {
        info!("write_owned_movies({} movies, {}, {})", movies.len(), machine_identifier, key);
        write_json(&self.library_file(machine_identifier, key, OWNED_MOVIES), movies).await;
    }

    pub async fn read_recommended_movies(&self, machine_identifier: &str, key: u32) -> Vec<Movie> {
        info!("read_recommended_movies({}, {})", machine_identifier, key);
        read_json_or_default(&self.library_file(machine_identifier, key, RECOMMENDED_MOVIES)).await
    }

    pub async fn write_recommended_movies(
        &self,
        movies: &[Movie],
        machine_identifier: &str,
        key: u32,
    ) {
        info!(
            "write_recommended_movies({} movies, {}, {})",
            movies.len(),
            machine_identifier,
            key
        );
        write_json(
            &self.library_file(machine_identifier, key, RECOMMENDED_MOVIES),
            movies,
        )
        .await;
    }

    pub async fn rss_file_exists(&self, machine_identifier: &str, key: u32) -> bool {
        let path = self.library_file(machine_identifier, key, RSS_FEED_JSON_FILE);
        fs::try_exists(&path).await.unwrap_or(false)
    }

    /// Raw JSON text of the RSS feed, or an empty string if it can't be read.
    pub async fn read_rss_file(&self, machine_identifier: &str, key: u32) -> String {
        let path = self.library_file(machine_identifier, key, RSS_FEED_JSON_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                error!("Can't read RSS file {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// Writes the recommended movies as RSS entries. Movies are expected to carry an IMDB id.
    pub async fn write_rss_file(&self, machine_identifier: &str, key: u32, recommended: &[Movie]) {
        let entries: Vec<Rss> = recommended.iter().map(Rss::from).collect();
        let missing_imdb = entries.iter().filter(|e| e.imdb_id.is_none()).count();
        if missing_imdb > 0 {
            warn!("{} RSS entries have no IMDB id", missing_imdb);
        }
        write_json(
            &self.library_file(machine_identifier, key, RSS_FEED_JSON_FILE),
            &entries,
        )
        .await;
    }

    pub async fn read_movie_ids(&self) -> Vec<Movie> {
        let movies: Vec<Movie> = read_json_or_default(&self.root.join(MOVIE_IDS)).await;
        info!("Read {} movie ids", movies.len());
        movies
    }

    pub async fn write_movie_ids(&self, movies: &[Movie]) {
        info!("write_movie_ids({} movies)", movies.len());
        write_json(&self.root.join(MOVIE_IDS), movies).await;
    }

    pub async fn read_properties(&self) -> GapsProperties {
        info!("read_properties()");
        read_json_or_default(&self.root.join(PROPERTIES)).await
    }

    pub async fn write_properties(&self, properties: &GapsProperties) {
        info!(
            "write_properties({} plex servers)",
            properties.plex_servers.len()
        );
        write_json(&self.root.join(PROPERTIES), properties).await;
    }

    /// Read-modify-write of the properties file, serialized across callers.
    pub async fn update_properties(&self, f: impl FnOnce(&mut GapsProperties)) {
        let _guard = self.properties_lock.lock().await;
        let mut properties = self.read_properties().await;
        f(&mut properties);
        self.write_properties(&properties).await;
    }

    /// Deletes everything below the storage root. The root folder itself is
    /// kept since it is usually a mounted volume.
    pub async fn nuke(&self) -> Payload {
        info!("Nuking {}", self.root.display());
        match clear_dir(&self.root).await {
            Ok(()) => Payload::NUKE_SUCCESSFUL,
            Err(e) => {
                error!("{} {:#}", Payload::NUKE_UNSUCCESSFUL.reason, e);
                Payload::NUKE_UNSUCCESSFUL
            }
        }
    }
}

async fn clear_dir(dir: &Path) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} does not exist, nothing to delete", dir.display());
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path)
                .await
                .with_context(|| format!("Failed to delete folder {}", path.display()))?;
        } else {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete file {}", path.display()))?;
        }
        info!("Deleted {}", path.display());
    }
    Ok(())
}

async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("{} does not exist", path.display());
            return T::default();
        }
        Err(e) => {
            error!("Can't read the file {}: {}", path.display(), e);
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            error!("Can't parse the file {}: {}", path.display(), e);
            T::default()
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) {
    if let Err(e) = try_write_json(path, value).await {
        error!("Can't write to file {}: {:#}", path.display(), e);
    }
}

async fn try_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let output = serde_json::to_vec(value).context("Failed to serialize snapshot")?;

    if let Some(folder) = path.parent() {
        if !fs::try_exists(folder).await.unwrap_or(false) {
            fs::create_dir_all(folder)
                .await
                .with_context(|| format!("Can't create folder {}", folder.display()))?;
            info!("Folder created: {}", folder.display());
        }
    }

    let tmp = tmp_path(path);
    let result = async {
        let mut file = fs::File::create(&tmp)
            .await
            .with_context(|| format!("Can't create file {}", tmp.display()))?;
        file.write_all(&output).await.context("Write failed")?;
        file.sync_all().await.context("Sync failed")?;
        drop(file);
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Can't replace {}", path.display()))
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}
