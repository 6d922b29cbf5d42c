//! Append-only capacity history on local disk.
//!
//! Two independent streams live in the data directory: the aggregate CSV log
//! (rotated monthly into `history_YYYY_MM.csv`) and the per-node JSON-lines
//! snapshot log (never rotated). Only the poll loop writes them.

use crate::core::domain::{
    error::WatchResult,
    model::{HistoryPoint, NodeSnapshot},
};
use chrono::{DateTime, Datelike, Local};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const COUNTS_FILE: &str = "history.csv";
pub const SNAPSHOTS_FILE: &str = "node_states.jsonl";

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn counts_path(&self) -> PathBuf {
        self.dir.join(COUNTS_FILE)
    }

    pub fn snapshots_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOTS_FILE)
    }

    pub fn archive_path(&self, year: i32, month: u32) -> PathBuf {
        self.dir.join(format!("history_{:04}_{:02}.csv", year, month))
    }

    /// Appends one row to the aggregate log, rotating it first if it was last
    /// written in a previous month.
    pub async fn append_counts(&self, point: &HistoryPoint) -> WatchResult<()> {
        self.append_counts_at(point, Local::now()).await
    }

    /// [`HistoryStore::append_counts`] with an explicit notion of "now".
    pub async fn append_counts_at(&self, point: &HistoryPoint, now: DateTime<Local>) -> WatchResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.counts_path();
        let needs_header = match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                let modified: DateTime<Local> = meta.modified()?.into();
                if (modified.year(), modified.month()) != (now.year(), now.month()) {
                    let archive = self.archive_path(modified.year(), modified.month());
                    archive_into(&path, &archive).await?;
                    tracing::info!(archive = %archive.display(), "rotated history log");
                    true
                } else {
                    meta.len() == 0
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut text = String::new();
        if needs_header {
            text.push_str(HistoryPoint::CSV_HEADER);
            text.push('\n');
        }
        text.push_str(&point.to_csv_row());
        text.push('\n');
        append(&path, text.as_bytes()).await
    }

    /// Appends one JSON line to the snapshot log.
    pub async fn append_snapshot(&self, snapshot: &NodeSnapshot) -> WatchResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');
        append(&self.snapshots_path(), line.as_bytes()).await
    }

    /// Every readable row of the current aggregate log.
    pub async fn read_counts(&self) -> WatchResult<Vec<HistoryPoint>> {
        read_counts_file(&self.counts_path()).await
    }

    /// Rows from all archives and the current log with `timestamp >= since`,
    /// oldest first.
    pub async fn read_counts_since(&self, since: f64) -> WatchResult<Vec<HistoryPoint>> {
        let mut files = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await {
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with("history_") && name.ends_with(".csv") {
                    files.push(entry.path());
                }
            }
        }
        // Archive names sort chronologically.
        files.sort();
        files.push(self.counts_path());

        let mut points = Vec::new();
        for file in files {
            points.extend(
                read_counts_file(&file)
                    .await?
                    .into_iter()
                    .filter(|p| p.timestamp >= since),
            );
        }
        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(points)
    }

    /// Every readable line of the snapshot log.
    pub async fn read_snapshots(&self) -> WatchResult<Vec<NodeSnapshot>> {
        let path = self.snapshots_path();
        let Some(content) = read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_lines(&content, &path, |line| serde_json::from_str(line).ok()))
    }
}

async fn append(path: &Path, bytes: &[u8]) -> WatchResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

/// Moves the aggregate log to `archive`. An archive that already exists is
/// extended with the log's rows instead of being replaced.
async fn archive_into(path: &Path, archive: &Path) -> WatchResult<()> {
    if tokio::fs::try_exists(archive).await? {
        let content = tokio::fs::read_to_string(path).await?;
        let body = content
            .strip_prefix(HistoryPoint::CSV_HEADER)
            .map(|rest| rest.trim_start_matches(['\r', '\n']))
            .unwrap_or(&content);
        if !body.is_empty() {
            let existing = tokio::fs::read(archive).await?;
            let mut text = String::new();
            if existing.last().is_some_and(|b| *b != b'\n') {
                text.push('\n');
            }
            text.push_str(body);
            if !body.ends_with('\n') {
                text.push('\n');
            }
            append(archive, text.as_bytes()).await?;
        }
        tokio::fs::remove_file(path).await?;
        Ok(())
    } else {
        tokio::fs::rename(path, archive).await?;
        Ok(())
    }
}

async fn read_optional(path: &Path) -> WatchResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_counts_file(path: &Path) -> WatchResult<Vec<HistoryPoint>> {
    let Some(content) = read_optional(path).await? else {
        return Ok(Vec::new());
    };
    let body = content
        .strip_prefix(HistoryPoint::CSV_HEADER)
        .map(|rest| rest.trim_start_matches(['\r', '\n']))
        .unwrap_or(&content);
    Ok(parse_lines(body, path, HistoryPoint::from_csv_row))
}

/// Parses non-empty lines. A bad final line is a torn write and is dropped
/// quietly; a bad line anywhere else is logged and skipped.
fn parse_lines<T>(content: &str, path: &Path, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let parsed = parse(line);
            if parsed.is_none() && index != last {
                tracing::warn!(path = %path.display(), line = index + 1, "skipping unreadable history line");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::StateCounts;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn point(timestamp: f64, idle: u32) -> HistoryPoint {
        HistoryPoint {
            timestamp,
            counts: StateCounts {
                idle,
                mixed: 1,
                allocated: 2,
                down: 0,
            },
        }
    }

    fn local(year: i32, month: u32, day: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .unwrap()
    }

    fn set_mtime(path: &Path, when: DateTime<Local>) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(when.into()).unwrap();
    }

    #[tokio::test]
    async fn test_first_append_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store.append_counts(&point(1.0, 3)).await.unwrap();
        store.append_counts(&point(2.0, 4)).await.unwrap();
        let content = std::fs::read_to_string(store.counts_path()).unwrap();
        assert_eq!(content, "Timestamp,Idle,Mixed,Alloc,Down\n1,3,1,2,0\n2,4,1,2,0\n");
        assert_eq!(store.read_counts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rotation_on_month_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store
            .append_counts_at(&point(1.0, 3), local(2024, 1, 20))
            .await
            .unwrap();
        set_mtime(&store.counts_path(), local(2024, 1, 20));

        store
            .append_counts_at(&point(2.0, 5), local(2024, 2, 1))
            .await
            .unwrap();

        let archived = std::fs::read_to_string(store.archive_path(2024, 1)).unwrap();
        assert_eq!(archived, "Timestamp,Idle,Mixed,Alloc,Down\n1,3,1,2,0\n");
        let current = std::fs::read_to_string(store.counts_path()).unwrap();
        assert_eq!(current, "Timestamp,Idle,Mixed,Alloc,Down\n2,5,1,2,0\n");
    }

    #[tokio::test]
    async fn test_rotation_extends_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        std::fs::write(
            store.archive_path(2024, 1),
            "Timestamp,Idle,Mixed,Alloc,Down\n1,1,1,1,1\n",
        )
        .unwrap();
        std::fs::write(
            store.counts_path(),
            "Timestamp,Idle,Mixed,Alloc,Down\n2,2,2,2,2\n",
        )
        .unwrap();
        set_mtime(&store.counts_path(), local(2024, 1, 31));

        store
            .append_counts_at(&point(3.0, 3), local(2024, 2, 1))
            .await
            .unwrap();

        let archived = std::fs::read_to_string(store.archive_path(2024, 1)).unwrap();
        assert_eq!(
            archived,
            "Timestamp,Idle,Mixed,Alloc,Down\n1,1,1,1,1\n2,2,2,2,2\n"
        );
        let current = std::fs::read_to_string(store.counts_path()).unwrap();
        assert_eq!(current, "Timestamp,Idle,Mixed,Alloc,Down\n3,3,1,2,0\n");
    }

    #[tokio::test]
    async fn test_same_month_different_year_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store
            .append_counts_at(&point(1.0, 3), local(2023, 3, 5))
            .await
            .unwrap();
        set_mtime(&store.counts_path(), local(2023, 3, 5));
        store
            .append_counts_at(&point(2.0, 3), local(2024, 3, 5))
            .await
            .unwrap();
        assert!(store.archive_path(2023, 3).exists());
    }

    #[tokio::test]
    async fn test_torn_last_line_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        std::fs::write(
            store.counts_path(),
            "Timestamp,Idle,Mixed,Alloc,Down\n1,3,1,2,0\ngarbage\n2,4,1,2,0\n3,4,1",
        )
        .unwrap();
        let points = store.read_counts().await.unwrap();
        let stamps: Vec<f64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_snapshots_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested"));
        let snapshot = NodeSnapshot {
            timestamp: 10.5,
            nodes: BTreeMap::from([("huk01".to_string(), 0), ("huk02".to_string(), 2)]),
        };
        store.append_snapshot(&snapshot).await.unwrap();
        let mut raw = std::fs::read_to_string(store.snapshots_path()).unwrap();
        assert_eq!(raw, "{\"timestamp\":10.5,\"nodes\":{\"huk01\":0,\"huk02\":2}}\n");

        raw.push_str("{\"timestamp\":11.0,\"nod");
        std::fs::write(store.snapshots_path(), raw).unwrap();
        assert_eq!(store.read_snapshots().await.unwrap(), vec![snapshot]);
    }

    #[tokio::test]
    async fn test_read_counts_since_spans_archives() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        std::fs::write(
            store.archive_path(2024, 1),
            "Timestamp,Idle,Mixed,Alloc,Down\n100,1,1,2,0\n200,2,1,2,0\n",
        )
        .unwrap();
        std::fs::write(
            store.counts_path(),
            "Timestamp,Idle,Mixed,Alloc,Down\n300,3,1,2,0\n",
        )
        .unwrap();
        let points = store.read_counts_since(150.0).await.unwrap();
        let idle: Vec<u32> = points.iter().map(|p| p.counts.idle).collect();
        assert_eq!(idle, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent"));
        assert!(store.read_counts().await.unwrap().is_empty());
        assert!(store.read_snapshots().await.unwrap().is_empty());
        assert!(store.read_counts_since(0.0).await.unwrap().is_empty());
    }
}
