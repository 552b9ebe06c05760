use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use tracing::debug;

use crate::model::{NewResponse, Response};
use crate::store::{BodyStore, ResponseStore};
use crate::{EngineError, Result};

const RESPONSES_FILE: &str = "responses.jsonl";
const BODIES_DIR: &str = "bodies";
// 20 MB soft limit for compaction
const COMPACTION_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;
// Keep last 10,000 records
const MAX_RECORDS: usize = 10_000;

/// 文件存储：响应元数据写入 JSON Lines，body 单独保存为 `bodies/<id>.txt`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn responses_path(&self) -> PathBuf {
        self.dir.join(RESPONSES_FILE)
    }

    fn body_path(&self, response_id: &str) -> PathBuf {
        self.dir.join(BODIES_DIR).join(format!("{}.txt", response_id))
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// 追加一条响应记录
    ///
    /// 写入期间持有 `fs2` 排他锁，多个进程同时追加不会交错。
    pub fn append(&self, record: &Response) -> Result<()> {
        self.ensure_dir(&self.dir)?;
        let json = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.responses_path())?;

        file.lock_exclusive()?;
        writeln!(file, "{}", json)?;
        drop(file);

        Ok(())
    }

    /// 全部响应记录（按写入顺序），读取前按需压缩
    pub fn list(&self) -> Result<Vec<Response>> {
        if !self.responses_path().exists() {
            return Ok(Vec::new());
        }

        self.compact_if_needed()?;
        self.read_all()
    }

    /// 最近 n 条记录，旧的在前
    pub fn tail(&self, n: usize) -> Result<Vec<Response>> {
        let records = self.list()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }

    /// 读取保存的 body
    pub fn read_body(&self, response_id: &str) -> Result<Option<String>> {
        let path = self.body_path(response_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn read_all(&self) -> Result<Vec<Response>> {
        let file = fs::File::open(self.responses_path())?;
        file.lock_shared()?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Response>(&line) {
                Ok(record) => records.push(record),
                Err(e) => debug!(error = %e, "Skipping malformed response record"),
            }
        }
        Ok(records)
    }

    /// 文件超过阈值时只保留最近的记录
    fn compact_if_needed(&self) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.responses_path())?;

        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        file.lock_exclusive()?;

        // 拿到锁后再检查一次，可能已被其他进程压缩
        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        let records: Vec<Response> = BufReader::new(&file)
            .lines()
            .map_while(|l| l.ok())
            .filter_map(|l| serde_json::from_str(&l).ok())
            .collect();

        if records.len() <= MAX_RECORDS {
            return Ok(());
        }
        let skip = records.len() - MAX_RECORDS;

        // 截断后在同一个句柄上重写，保持锁有效
        file.set_len(0)?;
        let mut file = file;
        file.seek(SeekFrom::Start(0))?;

        let mut writer = std::io::BufWriter::new(file);
        for record in records.iter().skip(skip) {
            writeln!(writer, "{}", serde_json::to_string(record)?)?;
        }
        writer.flush()?;

        debug!(kept = MAX_RECORDS, dropped = skip, "Compacted response log");
        Ok(())
    }
}

#[async_trait]
impl BodyStore for FileStore {
    async fn save_response_body(&self, response_id: &str, body: &str) -> Result<String> {
        let path = self.body_path(response_id);
        let parent = path
            .parent()
            .ok_or_else(|| EngineError::store(format!("无效的 body 路径: {}", path.display())))?;
        self.ensure_dir(parent)?;
        fs::write(&path, body)?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn delete_response_body(&self, response_id: &str) -> Result<()> {
        match fs::remove_file(self.body_path(response_id)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResponseStore for FileStore {
    async fn create_response(&self, response: NewResponse) -> Result<Response> {
        let record = Response::from_new(response, Utc::now());
        self.append(&record)?;
        Ok(record)
    }
}
