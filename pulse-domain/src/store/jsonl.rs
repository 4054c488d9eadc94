//! JSONL 文件账本
//!
//! 布局（每个项目独立，互不竞争）：
//!
//! ```text
//! <root>/<project_id>/runtime/events.jsonl       每行一条完整记录
//! <root>/<project_id>/runtime/locks/events.lock  零长度锁文件
//! ```
//!
//! 写事务在锁文件上持有操作系统级排他锁（跨进程有效），只覆盖账本自身的
//! 读-改-写。写回先落到临时文件并 fsync，再原子 rename 覆盖账本，
//! 因此无锁读者只会看到旧版或新版的完整账本。
//!
//! 读取时空行忽略；无法解析的行告警后跳过，下一次成功写回即自愈。
//! 同一 event_id 出现多行时以最后一行为准。
//!
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::integrity::{IntegrityIssue, IntegrityReport};
use super::{EventStore, TxBody};
use crate::error::DomainResult;
use crate::event::EventRecord;
use crate::value_object::{EventId, ProjectId};

const LEDGER_FILE: &str = "events.jsonl";
const LOCK_FILE: &str = "events.lock";

#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    root: PathBuf,
}

impl JsonlEventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.root.join(project_id.as_str()).join("runtime")
    }

    pub fn ledger_path(&self, project_id: &ProjectId) -> PathBuf {
        self.runtime_dir(project_id).join(LEDGER_FILE)
    }

    pub fn lock_path(&self, project_id: &ProjectId) -> PathBuf {
        self.runtime_dir(project_id).join("locks").join(LOCK_FILE)
    }

    /// 根目录下已有账本的项目
    pub fn list_projects(&self) -> DomainResult<Vec<ProjectId>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(project_id) = ProjectId::new(name) else {
                continue;
            };
            if self.ledger_path(&project_id).is_file() {
                out.push(project_id);
            }
        }
        out.sort();
        Ok(out)
    }

    /// 离线完整性检查：逐行报告损坏、跨项目、重复与违反不变式的记录
    ///
    /// 不加锁、不修改账本。
    pub fn check_integrity(&self, project_id: &ProjectId) -> DomainResult<IntegrityReport> {
        let path = self.ledger_path(project_id);
        let mut report = IntegrityReport::new(project_id.clone(), path.clone());
        if !path.exists() {
            return Ok(report);
        }
        let bytes = fs::read(&path)?;
        let mut seen: HashMap<EventId, usize> = HashMap::new();

        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = idx + 1;
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            report.total_lines += 1;
            let record = match serde_json::from_slice::<EventRecord>(raw) {
                Ok(record) => record,
                Err(err) => {
                    report.push(IntegrityIssue::Unparseable {
                        line,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            report.valid_records += 1;
            if record.project_id() != project_id {
                report.push(IntegrityIssue::ForeignProject {
                    line,
                    event_id: record.event_id().clone(),
                    found: record.project_id().clone(),
                });
            }
            if let Some(first_line) = seen.insert(record.event_id().clone(), line) {
                report.push(IntegrityIssue::DuplicateEventId {
                    line,
                    first_line,
                    event_id: record.event_id().clone(),
                });
            }
            report.inspect_record(line, &record);
        }
        Ok(report)
    }

    fn read_ledger(path: &Path, project_id: &ProjectId) -> DomainResult<Vec<EventRecord>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut rows: Vec<EventRecord> = Vec::new();
        let mut index: HashMap<EventId, usize> = HashMap::new();

        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record = match serde_json::from_slice::<EventRecord>(raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %err,
                        "skipping corrupt ledger line"
                    );
                    continue;
                }
            };
            if record.project_id() != project_id {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    found = %record.project_id(),
                    "skipping ledger line of another project"
                );
                continue;
            }
            match index.get(record.event_id()) {
                Some(&pos) => rows[pos] = record,
                None => {
                    index.insert(record.event_id().clone(), rows.len());
                    rows.push(record);
                }
            }
        }
        Ok(rows)
    }

    fn write_ledger(path: &Path, rows: &[EventRecord]) -> DomainResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for row in rows {
                serde_json::to_writer(&mut writer, row)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn acquire(&self, project_id: &ProjectId) -> DomainResult<LockGuard> {
        let lock_path = self.lock_path(project_id);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock()?;
        Ok(LockGuard { file })
    }
}

/// 持有期间保持排他锁；drop 时释放
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            debug!(error = %err, "ledger lock release failed; closing the handle releases it");
        }
    }
}

impl EventStore for JsonlEventStore {
    fn transact(&self, project_id: &ProjectId, body: &mut TxBody<'_>) -> DomainResult<()> {
        let _guard = self.acquire(project_id)?;
        let path = self.ledger_path(project_id);
        let mut rows = Self::read_ledger(&path, project_id)?;
        body(&mut rows)?;
        Self::write_ledger(&path, &rows)
    }

    fn load(&self, project_id: &ProjectId) -> DomainResult<Vec<EventRecord>> {
        Self::read_ledger(&self.ledger_path(project_id), project_id)
    }
}
