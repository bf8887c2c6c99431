use crate::workers::WorkerHandle;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

/// Journal d'exploitation append-only :
///
/// ```text
/// Begin 2024-01-10T12:00:00Z
/// Start 2024-01-10T12:00:00Z device_bridge:4101 override_machine:4102 aggregator:4103
/// Killed 2024-01-10T12:02:00Z
/// Exit 2024-01-10T13:00:00Z
/// ```
///
/// Une écriture ratée est loggée puis ignorée.
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin(&self) {
        self.append("Begin", "");
    }

    pub fn start(&self, handles: &[WorkerHandle]) {
        let workers: Vec<String> = handles.iter().map(|h| format!("{}:{}", h.role, h.pid)).collect();
        self.append("Start", &workers.join(" "));
    }

    pub fn killed(&self) {
        self.append("Killed", "");
    }

    pub fn exit(&self) {
        self.append("Exit", "");
    }

    fn append(&self, event: &str, detail: &str) {
        let ts = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".into());
        let line = if detail.is_empty() {
            format!("{event} {ts}\n")
        } else {
            format!("{event} {ts} {detail}\n")
        };

        let res = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = res {
            warn!("[watchdog] status log {} not written: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerRole;

    fn handle(role: WorkerRole, pid: u32) -> WorkerHandle {
        WorkerHandle {
            role,
            pid,
            instance_id: format!("{role}-{pid}"),
            last_restart: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new(dir.path().join("status.log"));

        log.begin();
        log.start(&[handle(WorkerRole::DeviceBridge, 41), handle(WorkerRole::Aggregator, 43)]);
        log.killed();
        log.exit();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Begin "));
        assert!(lines[1].starts_with("Start "));
        assert!(lines[1].ends_with(" device_bridge:41 aggregator:43"));
        assert!(lines[2].starts_with("Killed "));
        assert!(lines[3].starts_with("Exit "));

        let ts = lines[0].trim_start_matches("Begin ");
        assert!(OffsetDateTime::parse(ts, &Rfc3339).is_ok());
    }

    #[test]
    fn test_unwritable_log_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new(dir.path().join("missing/status.log"));
        log.begin();
        assert!(!log.path().exists());
    }
}
