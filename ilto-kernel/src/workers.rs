/**
 * WORKERS - Cycle de vie du groupe de processus supervisé
 *
 * RÔLE :
 * Device Bridge, Override Machine et Aggregator forment une seule unité :
 * démarrés ensemble (dans cet ordre), arrêtés ensemble, redémarrés ensemble.
 *
 * FONCTIONNEMENT :
 * - Worker : trait start/terminate (ProcessWorker en prod, fakes en test)
 * - ProcessWorker : commande découpée avec shell-words, env kernel + env du worker
 * - WorkerGroup : start_all / terminate_all ; un échec est loggé, les autres continuent
 */

use crate::config::WorkerSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::process::{Child, Command, Stdio};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    DeviceBridge,
    OverrideMachine,
    Aggregator,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerRole::DeviceBridge => "device_bridge",
            WorkerRole::OverrideMachine => "override_machine",
            WorkerRole::Aggregator => "aggregator",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid command for {role}: {reason}")]
    InvalidCommand { role: WorkerRole, reason: String },
    #[error("failed to start {role}: {source}")]
    StartFailed {
        role: WorkerRole,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to terminate {role}: {source}")]
    TerminateFailed {
        role: WorkerRole,
        #[source]
        source: std::io::Error,
    },
}

/// Instance démarrée d'un worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerHandle {
    pub role: WorkerRole,
    pub pid: u32,
    pub instance_id: String,
    pub last_restart: OffsetDateTime,
}

pub trait Worker: Send + Sync {
    fn role(&self) -> WorkerRole;

    /// Lance le worker ; `env` = variables communes du kernel
    fn start(&mut self, env: &HashMap<String, String>) -> Result<WorkerHandle, WorkerError>;

    /// Arrête le worker s'il tourne (sans effet sinon)
    fn terminate(&mut self) -> Result<(), WorkerError>;
}

pub struct ProcessWorker {
    spec: WorkerSpec,
    process: Option<Child>,
}

impl ProcessWorker {
    pub fn new(spec: WorkerSpec) -> Self {
        Self { spec, process: None }
    }

    fn command(&self) -> Result<Command, WorkerError> {
        let role = self.spec.role;
        let words = shell_words::split(&self.spec.command).map_err(|e| WorkerError::InvalidCommand {
            role,
            reason: e.to_string(),
        })?;
        let (program, args) = words.split_first().ok_or_else(|| WorkerError::InvalidCommand {
            role,
            reason: "empty command".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        Ok(cmd)
    }
}

impl Worker for ProcessWorker {
    fn role(&self) -> WorkerRole {
        self.spec.role
    }

    fn start(&mut self, env: &HashMap<String, String>) -> Result<WorkerHandle, WorkerError> {
        // un ancien processus oublié ne doit pas survivre au redémarrage
        self.terminate()?;

        let role = self.spec.role;
        let instance_id = Uuid::new_v4().to_string();
        let mut cmd = self.command()?;
        cmd.envs(env)
            .envs(&self.spec.env)
            .env("ILTO_WORKER_ROLE", role.to_string())
            .env("ILTO_INSTANCE_ID", &instance_id);

        let child = cmd
            .spawn()
            .map_err(|source| WorkerError::StartFailed { role, source })?;
        let handle = WorkerHandle {
            role,
            pid: child.id(),
            instance_id,
            last_restart: OffsetDateTime::now_utc(),
        };
        self.process = Some(child);

        info!("[workers] started {} pid {} (instance {})", role, handle.pid, handle.instance_id);
        Ok(handle)
    }

    fn terminate(&mut self) -> Result<(), WorkerError> {
        let Some(mut child) = self.process.take() else {
            return Ok(());
        };
        let role = self.spec.role;

        match child.try_wait() {
            Ok(Some(status)) => {
                info!("[workers] {} already exited ({})", role, status);
                return Ok(());
            }
            Ok(None) => {}
            Err(source) => return Err(WorkerError::TerminateFailed { role, source }),
        }

        child
            .kill()
            .map_err(|source| WorkerError::TerminateFailed { role, source })?;
        let status = child
            .wait()
            .map_err(|source| WorkerError::TerminateFailed { role, source })?;
        info!("[workers] {} pid {} terminated ({})", role, child.id(), status);
        Ok(())
    }
}

/// Le groupe supervisé, dans l'ordre de démarrage
pub struct WorkerGroup {
    workers: Vec<Box<dyn Worker>>,
    env: HashMap<String, String>,
}

impl WorkerGroup {
    pub fn new(workers: Vec<Box<dyn Worker>>, env: HashMap<String, String>) -> Self {
        Self { workers, env }
    }

    pub fn from_specs(specs: &[WorkerSpec], env: HashMap<String, String>) -> Self {
        let workers = specs
            .iter()
            .cloned()
            .map(|spec| Box::new(ProcessWorker::new(spec)) as Box<dyn Worker>)
            .collect();
        Self::new(workers, env)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Démarre tous les workers ; retourne les handles de ceux qui tournent
    pub fn start_all(&mut self) -> Vec<WorkerHandle> {
        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in &mut self.workers {
            debug!("[workers] starting {}", worker.role());
            match worker.start(&self.env) {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("[workers] {e}"),
            }
        }
        handles
    }

    pub fn terminate_all(&mut self) {
        for worker in &mut self.workers {
            if let Err(e) = worker.terminate() {
                warn!("[workers] {e}");
            }
        }
    }
}
