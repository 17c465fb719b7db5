use crate::config::TransformConfig;
use crate::error::{Result, Error};
use crate::metrics;
use crate::transform::{TransformOutcome, Transformer};
use async_trait::async_trait;
use log::{debug, info, log, warn, Level};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

const STDERR_TAIL_LINES: usize = 20;

/// Runs `dbt run` for the configured models.
#[derive(Debug, Clone)]
pub struct DbtRunner {
    dbt_bin: PathBuf,
    profiles_dir: PathBuf,
    project_dir: PathBuf,
    models: Vec<String>,
    exclude: Vec<String>,
    target: Option<String>,
    full_refresh: bool,
    timeout: Option<Duration>,
}

impl DbtRunner {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            dbt_bin: config.dbt_bin.clone(),
            profiles_dir: config.profiles_dir.clone(),
            project_dir: config.project_dir.clone(),
            models: config.models.clone(),
            exclude: config.exclude.clone(),
            target: config.target.clone(),
            full_refresh: config.full_refresh,
            timeout: config.timeout(),
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "run".into(),
            "--profiles-dir".into(),
            self.profiles_dir.clone().into(),
            "--project-dir".into(),
            self.project_dir.clone().into(),
        ];
        if let Some(target) = &self.target {
            args.push("--target".into());
            args.push(target.into());
        }
        if self.full_refresh {
            args.push("--full-refresh".into());
        }
        args.push("--models".into());
        args.extend(self.models.iter().map(OsString::from));
        if !self.exclude.is_empty() {
            args.push("--exclude".into());
            args.extend(self.exclude.iter().map(OsString::from));
        }
        args
    }

    /// Spawns dbt and logs its output line by line while it runs. Returns the
    /// exit status and the last stderr lines.
    async fn execute(&self) -> Result<(ExitStatus, String)> {
        let mut command = Command::new(&self.dbt_bin);
        command
            .args(self.args())
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Spawning {:?}", command);

        let mut child = command.spawn().map_err(|e| {
            Error::TransformError(format!("failed to start {}: {}", self.dbt_bin.display(), e))
        })?;

        let stderr_tail = Tail::new(STDERR_TAIL_LINES);
        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(log_lines(stdout, Level::Info, None)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(log_lines(stderr, Level::Warn, Some(stderr_tail.clone()))));
        }

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill dbt after timeout: {}", e);
                    }
                    for reader in &readers {
                        reader.abort();
                    }
                    let mut message = format!("dbt did not finish within {}s", limit.as_secs());
                    let tail = stderr_tail.joined();
                    if !tail.is_empty() {
                        message.push_str(": ");
                        message.push_str(&tail);
                    }
                    return Err(Error::TransformError(message));
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(|e| Error::TransformError(format!("failed to wait for dbt: {}", e)))?;

        for reader in readers {
            if let Err(e) = reader.await {
                debug!("dbt output reader stopped: {}", e);
            }
        }
        Ok((status, stderr_tail.joined()))
    }
}

#[async_trait]
impl Transformer for DbtRunner {
    async fn run(&self) -> Result<TransformOutcome> {
        let started = Instant::now();
        info!("Running dbt models: {}", self.models.join(" "));

        let result = self.execute().await;
        let elapsed = started.elapsed();
        metrics::TRANSFORM_DURATION.observe(elapsed.as_secs_f64());
        let (status, stderr_tail) = result?;

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::TransformError(format!("dbt exited with {}: {}", code, stderr_tail)));
        }

        info!("dbt finished in {:.1}s", elapsed.as_secs_f64());
        Ok(TransformOutcome {
            models: self.models.clone(),
            elapsed,
        })
    }
}

/// Last `capacity` lines of a stream, shared with the task reading it.
#[derive(Debug, Clone)]
struct Tail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Tail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn joined(&self) -> String {
        match self.lines.lock() {
            Ok(lines) => lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n"),
            Err(_) => String::new(),
        }
    }
}

async fn log_lines<R>(reader: R, level: Level, tail: Option<Tail>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                log!(level, "dbt: {}", line);
                if let Some(tail) = &tail {
                    tail.push(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading dbt output: {}", e);
                break;
            }
        }
    }
}
