use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::services::worker_pool::{BlockingPool, PoolError};

/// How often a running converter is polled for exit when a timeout is set
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Outcome of one converter run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success {
        text: String,
    },
    Failure {
        /// `None` when the process was killed by a signal
        exit_code: Option<i32>,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{program} is not installed. Please install it using '{hint}'")]
    NotInstalled { program: String, hint: String },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("error while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Runs the external text extractor on staged files.
pub struct ConverterService {
    program: String,
    install_hint: String,
    timeout: Option<Duration>,
    pool: Arc<BlockingPool>,
}

impl ConverterService {
    pub fn new(
        program: impl Into<String>,
        install_hint: impl Into<String>,
        timeout: Option<Duration>,
        pool: Arc<BlockingPool>,
    ) -> Self {
        Self {
            program: program.into(),
            install_hint: install_hint.into(),
            timeout,
            pool,
        }
    }

    pub fn from_config(config: &ServiceConfig, pool: Arc<BlockingPool>) -> Self {
        Self::new(
            config.converter_program.clone(),
            config.converter_install_hint.clone(),
            config.converter_timeout(),
            pool,
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolve the converter on PATH (or check it directly if given as a path).
    pub fn locate(&self) -> Result<PathBuf, ConvertError> {
        which::which(&self.program).map_err(|_| ConvertError::NotInstalled {
            program: self.program.clone(),
            hint: self.install_hint.clone(),
        })
    }

    /// Run the converter against `input` on a worker slot.
    pub async fn invoke(&self, input: &Path) -> Result<ConversionResult, ConvertError> {
        let executable = self.locate()?;
        let program = self.program.clone();
        let input = input.to_path_buf();
        let timeout = self.timeout;

        tracing::debug!("Running {} on {}", executable.display(), input.display());
        self.pool
            .run(move || run_converter(&program, &executable, &input, timeout))
            .await?
    }
}

/// Blocking half of [`ConverterService::invoke`]. Must run off the async runtime.
fn run_converter(
    program: &str,
    executable: &Path,
    input: &Path,
    timeout: Option<Duration>,
) -> Result<ConversionResult, ConvertError> {
    let started = Instant::now();
    let mut command = Command::new(executable);
    command
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so a timeout also reaches any helpers the converter
    // forks. Those inherit our pipes and would keep the readers below open.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .map_err(|source| ConvertError::Launch {
            program: program.to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Drain both pipes concurrently so a chatty converter cannot fill one
    // pipe and stall while we wait on the other.
    let (status, out, err) = std::thread::scope(|scope| {
        let out = scope.spawn(move || read_pipe(stdout));
        let err = scope.spawn(move || read_pipe(stderr));
        let status = wait_for_exit(program, &mut child, timeout);
        (
            status,
            out.join().unwrap_or_default(),
            err.join().unwrap_or_default(),
        )
    });
    let status = status?;

    tracing::debug!(
        "{} exited with {} after {:?}",
        program,
        status,
        started.elapsed()
    );

    if status.success() {
        Ok(ConversionResult::Success {
            text: String::from_utf8_lossy(&out).into_owned(),
        })
    } else {
        Ok(ConversionResult::Failure {
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        })
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf) {
            tracing::warn!("Failed to read converter output: {}", e);
        }
    }
    buf
}

fn wait_for_exit(
    program: &str,
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, ConvertError> {
    let wait_err = |source| ConvertError::Wait {
        program: program.to_string(),
        source,
    };

    let Some(timeout) = timeout else {
        return child.wait().map_err(wait_err);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(wait_err)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            tracing::warn!("⏱️  {} exceeded {:?}, killing pid {}", program, timeout, child.id());
            if let Err(e) = kill_process_group(child) {
                tracing::warn!("Failed to kill {}: {}", program, e);
            }
            // reap so the pipes close and no zombie is left behind
            let _ = child.wait();
            return Err(ConvertError::TimedOut {
                program: program.to_string(),
                after: timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child and everything in its process group. Must be called
/// before the child is reaped, while its pid still names the group.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // negative pid targets the whole group
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        child.kill()
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}
