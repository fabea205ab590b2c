use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::PatchConfig;
use crate::error::{Result, WatchError};
use crate::patch::{ConfigPatcher, PatchOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs an external program (by default `yq -i ...`) to patch the release document
pub struct CommandPatcher {
    program: String,
    args: Vec<String>,
    file: PathBuf,
    timeout: Duration,
}

impl CommandPatcher {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        CommandPatcher {
            program: program.into(),
            args,
            file: file.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PatchConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            &config.file,
            config.timeout(),
        )
    }

    /// Substitute `{name}`, `{tag}` and `{file}` in the argument template
    pub fn expand_args(&self, service: &str, tag: &str) -> Vec<String> {
        let file = self.file.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{name}", service)
                    .replace("{tag}", tag)
                    .replace("{file}", &file)
            })
            .collect()
    }

    /// Environment passed to the program in addition to the inherited one
    pub fn env_vars(&self, service: &str, tag: &str) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("REGISTRY_WATCH_SERVICE".to_string(), service.to_string());
        env.insert("REGISTRY_WATCH_TAG".to_string(), tag.to_string());
        env.insert(
            "REGISTRY_WATCH_FILE".to_string(),
            self.file.display().to_string(),
        );
        env
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Wait for `child`, killing it once `timeout` has elapsed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl ConfigPatcher for CommandPatcher {
    fn apply(&self, service: &str, tag: &str) -> Result<PatchOutcome> {
        let args = self.expand_args(service, tag);
        tracing::debug!(program = %self.program, ?args, "running patch command");

        let mut child = Command::new(&self.program)
            .args(&args)
            .envs(self.env_vars(service, tag))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                WatchError::patch(format!("failed to run {}: {}", self.program, e))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, self.timeout).map_err(|e| {
            WatchError::patch(format!("failed waiting for {}: {}", self.program, e))
        })?;

        // Readers are left detached on timeout: a surviving grandchild may hold the pipes.
        let Some(status) = status else {
            return Err(WatchError::patch(format!(
                "{} timed out after {}s",
                self.program,
                self.timeout.as_secs_f32()
            )));
        };

        if !status.success() {
            let stdout = stdout.join().unwrap_or_default();
            let stderr = stderr.join().unwrap_or_default();
            return Err(WatchError::patch(format!(
                "{} failed with exit code {}\nStdout: {}\nStderr: {}",
                self.program,
                status.code().unwrap_or(-1),
                stdout.trim_end(),
                stderr.trim_end()
            )));
        }

        Ok(PatchOutcome::Delegated)
    }
}
