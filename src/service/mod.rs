pub mod container;
pub mod native;

pub use container::ContainerService;
pub use native::NativeService;

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default bound on any single service command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Command not found in PATH: {0}")]
    CommandNotFound(String),

    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// How the reverse proxy is deployed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// System package managed by systemd or SysV init
    #[default]
    Native,
    /// Docker container
    Container,
}

/// Lifecycle control of the reverse proxy.
pub trait ServiceManager {
    fn name(&self) -> &str;
    fn setup(&self) -> Result<(), ServiceError>;
    fn start(&self) -> Result<(), ServiceError>;
    fn stop(&self) -> Result<(), ServiceError>;
    /// Validate configuration, then reload it without dropping connections.
    fn reload(&self) -> Result<(), ServiceError>;
    fn is_running(&self) -> Result<bool, ServiceError>;

    /// Reload when running, start otherwise.
    fn apply(&self) -> Result<(), ServiceError> {
        if self.is_running()? {
            self.reload()
        } else {
            self.start()
        }
    }
}

pub fn service_manager(mode: ProxyMode, proxy_name: &str) -> Box<dyn ServiceManager> {
    let runner = CommandRunner::new(DEFAULT_COMMAND_TIMEOUT);
    match mode {
        ProxyMode::Native => Box::new(NativeService::new(proxy_name, runner)),
        ProxyMode::Container => Box::new(ContainerService::new(proxy_name, runner)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. Seam for the service implementations.
pub trait CommandExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError>;
}

/// Blocking subprocess execution with a deadline.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandExecutor for CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        let executable = which::which(program)
            .map_err(|_| ServiceError::CommandNotFound(program.to_string()))?;

        tracing::debug!("Executing: {command_line}");
        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ServiceError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Drain pipes on threads so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ServiceError::Timeout {
                        command: command_line,
                        timeout: self.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(ServiceError::Spawn {
                        command: command_line,
                        source,
                    })
                }
            }
        };

        let collect = |handle: Option<std::thread::JoinHandle<String>>| {
            handle.and_then(|h| h.join().ok()).unwrap_or_default()
        };
        let output = CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(ServiceError::NonZeroExit {
                command: command_line,
                // Killed by a signal has no code
                code: status.code().unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            tracing::debug!("Failed to read command output: {e}");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Run `primary`, falling back to `fallback` when the first tool is missing
/// or fails.
pub(crate) fn with_fallback<T>(
    primary: impl FnOnce() -> Result<T, ServiceError>,
    fallback: impl FnOnce() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match primary() {
        Ok(value) => Ok(value),
        Err(e @ ServiceError::Timeout { .. }) => Err(e),
        Err(e) => {
            tracing::debug!("{e}; trying fallback");
            fallback()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Records calls and replays scripted results.
    #[derive(Default)]
    pub(crate) struct ScriptedExecutor {
        pub calls: RefCell<Vec<String>>,
        pub results: RefCell<VecDeque<Result<CommandOutput, ServiceError>>>,
    }

    impl ScriptedExecutor {
        pub fn push_ok(&self, stdout: &str) {
            self.results.borrow_mut().push_back(Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
        }

        pub fn push_err(&self, err: ServiceError) {
            self.results.borrow_mut().push_back(Err(err));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandExecutor for &ScriptedExecutor {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.borrow_mut().push(line);
            self.results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::default()))
        }
    }

    pub(crate) fn exit(code: i32) -> ServiceError {
        ServiceError::NonZeroExit {
            command: "scripted".to_string(),
            code,
            stderr: String::new(),
        }
    }

    #[test]
    fn test_missing_command_is_not_found() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let err = runner
            .run("perseus-definitely-not-installed", &[])
            .unwrap_err();
        assert!(matches!(err, ServiceError::CommandNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_classifies_exit_status() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        assert!(runner.run("true", &[]).is_ok());

        let err = runner.run("false", &[]).unwrap_err();
        assert!(matches!(err, ServiceError::NonZeroExit { code: 1, .. }));

        let out = runner.run("echo", &["hello"]).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_keeps_non_utf8_stderr() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let err = runner
            .run("sh", &["-c", r"printf '\377 bad config\n' >&2; exit 3"])
            .unwrap_err();
        match err {
            ServiceError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert!(stderr.ends_with("bad config"), "{stderr}");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_times_out() {
        let runner = CommandRunner::new(Duration::from_millis(100));
        let started = Instant::now();
        let err = runner.run("sleep", &["5"]).unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_apply_starts_stopped_service() {
        struct Stopped(RefCell<Vec<&'static str>>);
        impl ServiceManager for Stopped {
            fn name(&self) -> &str {
                "nginx"
            }
            fn setup(&self) -> Result<(), ServiceError> {
                Ok(())
            }
            fn start(&self) -> Result<(), ServiceError> {
                self.0.borrow_mut().push("start");
                Ok(())
            }
            fn stop(&self) -> Result<(), ServiceError> {
                Ok(())
            }
            fn reload(&self) -> Result<(), ServiceError> {
                self.0.borrow_mut().push("reload");
                Ok(())
            }
            fn is_running(&self) -> Result<bool, ServiceError> {
                Ok(false)
            }
        }

        let service = Stopped(RefCell::new(Vec::new()));
        service.apply().unwrap();
        assert_eq!(*service.0.borrow(), vec!["start"]);
    }
}
