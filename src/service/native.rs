use crate::service::{with_fallback, CommandExecutor, ServiceError, ServiceManager};

/// Proxy installed on the host, controlled through systemd with a SysV
/// `service` fallback.
pub struct NativeService<R> {
    name: String,
    runner: R,
}

impl<R: CommandExecutor> NativeService<R> {
    pub fn new(name: &str, runner: R) -> Self {
        Self {
            name: name.to_string(),
            runner,
        }
    }

    fn control(&self, action: &str) -> Result<(), ServiceError> {
        with_fallback(
            || self.runner.run("systemctl", &[action, &self.name]),
            || self.runner.run("service", &[&self.name, action]),
        )?;
        tracing::info!("{} {action} succeeded", self.name);
        Ok(())
    }

    /// `nginx -t` style configuration test
    fn test_config(&self) -> Result<(), ServiceError> {
        self.runner.run(&self.name, &["-t"])?;
        Ok(())
    }
}

impl<R: CommandExecutor> ServiceManager for NativeService<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self) -> Result<(), ServiceError> {
        if let Err(e) = self.runner.run("systemctl", &["enable", &self.name]) {
            tracing::warn!("Could not enable {} service via systemctl: {e}", self.name);
        }
        Ok(())
    }

    fn start(&self) -> Result<(), ServiceError> {
        self.control("start")
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.control("stop")
    }

    fn reload(&self) -> Result<(), ServiceError> {
        self.test_config()?;
        self.control("reload")
    }

    fn is_running(&self) -> Result<bool, ServiceError> {
        match self
            .runner
            .run("systemctl", &["is-active", "--quiet", &self.name])
        {
            Ok(_) => Ok(true),
            Err(ServiceError::NonZeroExit { .. }) => Ok(false),
            Err(ServiceError::CommandNotFound(_)) => {
                match self.runner.run("service", &[&self.name, "status"]) {
                    Ok(_) => Ok(true),
                    Err(ServiceError::NonZeroExit { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
