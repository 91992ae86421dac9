use crate::service::{CommandExecutor, ServiceError, ServiceManager};

const DOCKER: &str = "docker";

/// Proxy running in a named Docker container.
pub struct ContainerService<R> {
    container: String,
    runner: R,
}

impl<R: CommandExecutor> ContainerService<R> {
    pub fn new(container: &str, runner: R) -> Self {
        Self {
            container: container.to_string(),
            runner,
        }
    }

    fn docker(&self, args: &[&str]) -> Result<String, ServiceError> {
        Ok(self.runner.run(DOCKER, args)?.stdout)
    }
}

impl<R: CommandExecutor> ServiceManager for ContainerService<R> {
    fn name(&self) -> &str {
        &self.container
    }

    /// Only verifies the container exists; creating it belongs to deployment.
    fn setup(&self) -> Result<(), ServiceError> {
        self.docker(&["inspect", "--type", "container", &self.container])?;
        Ok(())
    }

    fn start(&self) -> Result<(), ServiceError> {
        self.docker(&["start", &self.container])?;
        tracing::info!("Container {} started", self.container);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.docker(&["stop", &self.container])?;
        tracing::info!("Container {} stopped", self.container);
        Ok(())
    }

    fn reload(&self) -> Result<(), ServiceError> {
        self.docker(&["exec", &self.container, "nginx", "-t"])?;
        self.docker(&["kill", "-s", "HUP", &self.container])?;
        tracing::info!("Container {} reloaded", self.container);
        Ok(())
    }

    fn is_running(&self) -> Result<bool, ServiceError> {
        match self.docker(&["inspect", "-f", "{{.State.Running}}", &self.container]) {
            Ok(state) => Ok(state.trim() == "true"),
            // No such container
            Err(ServiceError::NonZeroExit { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{exit, ScriptedExecutor};

    #[test]
    fn test_reload_tests_then_signals() {
        let exec = ScriptedExecutor::default();
        let service = ContainerService::new("nginx", &exec);

        service.reload().unwrap();
        assert_eq!(
            exec.calls(),
            vec!["docker exec nginx nginx -t", "docker kill -s HUP nginx"]
        );
    }

    #[test]
    fn test_is_running_reads_state() {
        let exec = ScriptedExecutor::default();
        exec.push_ok("true\n");
        exec.push_ok("false\n");
        exec.push_err(exit(1));
        let service = ContainerService::new("proxy", &exec);

        assert!(service.is_running().unwrap());
        assert!(!service.is_running().unwrap());
        assert!(!service.is_running().unwrap());
    }

    #[test]
    fn test_apply_starts_when_stopped() {
        let exec = ScriptedExecutor::default();
        exec.push_ok("false\n");
        let service = ContainerService::new("proxy", &exec);

        service.apply().unwrap();
        assert_eq!(
            exec.calls(),
            vec![
                "docker inspect -f {{.State.Running}} proxy",
                "docker start proxy"
            ]
        );
    }
}
