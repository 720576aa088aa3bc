//! Config - 環境変数 / フラグによる設定
//!
//! すべての設定はフラグとしても環境変数としても渡せます。
//! キュー名が 3 つとも設定されていればハンドシェイクを省略します（ローカル用）。

use std::time::Duration;

use clap::Parser;
use k8sdeploy_core::app::{SchedulerConfig, SelfUpdateConfig};
use k8sdeploy_core::domain::{ConfigError, QueueAccess, QueueCredentials, QueueRoutes};
use k8sdeploy_core::ports::{CredentialSource, StaticCredentials};
use k8sdeploy_http::OrchestratorHandshake;

/// k8sdeploy node agent.
#[derive(Debug, Parser)]
#[command(name = "k8sdeploy-agent")]
#[command(about = "Runs cluster commands received from the k8sdeploy queue")]
#[command(version)]
pub struct Cli {
    /// Orchestrator API base address.
    #[arg(long, env = "API_ADDRESS", default_value = "https://api.k8sdeploy.dev/v1")]
    pub api_address: String,

    #[arg(long, env = "K8SDEPLOY_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "K8SDEPLOY_API_SECRET", default_value = "", hide_env_values = true)]
    pub api_secret: String,

    #[arg(long, env = "K8SDEPLOY_COMPANY_ID", default_value = "")]
    pub company_id: String,

    /// RabbitMQ management API base address.
    #[arg(long, env = "RABBIT_HOST", default_value = "http://localhost:15672")]
    pub rabbit_host: String,

    /// Virtual host (defaults to the work queue name).
    #[arg(long, env = "RABBIT_VHOST")]
    pub rabbit_vhost: Option<String>,

    #[arg(long, env = "K8SDEPLOY_WORK_QUEUE")]
    pub work_queue: Option<String>,

    #[arg(long, env = "K8SDEPLOY_RESPONSE_QUEUE")]
    pub response_queue: Option<String>,

    #[arg(long, env = "K8SDEPLOY_CONTROL_QUEUE")]
    pub control_queue: Option<String>,

    #[arg(long, env = "K8SDEPLOY_QUEUE_KEY")]
    pub queue_key: Option<String>,

    #[arg(long, env = "K8SDEPLOY_QUEUE_SECRET", hide_env_values = true)]
    pub queue_secret: Option<String>,

    /// Poll the control queue and update the agent's own deployment.
    #[arg(long, env = "K8SDEPLOY_SELF_UPDATE")]
    pub self_update: bool,

    #[arg(long, env = "SELF_NAME", default_value = "k8sdeploy-agent")]
    pub self_name: String,

    #[arg(long, env = "SELF_NAMESPACE", default_value = "k8sdeploy")]
    pub self_namespace: String,

    #[arg(long, env = "SELF_CONTAINER_URL")]
    pub self_container_url: Option<String>,

    /// Use the local kubeconfig and skip the health server.
    #[arg(long, env = "DEVELOPMENT")]
    pub development: bool,

    #[arg(long, env = "KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// Health endpoint port.
    #[arg(long, env = "HTTP_PORT", default_value = "3000")]
    pub http_port: u16,

    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_secs: u64,
}

impl Cli {
    /// Queue access from configuration, when all three queue names are set.
    pub fn static_access(&self) -> Option<QueueAccess> {
        let (Some(work), Some(response), Some(control)) = (
            self.work_queue.clone(),
            self.response_queue.clone(),
            self.control_queue.clone(),
        ) else {
            return None;
        };
        Some(QueueAccess {
            routes: QueueRoutes {
                work,
                response,
                control,
            },
            credentials: QueueCredentials {
                key: self.queue_key.clone().unwrap_or_default(),
                secret: self.queue_secret.clone().unwrap_or_default(),
            },
        })
    }

    pub fn credential_source(&self) -> Result<Box<dyn CredentialSource>, ConfigError> {
        if let Some(access) = self.static_access() {
            return Ok(Box::new(StaticCredentials::new(access)));
        }
        let handshake = OrchestratorHandshake::new(
            self.api_address.as_str(),
            self.api_key.as_str(),
            self.api_secret.as_str(),
            self.company_id.as_str(),
        )?;
        Ok(Box::new(handshake))
    }

    pub fn vhost(&self, routes: &QueueRoutes) -> String {
        self.rabbit_vhost
            .clone()
            .unwrap_or_else(|| routes.work.clone())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            self_update: self.self_update,
        }
    }

    pub fn self_update_config(&self, build_version: &str) -> SelfUpdateConfig {
        SelfUpdateConfig {
            build_version: build_version.to_string(),
            name: self.self_name.clone(),
            namespace: self.self_namespace.clone(),
            container_url: self.self_container_url.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["k8sdeploy-agent"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn static_access_needs_all_three_queues() {
        let cli = parse(&["--work-queue", "w", "--response-queue", "r"]);
        assert!(cli.static_access().is_none());

        let cli = parse(&[
            "--work-queue",
            "w",
            "--response-queue",
            "r",
            "--control-queue",
            "c",
            "--queue-key",
            "k",
        ]);
        let access = cli.static_access().unwrap();
        assert_eq!(access.routes.control, "c");
        assert_eq!(access.credentials.key, "k");
        assert_eq!(access.credentials.secret, "");
    }

    #[test]
    fn vhost_defaults_to_work_queue() {
        let routes = QueueRoutes {
            work: "agent-42".to_string(),
            response: "r".to_string(),
            control: "c".to_string(),
        };
        assert_eq!(parse(&[]).vhost(&routes), "agent-42");
        assert_eq!(parse(&["--rabbit-vhost", "/"]).vhost(&routes), "/");
    }

    #[test]
    fn scheduler_and_self_update_settings() {
        let cli = parse(&[
            "--self-update",
            "--poll-interval-secs",
            "3",
            "--self-container-url",
            "registry.example.com/agent",
        ]);

        let scheduler = cli.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(3));
        assert!(scheduler.self_update);

        let target = cli.self_update_config("1.2.0");
        assert_eq!(target.build_version, "1.2.0");
        assert_eq!(target.container_url, "registry.example.com/agent");
        assert!(target.validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = Cli::try_parse_from(["k8sdeploy-agent", "--poll-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let result = Cli::try_parse_from(["k8sdeploy-agent", "--http-port", "70000"]);
        assert!(result.is_err());
    }
}
