//! AgentBuilder - エージェントの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use tokio::sync::watch;

use super::control::{SelfUpdateConfig, SelfUpdater};
use super::dispatcher::Dispatcher;
use super::scheduler::{Scheduler, SchedulerConfig};
use crate::actions::register_builtin;
use crate::domain::{AgentError, ConfigError, HandlerKey, QueueAccess};
use crate::ports::{Clock, QueueTransport, ResourceGateway, SystemClock};
use crate::typed::{ActionRegistry, Handler, HandlerContext, RegistryError};

/// AgentBuilder はエージェントを構築
///
/// # 使用例
/// ```ignore
/// let agent = AgentBuilder::new()
///     .with_builtin_actions()?
///     .gateway(gateway)
///     .transport(transport)
///     .queue_access(access)
///     .expect_actions(&builtin_keys())
///     .build()?;
///
/// agent.run(shutdown_rx).await?;
/// ```
///
/// # Fail-fast 設計
/// - gateway / transport / queue access が揃っていなければ ConfigError
/// - expect_actions() で渡したキーが全て登録されているかを build() 時にチェック
pub struct AgentBuilder {
    registry: ActionRegistry,
    gateway: Option<Arc<dyn ResourceGateway>>,
    transport: Option<Arc<dyn QueueTransport>>,
    access: Option<QueueAccess>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    self_update: Option<SelfUpdateConfig>,
    expected_actions: Option<Vec<HandlerKey>>,
}

/// BuildError はエージェント構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("missing actions: {0:?}. These actions were expected but not registered.")]
    MissingActions(Vec<String>),
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            registry: ActionRegistry::new(),
            gateway: None,
            transport: None,
            access: None,
            clock: Arc::new(SystemClock),
            config: SchedulerConfig::default(),
            self_update: None,
            expected_actions: None,
        }
    }

    /// Handler を登録
    pub fn register<H: Handler>(mut self) -> Result<Self, RegistryError> {
        self.registry.register::<H>()?;
        Ok(self)
    }

    pub fn with_builtin_actions(mut self) -> Result<Self, RegistryError> {
        register_builtin(&mut self.registry)?;
        Ok(self)
    }

    pub fn gateway(mut self, gateway: Arc<dyn ResourceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn QueueTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn queue_access(mut self, access: QueueAccess) -> Self {
        self.access = Some(access);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Where the agent's own deployment lives. Needed when self-update is on.
    pub fn self_update(mut self, config: SelfUpdateConfig) -> Self {
        self.self_update = Some(config);
        self
    }

    /// 期待される (action, subtype) のリストを設定
    pub fn expect_actions(mut self, keys: &[HandlerKey]) -> Self {
        self.expected_actions = Some(keys.to_vec());
        self
    }

    /// AgentBuilder を構築して Agent を生成
    ///
    /// # 検証
    /// - gateway, transport, queue access が設定されているか
    /// - work / response キュー名が空でないか
    /// - poll 間隔が 0 でないか
    /// - self-update が有効なら control キューと SelfUpdateConfig が揃っているか
    /// - expect_actions() のキーが全て登録されているか
    pub fn build(self) -> Result<Agent, BuildError> {
        let gateway = self.gateway.ok_or(ConfigError::Missing("resource gateway"))?;
        let transport = self.transport.ok_or(ConfigError::Missing("queue transport"))?;
        let access = self.access.ok_or(ConfigError::Missing("queue access"))?;

        let routes = access.routes;
        if routes.work.is_empty() {
            return Err(ConfigError::Missing("work queue").into());
        }
        if routes.response.is_empty() {
            return Err(ConfigError::Missing("response queue").into());
        }
        if self.config.interval.is_zero() {
            let reason = "poll interval must be greater than zero".to_string();
            return Err(ConfigError::Invalid(reason).into());
        }

        if let Some(expected) = &self.expected_actions {
            let missing: Vec<String> = expected
                .iter()
                .filter(|key| !self.registry.contains(key))
                .map(ToString::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingActions(missing));
            }
        }

        let context = HandlerContext::new(gateway, self.clock);

        let updater = if self.config.self_update {
            if routes.control.is_empty() {
                return Err(ConfigError::Missing("control queue").into());
            }
            let config = self
                .self_update
                .ok_or(ConfigError::Missing("self-update target"))?;
            config.validate()?;
            Some(Arc::new(SelfUpdater::new(
                config,
                context.clone(),
                transport.clone(),
                routes.control.clone(),
            )))
        } else {
            None
        };

        let dispatcher = Dispatcher::new(Arc::new(self.registry), context, transport, routes);
        Ok(Agent {
            scheduler: Scheduler::new(self.config, Arc::new(dispatcher), updater),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Agent は構築済みのエージェント
pub struct Agent {
    scheduler: Scheduler,
}

impl Agent {
    /// Run the poll loop until shutdown is requested.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) -> Result<(), AgentError> {
        self.scheduler.run(shutdown_rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{NamespacesHandler, builtin_keys};
    use crate::domain::{QueueCredentials, QueueRoutes};
    use crate::impls::{InMemoryGateway, InMemoryQueueTransport};
    use crate::typed::handler::tests::EchoHandler;

    fn access(control: &str) -> QueueAccess {
        QueueAccess {
            routes: QueueRoutes {
                work: "work".to_string(),
                response: "responses".to_string(),
                control: control.to_string(),
            },
            credentials: QueueCredentials {
                key: "k".to_string(),
                secret: "s".to_string(),
            },
        }
    }

    fn wired() -> AgentBuilder {
        AgentBuilder::new()
            .gateway(Arc::new(InMemoryGateway::new()))
            .transport(Arc::new(InMemoryQueueTransport::new()))
            .queue_access(access("control"))
    }

    #[test]
    fn test_build_success() {
        let agent = wired()
            .with_builtin_actions()
            .unwrap()
            .expect_actions(&builtin_keys())
            .build();
        assert!(agent.is_ok());
    }

    #[test]
    fn test_build_missing_actions() {
        let agent = wired()
            .register::<NamespacesHandler>()
            .unwrap()
            .expect_actions(&[NamespacesHandler::key(), EchoHandler::key()])
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::MissingActions(missing)) if missing == vec!["info/echo".to_string()]
        ));
    }

    #[test]
    fn test_build_without_gateway() {
        let agent = AgentBuilder::new()
            .transport(Arc::new(InMemoryQueueTransport::new()))
            .queue_access(access("control"))
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::Config(ConfigError::Missing("resource gateway")))
        ));
    }

    #[test]
    fn test_build_without_queue_access() {
        let agent = AgentBuilder::new()
            .gateway(Arc::new(InMemoryGateway::new()))
            .transport(Arc::new(InMemoryQueueTransport::new()))
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::Config(ConfigError::Missing("queue access")))
        ));
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let agent = wired()
            .scheduler_config(SchedulerConfig {
                interval: std::time::Duration::ZERO,
                ..Default::default()
            })
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::Config(ConfigError::Invalid(ref msg))) if msg.contains("poll interval")
        ));
    }

    #[test]
    fn test_self_update_needs_control_queue() {
        let agent = wired()
            .queue_access(access(""))
            .scheduler_config(SchedulerConfig {
                self_update: true,
                ..Default::default()
            })
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::Config(ConfigError::Missing("control queue")))
        ));
    }

    #[test]
    fn test_self_update_needs_target() {
        let agent = wired()
            .scheduler_config(SchedulerConfig {
                self_update: true,
                ..Default::default()
            })
            .build();
        assert!(matches!(
            agent,
            Err(BuildError::Config(ConfigError::Missing("self-update target")))
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = wired()
            .register::<NamespacesHandler>()
            .unwrap()
            .with_builtin_actions();
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }
}
