//! CredentialSource port - キュー名と認証情報の取得
//!
//! 起動時に一度だけ呼ばれます。失敗は致命的（ConfigError）です。

use async_trait::async_trait;

use crate::domain::{ConfigError, QueueAccess};

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn queue_access(&self) -> Result<QueueAccess, ConfigError>;
}

/// Queue access fixed at configuration time (local mode).
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    access: QueueAccess,
}

impl StaticCredentials {
    pub fn new(access: QueueAccess) -> Self {
        Self { access }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn queue_access(&self) -> Result<QueueAccess, ConfigError> {
        let routes = &self.access.routes;
        if routes.work.is_empty() {
            return Err(ConfigError::Missing("work queue"));
        }
        if routes.response.is_empty() {
            return Err(ConfigError::Missing("response queue"));
        }
        Ok(self.access.clone())
    }
}
