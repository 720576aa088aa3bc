//! `info/namespaces` - 見えている namespace 名の一覧

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::InfoRequest;
use crate::domain::{ActionKind, HandlerError};
use crate::ports::ResourceGateway;
use crate::typed::{Handler, HandlerContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacesBody {
    pub namespaces: Vec<String>,
}

pub struct NamespacesHandler {
    gateway: Arc<dyn ResourceGateway>,
}

#[async_trait]
impl Handler for NamespacesHandler {
    const ACTION: ActionKind = ActionKind::Info;
    const SUBTYPE: &'static str = "namespaces";
    type Request = InfoRequest;
    type Body = NamespacesBody;

    fn from_context(ctx: &HandlerContext) -> Self {
        Self {
            gateway: ctx.gateway.clone(),
        }
    }

    async fn process(&self, _request: InfoRequest) -> Result<NamespacesBody, HandlerError> {
        Ok(NamespacesBody {
            namespaces: self.gateway.list_namespaces().await?,
        })
    }
}
