//! ActionRegistry - (action, subtype) から handler コンストラクタへのマッピング
//!
//! # 学習ポイント
//! - HashMap での型消去されたコンストラクタ（関数ポインタ）の管理
//! - Generic methods での登録と型安全性
//!
//! インスタンスではなくコンストラクタを登録するので、
//! envelope ごとに新しい handler が作られ、リクエスト間で状態が漏れない。

use std::collections::HashMap;

use super::handler::{DynHandler, Handler, HandlerContext, TypedHandler};
use crate::domain::HandlerKey;

/// Builds a fresh type-erased handler for one envelope.
pub type HandlerConstructor = fn(&HandlerContext) -> Box<dyn DynHandler>;

fn construct<H: Handler>(ctx: &HandlerContext) -> Box<dyn DynHandler> {
    Box::new(TypedHandler::new(H::from_context(ctx)))
}

/// ActionRegistry は handler コンストラクタを登録・管理
///
/// # 使用例
/// ```ignore
/// let mut registry = ActionRegistry::new();
/// registry.register::<UpdateImageHandler>()?;
///
/// let handler = registry.construct(&key, &ctx);
/// ```
///
/// 初期化時にだけ変更し、実行時は読み取り専用で共有する。
#[derive(Default)]
pub struct ActionRegistry {
    constructors: HashMap<HandlerKey, HandlerConstructor>,
}

/// RegistryError は ActionRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for '{0}' is already registered")]
    AlreadyRegistered(HandlerKey),
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<H: Handler>(&mut self) -> Result<(), RegistryError> {
        let key = H::key();
        if self.constructors.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        self.constructors.insert(key, construct::<H>);
        Ok(())
    }

    pub fn resolve(&self, key: &HandlerKey) -> Option<HandlerConstructor> {
        self.constructors.get(key).copied()
    }

    /// Resolve and build a new handler instance.
    pub fn construct(&self, key: &HandlerKey, ctx: &HandlerContext) -> Option<Box<dyn DynHandler>> {
        self.resolve(key).map(|ctor| ctor(ctx))
    }

    pub fn contains(&self, key: &HandlerKey) -> bool {
        self.constructors.contains_key(key)
    }

    /// Registered keys, sorted for stable output.
    pub fn registered_keys(&self) -> Vec<HandlerKey> {
        let mut keys: Vec<HandlerKey> = self.constructors.keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
