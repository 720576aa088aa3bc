//! Typed - 型付き Handler API と ActionRegistry
//!
//! このモジュールは (action, subtype) と handler の対応を型で表し、
//! Dispatcher から具体的な handler 実装を切り離します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler` trait - Request / Body が型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod registry;

// 主要な trait/型 を再エクスポート
pub use self::handler::{DynHandler, Handler, HandlerContext, Processed, TypedHandler};
pub use self::registry::{ActionRegistry, HandlerConstructor, RegistryError};
