//! k8sdeploy-http
//!
//! HTTP adapters for the k8sdeploy agent.
//!
//! # モジュール構成
//! - **rabbit**: RabbitMQ management API 経由の QueueTransport
//! - **handshake**: オーケストレーター API へのログイン（CredentialSource）

pub mod handshake;
pub mod rabbit;

pub use self::handshake::OrchestratorHandshake;
pub use self::rabbit::RabbitHttpTransport;
