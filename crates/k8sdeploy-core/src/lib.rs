//! k8sdeploy-core
//!
//! Command dispatch core of the k8sdeploy node agent.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（envelope, request_id, response, queue routing, resources, errors）
//! - **ports**: 抽象化レイヤー（ResourceGateway, QueueTransport, CredentialSource, Clock）
//! - **typed**: 型付き Handler API（Handler trait, DynHandler, ActionRegistry）
//! - **actions**: 組み込み handler（deploy/image, info/*）
//! - **app**: アプリケーションロジック（builder, dispatcher, scheduler, self-update）
//! - **impls**: 実装（InMemoryGateway, InMemoryQueueTransport など開発用）

pub mod actions;
pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
