//! k8sdeploy-kube
//!
//! Kubernetes implementation of the agent's resource gateway.
//!
//! # モジュール構成
//! - **gateway**: KubeGateway（ResourceGateway 実装、接続設定）
//! - **mapping**: k8s-openapi オブジェクト → ドメインサマリー

pub mod gateway;
pub mod mapping;

pub use self::gateway::KubeGateway;
