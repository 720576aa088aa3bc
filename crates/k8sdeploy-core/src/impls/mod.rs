//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryGateway**: 固定のクラスタ状態を返す ResourceGateway（spy 付き）
//! - **InMemoryQueueTransport**: プロセス内キュー
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `k8sdeploy-kube`: KubeGateway
//! - `k8sdeploy-http`: RabbitHttpTransport, OrchestratorHandshake

pub mod inmem_gateway;
pub mod inmem_transport;

// 主要な型を再エクスポート
pub use self::inmem_gateway::InMemoryGateway;
pub use self::inmem_transport::InMemoryQueueTransport;
