//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（クラスタ API, メッセージブローカー, オーケストレーター）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod credentials;
pub mod gateway;
pub mod queue_transport;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credentials::{CredentialSource, StaticCredentials};
pub use self::gateway::ResourceGateway;
pub use self::queue_transport::{QueueTransport, RawMessage};
