//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AgentBuilder**: エージェントの構築とワイヤリング
//! - **Dispatcher**: 生メッセージ → Envelope → handler → 応答
//! - **Scheduler**: 一定間隔で work / control キューを poll
//! - **SelfUpdater**: control キューによる自己更新

pub mod builder;
pub mod control;
pub mod dispatcher;
pub mod scheduler;
pub mod shutdown;

// 主要な型を再エクスポート
pub use self::builder::{Agent, AgentBuilder, BuildError};
pub use self::control::{ControlOutcome, SelfUpdateConfig, SelfUpdater};
pub use self::dispatcher::{Dispatched, Dispatcher};
pub use self::scheduler::{PollOutcome, Poller, Scheduler, SchedulerConfig};
