//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: wiring and startup validation
//! - **Scheduler**: `add_task` / `get_task_status` / `get_queue_stats` / `cancel_task`
//! - **worker**: dispatcher loop, per-task workers, maintenance loop

pub mod builder;
pub mod scheduler;
pub mod worker;

pub use self::builder::SchedulerBuilder;
pub use self::scheduler::Scheduler;
pub use self::worker::SchedulerHandle;
