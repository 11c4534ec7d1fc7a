//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habits_core::HabitResult;

use crate::entities::{CrontabSchedule, Habit, HabitDraft, NewPeriodicTask, PeriodicTask, User};
use crate::value_objects::CrontabExpression;

/// 用户仓储抽象
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, email: &str, chat_id: Option<&str>) -> HabitResult<User>;
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> HabitResult<Option<User>>;
    async fn set_chat_id(&self, id: i64, chat_id: Option<&str>) -> HabitResult<User>;
}

/// 习惯仓储抽象
#[async_trait]
pub trait HabitRepository: Send + Sync {
    async fn create(&self, owner_id: i64, draft: &HabitDraft) -> HabitResult<Habit>;
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<Habit>>;
    async fn update(&self, id: i64, draft: &HabitDraft) -> HabitResult<Habit>;
    async fn set_frequency(&self, id: i64, frequency: Option<&str>) -> HabitResult<()>;
    async fn delete(&self, id: i64) -> HabitResult<bool>;
    async fn list_by_owner(&self, owner_id: i64) -> HabitResult<Vec<Habit>>;
    async fn list_public(&self) -> HabitResult<Vec<Habit>>;
    /// 以 `id` 作为关联习惯的其他习惯数量
    async fn count_referencing(&self, id: i64) -> HabitResult<usize>;
    async fn health_check(&self) -> HabitResult<()>;
}

/// crontab 计划仓储，按完整字段元组去重
#[async_trait]
pub trait CrontabScheduleRepository: Send + Sync {
    async fn get_or_create(&self, expr: &CrontabExpression) -> HabitResult<CrontabSchedule>;
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<CrontabSchedule>>;
}

/// 周期任务仓储
///
/// 任务通过 `habit_id` 外键归属于习惯，每个习惯最多一条。
#[async_trait]
pub trait PeriodicTaskRepository: Send + Sync {
    async fn create(&self, task: &NewPeriodicTask) -> HabitResult<PeriodicTask>;
    async fn delete_for_habit(&self, habit_id: i64) -> HabitResult<u64>;
    async fn find_for_habit(&self, habit_id: i64) -> HabitResult<Vec<PeriodicTask>>;
    async fn list_enabled(&self) -> HabitResult<Vec<PeriodicTask>>;
    async fn record_run(&self, id: i64, ran_at: DateTime<Utc>) -> HabitResult<()>;
}
