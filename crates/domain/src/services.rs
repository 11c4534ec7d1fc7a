//! 习惯生命周期与提醒计划同步

use std::sync::Arc;

use habits_core::{HabitError, HabitResult};
use tracing::{debug, info, instrument, warn};

use crate::entities::{CrontabSchedule, Habit, HabitDraft, HabitPatch, NewPeriodicTask, PeriodicTask, User};
use crate::repositories::{
    CrontabScheduleRepository, HabitRepository, PeriodicTaskRepository, UserRepository,
};
use crate::validation::{HabitRule, HabitValidator};
use crate::value_objects::CrontabExpression;

/// 提醒发送任务的标识
pub const REMINDER_TASK: &str = "habits.tasks.send_habit_reminder";

pub fn reminder_task_name(habit_id: i64, action: &str) -> String {
    format!("Напоминание о привычке {habit_id} - {action}")
}

pub fn reminder_task_description(action: &str, place: &str) -> String {
    format!("Напоминание для привычки: {action} в {place}")
}

/// 一次同步的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// 已注册新的周期任务
    Registered(PeriodicTask),
    /// 用户没有通知渠道，只确保了计划存在
    ScheduleOnly(CrontabSchedule),
}

/// 提醒计划同步器
///
/// 在习惯写入提交之后调用。存储错误统一包装为 `HabitError::Synchronization`，
/// 不回滚习惯本身，下一次更新时会重新同步。
pub struct ScheduleSynchronizer {
    schedules: Arc<dyn CrontabScheduleRepository>,
    tasks: Arc<dyn PeriodicTaskRepository>,
}

impl ScheduleSynchronizer {
    pub fn new(
        schedules: Arc<dyn CrontabScheduleRepository>,
        tasks: Arc<dyn PeriodicTaskRepository>,
    ) -> Self {
        Self { schedules, tasks }
    }

    pub fn crontab_for_period(period: i32) -> CrontabExpression {
        CrontabExpression::for_period(period)
    }

    #[instrument(skip(self, habit, owner), fields(habit_id = habit.id, owner_id = owner.id))]
    pub async fn synchronize(&self, habit: &Habit, owner: &User) -> HabitResult<SyncOutcome> {
        let crontab = Self::crontab_for_period(habit.period);
        let schedule = self
            .schedules
            .get_or_create(&crontab)
            .await
            .map_err(|e| sync_error("获取或创建crontab计划", habit.id, e))?;

        if !owner.has_notification_channel() {
            debug!("用户 {} 未绑定通知渠道，跳过周期任务注册", owner.id);
            return Ok(SyncOutcome::ScheduleOnly(schedule));
        }

        // 先删后建，保证每个习惯只有一个有效任务
        let removed = self
            .tasks
            .delete_for_habit(habit.id)
            .await
            .map_err(|e| sync_error("删除旧周期任务", habit.id, e))?;
        if removed > 0 {
            debug!("已删除习惯 {} 的 {} 个旧周期任务", habit.id, removed);
        }

        let task = self
            .tasks
            .create(&NewPeriodicTask {
                name: reminder_task_name(habit.id, &habit.action),
                task: REMINDER_TASK.to_string(),
                args: serde_json::to_string(&[habit.id])?,
                description: reminder_task_description(&habit.action, &habit.place),
                crontab_id: schedule.id,
                habit_id: habit.id,
            })
            .await
            .map_err(|e| sync_error("创建周期任务", habit.id, e))?;

        info!(
            "已为习惯 {} 注册提醒任务 {} (crontab: {})",
            habit.id, task.id, crontab
        );
        Ok(SyncOutcome::Registered(task))
    }

    /// 删除习惯的全部周期任务；crontab 计划可能被共享，保留不删
    #[instrument(skip(self))]
    pub async fn remove(&self, habit_id: i64) -> HabitResult<u64> {
        let removed = self
            .tasks
            .delete_for_habit(habit_id)
            .await
            .map_err(|e| sync_error("删除周期任务", habit_id, e))?;
        debug!("已删除习惯 {} 的 {} 个周期任务", habit_id, removed);
        Ok(removed)
    }
}

fn sync_error(step: &str, habit_id: i64, err: HabitError) -> HabitError {
    warn!("习惯 {} 的提醒同步失败 ({}): {}", habit_id, step, err);
    HabitError::synchronization(format!("{step}失败 (习惯 {habit_id}): {err}"))
}

/// 习惯服务：校验 → 持久化 → 同步提醒
pub struct HabitService {
    habits: Arc<dyn HabitRepository>,
    users: Arc<dyn UserRepository>,
    synchronizer: ScheduleSynchronizer,
}

impl HabitService {
    pub fn new(
        habits: Arc<dyn HabitRepository>,
        users: Arc<dyn UserRepository>,
        synchronizer: ScheduleSynchronizer,
    ) -> Self {
        Self {
            habits,
            users,
            synchronizer,
        }
    }

    async fn load_user(&self, user_id: i64) -> HabitResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| HabitError::user_not_found(user_id.to_string()))
    }

    async fn load_habit(&self, habit_id: i64) -> HabitResult<Habit> {
        self.habits
            .find_by_id(habit_id)
            .await?
            .ok_or_else(|| HabitError::habit_not_found(habit_id))
    }

    async fn load_owned(&self, actor_id: i64, habit_id: i64) -> HabitResult<Habit> {
        let habit = self.load_habit(habit_id).await?;
        if habit.owner_id != actor_id {
            return Err(HabitError::forbidden(format!(
                "用户 {actor_id} 不是习惯 {habit_id} 的所有者"
            )));
        }
        Ok(habit)
    }

    /// `self_id` 为正在更新的习惯；引用自身视为引用了不存在的习惯
    async fn validate(&self, draft: &HabitDraft, self_id: Option<i64>) -> HabitResult<()> {
        let related = match draft.related_habit {
            Some(related_id) if Some(related_id) != self_id => {
                self.habits.find_by_id(related_id).await?
            }
            _ => None,
        };
        HabitValidator::validate(draft, related.as_ref()).into_result()
    }

    /// 写入 frequency 并注册提醒；愉快习惯则清理残留任务
    async fn after_write(&self, habit: Habit, owner: &User) -> HabitResult<Habit> {
        if habit.is_pleasant {
            if habit.frequency.is_some() {
                self.habits
                    .set_frequency(habit.id, None)
                    .await
                    .map_err(|e| sync_error("清除frequency", habit.id, e))?;
            }
            self.synchronizer.remove(habit.id).await?;
            return Ok(Habit {
                frequency: None,
                ..habit
            });
        }

        let frequency = ScheduleSynchronizer::crontab_for_period(habit.period).to_string();
        self.habits
            .set_frequency(habit.id, Some(&frequency))
            .await
            .map_err(|e| sync_error("写入frequency", habit.id, e))?;

        let habit = Habit {
            frequency: Some(frequency),
            ..habit
        };
        self.synchronizer.synchronize(&habit, owner).await?;
        Ok(habit)
    }

    #[instrument(skip(self, draft))]
    pub async fn create(&self, owner_id: i64, draft: HabitDraft) -> HabitResult<Habit> {
        let owner = self.load_user(owner_id).await?;
        self.validate(&draft, None).await?;

        let habit = self.habits.create(owner.id, &draft).await?;
        info!("创建{}", habit.entity_description());

        self.after_write(habit, &owner).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, actor_id: i64, habit_id: i64, patch: HabitPatch) -> HabitResult<Habit> {
        let owner = self.load_user(actor_id).await?;
        let current = self.load_owned(actor_id, habit_id).await?;

        let draft = patch.apply_to(current.to_draft());
        self.validate(&draft, Some(habit_id)).await?;

        // 其他习惯依赖它的愉快属性
        if current.is_pleasant
            && !draft.is_pleasant
            && self.habits.count_referencing(habit_id).await? > 0
        {
            return Err(HabitError::validation(vec![
                HabitRule::RelatedMustBePleasant.into(),
            ]));
        }

        let habit = self.habits.update(habit_id, &draft).await?;
        info!("更新{}", habit.entity_description());

        self.after_write(habit, &owner).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, actor_id: i64, habit_id: i64) -> HabitResult<()> {
        let habit = self.load_owned(actor_id, habit_id).await?;

        let dependents = self.habits.count_referencing(habit.id).await?;
        if dependents > 0 {
            return Err(HabitError::HabitInUse {
                id: habit.id,
                dependents,
            });
        }

        self.synchronizer.remove(habit.id).await?;
        if !self.habits.delete(habit.id).await? {
            return Err(HabitError::habit_not_found(habit_id));
        }
        info!("删除{}", habit.entity_description());
        Ok(())
    }

    pub async fn get(&self, actor_id: i64, habit_id: i64) -> HabitResult<Habit> {
        let habit = self.load_habit(habit_id).await?;
        if !habit.is_visible_to(actor_id) {
            return Err(HabitError::forbidden(format!(
                "习惯 {habit_id} 不是公开的"
            )));
        }
        Ok(habit)
    }

    pub async fn list_own(&self, owner_id: i64) -> HabitResult<Vec<Habit>> {
        self.habits.list_by_owner(owner_id).await
    }

    pub async fn list_public(&self) -> HabitResult<Vec<Habit>> {
        self.habits.list_public().await
    }

    pub async fn health_check(&self) -> HabitResult<()> {
        self.habits.health_check().await
    }
}
