use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use habits_core::{BeatConfig, HabitError, HabitResult};
use habits_domain::entities::PeriodicTask;
use habits_domain::repositories::{
    CrontabScheduleRepository, HabitRepository, PeriodicTaskRepository, UserRepository,
};
use habits_domain::services::REMINDER_TASK;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::cron_utils::CronScheduler;
use crate::reminder::{reminder_text, ReminderSender};

/// 错过触发点超过该时长时记录告警
const OVERDUE_GRACE_MINUTES: i64 = 5;

/// 一次扫描的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 提醒节拍器：周期扫描已启用的周期任务，到点后发送提醒
pub struct ReminderBeat {
    tasks: Arc<dyn PeriodicTaskRepository>,
    schedules: Arc<dyn CrontabScheduleRepository>,
    habits: Arc<dyn HabitRepository>,
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn ReminderSender>,
    offset: FixedOffset,
    tick_interval: Duration,
}

impl ReminderBeat {
    pub fn new(
        tasks: Arc<dyn PeriodicTaskRepository>,
        schedules: Arc<dyn CrontabScheduleRepository>,
        habits: Arc<dyn HabitRepository>,
        users: Arc<dyn UserRepository>,
        sender: Arc<dyn ReminderSender>,
        config: &BeatConfig,
    ) -> HabitResult<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            HabitError::config_error(format!(
                "无效的时区偏移: {} 分钟",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            tasks,
            schedules,
            habits,
            users,
            sender,
            offset,
            tick_interval: Duration::from_secs(config.tick_interval_seconds),
        })
    }

    /// 扫描一次；单个任务的失败只记录日志，不影响其他任务
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> HabitResult<TickReport> {
        let mut report = TickReport::default();

        for task in self.tasks.list_enabled().await? {
            report.checked += 1;

            if task.task != REMINDER_TASK {
                warn!("跳过未知任务类型 '{}' (任务: {})", task.task, task.name);
                report.skipped += 1;
                continue;
            }

            match self.is_due(&task, now).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("无法计算任务 '{}' 的触发时间: {}", task.name, e);
                    report.skipped += 1;
                    continue;
                }
            }

            match self.deliver(&task).await {
                Ok(()) => {
                    if let Err(e) = self.tasks.record_run(task.id, now).await {
                        error!("记录任务 '{}' 的执行状态失败: {}", task.name, e);
                    }
                    report.sent += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!("任务 '{}' 提醒发送失败，下一轮重试: {}", task.name, e);
                    report.failed += 1;
                }
                Err(e) => {
                    // 重试无济于事，记为已执行，等下一个触发点
                    error!("任务 '{}' 提醒无法发送: {}", task.name, e);
                    if let Err(e) = self.tasks.record_run(task.id, now).await {
                        error!("记录任务 '{}' 的执行状态失败: {}", task.name, e);
                    }
                    report.failed += 1;
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            info!(
                "提醒扫描完成: 检查 {} 个, 发送 {} 个, 失败 {} 个, 跳过 {} 个",
                report.checked, report.sent, report.failed, report.skipped
            );
        }
        Ok(report)
    }

    async fn is_due(&self, task: &PeriodicTask, now: DateTime<Utc>) -> HabitResult<bool> {
        let schedule = self
            .schedules
            .find_by_id(task.crontab_id)
            .await?
            .ok_or_else(|| HabitError::Internal(format!("crontab计划 {} 不存在", task.crontab_id)))?;
        let scheduler = CronScheduler::from_expression(&schedule.expression(), self.offset)?;

        // 从未执行过的任务以创建时间为基准，避免注册后立即补发
        let since = task.last_run_at.unwrap_or(task.created_at);
        let due = scheduler.should_trigger(Some(since), now);
        if due && scheduler.is_task_overdue(since, now, OVERDUE_GRACE_MINUTES) {
            warn!("任务 '{}' 已错过预定时间，现在补发", task.name);
        }
        Ok(due)
    }

    async fn deliver(&self, task: &PeriodicTask) -> HabitResult<()> {
        let habit_id = task.habit_id_from_args().unwrap_or(task.habit_id);
        let habit = self
            .habits
            .find_by_id(habit_id)
            .await?
            .ok_or_else(|| HabitError::habit_not_found(habit_id))?;
        let owner = self
            .users
            .find_by_id(habit.owner_id)
            .await?
            .ok_or_else(|| HabitError::user_not_found(habit.owner_id.to_string()))?;
        let chat_id = owner.notification_channel().ok_or_else(|| {
            HabitError::config_error(format!("用户 {} 未绑定通知渠道", owner.id))
        })?;

        let related = match habit.related_habit {
            Some(related_id) => self.habits.find_by_id(related_id).await?,
            None => None,
        };

        self.sender
            .send(chat_id, &reminder_text(&habit, related.as_ref()))
            .await?;
        debug!("已发送{}的提醒", habit.entity_description());
        Ok(())
    }

    /// 按固定间隔扫描，收到关闭信号后退出
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "提醒节拍器启动，扫描间隔 {} 秒，时区偏移 {}",
            self.tick_interval.as_secs(),
            self.offset
        );
        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("提醒扫描失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("提醒节拍器收到关闭信号");
                    break;
                }
            }
        }
    }
}
