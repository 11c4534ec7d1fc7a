use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use cron::Schedule;
use habits_core::{HabitError, HabitResult};
use habits_domain::value_objects::CrontabExpression;
use tracing::{debug, warn};

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// CRON表达式解析和调度工具
///
/// 输入是五段式 crontab（分 时 日 月 周，周日为 0 或 7），在给定的时区偏移下求值。
pub struct CronScheduler {
    schedule: Schedule,
    offset: FixedOffset,
}

impl CronScheduler {
    /// 按 UTC 求值
    pub fn new(cron_expr: &str) -> HabitResult<Self> {
        Self::with_offset(cron_expr, Utc.fix())
    }

    pub fn with_offset(cron_expr: &str, offset: FixedOffset) -> HabitResult<Self> {
        let expr: CrontabExpression = cron_expr.parse()?;
        Self::from_expression(&expr, offset)
    }

    pub fn from_expression(expr: &CrontabExpression, offset: FixedOffset) -> HabitResult<Self> {
        let converted = to_cron_crate_format(expr);
        let schedule = Schedule::from_str(&converted).map_err(|e| HabitError::InvalidCron {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule, offset })
    }

    /// 检查从 `since` 之后是否已经到达一个触发点
    pub fn should_trigger(&self, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match since {
            Some(last) => match self.next_execution_time(last) {
                Some(next_time) => {
                    let should_trigger = next_time <= now;
                    if should_trigger {
                        debug!(
                            "任务应该触发: 上次执行={}, 下次执行={}, 当前时间={}",
                            last.format("%Y-%m-%d %H:%M:%S UTC"),
                            next_time.format("%Y-%m-%d %H:%M:%S UTC"),
                            now.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                    should_trigger
                }
                None => {
                    warn!(
                        "无法计算下一次执行时间，上次执行时间: {}",
                        last.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    false
                }
            },
            // 从未执行过：只看最近一分钟内是否有触发点
            None => self
                .next_execution_time(now - Duration::minutes(1))
                .is_some_and(|next_time| next_time <= now),
        }
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&self.offset))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }

    /// 检查任务是否已过期（超过预期执行时间太久）
    pub fn is_task_overdue(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        grace_period_minutes: i64,
    ) -> bool {
        self.next_execution_time(since)
            .is_some_and(|expected| now > expected + Duration::minutes(grace_period_minutes))
    }
}

/// cron crate 需要秒字段开头，且周字段 1 表示周日；数字星期统一改写为英文缩写
fn to_cron_crate_format(expr: &CrontabExpression) -> String {
    format!(
        "0 {} {} {} {} {}",
        expr.minute,
        expr.hour,
        expr.day_of_month,
        expr.month_of_year,
        map_day_of_week(&expr.day_of_week)
    )
}

fn map_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(|part| {
            let (base, step) = match part.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (part, None),
            };
            let base = base
                .split('-')
                .map(weekday_name)
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{base}/{step}"),
                None => base,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn weekday_name(token: &str) -> String {
    match token.parse::<usize>() {
        Ok(n) if n < WEEKDAY_NAMES.len() => WEEKDAY_NAMES[n].to_string(),
        _ => token.to_string(),
    }
}
