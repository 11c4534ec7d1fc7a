use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// 接收提醒的 Telegram 聊天ID，为空时不安排提醒
    pub chat_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn notification_channel(&self) -> Option<&str> {
        self.chat_id
            .as_deref()
            .map(str::trim)
            .filter(|chat_id| !chat_id.is_empty())
    }

    pub fn has_notification_channel(&self) -> bool {
        self.notification_channel().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: i64,
    pub owner_id: i64,
    pub place: String,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit: Option<i64>,
    /// 周期（天）：1、7、30，其他值按每天处理
    pub period: i32,
    pub reward: String,
    pub time_success: i32,
    pub max_time_processing: i32,
    pub is_public: bool,
    /// 由 period 推导出的 crontab，只对有用习惯写入
    pub frequency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn has_reward(&self) -> bool {
        !self.reward.trim().is_empty()
    }

    pub fn is_visible_to(&self, user_id: i64) -> bool {
        self.owner_id == user_id || self.is_public
    }

    pub fn to_draft(&self) -> HabitDraft {
        HabitDraft {
            place: self.place.clone(),
            action: self.action.clone(),
            is_pleasant: self.is_pleasant,
            related_habit: self.related_habit,
            period: self.period,
            reward: self.reward.clone(),
            time_success: self.time_success,
            max_time_processing: self.max_time_processing,
            is_public: self.is_public,
        }
    }

    pub fn entity_description(&self) -> String {
        format!("习惯 '{}' (ID: {}, 用户: {})", self.action, self.id, self.owner_id)
    }
}

/// 习惯的全部可写字段，创建时直接提交，更新时由补丁合并得到
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitDraft {
    pub place: String,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit: Option<i64>,
    pub period: i32,
    pub reward: String,
    pub time_success: i32,
    pub max_time_processing: i32,
    pub is_public: bool,
}

impl HabitDraft {
    pub fn has_reward(&self) -> bool {
        !self.reward.trim().is_empty()
    }

    pub fn has_related(&self) -> bool {
        self.related_habit.is_some()
    }
}

/// 部分更新；`related_habit` 为 `Some(None)` 表示显式清空
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitPatch {
    pub place: Option<String>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    pub related_habit: Option<Option<i64>>,
    pub period: Option<i32>,
    pub reward: Option<String>,
    pub time_success: Option<i32>,
    pub max_time_processing: Option<i32>,
    pub is_public: Option<bool>,
}

impl HabitPatch {
    pub fn apply_to(self, mut draft: HabitDraft) -> HabitDraft {
        if let Some(place) = self.place {
            draft.place = place;
        }
        if let Some(action) = self.action {
            draft.action = action;
        }
        if let Some(is_pleasant) = self.is_pleasant {
            draft.is_pleasant = is_pleasant;
        }
        if let Some(related_habit) = self.related_habit {
            draft.related_habit = related_habit;
        }
        if let Some(period) = self.period {
            draft.period = period;
        }
        if let Some(reward) = self.reward {
            draft.reward = reward;
        }
        if let Some(time_success) = self.time_success {
            draft.time_success = time_success;
        }
        if let Some(max_time_processing) = self.max_time_processing {
            draft.max_time_processing = max_time_processing;
        }
        if let Some(is_public) = self.is_public {
            draft.is_public = is_public;
        }
        draft
    }
}

/// 公开习惯列表只暴露的字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicHabitView {
    pub action: String,
    pub is_pleasant: bool,
    pub time_success: i32,
}

impl From<&Habit> for PublicHabitView {
    fn from(habit: &Habit) -> Self {
        Self {
            action: habit.action.clone(),
            is_pleasant: habit.is_pleasant,
            time_success: habit.time_success,
        }
    }
}

/// 按五个字段去重的 crontab 计划，可被多个习惯共享
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrontabSchedule {
    pub id: i64,
    pub minute: String,
    pub hour: String,
    pub day_of_week: String,
    pub day_of_month: String,
    pub month_of_year: String,
}

impl CrontabSchedule {
    pub fn expression(&self) -> crate::value_objects::CrontabExpression {
        crate::value_objects::CrontabExpression {
            minute: self.minute.clone(),
            hour: self.hour.clone(),
            day_of_month: self.day_of_month.clone(),
            month_of_year: self.month_of_year.clone(),
            day_of_week: self.day_of_week.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodicTask {
    pub id: i64,
    pub name: String,
    pub task: String,
    /// JSON 数组形式的参数，例如 `[42]`
    pub args: String,
    pub description: String,
    pub crontab_id: i64,
    pub habit_id: i64,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_run_count: i64,
    pub created_at: DateTime<Utc>,
}

impl PeriodicTask {
    /// 解析参数中的习惯ID
    pub fn habit_id_from_args(&self) -> Option<i64> {
        serde_json::from_str::<Vec<i64>>(&self.args)
            .ok()
            .and_then(|args| args.first().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPeriodicTask {
    pub name: String,
    pub task: String,
    pub args: String,
    pub description: String,
    pub crontab_id: i64,
    pub habit_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_habit() -> Habit {
        let now = Utc::now();
        Habit {
            id: 1,
            owner_id: 10,
            place: "Дом".to_string(),
            action: "Читать книгу".to_string(),
            is_pleasant: false,
            related_habit: None,
            period: 1,
            reward: "Чашка чая".to_string(),
            time_success: 90,
            max_time_processing: 100,
            is_public: false,
            frequency: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let habit = sample_habit();
        let patch = HabitPatch {
            place: Some("Обновленное место".to_string()),
            reward: Some("Обновленное вознаграждение".to_string()),
            ..HabitPatch::default()
        };
        let draft = patch.apply_to(habit.to_draft());

        assert_eq!(draft.place, "Обновленное место");
        assert_eq!(draft.reward, "Обновленное вознаграждение");
        assert_eq!(draft.action, habit.action);
        assert_eq!(draft.period, habit.period);
    }

    #[test]
    fn test_patch_can_clear_related_habit() {
        let mut habit = sample_habit();
        habit.related_habit = Some(5);
        habit.reward.clear();

        let untouched = HabitPatch::default().apply_to(habit.to_draft());
        assert_eq!(untouched.related_habit, Some(5));

        let cleared = HabitPatch {
            related_habit: Some(None),
            ..HabitPatch::default()
        }
        .apply_to(habit.to_draft());
        assert_eq!(cleared.related_habit, None);
    }

    #[test]
    fn test_visibility_and_channel() {
        let mut habit = sample_habit();
        assert!(habit.is_visible_to(10));
        assert!(!habit.is_visible_to(11));
        habit.is_public = true;
        assert!(habit.is_visible_to(11));

        let mut user = User {
            id: 10,
            email: "user@user.ru".to_string(),
            chat_id: Some("   ".to_string()),
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(!user.has_notification_channel());
        user.chat_id = Some("123456".to_string());
        assert_eq!(user.notification_channel(), Some("123456"));
    }

    #[test]
    fn test_periodic_task_args_parsing() {
        let task = PeriodicTask {
            id: 1,
            name: "Напоминание о привычке 42 - Гулять".to_string(),
            task: "habits.tasks.send_habit_reminder".to_string(),
            args: "[42]".to_string(),
            description: String::new(),
            crontab_id: 1,
            habit_id: 42,
            enabled: true,
            last_run_at: None,
            total_run_count: 0,
            created_at: Utc::now(),
        };
        assert_eq!(task.habit_id_from_args(), Some(42));
    }
}
