//! 测试用的内存仓储实现

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habits_core::{HabitError, HabitResult};

use crate::entities::{CrontabSchedule, Habit, HabitDraft, NewPeriodicTask, PeriodicTask, User};
use crate::repositories::{
    CrontabScheduleRepository, HabitRepository, PeriodicTaskRepository, UserRepository,
};
use crate::value_objects::CrontabExpression;

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, email: &str, chat_id: Option<&str>) -> HabitResult<User> {
        let mut users = self.users.lock().unwrap();
        let user = User {
            id: users.len() as i64 + 1,
            email: email.to_string(),
            chat_id: chat_id.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> HabitResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> HabitResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_chat_id(&self, id: i64, chat_id: Option<&str>) -> HabitResult<User> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| HabitError::user_not_found(id.to_string()))?;
        user.chat_id = chat_id.map(str::to_string);
        Ok(user.clone())
    }
}

#[derive(Default)]
pub struct InMemoryHabits {
    habits: Mutex<Vec<Habit>>,
    next_id: Mutex<i64>,
}

#[async_trait]
impl HabitRepository for InMemoryHabits {
    async fn create(&self, owner_id: i64, draft: &HabitDraft) -> HabitResult<Habit> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let habit = Habit {
            id: *next_id,
            owner_id,
            place: draft.place.clone(),
            action: draft.action.clone(),
            is_pleasant: draft.is_pleasant,
            related_habit: draft.related_habit,
            period: draft.period,
            reward: draft.reward.clone(),
            time_success: draft.time_success,
            max_time_processing: draft.max_time_processing,
            is_public: draft.is_public,
            frequency: None,
            created_at: now,
            updated_at: now,
        };
        self.habits.lock().unwrap().push(habit.clone());
        Ok(habit)
    }

    async fn find_by_id(&self, id: i64) -> HabitResult<Option<Habit>> {
        Ok(self.habits.lock().unwrap().iter().find(|h| h.id == id).cloned())
    }

    async fn update(&self, id: i64, draft: &HabitDraft) -> HabitResult<Habit> {
        let mut habits = self.habits.lock().unwrap();
        let habit = habits
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| HabitError::habit_not_found(id))?;
        habit.place = draft.place.clone();
        habit.action = draft.action.clone();
        habit.is_pleasant = draft.is_pleasant;
        habit.related_habit = draft.related_habit;
        habit.period = draft.period;
        habit.reward = draft.reward.clone();
        habit.time_success = draft.time_success;
        habit.max_time_processing = draft.max_time_processing;
        habit.is_public = draft.is_public;
        habit.updated_at = Utc::now();
        Ok(habit.clone())
    }

    async fn set_frequency(&self, id: i64, frequency: Option<&str>) -> HabitResult<()> {
        let mut habits = self.habits.lock().unwrap();
        let habit = habits
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| HabitError::habit_not_found(id))?;
        habit.frequency = frequency.map(str::to_string);
        Ok(())
    }

    async fn delete(&self, id: i64) -> HabitResult<bool> {
        let mut habits = self.habits.lock().unwrap();
        let before = habits.len();
        habits.retain(|h| h.id != id);
        Ok(habits.len() != before)
    }

    async fn list_by_owner(&self, owner_id: i64) -> HabitResult<Vec<Habit>> {
        Ok(self
            .habits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_public(&self) -> HabitResult<Vec<Habit>> {
        Ok(self
            .habits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.is_public)
            .cloned()
            .collect())
    }

    async fn count_referencing(&self, id: i64) -> HabitResult<usize> {
        Ok(self
            .habits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.related_habit == Some(id))
            .count())
    }

    async fn health_check(&self) -> HabitResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySchedules {
    schedules: Mutex<Vec<CrontabSchedule>>,
}

impl InMemorySchedules {
    pub fn count(&self) -> usize {
        self.schedules.lock().unwrap().len()
    }
}

#[async_trait]
impl CrontabScheduleRepository for InMemorySchedules {
    async fn get_or_create(&self, expr: &CrontabExpression) -> HabitResult<CrontabSchedule> {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(existing) = schedules.iter().find(|s| s.expression() == *expr) {
            return Ok(existing.clone());
        }
        let schedule = CrontabSchedule {
            id: schedules.len() as i64 + 1,
            minute: expr.minute.clone(),
            hour: expr.hour.clone(),
            day_of_week: expr.day_of_week.clone(),
            day_of_month: expr.day_of_month.clone(),
            month_of_year: expr.month_of_year.clone(),
        };
        schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn find_by_id(&self, id: i64) -> HabitResult<Option<CrontabSchedule>> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTasks {
    tasks: Mutex<Vec<PeriodicTask>>,
    next_id: Mutex<i64>,
    /// 置位后所有写操作失败，用于模拟存储故障
    pub fail_writes: Mutex<bool>,
}

impl InMemoryTasks {
    pub fn all(&self) -> Vec<PeriodicTask> {
        self.tasks.lock().unwrap().clone()
    }

    fn check_writable(&self) -> HabitResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(HabitError::DatabaseOperation("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PeriodicTaskRepository for InMemoryTasks {
    async fn create(&self, task: &NewPeriodicTask) -> HabitResult<PeriodicTask> {
        self.check_writable()?;
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let created = PeriodicTask {
            id: *next_id,
            name: task.name.clone(),
            task: task.task.clone(),
            args: task.args.clone(),
            description: task.description.clone(),
            crontab_id: task.crontab_id,
            habit_id: task.habit_id,
            enabled: true,
            last_run_at: None,
            total_run_count: 0,
            created_at: Utc::now(),
        };
        self.tasks.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_for_habit(&self, habit_id: i64) -> HabitResult<u64> {
        self.check_writable()?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.habit_id != habit_id);
        Ok((before - tasks.len()) as u64)
    }

    async fn find_for_habit(&self, habit_id: i64) -> HabitResult<Vec<PeriodicTask>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.habit_id == habit_id)
            .cloned()
            .collect())
    }

    async fn list_enabled(&self) -> HabitResult<Vec<PeriodicTask>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.enabled)
            .cloned()
            .collect())
    }

    async fn record_run(&self, id: i64, ran_at: DateTime<Utc>) -> HabitResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.last_run_at = Some(ran_at);
            task.total_run_count += 1;
        }
        Ok(())
    }
}
