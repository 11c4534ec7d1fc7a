pub mod sqlite_habit_repository;
pub mod sqlite_periodic_task_repository;
pub mod sqlite_schedule_repository;
pub mod sqlite_user_repository;

pub use sqlite_habit_repository::SqliteHabitRepository;
pub use sqlite_periodic_task_repository::SqlitePeriodicTaskRepository;
pub use sqlite_schedule_repository::SqliteCrontabScheduleRepository;
pub use sqlite_user_repository::SqliteUserRepository;
