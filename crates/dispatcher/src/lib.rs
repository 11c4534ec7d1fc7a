pub mod beat;
pub mod cron_utils;
pub mod reminder;

pub use beat::{ReminderBeat, TickReport};
pub use cron_utils::CronScheduler;
pub use reminder::{reminder_text, ReminderSender, TelegramReminderSender};
