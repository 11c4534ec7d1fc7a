//! 提醒消息与发送通道

use std::time::Duration;

use async_trait::async_trait;
use habits_core::{HabitError, HabitResult, TelegramConfig};
use habits_domain::entities::Habit;
use serde::Deserialize;
use tracing::{debug, instrument};

/// 提醒发送通道
#[async_trait]
pub trait ReminderSender: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> HabitResult<()>;
}

/// 根据习惯生成提醒文本
pub fn reminder_text(habit: &Habit, related: Option<&Habit>) -> String {
    let mut text = format!(
        "Напоминание: {} в {}.\nНа выполнение у вас {} секунд.",
        habit.action, habit.place, habit.time_success
    );

    if habit.has_reward() {
        text.push_str(&format!("\nВознаграждение: {}", habit.reward.trim()));
    } else if let Some(related) = related {
        text.push_str(&format!("\nПосле этого можно: {}", related.action));
    }
    text
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// 通过 Telegram Bot API `sendMessage` 发送提醒
pub struct TelegramReminderSender {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
}

impl TelegramReminderSender {
    pub fn new(config: &TelegramConfig) -> HabitResult<Self> {
        let bot_token = config
            .bot_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| HabitError::config_error("telegram.bot_token 未配置"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| HabitError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }
}

#[async_trait]
impl ReminderSender for TelegramReminderSender {
    #[instrument(skip(self, text))]
    async fn send(&self, chat_id: &str, text: &str) -> HabitResult<()> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| HabitError::Notification(format!("请求Telegram失败: {e}")))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| HabitError::Notification(format!("解析Telegram响应失败 ({status}): {e}")))?;

        if !status.is_success() || !body.ok {
            return Err(HabitError::Notification(format!(
                "Telegram拒绝发送 ({status}): {}",
                body.description.unwrap_or_default()
            )));
        }

        debug!("提醒已发送到聊天 {}", chat_id);
        Ok(())
    }
}
