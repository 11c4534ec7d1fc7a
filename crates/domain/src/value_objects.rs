use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use habits_core::HabitError;

/// 每天 09:00
pub const DAILY_CRONTAB: &str = "0 9 * * *";
/// 每周一 09:00
pub const WEEKLY_CRONTAB: &str = "0 9 * * 1";
/// 每月1日 09:00
pub const MONTHLY_CRONTAB: &str = "0 9 1 * *";

/// 标准五字段 crontab：分 时 日 月 周
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrontabExpression {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
}

impl CrontabExpression {
    /// 根据习惯周期推导提醒计划，未知周期按每天处理
    pub fn for_period(period: i32) -> Self {
        match period {
            7 => Self::fixed("0", "9", "*", "*", "1"),
            30 => Self::fixed("0", "9", "1", "*", "*"),
            // 1 和其他值
            _ => Self::fixed("0", "9", "*", "*", "*"),
        }
    }

    fn fixed(
        minute: &str,
        hour: &str,
        day_of_month: &str,
        month_of_year: &str,
        day_of_week: &str,
    ) -> Self {
        Self {
            minute: minute.to_string(),
            hour: hour.to_string(),
            day_of_month: day_of_month.to_string(),
            month_of_year: month_of_year.to_string(),
            day_of_week: day_of_week.to_string(),
        }
    }

    fn from_fields(fields: &[&str]) -> Result<Self, HabitError> {
        match fields {
            [minute, hour, day_of_month, month_of_year, day_of_week] => Ok(Self::fixed(
                minute,
                hour,
                day_of_month,
                month_of_year,
                day_of_week,
            )),
            _ => Err(HabitError::InvalidCron {
                expr: fields.join(" "),
                message: format!("需要5个字段，实际为{}个", fields.len()),
            }),
        }
    }
}

impl FromStr for CrontabExpression {
    type Err = HabitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        Self::from_fields(&fields)
    }
}

impl fmt::Display for CrontabExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month_of_year, self.day_of_week
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crontab_for_known_periods() {
        assert_eq!(CrontabExpression::for_period(1).to_string(), DAILY_CRONTAB);
        assert_eq!(CrontabExpression::for_period(7).to_string(), WEEKLY_CRONTAB);
        assert_eq!(CrontabExpression::for_period(30).to_string(), MONTHLY_CRONTAB);
    }

    #[test]
    fn test_crontab_for_unknown_period_falls_back_to_daily() {
        for period in [0, 2, 14, 31, 365, -1] {
            assert_eq!(CrontabExpression::for_period(period).to_string(), DAILY_CRONTAB);
        }
    }

    #[test]
    fn test_weekly_fields() {
        let expr = CrontabExpression::for_period(7);
        assert_eq!(expr.minute, "0");
        assert_eq!(expr.hour, "9");
        assert_eq!(expr.day_of_month, "*");
        assert_eq!(expr.month_of_year, "*");
        assert_eq!(expr.day_of_week, "1");
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!("0 9 * *".parse::<CrontabExpression>().is_err());
        assert!("0 0 9 * * *".parse::<CrontabExpression>().is_err());
        let parsed: CrontabExpression = "30  8 * * 1-5".parse().unwrap();
        assert_eq!(parsed.to_string(), "30 8 * * 1-5");
    }
}
