//! 请求字段校验，在业务规则之前执行

use habits_core::{HabitError, RuleViolation};
use habits_domain::entities::{HabitDraft, HabitPatch};

const BLANK_MESSAGE: &str = "Это поле не может быть пустым.";
const NEGATIVE_MESSAGE: &str = "Убедитесь, что это значение больше либо равно 0.";
const PERIOD_MESSAGE: &str = "Убедитесь, что это значение больше либо равно 1.";

fn check_not_blank(field: &str, value: &str, errors: &mut Vec<RuleViolation>) {
    if value.trim().is_empty() {
        errors.push(RuleViolation::new(format!("{field}_blank"), BLANK_MESSAGE));
    }
}

fn check_non_negative(field: &str, value: i32, errors: &mut Vec<RuleViolation>) {
    if value < 0 {
        errors.push(RuleViolation::new(format!("{field}_negative"), NEGATIVE_MESSAGE));
    }
}

fn check_period(value: i32, errors: &mut Vec<RuleViolation>) {
    if value < 1 {
        errors.push(RuleViolation::new("period_invalid", PERIOD_MESSAGE));
    }
}

fn into_result(errors: Vec<RuleViolation>) -> Result<(), HabitError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(HabitError::validation(errors))
    }
}

/// 校验创建请求的必填字段
pub fn validate_draft(draft: &HabitDraft) -> Result<(), HabitError> {
    let mut errors = Vec::new();
    check_not_blank("place", &draft.place, &mut errors);
    check_not_blank("action", &draft.action, &mut errors);
    check_period(draft.period, &mut errors);
    check_non_negative("time_success", draft.time_success, &mut errors);
    check_non_negative("max_time_processing", draft.max_time_processing, &mut errors);
    into_result(errors)
}

/// 只校验补丁中出现的字段
pub fn validate_patch(patch: &HabitPatch) -> Result<(), HabitError> {
    let mut errors = Vec::new();
    if let Some(place) = &patch.place {
        check_not_blank("place", place, &mut errors);
    }
    if let Some(action) = &patch.action {
        check_not_blank("action", action, &mut errors);
    }
    if let Some(period) = patch.period {
        check_period(period, &mut errors);
    }
    if let Some(time_success) = patch.time_success {
        check_non_negative("time_success", time_success, &mut errors);
    }
    if let Some(max_time_processing) = patch.max_time_processing {
        check_non_negative("max_time_processing", max_time_processing, &mut errors);
    }
    into_result(errors)
}
