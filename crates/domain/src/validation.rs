//! 习惯业务规则校验
//!
//! 规则按固定顺序检查，所有违反项按该顺序返回，第一项即主错误。

use habits_core::{HabitError, HabitResult, RuleViolation};

use crate::entities::{Habit, HabitDraft};

/// 执行时长上限（秒）
pub const MAX_TIME_SUCCESS_SECONDS: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HabitRule {
    TimeLimitExceeded,
    RelatedMustBePleasant,
    RewardAndRelatedExclusive,
    PleasantWithReward,
    PleasantWithRelated,
    UsefulWithoutReward,
}

impl HabitRule {
    /// 校验顺序
    pub const ORDER: [HabitRule; 6] = [
        HabitRule::TimeLimitExceeded,
        HabitRule::RelatedMustBePleasant,
        HabitRule::RewardAndRelatedExclusive,
        HabitRule::PleasantWithReward,
        HabitRule::PleasantWithRelated,
        HabitRule::UsefulWithoutReward,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            HabitRule::TimeLimitExceeded => "time_limit_exceeded",
            HabitRule::RelatedMustBePleasant => "related_must_be_pleasant",
            HabitRule::RewardAndRelatedExclusive => "reward_and_related_exclusive",
            HabitRule::PleasantWithReward => "pleasant_with_reward",
            HabitRule::PleasantWithRelated => "pleasant_with_related",
            HabitRule::UsefulWithoutReward => "useful_without_reward",
        }
    }

    /// 面向用户的原文提示，客户端依赖其精确内容
    pub fn message(&self) -> &'static str {
        match self {
            HabitRule::TimeLimitExceeded => "Время выполнения не должно превышать 120 секунд",
            HabitRule::RelatedMustBePleasant => {
                "В качестве связанной привычки можно выбрать только приятную привычку"
            }
            HabitRule::RewardAndRelatedExclusive => {
                "Нельзя одновременно выбирать и связанную привычку и вознаграждение"
            }
            HabitRule::PleasantWithReward => "Приятная привычка не может иметь вознаграждения",
            HabitRule::PleasantWithRelated => {
                "Приятная привычка не может быть связана с другой привычкой"
            }
            HabitRule::UsefulWithoutReward => {
                "Полезная привычка должна иметь либо вознаграждение, либо связанную привычку"
            }
        }
    }

    fn is_violated(&self, candidate: &HabitDraft, related: Option<&Habit>) -> bool {
        match self {
            HabitRule::TimeLimitExceeded => candidate.time_success > MAX_TIME_SUCCESS_SECONDS,
            // 找不到被引用的习惯同样视为"不是愉快习惯"
            HabitRule::RelatedMustBePleasant => {
                candidate.has_related() && !related.is_some_and(|habit| habit.is_pleasant)
            }
            HabitRule::RewardAndRelatedExclusive => {
                candidate.has_reward() && candidate.has_related()
            }
            HabitRule::PleasantWithReward => candidate.is_pleasant && candidate.has_reward(),
            HabitRule::PleasantWithRelated => candidate.is_pleasant && candidate.has_related(),
            HabitRule::UsefulWithoutReward => {
                !candidate.is_pleasant && !candidate.has_reward() && !candidate.has_related()
            }
        }
    }
}

impl From<HabitRule> for RuleViolation {
    fn from(rule: HabitRule) -> Self {
        RuleViolation::new(rule.code(), rule.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<HabitRule>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn violations(&self) -> &[HabitRule] {
        match self {
            ValidationOutcome::Valid => &[],
            ValidationOutcome::Invalid(rules) => rules,
        }
    }

    pub fn first(&self) -> Option<HabitRule> {
        self.violations().first().copied()
    }

    pub fn into_result(self) -> HabitResult<()> {
        match self {
            ValidationOutcome::Valid => Ok(()),
            ValidationOutcome::Invalid(rules) => Err(HabitError::validation(
                rules.into_iter().map(RuleViolation::from).collect(),
            )),
        }
    }
}

pub struct HabitValidator;

impl HabitValidator {
    /// 校验候选习惯
    ///
    /// `related` 是 `candidate.related_habit` 解析出的习惯；引用不存在时传 `None`。
    pub fn validate(candidate: &HabitDraft, related: Option<&Habit>) -> ValidationOutcome {
        let violated: Vec<HabitRule> = HabitRule::ORDER
            .iter()
            .copied()
            .filter(|rule| rule.is_violated(candidate, related))
            .collect();

        if violated.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(violated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn useful_with_reward() -> HabitDraft {
        HabitDraft {
            place: "Работа".to_string(),
            action: "Работать".to_string(),
            is_pleasant: false,
            related_habit: None,
            period: 1,
            reward: "Кофе".to_string(),
            time_success: 90,
            max_time_processing: 100,
            is_public: true,
        }
    }

    fn stored(id: i64, is_pleasant: bool) -> Habit {
        let now = Utc::now();
        Habit {
            id,
            owner_id: 1,
            place: "Диван".to_string(),
            action: "Слушать музыку".to_string(),
            is_pleasant,
            related_habit: None,
            period: 1,
            reward: if is_pleasant { String::new() } else { "Чай".to_string() },
            time_success: 30,
            max_time_processing: 50,
            is_public: false,
            frequency: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_useful_habit_with_reward_is_valid() {
        assert!(HabitValidator::validate(&useful_with_reward(), None).is_valid());
    }

    #[test]
    fn test_useful_habit_with_pleasant_related_is_valid() {
        let mut draft = useful_with_reward();
        draft.reward.clear();
        draft.related_habit = Some(4);
        let related = stored(4, true);
        assert!(HabitValidator::validate(&draft, Some(&related)).is_valid());
    }

    #[test]
    fn test_pleasant_habit_alone_is_valid() {
        let mut draft = useful_with_reward();
        draft.is_pleasant = true;
        draft.reward.clear();
        assert!(HabitValidator::validate(&draft, None).is_valid());
    }

    #[test]
    fn test_time_limit_is_reported_first_regardless_of_other_fields() {
        let mut draft = useful_with_reward();
        draft.time_success = 121;
        draft.is_pleasant = true;
        draft.related_habit = Some(9);

        let outcome = HabitValidator::validate(&draft, None);
        assert_eq!(outcome.first(), Some(HabitRule::TimeLimitExceeded));
        assert_eq!(
            outcome.violations(),
            &[
                HabitRule::TimeLimitExceeded,
                HabitRule::RelatedMustBePleasant,
                HabitRule::RewardAndRelatedExclusive,
                HabitRule::PleasantWithReward,
                HabitRule::PleasantWithRelated,
            ]
        );
    }

    #[test]
    fn test_time_limit_boundary() {
        let mut draft = useful_with_reward();
        draft.time_success = MAX_TIME_SUCCESS_SECONDS;
        assert!(HabitValidator::validate(&draft, None).is_valid());
    }

    #[test]
    fn test_related_must_be_pleasant() {
        let mut draft = useful_with_reward();
        draft.reward.clear();
        draft.related_habit = Some(2);
        let related = stored(2, false);

        let outcome = HabitValidator::validate(&draft, Some(&related));
        assert_eq!(outcome.violations(), &[HabitRule::RelatedMustBePleasant]);
    }

    #[test]
    fn test_missing_related_counts_as_not_pleasant() {
        let mut draft = useful_with_reward();
        draft.reward.clear();
        draft.related_habit = Some(404);

        let outcome = HabitValidator::validate(&draft, None);
        assert_eq!(outcome.first(), Some(HabitRule::RelatedMustBePleasant));
    }

    #[test]
    fn test_reward_and_related_exclusive_even_for_pleasant() {
        let mut draft = useful_with_reward();
        draft.is_pleasant = true;
        draft.related_habit = Some(3);
        let related = stored(3, true);

        let outcome = HabitValidator::validate(&draft, Some(&related));
        assert_eq!(outcome.first(), Some(HabitRule::RewardAndRelatedExclusive));
    }

    #[test]
    fn test_pleasant_with_reward() {
        let mut draft = useful_with_reward();
        draft.is_pleasant = true;

        let outcome = HabitValidator::validate(&draft, None);
        assert_eq!(outcome.violations(), &[HabitRule::PleasantWithReward]);
    }

    #[test]
    fn test_pleasant_with_related() {
        let mut draft = useful_with_reward();
        draft.is_pleasant = true;
        draft.reward.clear();
        draft.related_habit = Some(3);
        let related = stored(3, true);

        let outcome = HabitValidator::validate(&draft, Some(&related));
        assert_eq!(outcome.violations(), &[HabitRule::PleasantWithRelated]);
    }

    #[test]
    fn test_useful_without_reward_or_related() {
        let mut draft = useful_with_reward();
        draft.reward = "   ".to_string();

        let outcome = HabitValidator::validate(&draft, None);
        assert_eq!(outcome.violations(), &[HabitRule::UsefulWithoutReward]);
    }

    #[test]
    fn test_into_result_carries_literal_messages_in_order() {
        let mut draft = useful_with_reward();
        draft.time_success = 150;
        draft.reward.clear();

        let err = HabitValidator::validate(&draft, None).into_result().unwrap_err();
        match err {
            HabitError::Validation(violations) => {
                assert_eq!(violations.len(), 2);
                assert_eq!(
                    violations[0].message,
                    "Время выполнения не должно превышать 120 секунд"
                );
                assert_eq!(violations[1].rule, "useful_without_reward");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
