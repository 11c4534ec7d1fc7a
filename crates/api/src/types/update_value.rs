//! PATCH 语义的三态更新值
//!
//! 字段缺失为 `NoChange`，显式 `null` 为 `Unset`，其他值为 `Set`。
//! 需要配合字段上的 `#[serde(default)]` 使用。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum UpdateValue<T> {
    Set(T),
    Unset,
    #[default]
    NoChange,
}

impl<T> UpdateValue<T> {
    pub fn is_change(&self) -> bool {
        !matches!(self, UpdateValue::NoChange)
    }

    /// `None` 表示不修改，`Some(None)` 表示清空
    pub fn into_patch(self) -> Option<Option<T>> {
        match self {
            UpdateValue::Set(value) => Some(Some(value)),
            UpdateValue::Unset => Some(None),
            UpdateValue::NoChange => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for UpdateValue<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // 只有字段出现时才会调用到这里，所以 None 一定是显式的 null
        match Option::<T>::deserialize(deserializer)? {
            Some(value) => Ok(UpdateValue::Set(value)),
            None => Ok(UpdateValue::Unset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default)]
        related_habit: UpdateValue<i64>,
    }

    #[test]
    fn test_missing_null_and_value() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.related_habit, UpdateValue::NoChange);
        assert!(!missing.related_habit.is_change());

        let null: Patch = serde_json::from_str(r#"{"related_habit": null}"#).unwrap();
        assert_eq!(null.related_habit, UpdateValue::Unset);
        assert_eq!(null.related_habit.into_patch(), Some(None));

        let set: Patch = serde_json::from_str(r#"{"related_habit": 5}"#).unwrap();
        assert_eq!(set.related_habit.into_patch(), Some(Some(5)));
    }
}
