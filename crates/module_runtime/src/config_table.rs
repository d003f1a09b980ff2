//! ConfigTable - 显式的 key → typed setter 表
//!
//! 远程配置只能通过表中列出的键修改目标结构体。更新先在副本上暂存，
//! 调用方拿到完整的新值后再整体替换，读者永远看不到半更新状态。
//!
//! 每个 setter 先校验再写入：返回 `Err` 时目标保持不变，只有该键被拒绝。

use std::collections::BTreeMap;

use contracts::{ConfigMessage, MergeReport};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 单个键的 setter
pub type Setter<T> = fn(&mut T, &Value) -> Result<(), String>;

/// 键表
pub struct ConfigTable<T> {
    setters: BTreeMap<&'static str, Setter<T>>,
}

impl<T> Default for ConfigTable<T> {
    fn default() -> Self {
        Self {
            setters: BTreeMap::new(),
        }
    }
}

impl<T: Clone> ConfigTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个键
    pub fn with(mut self, key: &'static str, setter: Setter<T>) -> Self {
        self.setters.insert(key, setter);
        self
    }

    /// 所有已注册的键 (有序)
    pub fn keys(&self) -> Vec<&'static str> {
        self.setters.keys().copied().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.setters.contains_key(key)
    }

    /// 在 `current` 的副本上应用 `update`
    ///
    /// 返回暂存后的新值以及逐键的结果。未知键与被拒绝的键不影响其他键。
    pub fn stage(&self, current: &T, update: &ConfigMessage) -> (T, MergeReport) {
        let mut staged = current.clone();
        let mut report = MergeReport::default();

        for (key, value) in update {
            match self.setters.get(key.as_str()) {
                Some(setter) => match setter(&mut staged, value) {
                    Ok(()) => report.applied(key.clone()),
                    Err(reason) => report.rejected(key.clone(), reason),
                },
                None => report.unknown(key.clone()),
            }
        }

        (staged, report)
    }
}

/// 解析整数并检查闭区间
pub fn int_in_range(value: &Value, min: i64, max: i64) -> Result<i64, String> {
    let n = value
        .as_i64()
        .ok_or_else(|| format!("expected integer in {min}..={max}, got {value}"))?;
    if (min..=max).contains(&n) {
        Ok(n)
    } else {
        Err(format!("expected integer in {min}..={max}, got {n}"))
    }
}

/// 解析浮点数并检查闭区间
pub fn float_in_range(value: &Value, min: f64, max: f64) -> Result<f64, String> {
    let n = value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("expected number in {min}..={max}, got {value}"))?;
    if (min..=max).contains(&n) {
        Ok(n)
    } else {
        Err(format!("expected number in {min}..={max}, got {n}"))
    }
}

/// 解析布尔值
pub fn boolean(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected boolean, got {value}"))
}

/// 通过 serde 解析 (枚举、元组等)
pub fn parse<V: DeserializeOwned>(value: &Value) -> Result<V, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid value {value}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Target {
        rate: u32,
        enabled: bool,
    }

    fn table() -> ConfigTable<Target> {
        ConfigTable::<Target>::new()
            .with("rate", |t, v| {
                t.rate = int_in_range(v, 1, 240)? as u32;
                Ok(())
            })
            .with("enabled", |t, v| {
                t.enabled = boolean(v)?;
                Ok(())
            })
    }

    fn update(pairs: &[(&str, Value)]) -> ConfigMessage {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_stage_applies_valid_keys() {
        let current = Target::default();
        let (staged, report) = table().stage(
            &current,
            &update(&[("rate", json!(15)), ("enabled", json!(true))]),
        );

        assert_eq!(staged, Target { rate: 15, enabled: true });
        assert_eq!(report.applied.len(), 2);
        assert_eq!(current, Target::default());
    }

    #[test]
    fn test_stage_rejects_only_bad_key() {
        let current = Target {
            rate: 30,
            enabled: false,
        };
        let (staged, report) = table().stage(
            &current,
            &update(&[("rate", json!(-5)), ("enabled", json!(true)), ("colour", json!("red"))]),
        );

        assert_eq!(staged.rate, 30);
        assert!(staged.enabled);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].key, "rate");
        assert_eq!(report.unknown, vec!["colour".to_string()]);
    }

    #[test]
    fn test_value_helpers() {
        assert!(int_in_range(&json!("30"), 1, 240).is_err());
        assert!(int_in_range(&json!(2.5), 1, 240).is_err());
        assert_eq!(int_in_range(&json!(240), 1, 240), Ok(240));
        assert!(float_in_range(&json!(16.5), 0.0, 16.0).is_err());
        assert_eq!(float_in_range(&json!(2), 0.0, 16.0), Ok(2.0));
        assert_eq!(parse::<[u32; 2]>(&json!([640, 480])), Ok([640, 480]));
        assert_eq!(table().keys(), vec!["enabled", "rate"]);
    }
}
