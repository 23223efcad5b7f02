// ==========================================
// UPH 引擎 - 时长归一化
// ==========================================
// 职责: 将异构时长编码（整数秒 / H:MM:SS）解析为规范整数秒
// 规则: 空值、不可解析、超出 [下限, 上限] 一律拒绝（InvalidDuration），不截断
// ==========================================

use crate::config::engine_config::{DEFAULT_MAX_DURATION_SECS, DEFAULT_MIN_DURATION_SECS};
use crate::engine::error::{EngineError, EngineResult};

/// 时长归一化器
#[derive(Debug, Clone, Copy)]
pub struct DurationNormalizer {
    min_secs: i64,
    max_secs: i64,
}

impl Default for DurationNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DURATION_SECS, DEFAULT_MAX_DURATION_SECS)
    }
}

impl DurationNormalizer {
    pub fn new(min_secs: i64, max_secs: i64) -> Self {
        Self { min_secs, max_secs }
    }

    /// 归一化并校验区间
    pub fn normalize(&self, raw: &str) -> EngineResult<i64> {
        let secs = parse_duration_secs(raw)?;
        self.check_bounds(raw, secs)
    }

    /// 归一化拆分碎片时长
    ///
    /// 导出拆分产生的碎片可能恰好为 0 秒（只携带数量），此处放行 0；
    /// 其余值仍按区间校验。
    pub fn normalize_fragment(&self, raw: &str) -> EngineResult<i64> {
        let secs = parse_duration_secs(raw)?;
        if secs == 0 {
            return Ok(0);
        }
        self.check_bounds(raw, secs)
    }

    /// 校验已解析的秒数（合并后的总时长也走这里）
    pub fn check_bounds(&self, raw: &str, secs: i64) -> EngineResult<i64> {
        if secs < self.min_secs || secs > self.max_secs {
            return Err(EngineError::InvalidDuration {
                raw: raw.to_string(),
                reason: format!("超出区间 [{}, {}] 秒: {}", self.min_secs, self.max_secs, secs),
            });
        }
        Ok(secs)
    }
}

/// 解析时长为秒（不做区间校验，拒绝负数）
///
/// 支持:
/// - 整数秒: "600"
/// - 带小数秒: "600.4"（四舍五入）
/// - H:MM:SS: "0:10:00"、"12:05:09"（分秒须 < 60）
pub fn parse_duration_secs(raw: &str) -> EngineResult<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid(raw, "空值"));
    }

    if value.contains(':') {
        return parse_hms(value).ok_or_else(|| invalid(raw, "H:MM:SS 格式错误"));
    }

    let secs: f64 = value
        .parse()
        .map_err(|_| invalid(raw, "无法解析为秒数"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(raw, "秒数为负或非有限值"));
    }
    Ok(secs.round() as i64)
}

/// 解析 H:MM:SS（小时不限位数）
pub fn parse_hms(value: &str) -> Option<i64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let field = |s: &str| -> Option<i64> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        s.parse::<i64>().ok()
    };

    let hours = field(parts[0])?;
    let minutes = field(parts[1])?;
    let seconds = field(parts[2])?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

/// 秒数格式化为 H:MM:SS
pub fn seconds_to_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn invalid(raw: &str, reason: &str) -> EngineError {
    EngineError::InvalidDuration {
        raw: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_and_hms() {
        assert_eq!(parse_duration_secs("600").unwrap(), 600);
        assert_eq!(parse_duration_secs(" 600.4 ").unwrap(), 600);
        assert_eq!(parse_duration_secs("0:10:00").unwrap(), 600);
        assert_eq!(parse_duration_secs("12:05:09").unwrap(), 43_509);
        assert_eq!(parse_duration_secs("0:00:00").unwrap(), 0);
    }

    #[test]
    fn test_round_trip_through_hms() {
        let normalizer = DurationNormalizer::default();
        for raw in ["600", "0:10:00", "1:00:01", "23:59:59", "45", "7:30:00"] {
            let secs = normalizer.normalize(raw).unwrap();
            let hms = seconds_to_hms(secs);
            assert_eq!(parse_hms(&hms), Some(secs), "raw={}", raw);
            assert_eq!(normalizer.normalize(&hms).unwrap(), secs, "raw={}", raw);
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let normalizer = DurationNormalizer::default();
        for raw in ["", "   ", "abc", "-5", "-0:10:00", "1:60:00", "1:00", "25:00:00", "90000"] {
            let err = normalizer.normalize(raw).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidDuration { .. }),
                "raw={} err={:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_zero_only_allowed_as_fragment() {
        let normalizer = DurationNormalizer::default();
        assert!(normalizer.normalize("0:00:00").is_err());
        assert_eq!(normalizer.normalize_fragment("0:00:00").unwrap(), 0);
        assert!(normalizer.normalize_fragment("25:00:00").is_err());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let normalizer = DurationNormalizer::default();
        assert_eq!(normalizer.normalize("1").unwrap(), 1);
        assert_eq!(normalizer.normalize("24:00:00").unwrap(), 86_400);
    }
}
