use chrono::{DateTime, Duration, Utc};

use crate::errors::{ClickerError, Result};

/// CLI 时间参数解析
pub struct TimeParser;

impl TimeParser {
    /// 解析时间点，支持多种格式：
    /// - `now`
    /// - RFC3339 格式：2023-10-01T12:00:00Z
    /// - Unix 时间戳（秒）：1696161600
    /// - 相对过去的时间：1h, 2d, 1h30m（表示 now 之前）
    pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
        Self::parse_timestamp_at(input, Utc::now())
    }

    /// 同 `parse_timestamp`，以给定时间作为 now
    pub fn parse_timestamp_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let input = input.trim();

        if input.eq_ignore_ascii_case("now") {
            return Ok(now);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(secs) = input.parse::<i64>() {
            return DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                ClickerError::validation(format!("Unix 时间戳超出范围: '{}'", input))
            });
        }

        let ago = Self::parse_duration(input)?;
        now.checked_sub_signed(ago)
            .ok_or_else(|| ClickerError::validation(format!("时间超出有效范围: '{}'", input)))
    }

    /// 解析持续时间：1d, 2w, 1h30m, 45s
    pub fn parse_duration(input: &str) -> Result<Duration> {
        let mut total = Duration::zero();
        let mut remaining = input.trim();

        if remaining.is_empty() {
            return Err(ClickerError::validation("时间不能为空"));
        }

        while !remaining.is_empty() {
            // 提取数字
            let digits = remaining
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(remaining.len());
            if digits == 0 {
                return Err(ClickerError::validation(format!(
                    "无效的时间格式: '{}'",
                    input
                )));
            }
            let num: i64 = remaining[..digits].parse().map_err(|_| {
                ClickerError::validation(format!("无效的数字: '{}'", &remaining[..digits]))
            })?;
            remaining = &remaining[digits..];

            // 提取单位
            let unit_len = remaining
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(remaining.len());
            if unit_len == 0 {
                return Err(ClickerError::validation(format!(
                    "缺少时间单位，数字 '{}' 后应跟时间单位",
                    num
                )));
            }
            let unit = &remaining[..unit_len];
            remaining = &remaining[unit_len..];

            let duration = match unit.to_lowercase().as_str() {
                "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
                "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
                "h" | "hour" | "hours" => Duration::try_hours(num),
                "d" | "day" | "days" => Duration::try_days(num),
                "w" | "week" | "weeks" => Duration::try_weeks(num),
                _ => {
                    return Err(ClickerError::validation(format!(
                        "不支持的时间单位: '{}'",
                        unit
                    )));
                }
            }
            .ok_or_else(|| ClickerError::validation(format!("时间间隔过大: '{}'", input)))?;

            total += duration;
        }

        if total == Duration::zero() {
            return Err(ClickerError::validation("时间间隔不能为零"));
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_now_and_unix() {
        assert_eq!(TimeParser::parse_timestamp_at("now", now()).unwrap(), now());
        assert_eq!(
            TimeParser::parse_timestamp_at("1700000060", now()).unwrap(),
            DateTime::from_timestamp(1_700_000_060, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rfc3339() {
        let result = TimeParser::parse_timestamp_at("2023-10-01T12:00:00Z", now()).unwrap();
        assert_eq!(result.timestamp(), 1_696_161_600);

        let result = TimeParser::parse_timestamp_at("2023-10-01T14:00:00+02:00", now()).unwrap();
        assert_eq!(result.timestamp(), 1_696_161_600);
    }

    #[test]
    fn test_parse_relative_is_in_the_past() {
        let result = TimeParser::parse_timestamp_at("1h30m", now()).unwrap();
        assert_eq!((now() - result).num_seconds(), 5400);

        let result = TimeParser::parse_timestamp_at("2d", now()).unwrap();
        assert_eq!((now() - result).num_days(), 2);
    }

    #[test]
    fn test_invalid_inputs() {
        for input in ["", "abc", "1x", "h1", "0s", "12h3"] {
            assert!(
                TimeParser::parse_timestamp_at(input, now()).is_err(),
                "expected error for '{}'",
                input
            );
        }
    }
}
