//! TCP/UDP 포트 집합

use std::fmt;

use super::value_set::{MAX_VALUE, ValueSet};
use crate::error::TrafficError;

/// TCP/UDP 포트 집합 (0–65535)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortSet(ValueSet);

impl PortSet {
    /// 빈 포트 집합
    pub fn empty() -> Self {
        Self(ValueSet::empty())
    }

    /// 전체 포트
    pub fn all() -> Self {
        Self(ValueSet::complete())
    }

    /// 단일 포트
    pub fn single(port: u16) -> Self {
        Self(ValueSet::from_value(port))
    }

    /// 닫힌 구간 `[low, high]`
    ///
    /// 규칙 정의에서 읽은 값을 그대로 받아 검증합니다.
    pub fn range(low: i64, high: i64) -> Result<Self, TrafficError> {
        let max = i64::from(MAX_VALUE);
        if low < 0 || high > max || low > high {
            return Err(TrafficError::InvalidPortRange { low, high });
        }
        // 위 검증으로 u16 범위가 보장됨
        let (low, high) = (low as u16, high as u16);
        Ok(Self(ValueSet::from_range(low, high)))
    }

    /// 내부 값 집합
    pub fn values(&self) -> &ValueSet {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.0.is_complete()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(port)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0))
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self(self.0.intersect(&other.0))
    }

    pub fn subtract(&self, other: &Self) -> Self {
        Self(self.0.subtract(&other.0))
    }

    pub fn invert(&self) -> Self {
        Self(self.0.invert())
    }

    /// 연속 구간 목록
    pub fn ranges(&self) -> Vec<(u16, u16)> {
        self.0.ranges()
    }

    /// 표시용 구간 문자열 (`"22"`, `"8000-8080"`, 전체면 `"all"`)
    pub fn describe(&self) -> Vec<String> {
        if self.is_all() {
            return vec!["all".to_owned()];
        }
        self.ranges()
            .into_iter()
            .map(|(low, high)| {
                if low == high {
                    low.to_string()
                } else {
                    format!("{low}-{high}")
                }
            })
            .collect()
    }

    /// [`describe`](Self::describe) 형식의 문자열 목록을 다시 집합으로 읽습니다.
    pub fn parse_ranges<S: AsRef<str>>(items: &[S]) -> Result<Self, TrafficError> {
        let mut set = Self::empty();
        for item in items {
            let item = item.as_ref().trim();
            if item == "all" {
                return Ok(Self::all());
            }
            let part = match item.split_once('-') {
                Some((low, high)) => Self::range(parse_port(low)?, parse_port(high)?)?,
                None => {
                    let port = parse_port(item)?;
                    Self::range(port, port)?
                }
            };
            set = set.union(&part);
        }
        Ok(set)
    }
}

fn parse_port(raw: &str) -> Result<i64, TrafficError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| TrafficError::InvalidPortSpec(raw.to_owned()))
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.describe().join(", "))
    }
}
