//! ICMP type/code 집합
//!
//! `(type, code)` 쌍을 `type << 8 | code` 로 인코딩하여 [`ValueSet`]의
//! 16비트 공간에 담습니다. ICMP 버전은 이름 표시용이며 집합 연산에는
//! 영향을 주지 않습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value_set::ValueSet;
use crate::error::TrafficError;

/// ICMP 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcmpVersion {
    V4,
    V6,
}

/// `(type, code)` → 16비트 값
pub fn encode(icmp_type: u8, code: u8) -> u16 {
    (u16::from(icmp_type) << 8) | u16::from(code)
}

/// 16비트 값 → `(type, code)`
pub fn decode(value: u16) -> (u8, u8) {
    ((value >> 8) as u8, (value & 0xff) as u8)
}

/// ICMP type/code 집합
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpSet {
    version: IcmpVersion,
    values: ValueSet,
}

impl IcmpSet {
    pub fn empty(version: IcmpVersion) -> Self {
        Self {
            version,
            values: ValueSet::empty(),
        }
    }

    pub fn all(version: IcmpVersion) -> Self {
        Self {
            version,
            values: ValueSet::complete(),
        }
    }

    /// 단일 type/code
    pub fn type_code(version: IcmpVersion, icmp_type: u8, code: u8) -> Self {
        Self {
            version,
            values: ValueSet::from_value(encode(icmp_type, code)),
        }
    }

    /// 한 type 의 모든 code
    pub fn all_codes(version: IcmpVersion, icmp_type: u8) -> Self {
        Self {
            version,
            values: ValueSet::from_range(encode(icmp_type, 0), encode(icmp_type, u8::MAX)),
        }
    }

    /// 규칙 정의 값에서 생성합니다. `-1` 은 "전체"를 뜻합니다.
    ///
    /// type 이 -1 이면 code 와 무관하게 전체 집합입니다.
    pub fn from_rule(version: IcmpVersion, icmp_type: i64, code: i64) -> Result<Self, TrafficError> {
        if icmp_type == -1 {
            return Ok(Self::all(version));
        }
        let icmp_type = validate_octet("type", icmp_type)?;
        if code == -1 {
            return Ok(Self::all_codes(version, icmp_type));
        }
        let code = validate_octet("code", code)?;
        Ok(Self::type_code(version, icmp_type, code))
    }

    pub fn version(&self) -> IcmpVersion {
        self.version
    }

    pub fn values(&self) -> &ValueSet {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.values.is_complete()
    }

    pub fn contains(&self, icmp_type: u8, code: u8) -> bool {
        self.values.contains(encode(icmp_type, code))
    }

    pub fn union(&self, other: &Self) -> Self {
        self.with_values(self.values.union(&other.values))
    }

    pub fn intersect(&self, other: &Self) -> Self {
        self.with_values(self.values.intersect(&other.values))
    }

    pub fn subtract(&self, other: &Self) -> Self {
        self.with_values(self.values.subtract(&other.values))
    }

    pub fn invert(&self) -> Self {
        self.with_values(self.values.invert())
    }

    fn with_values(&self, values: ValueSet) -> Self {
        Self {
            version: self.version,
            values,
        }
    }

    /// 표시용 설명 목록
    ///
    /// 한 type 의 code 가 모두 포함되면 type 이름 하나로, 아니면
    /// `name/code` 형태로 나열합니다. 전체 집합은 `"all"` 입니다.
    pub fn describe(&self) -> Vec<String> {
        if self.is_all() {
            return vec!["all".to_owned()];
        }
        let mut out = Vec::new();
        for (low, high) in self.values.ranges() {
            let (mut t, mut c) = decode(low);
            let (end_t, end_c) = decode(high);
            loop {
                let last_code = if t == end_t { end_c } else { u8::MAX };
                let name = type_name(self.version, t);
                if c == 0 && last_code == u8::MAX {
                    out.push(name);
                } else {
                    for code in c..=last_code {
                        out.push(format!("{name}/{code}"));
                    }
                }
                if t == end_t {
                    break;
                }
                t += 1;
                c = 0;
            }
        }
        out
    }

    /// [`describe`](Self::describe) 형식의 문자열 목록을 다시 집합으로 읽습니다.
    pub fn parse_descriptions<S: AsRef<str>>(
        version: IcmpVersion,
        items: &[S],
    ) -> Result<Self, TrafficError> {
        let mut set = Self::empty(version);
        for item in items {
            let item = item.as_ref().trim();
            if item == "all" {
                return Ok(Self::all(version));
            }
            let part = match item.split_once('/') {
                Some((name, code)) => {
                    let icmp_type = type_number(version, name)?;
                    let code = code
                        .parse::<u8>()
                        .map_err(|_| TrafficError::InvalidIcmp {
                            field: "code",
                            value: code.parse::<i64>().unwrap_or(-2),
                        })?;
                    Self::type_code(version, icmp_type, code)
                }
                None => Self::all_codes(version, type_number(version, item)?),
            };
            set = set.union(&part);
        }
        Ok(set)
    }
}

fn validate_octet(field: &'static str, value: i64) -> Result<u8, TrafficError> {
    u8::try_from(value).map_err(|_| TrafficError::InvalidIcmp { field, value })
}

const ICMPV4_TYPES: &[(u8, &str)] = &[
    (0, "echo-reply"),
    (3, "destination-unreachable"),
    (4, "source-quench"),
    (5, "redirect"),
    (8, "echo-request"),
    (9, "router-advertisement"),
    (10, "router-solicitation"),
    (11, "time-exceeded"),
    (12, "parameter-problem"),
    (13, "timestamp-request"),
    (14, "timestamp-reply"),
];

const ICMPV6_TYPES: &[(u8, &str)] = &[
    (1, "destination-unreachable"),
    (2, "packet-too-big"),
    (3, "time-exceeded"),
    (4, "parameter-problem"),
    (128, "echo-request"),
    (129, "echo-reply"),
    (133, "router-solicitation"),
    (134, "router-advertisement"),
    (135, "neighbor-solicitation"),
    (136, "neighbor-advertisement"),
    (137, "redirect"),
];

fn type_table(version: IcmpVersion) -> &'static [(u8, &'static str)] {
    match version {
        IcmpVersion::V4 => ICMPV4_TYPES,
        IcmpVersion::V6 => ICMPV6_TYPES,
    }
}

/// ICMP type 이름. 알려지지 않은 type 은 `type-N`.
pub fn type_name(version: IcmpVersion, icmp_type: u8) -> String {
    type_table(version)
        .iter()
        .find(|(t, _)| *t == icmp_type)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| format!("type-{icmp_type}"))
}

fn type_number(version: IcmpVersion, name: &str) -> Result<u8, TrafficError> {
    if let Some((t, _)) = type_table(version).iter().find(|(_, n)| *n == name) {
        return Ok(*t);
    }
    let raw = name.strip_prefix("type-").unwrap_or(name);
    raw.parse::<u8>().map_err(|_| TrafficError::InvalidIcmp {
        field: "type",
        value: raw.parse::<i64>().unwrap_or(-2),
    })
}

impl fmt::Display for IcmpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.describe().join(", "))
    }
}
