//! 프로토콜별 트래픽 내용의 묶음
//!
//! [`TrafficContent`]는 프로토콜 번호 → [`ProtocolContent`] 맵에 "전체 허용"과
//! "전부 차단" 두 가지 지시자를 더한 값입니다. 모든 연산은 새 값을 반환하며,
//! 결과는 항상 정규화됩니다 (빈 프로토콜 제거, 빈 맵은 `None`).
//!
//! # 직렬화 형식
//! ```text
//! "all traffic"
//! "no traffic"
//! { "tcp": ["22", "8000-8080"], "icmp": ["echo-request"], "gre": ["all"] }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::icmp::IcmpSet;
use super::ports::PortSet;
use super::protocol::{PROTO_TCP, PROTO_UDP, ProtocolContent, protocol_number};
use crate::error::TrafficError;

/// "전체 허용" 직렬화 문자열
pub const ALL_TRAFFIC: &str = "all traffic";
/// "전부 차단" 직렬화 문자열
pub const NO_TRAFFIC: &str = "no traffic";

/// 맵을 덮어쓰는 지시자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    /// 프로토콜 맵이 내용을 결정함
    #[default]
    Unset,
    /// 모든 트래픽
    All,
    /// 트래픽 없음
    None,
}

/// 프로토콜별 트래픽 내용
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficContent {
    indicator: Indicator,
    protocols: BTreeMap<u8, ProtocolContent>,
}

impl TrafficContent {
    /// 모든 트래픽
    pub fn all() -> Self {
        Self {
            indicator: Indicator::All,
            protocols: BTreeMap::new(),
        }
    }

    /// 트래픽 없음
    pub fn none() -> Self {
        Self {
            indicator: Indicator::None,
            protocols: BTreeMap::new(),
        }
    }

    /// 프로토콜 내용 목록에서 생성합니다. 같은 프로토콜은 합쳐집니다.
    pub fn from_protocols(
        contents: impl IntoIterator<Item = ProtocolContent>,
    ) -> Result<Self, TrafficError> {
        let mut protocols: BTreeMap<u8, ProtocolContent> = BTreeMap::new();
        for content in contents {
            let merged = match protocols.get(&content.protocol()) {
                Some(existing) => existing.merge(&content)?,
                None => content,
            };
            protocols.insert(merged.protocol(), merged);
        }
        Ok(Self::normalized(protocols))
    }

    /// 단일 프로토콜 내용
    pub fn single(content: ProtocolContent) -> Self {
        let mut protocols = BTreeMap::new();
        protocols.insert(content.protocol(), content);
        Self::normalized(protocols)
    }

    /// TCP 포트 집합
    pub fn tcp(ports: PortSet) -> Self {
        Self::single(ProtocolContent::tcp(ports))
    }

    /// UDP 포트 집합
    pub fn udp(ports: PortSet) -> Self {
        Self::single(ProtocolContent::udp(ports))
    }

    /// ICMP type/code 집합
    pub fn icmp(set: IcmpSet) -> Self {
        Self::single(ProtocolContent::icmp(set))
    }

    fn normalized(mut protocols: BTreeMap<u8, ProtocolContent>) -> Self {
        protocols.retain(|_, content| !content.is_empty());
        if protocols.is_empty() {
            return Self::none();
        }
        if protocols.len() == usize::from(u8::MAX) + 1 && protocols.values().all(|c| c.is_all()) {
            return Self::all();
        }
        Self {
            indicator: Indicator::Unset,
            protocols,
        }
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    pub fn is_all(&self) -> bool {
        self.indicator == Indicator::All
    }

    pub fn is_none(&self) -> bool {
        self.indicator == Indicator::None
    }

    /// 특정 프로토콜 내용. `All` 이면 해당 프로토콜 전체를 돌려줍니다.
    pub fn protocol(&self, protocol: u8) -> Option<ProtocolContent> {
        match self.indicator {
            Indicator::All => Some(ProtocolContent::all(protocol)),
            Indicator::None => None,
            Indicator::Unset => self.protocols.get(&protocol).cloned(),
        }
    }

    /// 프로토콜 맵 (`Unset` 일 때만 내용이 있음)
    pub fn protocols(&self) -> impl Iterator<Item = &ProtocolContent> {
        self.protocols.values()
    }

    /// TCP 포트 포함 여부
    pub fn allows_tcp(&self, port: u16) -> bool {
        self.allows_port(PROTO_TCP, port)
    }

    /// UDP 포트 포함 여부
    pub fn allows_udp(&self, port: u16) -> bool {
        self.allows_port(PROTO_UDP, port)
    }

    fn allows_port(&self, protocol: u8, port: u16) -> bool {
        self.protocol(protocol)
            .and_then(|c| c.port_set().map(|p| p.contains(port)))
            .unwrap_or(false)
    }

    /// 합집합
    ///
    /// 어느 한쪽이 `All` 이면 `All`, 둘 다 `None` 이면 `None`.
    /// 그 밖에는 양쪽에 있는 모든 프로토콜을 합칩니다. 한쪽에만 있는
    /// 프로토콜은 그대로 유지됩니다.
    pub fn merge(&self, other: &Self) -> Result<Self, TrafficError> {
        if self.is_all() || other.is_all() {
            return Ok(Self::all());
        }
        if self.is_none() {
            return Ok(other.clone());
        }
        if other.is_none() {
            return Ok(self.clone());
        }
        let mut protocols = self.protocols.clone();
        for (number, content) in &other.protocols {
            let merged = match protocols.get(number) {
                Some(existing) => existing.merge(content)?,
                None => content.clone(),
            };
            protocols.insert(*number, merged);
        }
        Ok(Self::normalized(protocols))
    }

    /// 교집합
    ///
    /// 어느 한쪽이 `None` 이면 `None`, 둘 다 `All` 이면 `All`.
    /// 그 밖에는 양쪽 모두에 있는 프로토콜만 남습니다.
    pub fn intersect(&self, other: &Self) -> Result<Self, TrafficError> {
        if self.is_none() || other.is_none() {
            return Ok(Self::none());
        }
        if self.is_all() {
            return Ok(other.clone());
        }
        if other.is_all() {
            return Ok(self.clone());
        }
        let mut protocols = BTreeMap::new();
        for (number, content) in &self.protocols {
            if let Some(theirs) = other.protocols.get(number) {
                protocols.insert(*number, content.intersect(theirs)?);
            }
        }
        Ok(Self::normalized(protocols))
    }

    /// 차집합 (`self - other`)
    ///
    /// `self` 가 `None` 이거나 `other` 가 `All` 이면 `None`,
    /// `other` 가 `None` 이면 `self`. `self` 에만 있는 프로토콜은 그대로 남습니다.
    pub fn subtract(&self, other: &Self) -> Result<Self, TrafficError> {
        if self.is_none() || other.is_all() {
            return Ok(Self::none());
        }
        if other.is_none() {
            return Ok(self.clone());
        }
        if self.is_all() {
            // 전체에서 빼려면 전 프로토콜을 펼쳐야 함
            let protocols = (0..=u8::MAX).map(|number| {
                let full = ProtocolContent::all(number);
                match other.protocols.get(&number) {
                    Some(theirs) => full.subtract(theirs),
                    None => Ok(full),
                }
            });
            return Self::from_protocols(protocols.collect::<Result<Vec<_>, _>>()?);
        }
        let mut protocols = BTreeMap::new();
        for (number, content) in &self.protocols {
            let rest = match other.protocols.get(number) {
                Some(theirs) => content.subtract(theirs)?,
                None => content.clone(),
            };
            protocols.insert(*number, rest);
        }
        Ok(Self::normalized(protocols))
    }

    /// 여러 값을 합칩니다. 중간 결과가 `All` 이 되면 즉시 멈춥니다.
    /// 빈 목록의 합은 `None` 입니다.
    pub fn merge_all<'a>(
        contents: impl IntoIterator<Item = &'a TrafficContent>,
    ) -> Result<Self, TrafficError> {
        let mut acc = Self::none();
        for content in contents {
            acc = acc.merge(content)?;
            if acc.is_all() {
                break;
            }
        }
        Ok(acc)
    }

    /// 여러 값을 교차합니다. 중간 결과가 `None` 이 되면 즉시 멈춥니다.
    /// 빈 목록의 교집합은 `All` 입니다 (제약 없음).
    pub fn intersect_all<'a>(
        contents: impl IntoIterator<Item = &'a TrafficContent>,
    ) -> Result<Self, TrafficError> {
        let mut acc = Self::all();
        for content in contents {
            acc = acc.intersect(content)?;
            if acc.is_none() {
                break;
            }
        }
        Ok(acc)
    }

    /// 프로토콜 이름 → 설명 목록
    pub fn describe(&self) -> BTreeMap<String, Vec<String>> {
        self.protocols
            .values()
            .map(|content| (content.name(), content.describe()))
            .collect()
    }
}

impl Default for TrafficContent {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for TrafficContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.indicator {
            Indicator::All => f.write_str(ALL_TRAFFIC),
            Indicator::None => f.write_str(NO_TRAFFIC),
            Indicator::Unset => {
                let parts: Vec<String> = self.protocols.values().map(|c| c.to_string()).collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

impl Serialize for TrafficContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.indicator {
            Indicator::All => serializer.serialize_str(ALL_TRAFFIC),
            Indicator::None => serializer.serialize_str(NO_TRAFFIC),
            Indicator::Unset => {
                let described = self.describe();
                let mut map = serializer.serialize_map(Some(described.len()))?;
                for (name, items) in &described {
                    map.serialize_entry(name, items)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTraffic {
    Text(String),
    Protocols(BTreeMap<String, Vec<String>>),
}

impl<'de> Deserialize<'de> for TrafficContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WireTraffic::deserialize(deserializer)? {
            WireTraffic::Text(text) if text == ALL_TRAFFIC => Ok(Self::all()),
            WireTraffic::Text(text) if text == NO_TRAFFIC => Ok(Self::none()),
            WireTraffic::Text(text) => Err(de::Error::custom(format!(
                "expected \"{ALL_TRAFFIC}\", \"{NO_TRAFFIC}\" or a protocol map, got \"{text}\""
            ))),
            WireTraffic::Protocols(map) => {
                let contents = map
                    .iter()
                    .map(|(name, items)| {
                        let number = protocol_number(name)?;
                        ProtocolContent::parse_descriptions(number, items)
                    })
                    .collect::<Result<Vec<_>, TrafficError>>()
                    .map_err(de::Error::custom)?;
                Self::from_protocols(contents).map_err(de::Error::custom)
            }
        }
    }
}
