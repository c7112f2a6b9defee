//! 단일 IP 프로토콜의 트래픽 내용
//!
//! TCP/UDP 는 포트 집합, ICMPv4/ICMPv6 는 type/code 집합, 그 밖의 프로토콜은
//! "전부 허용 또는 전부 차단" 플래그 하나로 표현합니다.

use std::fmt;

use super::icmp::{IcmpSet, IcmpVersion};
use super::ports::PortSet;
use crate::error::TrafficError;

/// ICMP (IPv4)
pub const PROTO_ICMP: u8 = 1;
/// TCP
pub const PROTO_TCP: u8 = 6;
/// UDP
pub const PROTO_UDP: u8 = 17;
/// ICMPv6
pub const PROTO_ICMPV6: u8 = 58;

const PROTOCOL_NAMES: &[(u8, &str)] = &[
    (PROTO_ICMP, "icmp"),
    (2, "igmp"),
    (4, "ipip"),
    (PROTO_TCP, "tcp"),
    (PROTO_UDP, "udp"),
    (41, "ipv6"),
    (47, "gre"),
    (50, "esp"),
    (51, "ah"),
    (PROTO_ICMPV6, "icmpv6"),
    (89, "ospf"),
    (132, "sctp"),
];

/// 프로토콜 표시 이름. 이름이 없는 번호는 `proto-N`.
pub fn protocol_name(protocol: u8) -> String {
    PROTOCOL_NAMES
        .iter()
        .find(|(n, _)| *n == protocol)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| format!("proto-{protocol}"))
}

/// 이름(`tcp`, `proto-47`) 또는 번호 문자열(`"6"`)을 프로토콜 번호로 해석합니다.
pub fn protocol_number(name: &str) -> Result<u8, TrafficError> {
    let lowered = name.trim().to_ascii_lowercase();
    if let Some((n, _)) = PROTOCOL_NAMES.iter().find(|(_, p)| *p == lowered) {
        return Ok(*n);
    }
    let raw = lowered.strip_prefix("proto-").unwrap_or(&lowered);
    raw.parse::<u8>()
        .map_err(|_| TrafficError::UnknownProtocol(name.to_owned()))
}

fn is_port_protocol(protocol: u8) -> bool {
    matches!(protocol, PROTO_TCP | PROTO_UDP)
}

fn icmp_version_of(protocol: u8) -> Option<IcmpVersion> {
    match protocol {
        PROTO_ICMP => Some(IcmpVersion::V4),
        PROTO_ICMPV6 => Some(IcmpVersion::V6),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Ports(PortSet),
    Icmp(IcmpSet),
    Custom(bool),
}

/// 한 프로토콜의 트래픽 내용
///
/// 본문 종류는 프로토콜 번호로 결정되므로, 생성자를 거친 값은 항상
/// 프로토콜과 본문이 일치합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolContent {
    protocol: u8,
    body: Body,
}

impl ProtocolContent {
    /// 아무것도 허용하지 않는 내용
    pub fn empty(protocol: u8) -> Self {
        let body = if is_port_protocol(protocol) {
            Body::Ports(PortSet::empty())
        } else if let Some(version) = icmp_version_of(protocol) {
            Body::Icmp(IcmpSet::empty(version))
        } else {
            Body::Custom(false)
        };
        Self { protocol, body }
    }

    /// 모든 트래픽을 허용하는 내용
    pub fn all(protocol: u8) -> Self {
        let body = if is_port_protocol(protocol) {
            Body::Ports(PortSet::all())
        } else if let Some(version) = icmp_version_of(protocol) {
            Body::Icmp(IcmpSet::all(version))
        } else {
            Body::Custom(true)
        };
        Self { protocol, body }
    }

    /// TCP/UDP 포트 내용
    pub fn ports(protocol: u8, ports: PortSet) -> Result<Self, TrafficError> {
        if !is_port_protocol(protocol) {
            return Err(TrafficError::WrongContent {
                protocol,
                content: "ports",
            });
        }
        Ok(Self {
            protocol,
            body: Body::Ports(ports),
        })
    }

    /// TCP 포트 내용
    pub fn tcp(ports: PortSet) -> Self {
        Self {
            protocol: PROTO_TCP,
            body: Body::Ports(ports),
        }
    }

    /// UDP 포트 내용
    pub fn udp(ports: PortSet) -> Self {
        Self {
            protocol: PROTO_UDP,
            body: Body::Ports(ports),
        }
    }

    /// ICMP 내용. 프로토콜 번호는 ICMP 버전에서 정해집니다.
    pub fn icmp(set: IcmpSet) -> Self {
        let protocol = match set.version() {
            IcmpVersion::V4 => PROTO_ICMP,
            IcmpVersion::V6 => PROTO_ICMPV6,
        };
        Self {
            protocol,
            body: Body::Icmp(set),
        }
    }

    /// 포트/ICMP 가 아닌 프로토콜의 허용 여부
    pub fn custom(protocol: u8, allowed: bool) -> Result<Self, TrafficError> {
        if is_port_protocol(protocol) || icmp_version_of(protocol).is_some() {
            return Err(TrafficError::WrongContent {
                protocol,
                content: "an all-or-nothing flag",
            });
        }
        Ok(Self {
            protocol,
            body: Body::Custom(allowed),
        })
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn name(&self) -> String {
        protocol_name(self.protocol)
    }

    pub fn port_set(&self) -> Option<&PortSet> {
        match &self.body {
            Body::Ports(ports) => Some(ports),
            _ => None,
        }
    }

    pub fn icmp_set(&self) -> Option<&IcmpSet> {
        match &self.body {
            Body::Icmp(icmp) => Some(icmp),
            _ => None,
        }
    }

    pub fn custom_allowed(&self) -> Option<bool> {
        match &self.body {
            Body::Custom(allowed) => Some(*allowed),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.body {
            Body::Ports(ports) => ports.is_empty(),
            Body::Icmp(icmp) => icmp.is_empty(),
            Body::Custom(allowed) => !allowed,
        }
    }

    pub fn is_all(&self) -> bool {
        match &self.body {
            Body::Ports(ports) => ports.is_all(),
            Body::Icmp(icmp) => icmp.is_all(),
            Body::Custom(allowed) => *allowed,
        }
    }

    /// 교집합. 프로토콜이 다르면 에러입니다.
    pub fn intersect(&self, other: &Self) -> Result<Self, TrafficError> {
        self.combine(other, PortSet::intersect, IcmpSet::intersect, |a, b| a && b)
    }

    /// 합집합. 프로토콜이 다르면 에러입니다.
    pub fn merge(&self, other: &Self) -> Result<Self, TrafficError> {
        self.combine(other, PortSet::union, IcmpSet::union, |a, b| a || b)
    }

    /// 차집합. 프로토콜이 다르면 에러입니다.
    pub fn subtract(&self, other: &Self) -> Result<Self, TrafficError> {
        self.combine(other, PortSet::subtract, IcmpSet::subtract, |a, b| a && !b)
    }

    fn combine(
        &self,
        other: &Self,
        ports: impl Fn(&PortSet, &PortSet) -> PortSet,
        icmp: impl Fn(&IcmpSet, &IcmpSet) -> IcmpSet,
        flag: impl Fn(bool, bool) -> bool,
    ) -> Result<Self, TrafficError> {
        if self.protocol != other.protocol {
            return Err(TrafficError::ProtocolMismatch {
                left: self.protocol,
                right: other.protocol,
            });
        }
        let body = match (&self.body, &other.body) {
            (Body::Ports(a), Body::Ports(b)) => Body::Ports(ports(a, b)),
            (Body::Icmp(a), Body::Icmp(b)) => Body::Icmp(icmp(a, b)),
            (Body::Custom(a), Body::Custom(b)) => Body::Custom(flag(*a, *b)),
            _ => {
                return Err(TrafficError::ProtocolMismatch {
                    left: self.protocol,
                    right: other.protocol,
                });
            }
        };
        Ok(Self {
            protocol: self.protocol,
            body,
        })
    }

    /// 표시용 설명 목록 (포트 구간, ICMP 이름 또는 `"all"`)
    pub fn describe(&self) -> Vec<String> {
        match &self.body {
            Body::Ports(ports) => ports.describe(),
            Body::Icmp(icmp) => icmp.describe(),
            Body::Custom(true) => vec!["all".to_owned()],
            Body::Custom(false) => Vec::new(),
        }
    }

    /// [`describe`](Self::describe) 형식에서 다시 읽습니다.
    pub fn parse_descriptions<S: AsRef<str>>(
        protocol: u8,
        items: &[S],
    ) -> Result<Self, TrafficError> {
        if is_port_protocol(protocol) {
            return Self::ports(protocol, PortSet::parse_ranges(items)?);
        }
        if let Some(version) = icmp_version_of(protocol) {
            return Ok(Self::icmp(IcmpSet::parse_descriptions(version, items)?));
        }
        match items {
            [] => Ok(Self::empty(protocol)),
            [only] if only.as_ref() == "all" => Ok(Self::all(protocol)),
            _ => Err(TrafficError::InvalidPortSpec(format!(
                "protocol {} only accepts \"all\"",
                protocol_name(protocol)
            ))),
        }
    }
}

impl fmt::Display for ProtocolContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.describe();
        if items.is_empty() {
            write!(f, "{}: none", self.name())
        } else {
            write!(f, "{}: {}", self.name(), items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(low: i64, high: i64) -> ProtocolContent {
        ProtocolContent::ports(PROTO_TCP, PortSet::range(low, high).unwrap()).unwrap()
    }

    #[test]
    fn body_is_selected_by_protocol() {
        assert!(ProtocolContent::all(PROTO_TCP).port_set().is_some());
        assert!(ProtocolContent::all(PROTO_ICMPV6).icmp_set().is_some());
        assert_eq!(ProtocolContent::all(47).custom_allowed(), Some(true));
        assert_eq!(ProtocolContent::empty(47).custom_allowed(), Some(false));
    }

    #[test]
    fn constructors_reject_wrong_content() {
        assert!(ProtocolContent::ports(PROTO_ICMP, PortSet::all()).is_err());
        assert!(ProtocolContent::custom(PROTO_UDP, true).is_err());
        assert!(ProtocolContent::custom(PROTO_ICMP, true).is_err());
    }

    #[test]
    fn mismatched_protocols_are_an_error() {
        let udp = ProtocolContent::all(PROTO_UDP);
        let err = tcp(1, 2).merge(&udp).unwrap_err();
        assert_eq!(
            err,
            TrafficError::ProtocolMismatch {
                left: PROTO_TCP,
                right: PROTO_UDP
            }
        );
        assert!(tcp(1, 2).intersect(&udp).is_err());
        assert!(tcp(1, 2).subtract(&udp).is_err());
    }

    #[test]
    fn port_operations_delegate_to_port_set() {
        let merged = tcp(10, 20).merge(&tcp(15, 30)).unwrap();
        assert_eq!(merged.port_set().unwrap().ranges(), vec![(10, 30)]);
        let common = tcp(10, 20).intersect(&tcp(15, 30)).unwrap();
        assert_eq!(common.port_set().unwrap().ranges(), vec![(15, 20)]);
        let rest = tcp(10, 20).subtract(&tcp(15, 30)).unwrap();
        assert_eq!(rest.port_set().unwrap().ranges(), vec![(10, 14)]);
    }

    #[test]
    fn custom_flags_use_boolean_logic() {
        let yes = ProtocolContent::custom(47, true).unwrap();
        let no = ProtocolContent::custom(47, false).unwrap();
        assert!(yes.merge(&no).unwrap().is_all());
        assert!(yes.intersect(&no).unwrap().is_empty());
        assert!(yes.subtract(&no).unwrap().is_all());
        assert!(yes.subtract(&yes).unwrap().is_empty());
    }

    #[test]
    fn protocol_names_round_trip() {
        assert_eq!(protocol_name(PROTO_TCP), "tcp");
        assert_eq!(protocol_name(200), "proto-200");
        assert_eq!(protocol_number("TCP").unwrap(), PROTO_TCP);
        assert_eq!(protocol_number("proto-200").unwrap(), 200);
        assert_eq!(protocol_number("47").unwrap(), 47);
        assert!(protocol_number("carrier-pigeon").is_err());
    }

    #[test]
    fn display_lists_content() {
        assert_eq!(tcp(22, 22).to_string(), "tcp: 22");
        assert_eq!(ProtocolContent::empty(PROTO_UDP).to_string(), "udp: none");
    }
}
