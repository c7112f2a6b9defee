//! 규칙 필드 → TrafficContent

use vpcreach_core::error::TrafficError;
use vpcreach_core::traffic::{
    IcmpSet, IcmpVersion, PROTO_ICMP, PROTO_ICMPV6, PROTO_TCP, PROTO_UDP, PortSet,
    ProtocolContent, TrafficContent, protocol_number,
};

/// AWS 스타일 규칙 필드를 트래픽 집합으로 변환합니다.
///
/// - 프로토콜 `-1`/`all`: 모든 트래픽
/// - TCP/UDP: `low`/`high` 는 포트. 없거나 -1 이면 전체 포트.
/// - ICMP/ICMPv6: `low`/`high` 는 type/code. -1 은 전체.
/// - 그 밖의 번호: 전부 허용 플래그
pub fn rule_traffic(
    protocol: &str,
    low: Option<i64>,
    high: Option<i64>,
) -> Result<TrafficContent, TrafficError> {
    let trimmed = protocol.trim();
    if trimmed == "-1" || trimmed.eq_ignore_ascii_case("all") {
        return Ok(TrafficContent::all());
    }

    let number = protocol_number(trimmed)?;
    let content = match number {
        PROTO_TCP | PROTO_UDP => ProtocolContent::ports(number, port_set(low, high)?)?,
        PROTO_ICMP => ProtocolContent::icmp(IcmpSet::from_rule(
            IcmpVersion::V4,
            low.unwrap_or(-1),
            high.unwrap_or(-1),
        )?),
        PROTO_ICMPV6 => ProtocolContent::icmp(IcmpSet::from_rule(
            IcmpVersion::V6,
            low.unwrap_or(-1),
            high.unwrap_or(-1),
        )?),
        other => ProtocolContent::custom(other, true)?,
    };
    Ok(TrafficContent::single(content))
}

fn port_set(low: Option<i64>, high: Option<i64>) -> Result<PortSet, TrafficError> {
    match (low, high) {
        (None | Some(-1), None | Some(-1)) => Ok(PortSet::all()),
        (Some(low), None) => PortSet::range(low, low),
        (None, Some(high)) => PortSet::range(high, high),
        (Some(low), Some(high)) => PortSet::range(low, high),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minus_one_is_all_traffic() {
        assert!(rule_traffic("-1", None, None).unwrap().is_all());
        assert!(rule_traffic("ALL", Some(22), Some(22)).unwrap().is_all());
    }

    #[test]
    fn tcp_port_range() {
        let traffic = rule_traffic("tcp", Some(8000), Some(8080)).unwrap();
        assert!(traffic.allows_tcp(8000));
        assert!(traffic.allows_tcp(8080));
        assert!(!traffic.allows_tcp(8081));
        assert!(!traffic.allows_udp(8000));
    }

    #[test]
    fn numeric_protocol_and_missing_ports() {
        let traffic = rule_traffic("17", None, None).unwrap();
        assert!(traffic.allows_udp(53));
        assert!(traffic.allows_udp(65535));
    }

    #[test]
    fn reversed_port_range_is_error() {
        let err = rule_traffic("tcp", Some(90), Some(80)).unwrap_err();
        assert!(matches!(err, TrafficError::InvalidPortRange { .. }));
    }

    #[test]
    fn out_of_range_port_is_error() {
        assert!(rule_traffic("tcp", Some(0), Some(70000)).is_err());
    }

    #[test]
    fn icmp_type_code() {
        let traffic = rule_traffic("icmp", Some(8), Some(-1)).unwrap();
        let content = traffic.protocol(PROTO_ICMP).unwrap();
        let set = content.icmp_set().unwrap();
        assert!(set.contains(8, 0));
        assert!(set.contains(8, 200));
        assert!(!set.contains(0, 0));
    }

    #[test]
    fn icmp_out_of_range_is_error() {
        let err = rule_traffic("icmp", Some(256), Some(0)).unwrap_err();
        assert!(matches!(err, TrafficError::InvalidIcmp { field: "type", .. }));
        let err = rule_traffic("icmpv6", Some(1), Some(300)).unwrap_err();
        assert!(matches!(err, TrafficError::InvalidIcmp { field: "code", .. }));
    }

    #[test]
    fn other_protocol_is_flag() {
        let traffic = rule_traffic("gre", None, None).unwrap();
        let content = traffic.protocol(47).unwrap();
        assert_eq!(content.custom_allowed(), Some(true));
    }

    #[test]
    fn unknown_protocol_is_error() {
        let err = rule_traffic("carrier-pigeon", None, None).unwrap_err();
        assert!(matches!(err, TrafficError::UnknownProtocol(_)));
    }
}
