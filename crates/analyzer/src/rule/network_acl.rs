//! 네트워크 ACL 항목 평가
//!
//! 항목은 규칙 번호 오름차순으로 평가하며, 먼저 일치한 항목이 이깁니다.
//! 이를 "이미 결정된 트래픽" 누적으로 표현합니다.
//!
//! ```text
//! decided = None
//! for entry in sorted(entries):
//!     if !entry.cidr.contains(ip): continue
//!     if allow: allowed += entry.traffic - decided
//!     decided += entry.traffic
//! ```
//!
//! "결정됨"은 프로토콜/포트 단위이며 어느 CIDR 로 일치했는지와는 무관합니다.

use std::net::IpAddr;

use tracing::debug;
use vpcreach_core::error::TrafficError;
use vpcreach_core::topology::{
    Direction, Factor, FactorKind, ResourceReference, RuleAction, RuleMatch,
};
use vpcreach_core::traffic::TrafficContent;

use super::Side;
use super::traffic::rule_traffic;
use crate::resource::{NetworkAcl, NetworkAclEntry, parse_cidr};

/// 서브넷 NACL 팩터
///
/// 상대편 주소 하나에 대해 정방향/응답 방향 항목을 각각 평가합니다.
pub fn network_acl_factor(
    acl: &NetworkAcl,
    resource: ResourceReference,
    side: Side,
    counterpart: IpAddr,
) -> Result<Factor, TrafficError> {
    let forward_direction = side.forward_direction();
    let (forward, mut matches) = evaluate_entries(&acl.entries, forward_direction, counterpart)?;
    let (backward, return_matches) =
        evaluate_entries(&acl.entries, side.return_direction(), counterpart)?;
    matches.extend(return_matches);

    debug!(
        acl = acl.id.as_str(),
        resource = %resource,
        counterpart = %counterpart,
        forward = %forward,
        "network acl factor"
    );

    Ok(
        Factor::new(FactorKind::NetworkAcl, resource, forward, backward)
            .with_matches(matches)
            .with_note(format!("{} {}", acl.id, direction_label(forward_direction))),
    )
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Inbound => "ingress",
        Direction::Outbound => "egress",
    }
}

/// 한 방향의 항목을 평가해 허용 트래픽과 설명 목록을 돌려줍니다.
pub fn evaluate_entries(
    entries: &[NetworkAclEntry],
    direction: Direction,
    counterpart: IpAddr,
) -> Result<(TrafficContent, Vec<RuleMatch>), TrafficError> {
    let egress = direction == Direction::Outbound;
    let mut ordered: Vec<&NetworkAclEntry> =
        entries.iter().filter(|e| e.egress == egress).collect();
    ordered.sort_by_key(|e| e.rule_number);

    let mut decided = TrafficContent::none();
    let mut allowed = TrafficContent::none();
    let mut matches = Vec::new();

    for entry in ordered {
        let (low, high) = if is_icmp(&entry.protocol) {
            (entry.icmp_type, entry.icmp_code)
        } else {
            (entry.from_port, entry.to_port)
        };
        let traffic = rule_traffic(&entry.protocol, low, high)?;
        if !parse_cidr(&entry.cidr)?.contains(&counterpart) {
            continue;
        }

        let effective = traffic.subtract(&decided)?;
        if entry.action == RuleAction::Allow {
            allowed = allowed.merge(&effective)?;
        }
        matches.push(RuleMatch {
            direction,
            action: entry.action,
            description: format!("#{} {} {}", entry.rule_number, entry.protocol, entry.cidr),
            traffic: effective,
        });
        decided = decided.merge(&traffic)?;
        if decided.is_all() {
            break;
        }
    }

    Ok((allowed, matches))
}

fn is_icmp(protocol: &str) -> bool {
    matches!(
        protocol.trim().to_ascii_lowercase().as_str(),
        "icmp" | "icmpv6" | "1" | "58"
    )
}
