//! 보안 그룹 규칙 매칭
//!
//! 보안 그룹 규칙은 허용만 하고 서로 독립적이므로, 일치하는 규칙의 트래픽을
//! 순서와 무관하게 합칩니다. 한 인터페이스에 붙은 여러 그룹도 하나의
//! 팩터로 합쳐집니다.

use std::net::IpAddr;

use tracing::debug;
use vpcreach_core::error::TrafficError;
use vpcreach_core::topology::{
    Direction, Factor, FactorKind, ResourceReference, RuleAction, RuleMatch,
};
use vpcreach_core::traffic::TrafficContent;

use super::traffic::rule_traffic;
use super::{Counterpart, Side};
use crate::resource::{SecurityGroup, SecurityGroupRule, parse_cidr};

/// 인터페이스에 붙은 보안 그룹들의 팩터
///
/// `resource` 는 그룹이 붙은 인터페이스입니다.
pub fn security_groups_factor(
    resource: ResourceReference,
    groups: &[SecurityGroup],
    side: Side,
    counterpart: &Counterpart,
) -> Result<Factor, TrafficError> {
    let (forward, mut matches) =
        evaluate_groups(groups, side.forward_direction(), counterpart)?;
    let (backward, return_matches) =
        evaluate_groups(groups, side.return_direction(), counterpart)?;
    matches.extend(return_matches);

    debug!(
        resource = %resource,
        groups = groups.len(),
        forward = %forward,
        "security group factor"
    );

    let mut factor = Factor::new(FactorKind::SecurityGroup, resource, forward, backward)
        .with_matches(matches);
    if groups.is_empty() {
        factor = factor.with_note("no security groups attached");
    }
    Ok(factor)
}

fn evaluate_groups(
    groups: &[SecurityGroup],
    direction: Direction,
    counterpart: &Counterpart,
) -> Result<(TrafficContent, Vec<RuleMatch>), TrafficError> {
    let mut allowed = TrafficContent::none();
    let mut matches = Vec::new();

    for group in groups {
        let rules = match direction {
            Direction::Inbound => &group.inbound,
            Direction::Outbound => &group.outbound,
        };
        for rule in rules {
            // 일치 여부와 관계없이 규칙 값을 먼저 검증
            let traffic = rule_traffic(&rule.protocol, rule.from_port, rule.to_port)?;
            if !rule_matches(rule, counterpart)? {
                continue;
            }
            allowed = allowed.merge(&traffic)?;
            matches.push(RuleMatch {
                direction,
                action: RuleAction::Allow,
                description: describe_rule(group, rule),
                traffic,
            });
        }
    }
    Ok((allowed, matches))
}

fn rule_matches(rule: &SecurityGroupRule, counterpart: &Counterpart) -> Result<bool, TrafficError> {
    if cidrs_contain(&rule.cidrs, counterpart.ip)? {
        return Ok(true);
    }
    Ok(counterpart
        .security_groups
        .as_ref()
        .is_some_and(|groups| rule.security_groups.iter().any(|g| groups.contains(g))))
}

fn cidrs_contain(cidrs: &[String], ip: IpAddr) -> Result<bool, TrafficError> {
    let mut found = false;
    for cidr in cidrs {
        found |= parse_cidr(cidr)?.contains(&ip);
    }
    Ok(found)
}

fn describe_rule(group: &SecurityGroup, rule: &SecurityGroupRule) -> String {
    let mut targets: Vec<&str> = rule.cidrs.iter().map(String::as_str).collect();
    targets.extend(rule.security_groups.iter().map(String::as_str));
    let mut text = format!("{} {} {}", group.id, rule.protocol, targets.join(","));
    if let Some(description) = &rule.description {
        text.push_str(" (");
        text.push_str(description);
        text.push(')');
    }
    text
}
