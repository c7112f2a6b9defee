//! 규칙 엔진: 보안 그룹, 네트워크 ACL, 인스턴스 상태를 팩터로 변환
//!
//! 각 함수는 한 지점의 설정과 상대편(counterpart) 정보를 받아
//! 정방향/응답 방향 트래픽을 담은 [`Factor`](vpcreach_core::topology::Factor)를
//! 만듭니다.
//!
//! | 설정 | Source 쪽 정방향 | Destination 쪽 정방향 |
//! |------|-----------------|----------------------|
//! | 보안 그룹 | outbound 규칙 | inbound 규칙 |
//! | 네트워크 ACL | egress 항목 | ingress 항목 |
//!
//! 응답 방향은 반대쪽 규칙 집합을 같은 상대편에 대해 평가합니다.

mod instance;
mod network_acl;
mod security_group;
mod traffic;

use std::net::IpAddr;

use vpcreach_core::topology::Direction;

pub use instance::instance_state_factor;
pub use network_acl::{evaluate_entries, network_acl_factor};
pub use security_group::security_groups_factor;
pub use traffic::rule_traffic;

/// 팩터를 계산하는 지점이 흐름의 어느 쪽인지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// 트래픽을 내보내는 쪽
    Source,
    /// 트래픽을 받는 쪽
    Destination,
}

impl Side {
    /// 정방향 트래픽에 쓰는 규칙 방향
    pub fn forward_direction(self) -> Direction {
        match self {
            Self::Source => Direction::Outbound,
            Self::Destination => Direction::Inbound,
        }
    }

    /// 응답 트래픽에 쓰는 규칙 방향
    pub fn return_direction(self) -> Direction {
        match self {
            Self::Source => Direction::Inbound,
            Self::Destination => Direction::Outbound,
        }
    }
}

/// 규칙과 대조할 상대편
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterpart {
    /// 이 홉에서 관찰되는 상대편 주소
    pub ip: IpAddr,
    /// 상대편 보안 그룹. 주소 변환을 거쳐 신원을 알 수 없으면 `None`.
    pub security_groups: Option<Vec<String>>,
}

impl Counterpart {
    /// 주소만 아는 상대편
    pub fn address(ip: IpAddr) -> Self {
        Self {
            ip,
            security_groups: None,
        }
    }

    pub fn with_security_groups(ip: IpAddr, groups: Vec<String>) -> Self {
        Self {
            ip,
            security_groups: Some(groups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_directions_are_opposite() {
        for side in [Side::Source, Side::Destination] {
            assert_ne!(side.forward_direction(), side.return_direction());
        }
        assert_eq!(Side::Source.forward_direction(), Direction::Outbound);
    }
}
