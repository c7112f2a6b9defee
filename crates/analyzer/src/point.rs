//! 추적 대상 끝점과 벡터
//!
//! [`NetworkPoint`]는 대상 하나가 해석된 결과(인터페이스 주소 하나 또는 외부
//! 주소)이고, [`NetworkVector`]는 추적할 출발점/도착점 한 쌍입니다.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;
use vpcreach_core::topology::{Edge, IpTuple, ResourceReference};

use crate::resource::{NetworkInterface, kind};

/// 해석된 끝점
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPoint {
    /// 인터페이스 참조 또는 `ip-address` 참조
    pub reference: ResourceReference,
    /// 내부 주소 (외부 끝점이면 그 주소)
    pub ip: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl NetworkPoint {
    /// 모델링된 네트워크 밖의 주소
    pub fn external(domain: &str, ip: IpAddr) -> Self {
        Self {
            reference: ResourceReference::new(domain, kind::IP_ADDRESS, ip.to_string()),
            ip,
            public_ip: None,
            security_groups: Vec::new(),
            vpc_id: None,
            subnet_id: None,
            instance_id: None,
        }
    }

    /// 인터페이스의 주소 하나
    pub fn interface(domain: &str, eni: &NetworkInterface, ip: IpAddr) -> Self {
        Self {
            reference: ResourceReference::new(domain, kind::NETWORK_INTERFACE, eni.id.as_str()),
            ip,
            public_ip: eni.public_ip.filter(|_| ip.is_ipv4()),
            security_groups: eni.security_groups.clone(),
            vpc_id: Some(eni.vpc_id.clone()),
            subnet_id: Some(eni.subnet_id.clone()),
            instance_id: eni.instance_id.clone(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.vpc_id.is_none()
    }

    fn same_family(&self, other: &Self) -> bool {
        self.ip.is_ipv4() == other.ip.is_ipv4()
    }
}

impl fmt::Display for NetworkPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference, self.ip)
    }
}

/// 추적할 끝점 한 쌍
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkVector {
    pub source: NetworkPoint,
    pub destination: NetworkPoint,
}

impl NetworkVector {
    pub fn new(source: NetworkPoint, destination: NetworkPoint) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// 주소 체계가 같고 서로 다른 끝점의 모든 조합
    pub fn between(sources: &[NetworkPoint], destinations: &[NetworkPoint]) -> Vec<Self> {
        sources
            .iter()
            .flat_map(|s| destinations.iter().map(move |d| (s, d)))
            .filter(|(s, d)| s.same_family(d) && s.reference != d.reference)
            .map(|(s, d)| Self::new(s.clone(), d.clone()))
            .collect()
    }

    /// 출발점이 보내는 패킷의 목적지 주소
    ///
    /// 다른 VPC 나 외부에서 들어오는 경우 도착점의 공인 주소로 보냅니다.
    pub fn destination_address(&self) -> IpAddr {
        let crosses = self.source.is_external() || self.source.vpc_id != self.destination.vpc_id;
        match self.destination.public_ip {
            Some(public) if crosses && !self.destination.is_external() => public,
            _ => self.destination.ip,
        }
    }

    /// 추적 시작 엣지 (출발 참조로 들어가는 가상의 엣지)
    pub fn start_edge(&self) -> Edge {
        Edge::new(
            IpTuple::new(self.source.ip, self.destination_address()),
            self.source.reference.clone(),
            false,
        )
    }
}

impl fmt::Display for NetworkVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}
