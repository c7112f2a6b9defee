//! 리소스 모델
//!
//! 프로바이더가 돌려주는 AWS 스타일 리소스입니다. 스냅샷 JSON 에서는
//! `kind` 필드로 종류를 구분합니다.
//!
//! ```json
//! { "kind": "subnet", "id": "subnet-1", "vpc_id": "vpc-1", "cidr": "10.0.1.0/24" }
//! ```
//!
//! CIDR 은 문자열 그대로 보관하고 사용할 때 파싱합니다. 잘못된 CIDR 은
//! 스냅샷 로딩이 아니라 규칙 평가 시점에 [`TrafficError::InvalidCidr`]로 드러납니다.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use vpcreach_core::error::TrafficError;
use vpcreach_core::topology::{ResourceReference, RuleAction};

/// 리소스 종류 이름
pub mod kind {
    pub const INSTANCE: &str = "ec2-instance";
    pub const NETWORK_INTERFACE: &str = "network-interface";
    pub const SECURITY_GROUP: &str = "security-group";
    pub const NETWORK_ACL: &str = "network-acl";
    pub const SUBNET: &str = "subnet";
    pub const VPC: &str = "vpc";
    pub const ROUTE_TABLE: &str = "route-table";
    pub const INTERNET_GATEWAY: &str = "internet-gateway";
    pub const NAT_GATEWAY: &str = "nat-gateway";
    /// 모델링된 네트워크 밖의 주소 (저장되는 리소스 없음)
    pub const IP_ADDRESS: &str = "ip-address";
}

/// 스냅샷/프로바이더가 다루는 리소스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Resource {
    Ec2Instance(Instance),
    NetworkInterface(NetworkInterface),
    SecurityGroup(SecurityGroup),
    NetworkAcl(NetworkAcl),
    Subnet(Subnet),
    Vpc(Vpc),
    RouteTable(RouteTable),
    InternetGateway(InternetGateway),
    NatGateway(NatGateway),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ec2Instance(_) => kind::INSTANCE,
            Self::NetworkInterface(_) => kind::NETWORK_INTERFACE,
            Self::SecurityGroup(_) => kind::SECURITY_GROUP,
            Self::NetworkAcl(_) => kind::NETWORK_ACL,
            Self::Subnet(_) => kind::SUBNET,
            Self::Vpc(_) => kind::VPC,
            Self::RouteTable(_) => kind::ROUTE_TABLE,
            Self::InternetGateway(_) => kind::INTERNET_GATEWAY,
            Self::NatGateway(_) => kind::NAT_GATEWAY,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Ec2Instance(r) => &r.id,
            Self::NetworkInterface(r) => &r.id,
            Self::SecurityGroup(r) => &r.id,
            Self::NetworkAcl(r) => &r.id,
            Self::Subnet(r) => &r.id,
            Self::Vpc(r) => &r.id,
            Self::RouteTable(r) => &r.id,
            Self::InternetGateway(r) => &r.id,
            Self::NatGateway(r) => &r.id,
        }
    }

    pub fn reference(&self, domain: &str) -> ResourceReference {
        ResourceReference::new(domain, self.kind(), self.id())
    }
}

/// EC2 인스턴스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// `Name` 태그
    #[serde(default)]
    pub name: Option<String>,
    /// 실행 상태 (`running`, `stopped`, ...)
    pub state: String,
    /// 연결된 네트워크 인터페이스 ID (첫 번째가 기본)
    #[serde(default)]
    pub network_interfaces: Vec<String>,
}

/// 탄력적 네트워크 인터페이스 (ENI)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    pub subnet_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub private_ips: Vec<IpAddr>,
    #[serde(default)]
    pub public_ip: Option<IpAddr>,
    #[serde(default)]
    pub ipv6_addresses: Vec<IpAddr>,
    /// 꺼져 있으면 자기 주소가 아닌 트래픽을 다시 내보낼 수 있음
    #[serde(default = "default_true")]
    pub source_dest_check: bool,
}

fn default_true() -> bool {
    true
}

impl NetworkInterface {
    /// 사설/IPv6 주소 목록
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.private_ips
            .iter()
            .chain(self.ipv6_addresses.iter())
            .copied()
    }

    /// 인터페이스 내부 주소인지 (공인 IP 제외)
    pub fn owns(&self, ip: IpAddr) -> bool {
        self.addresses().any(|a| a == ip)
    }
}

/// 보안 그룹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub vpc_id: String,
    #[serde(default)]
    pub inbound: Vec<SecurityGroupRule>,
    #[serde(default)]
    pub outbound: Vec<SecurityGroupRule>,
}

/// 보안 그룹 규칙
///
/// ICMP 규칙에서는 `from_port` 가 type, `to_port` 가 code 입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// `-1`, `tcp`, `udp`, `icmp`, `icmpv6` 또는 프로토콜 번호
    pub protocol: String,
    #[serde(default)]
    pub from_port: Option<i64>,
    #[serde(default)]
    pub to_port: Option<i64>,
    #[serde(default)]
    pub cidrs: Vec<String>,
    /// 참조하는 보안 그룹 ID
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 네트워크 ACL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAcl {
    pub id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub entries: Vec<NetworkAclEntry>,
}

/// 네트워크 ACL 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAclEntry {
    pub rule_number: u32,
    /// true 면 outbound(egress), false 면 inbound(ingress)
    pub egress: bool,
    pub protocol: String,
    pub action: RuleAction,
    pub cidr: String,
    #[serde(default)]
    pub from_port: Option<i64>,
    #[serde(default)]
    pub to_port: Option<i64>,
    #[serde(default)]
    pub icmp_type: Option<i64>,
    #[serde(default)]
    pub icmp_code: Option<i64>,
}

/// 서브넷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub vpc_id: String,
    pub cidr: String,
    #[serde(default)]
    pub ipv6_cidr: Option<String>,
    /// 명시적으로 연결된 라우트 테이블 (없으면 VPC 기본 테이블)
    #[serde(default)]
    pub route_table_id: Option<String>,
    #[serde(default)]
    pub network_acl_id: Option<String>,
}

impl Subnet {
    /// 서브넷 대역이 주소를 포함하는지
    pub fn contains(&self, ip: IpAddr) -> Result<bool, TrafficError> {
        if parse_cidr(&self.cidr)?.contains(&ip) {
            return Ok(true);
        }
        match &self.ipv6_cidr {
            Some(cidr) => Ok(parse_cidr(cidr)?.contains(&ip)),
            None => Ok(false),
        }
    }
}

/// VPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
    pub main_route_table_id: String,
}

/// 라우트 테이블
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteTable {
    /// 가장 긴 접두어가 일치하는 경로
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<&Route>, TrafficError> {
        let mut best: Option<(u8, &Route)> = None;
        for route in &self.routes {
            let net = parse_cidr(&route.destination)?;
            if net.contains(&ip) && best.is_none_or(|(len, _)| net.prefix_len() > len) {
                best = Some((net.prefix_len(), route));
            }
        }
        Ok(best.map(|(_, route)| route))
    }
}

/// 라우트 한 줄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub destination: String,
    pub target: RouteTarget,
}

/// 라우트 대상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum RouteTarget {
    Local,
    InternetGateway(String),
    NatGateway(String),
    NetworkInterface(String),
    Blackhole,
}

/// 인터넷 게이트웨이
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternetGateway {
    pub id: String,
    #[serde(default)]
    pub vpc_id: Option<String>,
}

/// NAT 게이트웨이
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatGateway {
    pub id: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub private_ip: IpAddr,
    #[serde(default)]
    pub public_ip: Option<IpAddr>,
}

/// CIDR 문자열을 파싱합니다. 접두어 없는 주소는 호스트 대역(/32, /128)으로 봅니다.
pub fn parse_cidr(value: &str) -> Result<IpNet, TrafficError> {
    let trimmed = value.trim();
    if let Ok(net) = trimmed.parse::<IpNet>() {
        return Ok(net);
    }
    trimmed
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|e| TrafficError::InvalidCidr {
            value: value.to_owned(),
            reason: e.to_string(),
        })
}
