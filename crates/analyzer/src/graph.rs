//! AWS 리소스 위의 추적 그래프
//!
//! [`AwsGraph`]는 벡터 하나에 대한 [`TraceSource`]입니다. 엣지의 도착 참조
//! 종류에 따라 노드를 만들고, 노드마다 팩터와 다음 홉을 계산합니다.
//!
//! | 노드 | 팩터 | 다음 홉 |
//! |------|------|---------|
//! | 인터페이스 (출발) | 인스턴스 상태, SG outbound | 자기 서브넷 |
//! | 인터페이스 (도착) | 인스턴스 상태, SG inbound | 목적지면 끝, 어플라이언스면 자기 서브넷 |
//! | 서브넷 (나감) | egress NACL | 라우트 테이블 최장 접두어 일치 |
//! | 서브넷 (들어옴) | ingress NACL | 목적지 주소를 가진 인터페이스 |
//! | 인터넷 게이트웨이 | 없음 | 1:1 주소 변환 후 외부 주소 또는 서브넷 |
//! | NAT 게이트웨이 | 자기 서브넷 NACL 양방향 | 출발지 주소 변환 후 라우팅 |
//! | 외부 주소 | 없음 | 목적지 VPC 의 인터넷 게이트웨이 |
//!
//! 같은 서브넷 안의 통신은 NACL 을 거치지 않습니다.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;
use vpcreach_core::error::TopologyError;
use vpcreach_core::topology::{Edge, Factor, IpTuple, ResourceReference};

use crate::collection::CachedProvider;
use crate::error::{AnalyzerError, ProviderError};
use crate::point::{NetworkPoint, NetworkVector};
use crate::provider::ResourceProvider;
use crate::resource::{NetworkInterface, RouteTarget, Subnet, kind};
use crate::rule::{
    Counterpart, Side, instance_state_factor, network_acl_factor, security_groups_factor,
};
use crate::tracer::{TraceSource, Traceable};

struct Context<P> {
    provider: Arc<CachedProvider<P>>,
    vector: NetworkVector,
}

/// 벡터 하나에 대한 AWS 추적 그래프
pub struct AwsGraph<P> {
    ctx: Arc<Context<P>>,
}

impl<P: ResourceProvider> AwsGraph<P> {
    pub fn new(provider: Arc<CachedProvider<P>>, vector: NetworkVector) -> Self {
        Self {
            ctx: Arc::new(Context { provider, vector }),
        }
    }
}

enum NodeKind {
    /// 트래픽을 내보내는 인터페이스
    Departing(NetworkInterface),
    /// 트래픽을 받는 인터페이스
    Arriving(NetworkInterface),
    /// 서브넷 밖으로 라우팅
    Leaving(Subnet),
    /// 서브넷 안의 인터페이스로 전달
    Entering(Subnet),
    /// 다음 홉이 로드 시점에 정해지는 노드 (게이트웨이)
    Fixed(Result<Vec<Edge>, String>),
    /// 외부 주소
    External,
}

/// AWS 그래프 노드
pub struct AwsNode<P> {
    ctx: Arc<Context<P>>,
    reference: ResourceReference,
    tuple: IpTuple,
    factors: Vec<Factor>,
    divider: bool,
    kind: NodeKind,
}

impl<P: ResourceProvider> Traceable for AwsNode<P> {
    fn reference(&self) -> &ResourceReference {
        &self.reference
    }

    /// 서브넷만 같은 경로에 다시 나올 수 있습니다 (같은 서브넷으로 나갔다가
    /// 어플라이언스를 거쳐 돌아오는 경우). 다른 노드는 경로 전체 기준으로
    /// 루프를 판정하며, 서브넷 재방문의 길이는 `max_hops` 로 제한됩니다.
    fn visitable(&self, already_visited: bool) -> bool {
        !already_visited || matches!(self.kind, NodeKind::Leaving(_) | NodeKind::Entering(_))
    }

    fn segments(&self) -> bool {
        self.divider
    }

    fn factors(&self) -> &[Factor] {
        &self.factors
    }

    async fn forward_edges(&self) -> Result<Vec<Edge>, AnalyzerError> {
        let edges = match &self.kind {
            NodeKind::Departing(eni) => vec![self.ctx.subnet_edge(self.tuple, &eni.subnet_id)],
            NodeKind::Arriving(eni) if !eni.source_dest_check => {
                vec![self.ctx.subnet_edge(self.tuple, &eni.subnet_id)]
            }
            NodeKind::Arriving(eni) => {
                return Err(self.dead_end(format!(
                    "{} does not own {} and source/destination check is enabled",
                    eni.id, self.tuple.dst
                )));
            }
            NodeKind::Leaving(subnet) => self.ctx.route(subnet, self.tuple).await?,
            NodeKind::Entering(subnet) => self.ctx.deliver(subnet, self.tuple).await?,
            NodeKind::Fixed(Ok(edges)) => edges.clone(),
            NodeKind::Fixed(Err(reason)) => return Err(self.dead_end(reason.clone())),
            NodeKind::External => self.ctx.enter_destination_vpc(self.tuple).await?,
        };
        debug!(reference = %self.reference, edges = edges.len(), "forward edges");
        Ok(edges)
    }
}

impl<P> AwsNode<P> {
    fn dead_end(&self, reason: String) -> AnalyzerError {
        TopologyError::DeadEnd {
            reference: self.reference.to_string(),
            reason,
        }
        .into()
    }
}

impl<P: ResourceProvider> TraceSource for AwsGraph<P> {
    type Node = AwsNode<P>;

    async fn load(
        &self,
        edge: &Edge,
        previous: Option<&ResourceReference>,
    ) -> Result<AwsNode<P>, AnalyzerError> {
        let (tuple, factors, divider, kind) = match edge.end.kind.as_str() {
            kind::NETWORK_INTERFACE => self.ctx.load_interface(edge).await,
            kind::SUBNET => self.ctx.load_subnet(edge, previous).await,
            kind::INTERNET_GATEWAY => self.ctx.load_internet_gateway(edge, previous).await,
            kind::NAT_GATEWAY => self.ctx.load_nat_gateway(edge).await,
            kind::IP_ADDRESS => Ok((edge.tuple, Vec::new(), false, NodeKind::External)),
            other => Err(AnalyzerError::Resource {
                reference: edge.end.to_string(),
                reason: format!("kind '{other}' cannot be traced"),
            }),
        }
        .map_err(missing_as_topology)?;

        Ok(AwsNode {
            ctx: self.ctx.clone(),
            reference: edge.end.clone(),
            tuple,
            factors,
            divider,
            kind,
        })
    }
}

/// 다른 리소스가 가리키는 리소스가 없으면 토폴로지 에러로 봅니다.
fn missing_as_topology(err: AnalyzerError) -> AnalyzerError {
    match err {
        AnalyzerError::Provider(ProviderError::NotFound { reference }) => {
            TopologyError::MissingResource { reference }.into()
        }
        other => other,
    }
}

type Loaded = (IpTuple, Vec<Factor>, bool, NodeKind);

impl<P: ResourceProvider> Context<P> {
    fn reference(&self, kind: &str, id: &str) -> ResourceReference {
        self.provider.reference(kind, id)
    }

    fn subnet_edge(&self, tuple: IpTuple, subnet_id: &str) -> Edge {
        Edge::new(tuple, self.reference(kind::SUBNET, subnet_id), false)
    }

    /// 상대편 끝점의 보안 그룹은 주소가 변환되지 않았을 때만 압니다.
    fn counterpart(point: &NetworkPoint, observed: IpAddr) -> Counterpart {
        if !point.is_external() && point.ip == observed {
            Counterpart::with_security_groups(observed, point.security_groups.clone())
        } else {
            Counterpart::address(observed)
        }
    }

    async fn load_interface(&self, edge: &Edge) -> Result<Loaded, AnalyzerError> {
        let eni = self.provider.network_interface(&edge.end.id).await?;
        let departing = !edge.connects_interface;
        let (side, counterpart) = if departing {
            (
                Side::Source,
                Self::counterpart(&self.vector.destination, edge.tuple.dst),
            )
        } else {
            (
                Side::Destination,
                Self::counterpart(&self.vector.source, edge.tuple.src),
            )
        };

        let mut groups = Vec::with_capacity(eni.security_groups.len());
        for id in &eni.security_groups {
            groups.push(self.provider.security_group(id).await?);
        }

        let mut factors = Vec::with_capacity(2);
        if let Some(instance_id) = &eni.instance_id {
            let instance = self.provider.instance(instance_id).await?;
            factors.push(instance_state_factor(
                &instance,
                self.reference(kind::INSTANCE, instance_id),
            ));
        }
        factors.push(security_groups_factor(
            edge.end.clone(),
            &groups,
            side,
            &counterpart,
        )?);

        let kind = if departing {
            NodeKind::Departing(eni)
        } else {
            NodeKind::Arriving(eni)
        };
        Ok((edge.tuple, factors, false, kind))
    }

    async fn load_subnet(
        &self,
        edge: &Edge,
        previous: Option<&ResourceReference>,
    ) -> Result<Loaded, AnalyzerError> {
        let subnet = self.provider.subnet(&edge.end.id).await?;
        let departing = match previous {
            Some(prev) if prev.kind == kind::NETWORK_INTERFACE => {
                self.provider.network_interface(&prev.id).await?.subnet_id == subnet.id
            }
            Some(prev) if prev.kind == kind::NAT_GATEWAY => {
                self.provider.nat_gateway(&prev.id).await?.subnet_id == subnet.id
            }
            _ => false,
        };
        let tuple = edge.tuple;

        if departing && subnet.contains(tuple.dst)? {
            debug!(subnet = subnet.id.as_str(), "intra-subnet traffic skips network acl");
            return Ok((tuple, Vec::new(), false, NodeKind::Entering(subnet)));
        }

        let (side, counterpart) = if departing {
            (Side::Source, tuple.dst)
        } else {
            (Side::Destination, tuple.src)
        };
        let mut factors = Vec::new();
        if let Some(acl_id) = &subnet.network_acl_id {
            let acl = self.provider.network_acl(acl_id).await?;
            factors.push(network_acl_factor(
                &acl,
                edge.end.clone(),
                side,
                counterpart,
            )?);
        }

        let kind = if departing {
            NodeKind::Leaving(subnet)
        } else {
            NodeKind::Entering(subnet)
        };
        Ok((tuple, factors, false, kind))
    }

    async fn load_internet_gateway(
        &self,
        edge: &Edge,
        previous: Option<&ResourceReference>,
    ) -> Result<Loaded, AnalyzerError> {
        let igw = self.provider.internet_gateway(&edge.end.id).await?;
        let outbound = previous.is_some_and(|p| p.kind != kind::IP_ADDRESS);
        let tuple = edge.tuple;

        if outbound {
            let translated = match self.public_address_of(tuple.src).await? {
                Some(public) => IpTuple::new(public, tuple.dst),
                None => {
                    let reason = format!("{} has no public address", tuple.src);
                    return Ok((tuple, Vec::new(), false, NodeKind::Fixed(Err(reason))));
                }
            };
            let next = Edge::new(
                translated,
                self.reference(kind::IP_ADDRESS, &translated.dst.to_string()),
                false,
            );
            let divider = translated != tuple;
            return Ok((translated, Vec::new(), divider, NodeKind::Fixed(Ok(vec![next]))));
        }

        let Some(vpc_id) = igw.vpc_id.as_deref() else {
            let reason = format!("{} is not attached to a vpc", igw.id);
            return Ok((tuple, Vec::new(), false, NodeKind::Fixed(Err(reason))));
        };
        let owner = self
            .provider
            .network_interfaces()
            .await?
            .into_iter()
            .find(|eni| {
                eni.vpc_id == vpc_id && (eni.public_ip == Some(tuple.dst) || eni.owns(tuple.dst))
            });
        let Some(eni) = owner else {
            let reason = format!("no interface in {vpc_id} answers for {}", tuple.dst);
            return Ok((tuple, Vec::new(), false, NodeKind::Fixed(Err(reason))));
        };

        let private = if eni.owns(tuple.dst) {
            tuple.dst
        } else if eni.owns(self.vector.destination.ip) {
            self.vector.destination.ip
        } else {
            match eni.private_ips.first() {
                Some(ip) => *ip,
                None => {
                    let reason = format!("{} has no private address", eni.id);
                    return Ok((tuple, Vec::new(), false, NodeKind::Fixed(Err(reason))));
                }
            }
        };
        let translated = IpTuple::new(tuple.src, private);
        let next = self.subnet_edge(translated, &eni.subnet_id);
        let divider = translated != tuple;
        Ok((translated, Vec::new(), divider, NodeKind::Fixed(Ok(vec![next]))))
    }

    async fn load_nat_gateway(&self, edge: &Edge) -> Result<Loaded, AnalyzerError> {
        let nat = self.provider.nat_gateway(&edge.end.id).await?;
        let subnet = self.provider.subnet(&nat.subnet_id).await?;
        let tuple = edge.tuple;

        if nat.private_ip.is_ipv4() != tuple.dst.is_ipv4() {
            let reason = format!("{} cannot translate {}", nat.id, tuple.dst);
            return Ok((tuple, Vec::new(), false, NodeKind::Fixed(Err(reason))));
        }
        let translated = IpTuple::new(nat.private_ip, tuple.dst);

        let mut factors = Vec::new();
        if let Some(acl_id) = &subnet.network_acl_id {
            let acl = self.provider.network_acl(acl_id).await?;
            let subnet_ref = self.reference(kind::SUBNET, &subnet.id);
            factors.push(network_acl_factor(
                &acl,
                subnet_ref.clone(),
                Side::Destination,
                tuple.src,
            )?);
            factors.push(network_acl_factor(
                &acl,
                subnet_ref,
                Side::Source,
                translated.dst,
            )?);
        }

        let edges = self.route(&subnet, translated).await?;
        Ok((translated, factors, true, NodeKind::Fixed(Ok(edges))))
    }

    /// 서브넷 라우트 테이블(없으면 VPC 기본 테이블)에서 다음 홉을 찾습니다.
    async fn route(&self, subnet: &Subnet, tuple: IpTuple) -> Result<Vec<Edge>, AnalyzerError> {
        let table_id = match &subnet.route_table_id {
            Some(id) => id.clone(),
            None => self.provider.vpc(&subnet.vpc_id).await?.main_route_table_id,
        };
        let table = self.provider.route_table(&table_id).await?;
        let subnet_ref = self.reference(kind::SUBNET, &subnet.id);
        let dead_end = |reason: String| -> AnalyzerError {
            TopologyError::DeadEnd {
                reference: subnet_ref.to_string(),
                reason,
            }
            .into()
        };

        let Some(route) = table.lookup(tuple.dst)? else {
            return Err(dead_end(format!("{} has no route to {}", table.id, tuple.dst)));
        };
        debug!(table = table.id.as_str(), destination = route.destination.as_str(), "route");

        let edge = match &route.target {
            RouteTarget::Local => {
                let target = self
                    .provider
                    .subnets_in(&subnet.vpc_id)
                    .await?
                    .into_iter()
                    .map(|s| s.contains(tuple.dst).map(|hit| hit.then_some(s)))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .flatten()
                    .next();
                match target {
                    Some(target) => self.subnet_edge(tuple, &target.id),
                    None => {
                        return Err(dead_end(format!(
                            "no subnet in {} contains {}",
                            subnet.vpc_id, tuple.dst
                        )));
                    }
                }
            }
            RouteTarget::InternetGateway(id) => {
                Edge::new(tuple, self.reference(kind::INTERNET_GATEWAY, id), false)
            }
            RouteTarget::NatGateway(id) => {
                Edge::new(tuple, self.reference(kind::NAT_GATEWAY, id), false)
            }
            RouteTarget::NetworkInterface(id) => {
                Edge::new(tuple, self.reference(kind::NETWORK_INTERFACE, id), true)
            }
            RouteTarget::Blackhole => {
                return Err(dead_end(format!(
                    "route {} in {} is a blackhole",
                    route.destination, table.id
                )));
            }
        };
        Ok(vec![edge])
    }

    /// 서브넷 안에서 목적지 주소를 가진 인터페이스로 전달합니다.
    async fn deliver(&self, subnet: &Subnet, tuple: IpTuple) -> Result<Vec<Edge>, AnalyzerError> {
        let edges: Vec<Edge> = self
            .provider
            .network_interfaces()
            .await?
            .into_iter()
            .filter(|eni| eni.subnet_id == subnet.id && eni.owns(tuple.dst))
            .map(|eni| Edge::new(tuple, self.reference(kind::NETWORK_INTERFACE, &eni.id), true))
            .collect();
        if edges.is_empty() {
            return Err(TopologyError::DeadEnd {
                reference: self.reference(kind::SUBNET, &subnet.id).to_string(),
                reason: format!("no interface in {} owns {}", subnet.id, tuple.dst),
            }
            .into());
        }
        Ok(edges)
    }

    /// 외부 주소에서 목적지 VPC 의 인터넷 게이트웨이로 들어갑니다.
    async fn enter_destination_vpc(&self, tuple: IpTuple) -> Result<Vec<Edge>, AnalyzerError> {
        let destination = &self.vector.destination;
        let addressed = destination.public_ip == Some(tuple.dst)
            || (tuple.dst.is_ipv6() && destination.ip == tuple.dst);
        let dead_end = |reason: String| -> AnalyzerError {
            TopologyError::DeadEnd {
                reference: self.reference(kind::IP_ADDRESS, &tuple.src.to_string()).to_string(),
                reason,
            }
            .into()
        };

        let vpc_id = match &destination.vpc_id {
            Some(vpc_id) if addressed => vpc_id,
            _ => {
                return Err(dead_end(format!(
                    "{} is outside the modelled network",
                    tuple.dst
                )));
            }
        };
        match self.provider.internet_gateway_of(vpc_id).await? {
            Some(igw) => Ok(vec![Edge::new(
                tuple,
                self.reference(kind::INTERNET_GATEWAY, &igw.id),
                false,
            )]),
            None => Err(dead_end(format!("{vpc_id} has no internet gateway"))),
        }
    }

    /// 내부 주소의 공인 주소 (인터페이스 또는 NAT 게이트웨이). IPv6 는 그대로.
    async fn public_address_of(&self, ip: IpAddr) -> Result<Option<IpAddr>, AnalyzerError> {
        if ip.is_ipv6() {
            return Ok(Some(ip));
        }
        let interfaces = self.provider.network_interfaces().await?;
        if let Some(eni) = interfaces.iter().find(|eni| eni.owns(ip)) {
            return Ok(eni.public_ip);
        }
        if interfaces.iter().any(|eni| eni.public_ip == Some(ip)) {
            return Ok(Some(ip));
        }
        let nat = self
            .provider
            .nat_gateways()
            .await?
            .into_iter()
            .find(|nat| nat.private_ip == ip);
        Ok(nat.and_then(|nat| nat.public_ip))
    }
}
