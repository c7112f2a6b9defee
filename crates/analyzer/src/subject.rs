//! 대상 식별자 해석
//!
//! 사용자가 입력한 source/destination 문자열을 [`NetworkPoint`] 목록으로 바꿉니다.
//!
//! - 명시적 형식 `<type>:<identifier>` (`ip`, `host`, `ec2`)
//! - 암묵적 형식: IP 주소 → 호스트 이름 → 인스턴스 퍼지 일치 순서로 시도
//!
//! 퍼지 일치 순서는 ID 완전 일치, ID 접두어, Name 태그 완전 일치,
//! Name 태그 접두어입니다. 각 단계에서 정확히 하나만 일치해야 하며, 둘 이상이면
//! 후보를 나열한 [`SubjectError::Ambiguous`]를 돌려줍니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;

use tracing::debug;

use crate::collection::CachedProvider;
use crate::error::{AnalyzerError, SubjectError};
use crate::point::NetworkPoint;
use crate::provider::ResourceProvider;
use crate::resource::{Instance, NetworkInterface};

/// 대상의 역할
///
/// 닫힌 열거형이라 잘못된 역할은 만들 수 없습니다. CLI 는 위치 인자로 역할을 정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// 파싱된 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// `ip:<addr>` 또는 주소 리터럴
    Ip(IpAddr),
    /// `host:<name>`
    Host(String),
    /// `ec2:<id-or-name>`
    Instance(String),
    /// 타입 없는 문자열. 호스트 이름, 인스턴스 순서로 시도합니다.
    Implicit(String),
}

/// 역할이 붙은 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub role: Role,
    pub identifier: Identifier,
}

impl Subject {
    pub fn parse(role: Role, input: &str) -> Result<Self, SubjectError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SubjectError::EmptyIdentifier {
                role: role.to_string(),
            });
        }
        if let Ok(ip) = input.parse::<IpAddr>() {
            return Ok(Self {
                role,
                identifier: Identifier::Ip(ip),
            });
        }

        let identifier = match input.split_once(':') {
            Some((prefix, rest)) => {
                let rest = rest.trim();
                if rest.is_empty() {
                    return Err(SubjectError::EmptyIdentifier {
                        role: role.to_string(),
                    });
                }
                match prefix.to_ascii_lowercase().as_str() {
                    "ip" => Identifier::Ip(
                        rest.parse()
                            .map_err(|_| SubjectError::InvalidAddress(rest.to_owned()))?,
                    ),
                    "host" => Identifier::Host(rest.to_owned()),
                    "ec2" => Identifier::Instance(rest.to_owned()),
                    other => return Err(SubjectError::UnknownType(other.to_owned())),
                }
            }
            None => Identifier::Implicit(input.to_owned()),
        };
        Ok(Self { role, identifier })
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Ip(ip) => write!(f, "{} ip:{ip}", self.role),
            Identifier::Host(host) => write!(f, "{} host:{host}", self.role),
            Identifier::Instance(id) => write!(f, "{} ec2:{id}", self.role),
            Identifier::Implicit(s) => write!(f, "{} {s}", self.role),
        }
    }
}

/// 호스트 이름 조회
pub trait HostResolver: Send + Sync + 'static {
    fn lookup(&self, host: &str)
    -> impl Future<Output = Result<Vec<IpAddr>, SubjectError>> + Send;
}

/// 시스템 DNS 조회
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl HostResolver for DnsResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, SubjectError> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| SubjectError::HostLookup {
                host: host.to_owned(),
                reason: e.to_string(),
            })?;
        let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }
}

/// 고정 테이블 조회 (오프라인 스냅샷, 테스트)
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, ips: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase(), ips);
        self
    }
}

impl HostResolver for StaticResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, SubjectError> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| SubjectError::HostLookup {
                host: host.to_owned(),
                reason: "unknown host".to_owned(),
            })
    }
}

/// 대상을 끝점 목록으로 해석합니다.
pub async fn resolve<P, H>(
    subject: &Subject,
    provider: &CachedProvider<P>,
    hosts: &H,
) -> Result<Vec<NetworkPoint>, AnalyzerError>
where
    P: ResourceProvider,
    H: HostResolver,
{
    let points = match &subject.identifier {
        Identifier::Ip(ip) => vec![resolve_ip(provider, *ip).await?],
        Identifier::Host(host) => resolve_host(provider, hosts, host).await?,
        Identifier::Instance(query) => {
            let instance = find_instance(provider, query).await?;
            instance_points(provider, &instance).await?
        }
        Identifier::Implicit(input) => match hosts.lookup(input).await {
            Ok(ips) if !ips.is_empty() => resolve_ips(provider, &ips).await?,
            _ => {
                debug!(input = input.as_str(), "not a resolvable host, trying instances");
                let instance = find_instance(provider, input).await?;
                instance_points(provider, &instance).await?
            }
        },
    };

    if points.is_empty() {
        return Err(SubjectError::NotFound {
            identifier: subject.to_string(),
        }
        .into());
    }
    debug!(subject = %subject, points = points.len(), "subject resolved");
    Ok(points)
}

async fn resolve_host<P: ResourceProvider, H: HostResolver>(
    provider: &CachedProvider<P>,
    hosts: &H,
    host: &str,
) -> Result<Vec<NetworkPoint>, AnalyzerError> {
    let ips = hosts.lookup(host).await?;
    resolve_ips(provider, &ips).await
}

async fn resolve_ips<P: ResourceProvider>(
    provider: &CachedProvider<P>,
    ips: &[IpAddr],
) -> Result<Vec<NetworkPoint>, AnalyzerError> {
    let mut points = Vec::with_capacity(ips.len());
    for ip in ips {
        points.push(resolve_ip(provider, *ip).await?);
    }
    Ok(points)
}

/// 주소를 가진 인터페이스가 있으면 그 인터페이스, 없으면 외부 주소
async fn resolve_ip<P: ResourceProvider>(
    provider: &CachedProvider<P>,
    ip: IpAddr,
) -> Result<NetworkPoint, AnalyzerError> {
    let interfaces = provider.network_interfaces().await?;
    if let Some(eni) = interfaces.iter().find(|eni| eni.owns(ip)) {
        return Ok(NetworkPoint::interface(provider.domain(), eni, ip));
    }
    let by_public = interfaces
        .iter()
        .find(|eni| eni.public_ip == Some(ip))
        .and_then(|eni| eni.private_ips.first().map(|private| (eni, *private)));
    if let Some((eni, private)) = by_public {
        return Ok(NetworkPoint::interface(provider.domain(), eni, private));
    }
    Ok(NetworkPoint::external(provider.domain(), ip))
}

/// 인스턴스 퍼지 일치
async fn find_instance<P: ResourceProvider>(
    provider: &CachedProvider<P>,
    query: &str,
) -> Result<Instance, AnalyzerError> {
    let instances = provider.instances().await?;
    if let Some(exact) = instances.iter().find(|i| i.id == query) {
        return Ok(exact.clone());
    }

    let by_id: Vec<&Instance> = instances.iter().filter(|i| i.id.starts_with(query)).collect();
    if let Some(found) = unique(query, by_id)? {
        return Ok(found);
    }
    let by_name: Vec<&Instance> = instances
        .iter()
        .filter(|i| i.name.as_deref() == Some(query))
        .collect();
    if let Some(found) = unique(query, by_name)? {
        return Ok(found);
    }
    let by_name_prefix: Vec<&Instance> = instances
        .iter()
        .filter(|i| i.name.as_deref().is_some_and(|n| n.starts_with(query)))
        .collect();
    if let Some(found) = unique(query, by_name_prefix)? {
        return Ok(found);
    }

    Err(SubjectError::NotFound {
        identifier: query.to_owned(),
    }
    .into())
}

/// 일치가 없으면 `None`, 하나면 그 인스턴스, 둘 이상이면 모호함 에러
fn unique(query: &str, hits: Vec<&Instance>) -> Result<Option<Instance>, SubjectError> {
    match hits.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some((*one).clone())),
        many => {
            let mut candidates: Vec<String> = many.iter().map(|i| i.id.clone()).collect();
            candidates.sort();
            Err(SubjectError::Ambiguous {
                identifier: query.to_owned(),
                candidates,
            })
        }
    }
}

/// 인스턴스의 모든 인터페이스 주소
async fn instance_points<P: ResourceProvider>(
    provider: &CachedProvider<P>,
    instance: &Instance,
) -> Result<Vec<NetworkPoint>, AnalyzerError> {
    let interfaces: Vec<NetworkInterface> = if instance.network_interfaces.is_empty() {
        provider
            .network_interfaces()
            .await?
            .into_iter()
            .filter(|eni| eni.instance_id.as_deref() == Some(instance.id.as_str()))
            .collect()
    } else {
        let mut found = Vec::with_capacity(instance.network_interfaces.len());
        for id in &instance.network_interfaces {
            found.push(provider.network_interface(id).await?);
        }
        found
    };

    Ok(interfaces
        .iter()
        .flat_map(|eni| {
            eni.addresses()
                .map(move |ip| NetworkPoint::interface(provider.domain(), eni, ip))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::provider::SnapshotProvider;

    fn provider() -> CachedProvider<SnapshotProvider> {
        let value = json!({
            "resources": [
                {"kind": "ec2-instance", "id": "i-0abc1", "name": "web-1", "state": "running",
                 "network_interfaces": ["eni-1"]},
                {"kind": "ec2-instance", "id": "i-0abc2", "name": "web-2", "state": "running"},
                {"kind": "ec2-instance", "id": "i-0fff", "name": "db", "state": "running"},
                {"kind": "network-interface", "id": "eni-1", "subnet_id": "subnet-1", "vpc_id": "vpc-1",
                 "instance_id": "i-0abc1", "private_ips": ["10.0.0.1"], "public_ip": "54.0.0.1"},
                {"kind": "network-interface", "id": "eni-2", "subnet_id": "subnet-1", "vpc_id": "vpc-1",
                 "instance_id": "i-0abc2", "private_ips": ["10.0.0.2"], "ipv6_addresses": ["2001:db8::2"]},
                {"kind": "network-interface", "id": "eni-3", "subnet_id": "subnet-1", "vpc_id": "vpc-1",
                 "instance_id": "i-0fff", "private_ips": ["10.0.0.3"]}
            ]
        });
        let snapshot = SnapshotProvider::from_json("aws", &value.to_string()).unwrap();
        CachedProvider::new(Arc::new(snapshot), "aws")
    }

    fn subject(input: &str) -> Subject {
        Subject::parse(Role::Source, input).unwrap()
    }

    #[test]
    fn empty_identifier_names_its_role() {
        let err = Subject::parse(Role::Destination, "  ").unwrap_err();
        assert_eq!(
            err,
            SubjectError::EmptyIdentifier {
                role: "destination".to_owned()
            }
        );
        assert_eq!(err.to_string(), "destination identifier is empty");
        let err = Subject::parse(Role::Source, "ec2:").unwrap_err();
        assert!(err.to_string().starts_with("source "));
    }

    #[test]
    fn explicit_and_implicit_forms() {
        assert_eq!(subject("10.0.0.1").identifier, Identifier::Ip("10.0.0.1".parse().unwrap()));
        assert_eq!(subject("ip:::1").identifier, Identifier::Ip("::1".parse().unwrap()));
        assert_eq!(subject("host:example.com").identifier, Identifier::Host("example.com".into()));
        assert_eq!(subject("ec2:web").identifier, Identifier::Instance("web".into()));
        assert_eq!(subject("web").identifier, Identifier::Implicit("web".into()));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            Subject::parse(Role::Destination, "  "),
            Err(SubjectError::EmptyIdentifier { .. })
        ));
        assert!(matches!(
            Subject::parse(Role::Source, "ec2:"),
            Err(SubjectError::EmptyIdentifier { .. })
        ));
        assert!(matches!(
            Subject::parse(Role::Source, "rds:db-1"),
            Err(SubjectError::UnknownType(_))
        ));
        assert!(matches!(
            Subject::parse(Role::Source, "ip:10.0.0.300"),
            Err(SubjectError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn unique_id_prefix_resolves() {
        let provider = provider();
        let points = resolve(&subject("ec2:i-0f"), &provider, &StaticResolver::new())
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].reference.id, "eni-3");
    }

    #[tokio::test]
    async fn shared_id_prefix_is_ambiguous() {
        let provider = provider();
        let err = resolve(&subject("ec2:i-0abc"), &provider, &StaticResolver::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalyzerError::Subject(SubjectError::Ambiguous {
                identifier: "i-0abc".to_owned(),
                candidates: vec!["i-0abc1".to_owned(), "i-0abc2".to_owned()],
            })
        );
    }

    #[tokio::test]
    async fn exact_id_beats_prefix() {
        let provider = provider();
        let points = resolve(&subject("i-0abc1"), &provider, &StaticResolver::new())
            .await
            .unwrap();
        assert_eq!(points[0].instance_id.as_deref(), Some("i-0abc1"));
    }

    #[tokio::test]
    async fn name_match_and_interface_lookup() {
        let provider = provider();
        let points = resolve(&subject("web-2"), &provider, &StaticResolver::new())
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.reference.id == "eni-2"));

        let err = resolve(&subject("web"), &provider, &StaticResolver::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Subject(SubjectError::Ambiguous { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let provider = provider();
        let err = resolve(&subject("ec2:cache"), &provider, &StaticResolver::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Subject(SubjectError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn ip_resolves_to_interface_or_external() {
        let provider = provider();
        let resolver = StaticResolver::new();
        let internal = resolve(&subject("10.0.0.1"), &provider, &resolver).await.unwrap();
        assert_eq!(internal[0].reference.id, "eni-1");

        let public = resolve(&subject("54.0.0.1"), &provider, &resolver).await.unwrap();
        assert_eq!(public[0].ip.to_string(), "10.0.0.1");

        let external = resolve(&subject("8.8.8.8"), &provider, &resolver).await.unwrap();
        assert!(external[0].is_external());
    }

    #[tokio::test]
    async fn host_lookup_before_instance_match() {
        let provider = provider();
        let resolver = StaticResolver::new().with_host("db", vec!["8.8.4.4".parse().unwrap()]);
        let points = resolve(&subject("db"), &provider, &resolver).await.unwrap();
        assert!(points[0].is_external());

        let err = resolve(&subject("host:nowhere"), &provider, &resolver)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Subject(SubjectError::HostLookup { .. })
        ));
    }
}
