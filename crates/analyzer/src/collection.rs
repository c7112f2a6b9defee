//! 분석 1회 단위 리소스 컬렉션과 캐시 프로바이더
//!
//! [`ResourceCollection`]은 `domain → kind → id → Resource` 저장소입니다.
//! [`CachedProvider`]는 컬렉션을 `RwLock` 뒤에 두고, 읽기는 동시에,
//! 처음 조회한 리소스의 기록은 직렬로 처리합니다. 전역 캐시는 없으며
//! 분석마다 새 컬렉션을 만듭니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use vpcreach_core::metrics as m;
use vpcreach_core::topology::ResourceReference;

use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::resource::{
    Instance, InternetGateway, NatGateway, NetworkAcl, NetworkInterface, Resource, RouteTable,
    SecurityGroup, Subnet, Vpc, kind,
};

/// `domain → kind → id → Resource`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceCollection {
    resources: BTreeMap<String, BTreeMap<String, BTreeMap<String, Resource>>>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: &str, resource: Resource) {
        self.resources
            .entry(domain.to_owned())
            .or_default()
            .entry(resource.kind().to_owned())
            .or_default()
            .insert(resource.id().to_owned(), resource);
    }

    pub fn get(&self, reference: &ResourceReference) -> Option<&Resource> {
        self.resources
            .get(&reference.domain)?
            .get(&reference.kind)?
            .get(&reference.id)
    }

    /// 다른 컬렉션의 리소스를 덮어써 합칩니다.
    pub fn merge(&mut self, other: ResourceCollection) {
        for (domain, kinds) in other.resources {
            let target = self.resources.entry(domain).or_default();
            for (kind, ids) in kinds {
                target.entry(kind).or_default().extend(ids);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.resources
            .values()
            .flat_map(|kinds| kinds.values())
            .map(|ids| ids.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 모든 리소스와 그 참조
    pub fn iter(&self) -> impl Iterator<Item = (ResourceReference, &Resource)> {
        self.resources.iter().flat_map(|(domain, kinds)| {
            kinds.iter().flat_map(move |(kind, ids)| {
                ids.iter()
                    .map(move |(id, r)| (ResourceReference::new(domain, kind, id), r))
            })
        })
    }
}

macro_rules! typed_accessor {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub async fn $name(&self, id: &str) -> Result<$ty, ProviderError> {
            let reference = self.reference($kind, id);
            match self.get(&reference).await? {
                Resource::$variant(inner) => Ok(inner),
                _ => Err(ProviderError::NotFound {
                    reference: reference.to_string(),
                }),
            }
        }
    };
}

/// 컬렉션을 캐시로 쓰는 프로바이더 래퍼
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: Arc<P>,
    domain: String,
    collection: RwLock<ResourceCollection>,
    listed: RwLock<HashMap<String, Vec<Resource>>>,
}

impl<P: ResourceProvider> CachedProvider<P> {
    pub fn new(inner: Arc<P>, domain: impl Into<String>) -> Self {
        Self {
            inner,
            domain: domain.into(),
            collection: RwLock::new(ResourceCollection::new()),
            listed: RwLock::new(HashMap::new()),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn reference(&self, kind: &str, id: &str) -> ResourceReference {
        ResourceReference::new(self.domain.as_str(), kind, id)
    }

    /// 캐시에서 찾고, 없으면 프로바이더에서 가져와 기록합니다.
    pub async fn get(&self, reference: &ResourceReference) -> Result<Resource, ProviderError> {
        if let Some(found) = self.collection.read().await.get(reference) {
            metrics::counter!(
                m::PROVIDER_FETCHES_TOTAL,
                m::LABEL_KIND => reference.kind.clone(),
                m::LABEL_RESULT => "hit"
            )
            .increment(1);
            return Ok(found.clone());
        }

        match self.inner.fetch(reference).await {
            Ok(resource) => {
                metrics::counter!(
                    m::PROVIDER_FETCHES_TOTAL,
                    m::LABEL_KIND => reference.kind.clone(),
                    m::LABEL_RESULT => "miss"
                )
                .increment(1);
                debug!(reference = %reference, "resource cached");
                self.collection
                    .write()
                    .await
                    .insert(&reference.domain, resource.clone());
                Ok(resource)
            }
            Err(e) => {
                metrics::counter!(
                    m::PROVIDER_FETCHES_TOTAL,
                    m::LABEL_KIND => reference.kind.clone(),
                    m::LABEL_RESULT => "error"
                )
                .increment(1);
                Err(e)
            }
        }
    }

    /// 한 종류를 모두 조회하고 컬렉션에 기록합니다.
    ///
    /// 종류별 결과는 분석 동안 유지되어 같은 종류를 다시 나열하지 않습니다.
    /// 실패한 나열은 기록하지 않습니다.
    pub async fn list(&self, kind: &str) -> Result<Vec<Resource>, ProviderError> {
        if let Some(found) = self.listed.read().await.get(kind) {
            metrics::counter!(
                m::PROVIDER_FETCHES_TOTAL,
                m::LABEL_KIND => kind.to_owned(),
                m::LABEL_RESULT => "hit"
            )
            .increment(1);
            return Ok(found.clone());
        }

        let resources = self.inner.list(kind).await?;
        {
            let mut collection = self.collection.write().await;
            for resource in &resources {
                collection.insert(&self.domain, resource.clone());
            }
        }
        debug!(kind, count = resources.len(), "kind listed");
        self.listed
            .write()
            .await
            .entry(kind.to_owned())
            .or_insert_with(|| resources.clone());
        Ok(resources)
    }

    /// 지금까지 모은 리소스의 복사본
    pub async fn snapshot(&self) -> ResourceCollection {
        self.collection.read().await.clone()
    }

    typed_accessor!(instance, kind::INSTANCE, Ec2Instance, Instance);
    typed_accessor!(
        network_interface,
        kind::NETWORK_INTERFACE,
        NetworkInterface,
        NetworkInterface
    );
    typed_accessor!(
        security_group,
        kind::SECURITY_GROUP,
        SecurityGroup,
        SecurityGroup
    );
    typed_accessor!(network_acl, kind::NETWORK_ACL, NetworkAcl, NetworkAcl);
    typed_accessor!(subnet, kind::SUBNET, Subnet, Subnet);
    typed_accessor!(vpc, kind::VPC, Vpc, Vpc);
    typed_accessor!(route_table, kind::ROUTE_TABLE, RouteTable, RouteTable);
    typed_accessor!(
        internet_gateway,
        kind::INTERNET_GATEWAY,
        InternetGateway,
        InternetGateway
    );
    typed_accessor!(nat_gateway, kind::NAT_GATEWAY, NatGateway, NatGateway);

    /// 모든 네트워크 인터페이스
    pub async fn network_interfaces(&self) -> Result<Vec<NetworkInterface>, ProviderError> {
        Ok(self
            .list(kind::NETWORK_INTERFACE)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Resource::NetworkInterface(eni) => Some(eni),
                _ => None,
            })
            .collect())
    }

    /// 모든 인스턴스
    pub async fn instances(&self) -> Result<Vec<Instance>, ProviderError> {
        Ok(self
            .list(kind::INSTANCE)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Resource::Ec2Instance(instance) => Some(instance),
                _ => None,
            })
            .collect())
    }

    /// VPC 안의 서브넷
    pub async fn subnets_in(&self, vpc_id: &str) -> Result<Vec<Subnet>, ProviderError> {
        Ok(self
            .list(kind::SUBNET)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Resource::Subnet(subnet) if subnet.vpc_id == vpc_id => Some(subnet),
                _ => None,
            })
            .collect())
    }

    /// VPC 에 붙은 인터넷 게이트웨이
    pub async fn internet_gateway_of(
        &self,
        vpc_id: &str,
    ) -> Result<Option<InternetGateway>, ProviderError> {
        Ok(self
            .list(kind::INTERNET_GATEWAY)
            .await?
            .into_iter()
            .find_map(|r| match r {
                Resource::InternetGateway(igw) if igw.vpc_id.as_deref() == Some(vpc_id) => {
                    Some(igw)
                }
                _ => None,
            }))
    }

    /// 모든 NAT 게이트웨이
    pub async fn nat_gateways(&self) -> Result<Vec<NatGateway>, ProviderError> {
        Ok(self
            .list(kind::NAT_GATEWAY)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Resource::NatGateway(nat) => Some(nat),
                _ => None,
            })
            .collect())
    }
}
