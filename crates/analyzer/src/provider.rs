//! 리소스 프로바이더 추상화
//!
//! [`ResourceProvider`] 트레이트는 분석기가 외부 환경에 요구하는 유일한
//! 인터페이스입니다. 운영 환경에서는 클라우드 API 클라이언트가, 테스트와
//! 오프라인 분석에서는 [`SnapshotProvider`]가 구현합니다.
//!
//! ```text
//! ┌──────────────┐
//! │   Analyzer   │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────────┐
//! │ CachedProvider   │ (분석 1회 단위 캐시)
//! └──────┬───────────┘
//!        ▼
//! ┌──────────────────┐
//! │ResourceProvider  │ (trait)
//! └──────────────────┘
//!        │
//!        ▼
//!  SnapshotProvider (JSON)
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vpcreach_core::topology::ResourceReference;

use crate::error::ProviderError;
use crate::resource::Resource;

/// 리소스 조회 트레이트
///
/// `NotFound`, `Unauthorized`, `Transient` 를 구분해서 돌려줘야 하며,
/// 찾지 못한 리소스를 빈 값으로 대신하면 안 됩니다.
pub trait ResourceProvider: Send + Sync + 'static {
    /// 참조 하나를 조회합니다.
    fn fetch(
        &self,
        reference: &ResourceReference,
    ) -> impl Future<Output = Result<Resource, ProviderError>> + Send;

    /// 한 종류의 리소스를 모두 조회합니다.
    fn list(&self, kind: &str) -> impl Future<Output = Result<Vec<Resource>, ProviderError>> + Send;
}

/// 스냅샷 파일 형식
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// JSON 스냅샷 기반 프로바이더
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    domain: String,
    resources: HashMap<(String, String), Resource>,
    denied: HashSet<ResourceReference>,
    throttled: HashSet<ResourceReference>,
}

impl SnapshotProvider {
    pub fn new(domain: impl Into<String>, snapshot: Snapshot) -> Self {
        let mut provider = Self {
            domain: domain.into(),
            resources: HashMap::new(),
            denied: HashSet::new(),
            throttled: HashSet::new(),
        };
        for resource in snapshot.resources {
            provider.insert(resource);
        }
        provider
    }

    /// JSON 문자열에서 생성합니다.
    pub fn from_json(domain: impl Into<String>, json: &str) -> Result<Self, ProviderError> {
        let snapshot: Snapshot = serde_json::from_str(json).map_err(|e| ProviderError::Snapshot {
            path: "<inline>".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(domain, snapshot))
    }

    /// 스냅샷 파일을 읽어 생성합니다.
    pub async fn load(
        domain: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| ProviderError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        info!(
            path = %path.display(),
            resources = snapshot.resources.len(),
            "snapshot loaded"
        );
        Ok(Self::new(domain, snapshot))
    }

    /// 리소스를 추가하거나 교체합니다.
    pub fn insert(&mut self, resource: Resource) {
        let key = (resource.kind().to_owned(), resource.id().to_owned());
        self.resources.insert(key, resource);
    }

    /// 이 참조의 조회를 권한 없음으로 처리합니다.
    pub fn deny(&mut self, reference: ResourceReference) {
        self.denied.insert(reference);
    }

    /// 이 참조의 조회를 일시적 실패로 처리합니다.
    pub fn throttle(&mut self, reference: ResourceReference) {
        self.throttled.insert(reference);
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceProvider for SnapshotProvider {
    async fn fetch(&self, reference: &ResourceReference) -> Result<Resource, ProviderError> {
        if self.denied.contains(reference) {
            return Err(ProviderError::Unauthorized {
                reference: reference.to_string(),
                reason: "access denied by snapshot policy".to_owned(),
            });
        }
        if self.throttled.contains(reference) {
            return Err(ProviderError::Transient {
                reference: reference.to_string(),
                reason: "request throttled by snapshot policy".to_owned(),
            });
        }
        if reference.domain != self.domain {
            return Err(ProviderError::NotFound {
                reference: reference.to_string(),
            });
        }
        let key = (reference.kind.clone(), reference.id.clone());
        let found = self.resources.get(&key).cloned();
        debug!(reference = %reference, found = found.is_some(), "snapshot fetch");
        found.ok_or_else(|| ProviderError::NotFound {
            reference: reference.to_string(),
        })
    }

    async fn list(&self, kind: &str) -> Result<Vec<Resource>, ProviderError> {
        let mut found: Vec<Resource> = self
            .resources
            .iter()
            .filter(|((k, _), _)| k == kind)
            .filter(|(_, r)| !self.denied.contains(&r.reference(&self.domain)))
            .map(|(_, r)| r.clone())
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }
}
