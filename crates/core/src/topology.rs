//! 토폴로지 타입: 참조, 엣지, 팩터, 포인트, 세그먼트, 경로
//!
//! I/O 없는 순수 데이터입니다. 경로는 NAT 경계마다 세그먼트로 나뉘며,
//! 한 세그먼트 안에서는 같은 흐름의 IP 튜플이 바뀌지 않습니다.
//!
//! ```text
//! Path
//!  ├── Segment (translation 없음)
//!  │     ├── Hop { edge, Point }
//!  │     └── Hop { edge, Point }
//!  └── Segment (NAT 이후)
//!        └── Hop { edge, Point }
//! ```

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::traffic::TrafficContent;

/// 토폴로지 리소스의 안정적인 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceReference {
    /// 제공자 도메인 (예: `aws`)
    pub domain: String,
    /// 리소스 종류 (예: `network-interface`)
    pub kind: String,
    /// 리소스 ID
    pub id: String,
}

impl ResourceReference {
    pub fn new(domain: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.kind, self.id)
    }
}

/// 한 홉에서 관찰되는 IP 쌍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpTuple {
    pub src: IpAddr,
    pub dst: IpAddr,
}

impl IpTuple {
    pub fn new(src: IpAddr, dst: IpAddr) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for IpTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// 방향이 있는 한 홉
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// 이 홉에서의 IP 쌍 (NAT 를 지나면 바뀜)
    pub tuple: IpTuple,
    /// 도착 리소스
    pub end: ResourceReference,
    /// 네트워크 인터페이스로 "들어가는" 홉인지
    pub connects_interface: bool,
}

impl Edge {
    pub fn new(tuple: IpTuple, end: ResourceReference, connects_interface: bool) -> Self {
        Self {
            tuple,
            end,
            connects_interface,
        }
    }
}

/// 규칙 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// 규칙 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// 팩터 설명에 남는 매칭된 규칙 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub direction: Direction,
    pub action: RuleAction,
    /// 사람이 읽을 규칙 설명
    pub description: String,
    /// 이 규칙이 새로 결정한 트래픽
    pub traffic: TrafficContent,
}

/// 팩터 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactorKind {
    /// 인스턴스 실행 상태
    InstanceState,
    /// 보안 그룹
    SecurityGroup,
    /// 네트워크 ACL
    NetworkAcl,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceState => f.write_str("instance-state"),
            Self::SecurityGroup => f.write_str("security-group"),
            Self::NetworkAcl => f.write_str("network-acl"),
        }
    }
}

/// 한 설정 출처가 한 지점에서 트래픽에 미치는 영향
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub kind: FactorKind,
    /// 영향을 준 리소스
    pub resource: ResourceReference,
    /// 정방향(출발지 → 목적지) 허용 트래픽
    pub traffic_forward: TrafficContent,
    /// 응답 방향 허용 트래픽
    pub traffic_return: TrafficContent,
    /// 설명용 매칭 규칙 목록
    #[serde(default)]
    pub matches: Vec<RuleMatch>,
    /// 자유 형식 설명
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Factor {
    pub fn new(
        kind: FactorKind,
        resource: ResourceReference,
        traffic_forward: TrafficContent,
        traffic_return: TrafficContent,
    ) -> Self {
        Self {
            kind,
            resource,
            traffic_forward,
            traffic_return,
            matches: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_matches(mut self, matches: Vec<RuleMatch>) -> Self {
        self.matches = matches;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// 경로 위의 한 지점
///
/// 팩터마다 정방향과 응답 방향 트래픽을 모두 가지므로, 정방향/응답 팩터
/// 목록은 같은 팩터 목록의 두 투영입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub reference: ResourceReference,
    pub factors: Vec<Factor>,
    /// 이 지점에서 주소 변환이 일어나 새 세그먼트가 시작되는지
    pub segment_divider: bool,
}

impl Point {
    pub fn new(reference: ResourceReference, factors: Vec<Factor>, segment_divider: bool) -> Self {
        Self {
            reference,
            factors,
            segment_divider,
        }
    }

    /// 정방향 팩터 트래픽
    pub fn factors_forward(&self) -> impl Iterator<Item = &TrafficContent> {
        self.factors.iter().map(|f| &f.traffic_forward)
    }

    /// 응답 방향 팩터 트래픽
    pub fn factors_return(&self) -> impl Iterator<Item = &TrafficContent> {
        self.factors.iter().map(|f| &f.traffic_return)
    }
}

/// 세그먼트 안의 한 홉. 첫 지점에는 들어오는 엣지가 없을 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub edge: Option<Edge>,
    pub point: Point,
}

/// 주소 변환 없이 이어지는 지점들
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    hops: Vec<Hop>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// 엣지/지점을 덧붙인 새 세그먼트
    pub fn add(&self, edge: Option<Edge>, point: Point) -> Self {
        let mut hops = self.hops.clone();
        hops.push(Hop { edge, point });
        Self { hops }
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.hops.iter().map(|h| &h.point)
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn contains(&self, reference: &ResourceReference) -> bool {
        self.points().any(|p| &p.reference == reference)
    }
}

/// 출발지에서 목적지까지의 경로
///
/// 추적기가 빈 경로에서 시작해 한 홉씩 늘려 가며, 목적지에 닿으면 그대로
/// 결과로 넘깁니다. 확장 연산은 항상 새 경로를 반환합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지점을 덧붙인 새 경로
    ///
    /// `point.segment_divider` 가 참이고 경로가 비어 있지 않으면 새
    /// 세그먼트를 시작합니다.
    pub fn extend(&self, edge: Option<Edge>, point: Point) -> Self {
        let mut segments = self.segments.clone();
        let starts_segment = point.segment_divider || segments.is_empty();
        if starts_segment && segments.last().is_none_or(|s| !s.is_empty()) {
            segments.push(Segment::new().add(edge, point));
        } else if let Some(last) = segments.last_mut() {
            *last = last.add(edge, point);
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 모든 지점 (순서대로)
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.segments.iter().flat_map(|s| s.points())
    }

    /// 어느 세그먼트에든 해당 참조의 지점이 있는지
    pub fn contains(&self, reference: &ResourceReference) -> bool {
        self.segments.iter().any(|s| s.contains(reference))
    }

    /// 지점 수
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.hops().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&Point> {
        self.segments.last().and_then(|s| s.hops().last()).map(|h| &h.point)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments: Vec<String> = self
            .segments
            .iter()
            .map(|s| {
                s.points()
                    .map(|p| p.reference.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect();
        f.write_str(&segments.join(" => "))
    }
}
