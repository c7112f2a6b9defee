//! 트래픽 집합 대수
//!
//! ```text
//! ValueSet (16비트 비트셋)
//!   ├── PortSet   (TCP/UDP 포트)
//!   └── IcmpSet   (type << 8 | code)
//!         └── ProtocolContent (프로토콜 하나)
//!               └── TrafficContent (프로토콜 맵 + All/None 지시자)
//! ```

pub mod content;
pub mod icmp;
pub mod ports;
pub mod protocol;
pub mod value_set;

pub use content::{ALL_TRAFFIC, Indicator, NO_TRAFFIC, TrafficContent};
pub use icmp::{IcmpSet, IcmpVersion};
pub use ports::PortSet;
pub use protocol::{
    PROTO_ICMP, PROTO_ICMPV6, PROTO_TCP, PROTO_UDP, ProtocolContent, protocol_name,
    protocol_number,
};
pub use value_set::ValueSet;
