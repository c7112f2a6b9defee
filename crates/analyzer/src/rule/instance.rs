//! 인스턴스 실행 상태 팩터

use vpcreach_core::topology::{Factor, FactorKind, ResourceReference};
use vpcreach_core::traffic::TrafficContent;

use crate::resource::Instance;

const RUNNING: &str = "running";

/// 실행 중이면 양방향 모두 허용, 아니면 양방향 모두 차단
pub fn instance_state_factor(instance: &Instance, resource: ResourceReference) -> Factor {
    if instance.state.eq_ignore_ascii_case(RUNNING) {
        return Factor::new(
            FactorKind::InstanceState,
            resource,
            TrafficContent::all(),
            TrafficContent::all(),
        );
    }
    Factor::new(
        FactorKind::InstanceState,
        resource,
        TrafficContent::none(),
        TrafficContent::none(),
    )
    .with_note(format!("instance {} is {}", instance.id, instance.state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(state: &str) -> Instance {
        Instance {
            id: "i-1".to_owned(),
            name: None,
            state: state.to_owned(),
            network_interfaces: Vec::new(),
        }
    }

    fn reference() -> ResourceReference {
        ResourceReference::new("aws", "ec2-instance", "i-1")
    }

    #[test]
    fn running_allows_everything() {
        let factor = instance_state_factor(&instance("running"), reference());
        assert!(factor.traffic_forward.is_all());
        assert!(factor.traffic_return.is_all());
        assert!(factor.notes.is_empty());
    }

    #[test]
    fn stopped_blocks_and_explains() {
        let factor = instance_state_factor(&instance("stopped"), reference());
        assert!(factor.traffic_forward.is_none());
        assert!(factor.traffic_return.is_none());
        assert!(factor.notes[0].contains("stopped"));
    }
}
