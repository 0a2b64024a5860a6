//! JSON shapes printed by `aws ... --output json`.

use std::net::IpAddr;

use serde::Deserialize;

use crate::instance::{Instance, InstanceState, Reservation};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeInstancesOutput {
    #[serde(default)]
    pub(super) reservations: Vec<AwsReservation>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AwsReservation {
    #[serde(default)]
    pub(super) instances: Vec<AwsInstance>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AwsInstance {
    pub(super) instance_id: String,
    pub(super) state: AwsInstanceState,
    #[serde(default)]
    pub(super) public_ip_address: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AwsInstanceState {
    pub(super) name: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeInstanceAttributeOutput {
    pub(super) disable_api_termination: AttributeBooleanValue,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AttributeBooleanValue {
    #[serde(default)]
    pub(super) value: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeStacksOutput {
    #[serde(default)]
    pub(super) stacks: Vec<AwsStack>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AwsStack {
    pub(super) stack_name: String,
    pub(super) stack_status: String,
}

impl AwsInstance {
    /// Converts into the domain snapshot, rejecting a garbled address.
    pub(super) fn into_instance(self) -> Result<Instance, String> {
        let public_ip = self
            .public_ip_address
            .map(|raw| {
                raw.parse::<IpAddr>()
                    .map_err(|err| format!("invalid PublicIpAddress {raw:?}: {err}"))
            })
            .transpose()?;
        Ok(Instance {
            id: self.instance_id,
            state: InstanceState::from_name(&self.state.name),
            public_ip,
        })
    }
}

impl AwsReservation {
    pub(super) fn into_reservation(self) -> Result<Reservation, String> {
        let instances = self
            .instances
            .into_iter()
            .map(AwsInstance::into_instance)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reservation { instances })
    }
}
