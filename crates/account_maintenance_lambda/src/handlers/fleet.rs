use account_maintenance_core::contract::{
    FleetResponse, FleetSummary, NO_MATCHING_INSTANCES_MESSAGE,
};
use account_maintenance_core::error::ProviderError;
use account_maintenance_core::fleet::{
    FleetAction, InstanceRecord, InstanceSelector, InvalidAction,
};
use account_maintenance_core::pagination::paginate;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::fleet::InstanceFleet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error(transparent)]
    InvalidAction(#[from] InvalidAction),
    #[error("could not list instances: {0}")]
    Listing(#[source] ProviderError),
    #[error("could not {action} instances: {source}")]
    BulkAction {
        action: FleetAction,
        #[source]
        source: ProviderError,
    },
}

/// Entry point for `{"action": "start" | "stop"}` invocations. An invalid
/// action is rejected before any provider call.
pub fn handle_fleet_event(
    event: &Value,
    selector: &InstanceSelector,
    fleet: &impl InstanceFleet,
) -> FleetResponse {
    info!(event = "fleet_request_received", payload = %event, "received fleet request");

    match FleetAction::from_event(event) {
        Ok(action) => set_fleet_power(action, selector, fleet),
        Err(invalid) => into_error_response(FleetError::from(invalid)),
    }
}

pub fn set_fleet_power(
    action: FleetAction,
    selector: &InstanceSelector,
    fleet: &impl InstanceFleet,
) -> FleetResponse {
    match apply_action(action, selector, fleet) {
        Ok(summary) => FleetResponse::Success(summary),
        Err(failure) => into_error_response(failure),
    }
}

fn into_error_response(failure: FleetError) -> FleetResponse {
    error!(event = "fleet_request_failed", error = %failure, "fleet power change failed");
    FleetResponse::Error {
        message: failure.to_string(),
    }
}

fn apply_action(
    action: FleetAction,
    selector: &InstanceSelector,
    fleet: &impl InstanceFleet,
) -> Result<FleetSummary, FleetError> {
    let instances = paginate(|token| fleet.instance_page(selector, token))
        .collect::<Result<Vec<InstanceRecord>, _>>()
        .map_err(FleetError::Listing)?;

    let instance_ids = eligible_instance_ids(instances, selector);
    info!(
        event = "fleet_instances_matched",
        action = %action,
        instances = ?instance_ids,
        "matched instances"
    );

    if instance_ids.is_empty() {
        info!(event = "fleet_nothing_to_do", "no matching instances, nothing to do");
        return Ok(FleetSummary::NothingToDo {
            message: NO_MATCHING_INSTANCES_MESSAGE.to_string(),
        });
    }

    let outcome = match action {
        FleetAction::Start => fleet.start_instances(&instance_ids),
        FleetAction::Stop => fleet.stop_instances(&instance_ids),
    };
    outcome.map_err(|source| FleetError::BulkAction { action, source })?;

    info!(
        event = "fleet_action_applied",
        action = %action,
        count = instance_ids.len(),
        "bulk power change submitted"
    );
    Ok(FleetSummary::Applied {
        action,
        instances: instance_ids,
    })
}

fn eligible_instance_ids(
    instances: Vec<InstanceRecord>,
    selector: &InstanceSelector,
) -> Vec<String> {
    instances
        .into_iter()
        .filter_map(|instance| {
            if selector.admits(&instance) {
                Some(instance.instance_id)
            } else {
                warn!(
                    event = "fleet_instance_ignored",
                    instance_id = %instance.instance_id,
                    state = instance.state.name(),
                    "provider returned an instance outside the selector"
                );
                None
            }
        })
        .collect()
}
