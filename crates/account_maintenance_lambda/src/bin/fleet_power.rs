use std::collections::BTreeMap;

use account_maintenance_core::contract::FleetResponse;
use account_maintenance_core::error::ProviderError;
use account_maintenance_core::fleet::{InstanceRecord, InstanceSelector, InstanceState};
use account_maintenance_core::pagination::Page;
use account_maintenance_lambda::adapters::block_on_current;
use account_maintenance_lambda::adapters::fleet::InstanceFleet;
use account_maintenance_lambda::config::{load_instance_selector, process_env};
use account_maintenance_lambda::handlers::fleet::handle_fleet_event;
use account_maintenance_lambda::telemetry::init_tracing;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, Instance};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct Ec2InstanceFleet {
    ec2_client: aws_sdk_ec2::Client,
}

impl InstanceFleet for Ec2InstanceFleet {
    fn instance_page(
        &self,
        selector: &InstanceSelector,
        next_token: Option<&str>,
    ) -> Result<Page<InstanceRecord>, ProviderError> {
        let request = self
            .ec2_client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", selector.tag_key))
                    .set_values(Some(selector.tag_values.clone()))
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(selector.state_names()))
                    .build(),
            )
            .set_next_token(next_token.map(str::to_string));
        let output = block_on_current(async move { request.send().await }).map_err(|error| {
            ProviderError::request("DescribeInstances", DisplayErrorContext(error).to_string())
        })?;

        let items = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(instance_record)
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_string),
        })
    }

    fn start_instances(&self, instance_ids: &[String]) -> Result<(), ProviderError> {
        let request = self
            .ec2_client
            .start_instances()
            .set_instance_ids(Some(instance_ids.to_vec()));
        block_on_current(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                ProviderError::request("StartInstances", DisplayErrorContext(error).to_string())
            })
    }

    fn stop_instances(&self, instance_ids: &[String]) -> Result<(), ProviderError> {
        let request = self
            .ec2_client
            .stop_instances()
            .set_instance_ids(Some(instance_ids.to_vec()));
        block_on_current(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                ProviderError::request("StopInstances", DisplayErrorContext(error).to_string())
            })
    }
}

fn instance_record(instance: &Instance) -> Option<InstanceRecord> {
    let instance_id = instance.instance_id()?;
    let state = instance
        .state()
        .and_then(|state| state.name())
        .map(|name| InstanceState::from_name(name.as_str()))
        .unwrap_or_else(|| InstanceState::Other("unknown".to_string()));
    let tags: BTreeMap<String, String> = instance
        .tags()
        .iter()
        .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
        .collect();

    Some(InstanceRecord {
        instance_id: instance_id.to_string(),
        state,
        tags,
    })
}

struct RuntimeDependencies {
    selector: InstanceSelector,
    fleet: Ec2InstanceFleet,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<FleetResponse, Error> {
    Ok(handle_fleet_event(&event.payload, &deps.selector, &deps.fleet))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let selector =
        load_instance_selector(process_env).map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        selector,
        fleet: Ec2InstanceFleet {
            ec2_client: aws_sdk_ec2::Client::new(&aws_config),
        },
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
