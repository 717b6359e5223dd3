use account_maintenance_core::contract::RetentionResponse;
use account_maintenance_core::error::ProviderError;
use account_maintenance_core::pagination::Page;
use account_maintenance_core::retention::{RetentionPolicy, SnapshotRecord};
use account_maintenance_lambda::adapters::block_on_current;
use account_maintenance_lambda::adapters::snapshots::{AccountIdentity, SnapshotCatalog};
use account_maintenance_lambda::config::{load_retention_policy, process_env};
use account_maintenance_lambda::handlers::retention::enforce_retention;
use account_maintenance_lambda::telemetry::init_tracing;
use aws_sdk_ec2::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::warn;

struct StsAccountIdentity {
    sts_client: aws_sdk_sts::Client,
}

impl AccountIdentity for StsAccountIdentity {
    fn caller_account_id(&self) -> Result<String, ProviderError> {
        let client = self.sts_client.clone();
        let output = block_on_current(async move { client.get_caller_identity().send().await })
            .map_err(|error| {
                ProviderError::request("GetCallerIdentity", DisplayErrorContext(error).to_string())
            })?;
        output
            .account()
            .map(str::to_string)
            .ok_or(ProviderError::MissingField {
                operation: "GetCallerIdentity",
                field: "Account",
            })
    }
}

struct Ec2SnapshotCatalog {
    ec2_client: aws_sdk_ec2::Client,
}

impl SnapshotCatalog for Ec2SnapshotCatalog {
    fn snapshot_page(
        &self,
        owner_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<SnapshotRecord>, ProviderError> {
        let request = self
            .ec2_client
            .describe_snapshots()
            .owner_ids(owner_id)
            .set_next_token(next_token.map(str::to_string));
        let output = block_on_current(async move { request.send().await }).map_err(|error| {
            ProviderError::request("DescribeSnapshots", DisplayErrorContext(error).to_string())
        })?;

        let items = output
            .snapshots()
            .iter()
            .filter_map(|snapshot| {
                let Some(snapshot_id) = snapshot.snapshot_id() else {
                    warn!(event = "snapshot_without_id", "skipping snapshot without an id");
                    return None;
                };
                Some(SnapshotRecord {
                    snapshot_id: snapshot_id.to_string(),
                    created_at: snapshot.start_time().and_then(|start| {
                        DateTime::<Utc>::from_timestamp(start.secs(), start.subsec_nanos())
                    }),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_string),
        })
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        let request = self.ec2_client.delete_snapshot().snapshot_id(snapshot_id);
        block_on_current(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                ProviderError::request("DeleteSnapshot", DisplayErrorContext(error).to_string())
            })
    }
}

struct RuntimeDependencies {
    policy: RetentionPolicy,
    identity: StsAccountIdentity,
    catalog: Ec2SnapshotCatalog,
}

async fn handle_request(
    _event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<RetentionResponse, Error> {
    Ok(enforce_retention(
        &deps.policy,
        Utc::now(),
        &deps.identity,
        &deps.catalog,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let policy =
        load_retention_policy(process_env).map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        policy,
        identity: StsAccountIdentity {
            sts_client: aws_sdk_sts::Client::new(&aws_config),
        },
        catalog: Ec2SnapshotCatalog {
            ec2_client: aws_sdk_ec2::Client::new(&aws_config),
        },
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
