use account_maintenance_core::contract::AggregatorResponse;
use account_maintenance_lambda::adapters::block_on_current;
use account_maintenance_lambda::adapters::object_store::{
    ObjectStore, ObjectStoreError, StoredObject, WritePrecondition,
};
use account_maintenance_lambda::config::{load_aggregator_config, process_env};
use account_maintenance_lambda::handlers::aggregator::{handle_object_created, AggregatorConfig};
use account_maintenance_lambda::telemetry::init_tracing;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Local;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct S3ObjectStore {
    s3_client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let request = self.s3_client.get_object().bucket(bucket).key(key);
        let output = match block_on_current(async move { request.send().await }) {
            Ok(value) => value,
            Err(error) => {
                let not_found = error
                    .as_service_error()
                    .map(GetObjectError::is_no_such_key)
                    .unwrap_or(false);
                return Err(if not_found {
                    ObjectStoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Request(format!(
                        "failed to read s3://{bucket}/{key}: {}",
                        DisplayErrorContext(error)
                    ))
                });
            }
        };

        let etag = output.e_tag().map(str::to_string);
        let body = block_on_current(async move { output.body.collect().await })
            .map_err(|error| {
                ObjectStoreError::Request(format!(
                    "failed to download body of s3://{bucket}/{key}: {error}"
                ))
            })?
            .into_bytes()
            .to_vec();

        Ok(StoredObject { body, etag })
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), ObjectStoreError> {
        let request = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()));
        let request = match precondition {
            WritePrecondition::Unconditional => request,
            WritePrecondition::IfAbsent => request.if_none_match("*"),
            WritePrecondition::IfMatch(etag) => request.if_match(etag),
        };

        match block_on_current(async move { request.send().await }) {
            Ok(_) => Ok(()),
            Err(error) => {
                let status = error
                    .raw_response()
                    .map(|response| response.status().as_u16());
                // 412 for a stale ETag, 409 when another conditional write is in flight.
                if matches!(status, Some(409 | 412)) {
                    Err(ObjectStoreError::PreconditionFailed {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                } else {
                    Err(ObjectStoreError::Request(format!(
                        "failed to write s3://{bucket}/{key}: {}",
                        DisplayErrorContext(error)
                    )))
                }
            }
        }
    }
}

struct RuntimeDependencies {
    config: AggregatorConfig,
    store: S3ObjectStore,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<AggregatorResponse, Error> {
    Ok(handle_object_created(
        &event.payload,
        &deps.config,
        Local::now().naive_local(),
        &deps.store,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config =
        load_aggregator_config(process_env).map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config,
        store: S3ObjectStore {
            s3_client: aws_sdk_s3::Client::new(&aws_config),
        },
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
