use account_maintenance_core::error::ProviderError;
use account_maintenance_core::fleet::{InstanceRecord, InstanceSelector};
use account_maintenance_core::pagination::Page;

pub trait InstanceFleet {
    /// One page of instances matching `selector`, flattened across reservations.
    fn instance_page(
        &self,
        selector: &InstanceSelector,
        next_token: Option<&str>,
    ) -> Result<Page<InstanceRecord>, ProviderError>;

    fn start_instances(&self, instance_ids: &[String]) -> Result<(), ProviderError>;

    fn stop_instances(&self, instance_ids: &[String]) -> Result<(), ProviderError>;
}
