use account_maintenance_core::error::ProviderError;
use account_maintenance_core::pagination::Page;
use account_maintenance_core::retention::SnapshotRecord;

pub trait AccountIdentity {
    fn caller_account_id(&self) -> Result<String, ProviderError>;
}

pub trait SnapshotCatalog {
    fn snapshot_page(
        &self,
        owner_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<SnapshotRecord>, ProviderError>;

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError>;
}
