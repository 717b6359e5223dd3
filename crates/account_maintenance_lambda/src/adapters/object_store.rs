use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Guard attached to a write so concurrent writers cannot silently overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePrecondition {
    Unconditional,
    /// Succeeds only if no object exists at the key.
    IfAbsent,
    /// Succeeds only if the stored object still carries this ETag.
    IfMatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectStoreError {
    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },
    #[error("object s3://{bucket}/{key} changed since it was read")]
    PreconditionFailed { bucket: String, key: String },
    #[error("{0}")]
    Request(String),
}

pub trait ObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError>;

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        precondition: WritePrecondition,
    ) -> Result<(), ObjectStoreError>;
}
