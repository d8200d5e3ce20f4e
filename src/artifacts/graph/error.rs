use thiserror::Error;

/// Why a snapshot could not be taken
///
/// Both kinds abort the current snapshot only; whether that ends the process
/// is up to the caller.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read the object store: {0:#}")]
    StoreAccess(anyhow::Error),
    #[error("failed to resolve references: {0:#}")]
    ReferenceResolution(anyhow::Error),
}
