use thiserror::Error;

use crate::mail::DispatchError;
use crate::storage::StorageError;
use crate::validation::ValidationError;

pub type StagingResult<T> = Result<T, StagingError>;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Dispatch stopped early and purging the delivered prefix also failed.
    #[error("{dispatch}; {purge}")]
    PartialDispatch {
        #[source]
        dispatch: DispatchError,
        purge: Box<StagingError>,
    },
    #[error("failed to purge {failed} of {total} sent record(s): {source}")]
    Purge {
        failed: usize,
        total: usize,
        #[source]
        source: StorageError,
    },
}
