use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// The fetch service rejected or failed an adapter call. Fatal to the
    /// affected handle (posts) or post (comments), never to the whole run.
    #[error("fetch service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    /// An expected identifier column was absent from a dataset. Degrades
    /// dedup for that collection; never aborts.
    #[error("identifier column '{0}' missing from dataset")]
    SchemaDrift(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
