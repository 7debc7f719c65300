use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("tried to overwrite {0} entry {1}")]
    EntryAlreadyExists(&'static str, u64),

    #[error("missing {0} entry {1}")]
    MissingEntry(&'static str, u64),

    #[error("codec: {0}")]
    Codec(String),

    #[error("not yet implemented")]
    Unimplemented,

    #[error("{0}")]
    Other(String),
}
