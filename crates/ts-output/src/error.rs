use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode CSV row: {0}")]
    Csv(#[from] csv::Error),
}

pub type OutputResult<T> = Result<T, OutputError>;
