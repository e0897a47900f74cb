use crate::output::OutputError;
use crate::source::SourceError;
use crate::uptime::ReportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error("input error: {0}")]
    Source(#[from] SourceError),
    #[error("output error: {0}")]
    Output(#[from] OutputError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
