/// Errors that can occur while diffing two HTML fragments.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiffError {
    #[error("HTML parse error: {0}")]
    Parse(String),
}
