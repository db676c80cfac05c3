#[derive(Debug)]
pub enum PipelineError {
    Fetch(reqwest::Error),
    FetchStatus(reqwest::StatusCode),
    Git(git2::Error),
    Io(std::io::Error),
    Parse(String),
    Store(diesel::result::Error),
    Cancelled,
}

impl std::error::Error for PipelineError {}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Fetch(e) => write!(f, "fetch error: {}", e),
            PipelineError::FetchStatus(code) => write!(f, "fetch returned {}", code),
            PipelineError::Git(e) => write!(f, "git clone error: {}", e),
            PipelineError::Io(e) => write!(f, "io error: {}", e),
            PipelineError::Parse(msg) => write!(f, "parse error: {}", msg),
            PipelineError::Store(e) => write!(f, "store error: {}", e),
            PipelineError::Cancelled => write!(f, "cancellation requested"),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Fetch(e)
    }
}

impl From<git2::Error> for PipelineError {
    fn from(e: git2::Error) -> Self {
        PipelineError::Git(e)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e)
    }
}

impl From<diesel::result::Error> for PipelineError {
    fn from(e: diesel::result::Error) -> Self {
        PipelineError::Store(e)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::Parse(e.to_string())
    }
}
