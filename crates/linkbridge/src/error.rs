//! Bridge errors.

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The worker thread could not be started.
    Spawn(String),
    /// The worker thread panicked.
    WorkerPanicked,
    /// The call failed on the link, including faults raised by the task.
    Link(linkrun::Error),
}

impl Error {
    /// The remote fault's tag, when the task (or the worker) raised one.
    pub fn fault_name(&self) -> Option<&str> {
        match self {
            Self::Link(linkrun::Error::Remote(remote)) => Some(&remote.name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
            Self::WorkerPanicked => write!(f, "worker thread panicked"),
            Self::Link(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Link(e) => Some(e),
            _ => None,
        }
    }
}

impl From<linkrun::Error> for Error {
    fn from(e: linkrun::Error) -> Self {
        Self::Link(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
