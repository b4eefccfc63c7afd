use crate::parse;
use std::fmt::{self, Display, Formatter};

#[derive(Debug)]
pub enum Error {
    /// Network failure or a non-success status from the menu page.
    Fetch(reqwest::Error),
    /// The menu page answered with a blank body.
    EmptyResponse,
    Parse(parse::Error),
    /// Reading or writing the saved menu files.
    Persistence(std::io::Error),
    Json(serde_json::Error),
    Config(String),
}

impl From<parse::Error> for Error {
    fn from(e: parse::Error) -> Self {
        Error::Parse(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Fetch(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fetch(e) => write!(f, "Fetch error: {e}"),
            Error::EmptyResponse => write!(f, "Fetch error: the menu page was empty"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Persistence(e) => write!(f, "Persistence error: {e}"),
            Error::Json(e) => write!(f, "Json error: {e}"),
            Error::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fetch(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Persistence(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::EmptyResponse | Error::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
