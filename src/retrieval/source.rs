//! Where a resource comes from
//!
//! Resolved once per retrieval; each variant has exactly one handler in the
//! coordinator.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::fetch::FetchError;

/// Request classes have independent concurrency bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Files on local storage
    Local,
    /// Network sources, higher latency
    Remote,
}

impl RequestClass {
    pub const ALL: [RequestClass; 2] = [RequestClass::Local, RequestClass::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Local => "local",
            RequestClass::Remote => "remote",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a resource in memory, without I/O (text bitmaps, generated tiles)
pub type FactoryFn<R> = Arc<dyn Fn() -> Result<R, FetchError> + Send + Sync>;

/// Source of one retrievable resource
pub enum ResourceSource<R> {
    /// Already in memory; inserted synchronously
    Resident(R),
    /// Built synchronously by a factory
    Factory(FactoryFn<R>),
    /// Local file, fetched asynchronously
    Local(PathBuf),
    /// Remote URL, fetched asynchronously
    Remote(String),
    /// Anything else; logged and marked permanently absent
    Unrecognized(String),
}

impl<R> ResourceSource<R> {
    /// Classify a location string
    ///
    /// `http(s)://` is remote, `file://` and scheme-less strings are local
    /// paths, any other scheme is unrecognized.
    pub fn from_location(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return ResourceSource::Remote(location.to_string());
        }
        if let Some(path) = location.strip_prefix("file://") {
            return ResourceSource::Local(PathBuf::from(path));
        }
        match location.split_once("://") {
            Some(_) => ResourceSource::Unrecognized(location.to_string()),
            None => ResourceSource::Local(PathBuf::from(location)),
        }
    }

    /// Request class for asynchronous sources
    pub fn class(&self) -> Option<RequestClass> {
        match self {
            ResourceSource::Local(_) => Some(RequestClass::Local),
            ResourceSource::Remote(_) => Some(RequestClass::Remote),
            _ => None,
        }
    }
}

impl<R> fmt::Debug for ResourceSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSource::Resident(_) => f.write_str("Resident"),
            ResourceSource::Factory(_) => f.write_str("Factory"),
            ResourceSource::Local(path) => write!(f, "Local({})", path.display()),
            ResourceSource::Remote(url) => write!(f, "Remote({})", url),
            ResourceSource::Unrecognized(what) => write!(f, "Unrecognized({})", what),
        }
    }
}
