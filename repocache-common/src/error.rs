// Copyright 2025 repocache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::Backtrace,
    fmt::{Display, Formatter},
    sync::Arc,
};

use itertools::Itertools;

/// Kinds of failures at the edges of the repository cache.
///
/// Operations of the in-memory cache itself never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The persistent storage behind the cache failed.
    Storage,
    /// An option of a cache or a tool is invalid.
    Config,
    /// An argument cannot be parsed.
    Parse,
    /// Error raised by caller code.
    External,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Parse => "parse",
            ErrorKind::External => "external",
        };
        f.write_str(s)
    }
}

/// Error of the fallible repocache operations.
///
/// Displayed on one line as `<kind> error: <message> [<key>=<value>, ..]: <source>`.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<Arc<anyhow::Error>>,
    backtrace: Arc<Backtrace>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)?;
        if !self.context.is_empty() {
            let context = self.context.iter().map(|(k, v)| format!("{k}={v}")).join(", ");
            write!(f, " [{context}]")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    /// Create an error of `kind`. The backtrace is captured if enabled by `RUST_BACKTRACE`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
            source: None,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// Failure of the persistent storage.
    pub fn storage(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorKind::Storage, message).with_source(source)
    }

    /// Invalid value of a config option.
    pub fn invalid_config(option: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, reason)
            .with_context("option", option)
            .with_context("value", value)
    }

    /// Attach a key-value pair describing the failure.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach the underlying error.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Kind of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Key-value pairs describing the failure.
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// The underlying error, if any.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }

    /// Backtrace captured at creation.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Result with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_sync_static() {
        fn is_send_sync_static<T: Send + Sync + 'static>() {}
        is_send_sync_static::<Error>();
    }

    #[test]
    fn test_storage_error() {
        let err = Error::storage("read failed", std::io::Error::other("disk detached")).with_context("unit", 3);

        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "storage error: read failed [unit=3]: disk detached");
        assert!(err.source().is_some_and(|e| e.downcast_ref::<std::io::Error>().is_some()));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_config() {
        let err = Error::invalid_config("shards", 0, "shards must be greater than zero");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.context(), [("option", "shards".to_string()), ("value", "0".to_string())]);
        assert_eq!(
            err.to_string(),
            "config error: shards must be greater than zero [option=shards, value=0]"
        );
    }
}
