//! Compiled contract bytecode sources

use crate::error::{Result, SmartApeError};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Supplies the SmartAPE contract bytecode, fetched once per deploy
#[async_trait]
pub trait BytecodeSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>>;
}

/// Bytecode held in memory
#[derive(Debug, Clone, Default)]
pub struct InlineBytecode(pub Vec<u8>);

#[async_trait]
impl BytecodeSource for InlineBytecode {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Remote or local `.bin` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytecodeLocation {
    Url(Url),
    Path(PathBuf),
}

impl BytecodeLocation {
    /// `http://` and `https://` values are URLs; everything else is a path
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            let url = Url::parse(value).map_err(|e| SmartApeError::Bytecode {
                location: value.to_string(),
                reason: e.to_string(),
            })?;
            Ok(BytecodeLocation::Url(url))
        } else {
            Ok(BytecodeLocation::Path(PathBuf::from(value)))
        }
    }
}

impl fmt::Display for BytecodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BytecodeLocation::Url(url) => write!(f, "{}", url),
            BytecodeLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetches bytecode from a [`BytecodeLocation`]
pub struct BytecodeLoader {
    client: Client,
    location: BytecodeLocation,
}

impl BytecodeLoader {
    pub fn new(location: BytecodeLocation, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SmartApeError::Bytecode {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, location })
    }

    pub fn location(&self) -> &BytecodeLocation {
        &self.location
    }

    fn failed(&self, reason: impl ToString) -> SmartApeError {
        SmartApeError::Bytecode {
            location: self.location.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl BytecodeSource for BytecodeLoader {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let mut bytes = match &self.location {
            BytecodeLocation::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| self.failed(e))?;
                if !response.status().is_success() {
                    return Err(self.failed(format!("HTTP {}", response.status())));
                }
                response.bytes().await.map_err(|e| self.failed(e))?.to_vec()
            }
            BytecodeLocation::Path(path) => {
                tokio::fs::read(path).await.map_err(|e| self.failed(e))?
            }
        };

        // .bin files are hex text; a trailing newline is not part of the code
        while bytes.last().is_some_and(|b| b.is_ascii_whitespace()) {
            bytes.pop();
        }
        debug!("fetched {} bytes of bytecode from {}", bytes.len(), self.location);
        Ok(bytes)
    }
}
