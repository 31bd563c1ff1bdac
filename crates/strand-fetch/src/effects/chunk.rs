use std::convert::Infallible;
use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::RetryPolicy;
use crate::data::{ChunkAddress, FileDescriptor};
use crate::error::{Error, Result};

/// Remote chunk store.
///
/// Implementations return the raw (still encrypted) body of one chunk. They
/// should not retry on their own; [`ChunkFetcher`] owns the retry budget.
pub trait ChunkSource: Send + Sync {
    type Error: fmt::Display + Send + 'static;

    fn fetch(
        &self,
        address: &ChunkAddress,
    ) -> impl Future<Output = std::result::Result<Bytes, Self::Error>> + Send;
}

/// Turns one encrypted chunk into plaintext.
///
/// Called with the file key and the descriptor's format version.
pub trait Decryptor: Send + Sync {
    type Error: fmt::Display + Send + 'static;

    fn decrypt(
        &self,
        ciphertext: Bytes,
        key: &str,
        version: u32,
    ) -> std::result::Result<Bytes, Self::Error>;
}

impl<F, E> Decryptor for F
where
    F: Fn(Bytes, &str, u32) -> std::result::Result<Bytes, E> + Send + Sync,
    E: fmt::Display + Send + 'static,
{
    type Error = E;

    fn decrypt(
        &self,
        ciphertext: Bytes,
        key: &str,
        version: u32,
    ) -> std::result::Result<Bytes, Self::Error> {
        self(ciphertext, key, version)
    }
}

/// Passes chunks through unchanged, for stores that serve plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl Decryptor for Plaintext {
    type Error = Infallible;

    fn decrypt(
        &self,
        ciphertext: Bytes,
        _key: &str,
        _version: u32,
    ) -> std::result::Result<Bytes, Self::Error> {
        Ok(ciphertext)
    }
}

/// Fetches and decrypts single chunks under a [`RetryPolicy`].
///
/// A network error, a timed-out request and a decryption error all count as
/// one failed attempt.
#[derive(Debug)]
pub struct ChunkFetcher<S, D> {
    source: S,
    decryptor: D,
    policy: RetryPolicy,
}

impl<S: ChunkSource, D: Decryptor> ChunkFetcher<S, D> {
    pub fn new(source: S, decryptor: D, policy: RetryPolicy) -> Self {
        Self {
            source,
            decryptor,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the plaintext of chunk `index`, or
    /// [`Error::NetworkOrDecryptFailure`] once every attempt has failed.
    pub async fn fetch(&self, descriptor: &FileDescriptor, index: u64) -> Result<Bytes> {
        let address = descriptor.chunk_address(index);
        let mut attempt = 1;
        loop {
            let reason = match self.attempt(descriptor, &address).await {
                Ok(plain) => return Ok(plain),
                Err(reason) => reason,
            };

            match self.policy.next_delay(attempt) {
                Some(delay) => {
                    debug!(%address, attempt, %reason, "chunk attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    warn!(%address, attempts = attempt, %reason, "chunk retries exhausted");
                    return Err(Error::NetworkOrDecryptFailure {
                        id: descriptor.id.clone(),
                        index,
                        attempts: attempt,
                        reason,
                    });
                }
            }
        }
    }

    async fn attempt(
        &self,
        descriptor: &FileDescriptor,
        address: &ChunkAddress,
    ) -> std::result::Result<Bytes, String> {
        let cipher = tokio::time::timeout(self.policy.request_timeout(), self.source.fetch(address))
            .await
            .map_err(|_| format!("request timed out after {:?}", self.policy.request_timeout()))?
            .map_err(|e| format!("fetch: {e}"))?;
        self.decryptor
            .decrypt(cipher, &descriptor.key, descriptor.version)
            .map_err(|e| format!("decrypt: {e}"))
    }
}
