use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use zalift_config::ZaliftConfig;
use zalift_fhe::{Decryptor, Grant, Handle};
use zalift_keypair::seal_value;

use crate::clock::Clock;
use crate::decryption::request::{
    DecryptionResult, DecryptionStatus, PublicDecryptRequest, PublicDecryptResponse, RequestId,
    UserDecryptRequest, UserDecryptResponse,
};
use crate::error::DecryptionError;
use crate::storage::StateStore;

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub chain_id: u64,
    pub max_duration_days: u64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub queue_capacity: usize,
    /// Simulated latency before each request is processed.
    pub response_delay: Duration,
}

impl OracleConfig {
    pub fn from_config(config: &ZaliftConfig) -> Self {
        let d = &config.decryption;
        Self {
            chain_id: config.chain.chain_id,
            max_duration_days: d.max_duration_days,
            poll_interval: Duration::from_millis(d.poll_interval_ms.max(1)),
            request_timeout: Duration::from_millis(d.request_timeout_ms),
            queue_capacity: d.queue_capacity.max(1),
            response_delay: Duration::from_millis(d.response_delay_ms),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::from_config(&ZaliftConfig::default())
    }
}

/// Messages for the oracle task
enum OracleCommand {
    User(RequestId, UserDecryptRequest),
    Public(RequestId, PublicDecryptRequest),
    Shutdown,
}

/// Off-chain key holder answering decryption requests against the ACL.
pub struct DecryptionOracle<S, D> {
    store: Arc<S>,
    decryptor: Arc<D>,
    clock: Arc<dyn Clock>,
    config: OracleConfig,
}

impl<S, D> DecryptionOracle<S, D>
where
    S: StateStore + 'static,
    D: Decryptor + 'static,
{
    /// Starts the oracle task. Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<S>,
        decryptor: Arc<D>,
        clock: Arc<dyn Clock>,
        config: OracleConfig,
    ) -> (OracleClient, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity.max(1));
        let statuses = Arc::new(DashMap::new());

        let client = OracleClient {
            command_tx,
            statuses: statuses.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
            poll_interval: config.poll_interval,
            request_timeout: config.request_timeout,
        };

        let oracle = Self {
            store,
            decryptor,
            clock,
            config,
        };
        let handle = tokio::spawn(oracle.run(command_rx, statuses));

        (client, handle)
    }

    async fn run(
        self,
        mut command_rx: mpsc::Receiver<OracleCommand>,
        statuses: Arc<DashMap<RequestId, DecryptionStatus>>,
    ) {
        info!("decryption oracle started (chain {})", self.config.chain_id);

        while let Some(cmd) = command_rx.recv().await {
            if matches!(cmd, OracleCommand::Shutdown) {
                break;
            }
            if !self.config.response_delay.is_zero() {
                tokio::time::sleep(self.config.response_delay).await;
            }

            let (id, outcome) = match cmd {
                OracleCommand::User(id, req) => {
                    (id, self.user_decrypt(&req).map(DecryptionResult::User))
                }
                OracleCommand::Public(id, req) => {
                    (id, self.public_decrypt(&req).map(DecryptionResult::Public))
                }
                OracleCommand::Shutdown => break,
            };

            let status = match outcome {
                Ok(result) => {
                    debug!("request {} answered", id);
                    DecryptionStatus::Ready(result)
                }
                Err(e) => {
                    warn!("request {} refused: {}", id, e);
                    DecryptionStatus::Failed(e)
                }
            };
            statuses.insert(id, status);
        }

        info!("decryption oracle stopped");
    }

    fn user_decrypt(&self, req: &UserDecryptRequest) -> Result<UserDecryptResponse, DecryptionError> {
        let auth = &req.authorization.message;

        let signer = req.authorization.verify()?;
        if signer != req.requester {
            return Err(DecryptionError::InvalidSignature);
        }
        // A signature for another chain or another key is not this request's
        if auth.chain_id != self.config.chain_id || auth.public_key != req.public_key {
            return Err(DecryptionError::InvalidSignature);
        }

        let now = self.clock.now();
        if auth.duration_days > self.config.max_duration_days || !auth.is_valid_at(now) {
            return Err(DecryptionError::AuthorizationExpired);
        }

        if let Some((_, contract)) = req.pairs.iter().find(|(_, c)| !auth.covers(c)) {
            return Err(DecryptionError::ContractNotAuthorized(*contract));
        }

        let mut values = HashMap::new();
        for (handle, contract) in &req.pairs {
            let allowed = handle.is_zero()
                || (self.granted(&Grant::account(*handle, req.requester))?
                    && self.granted(&Grant::account(*handle, *contract))?);
            if !allowed {
                debug!("{} not granted to {} via {}, omitted", handle, req.requester, contract);
                continue;
            }
            let Some(value) = self.cleartext(handle) else {
                continue;
            };
            let sealed = seal_value(value, &handle.0, &req.public_key)?;
            values.insert(*handle, sealed);
        }

        info!(
            "user decrypt for {}: {}/{} handles",
            req.requester,
            values.len(),
            req.pairs.len()
        );
        Ok(UserDecryptResponse { values })
    }

    fn public_decrypt(
        &self,
        req: &PublicDecryptRequest,
    ) -> Result<PublicDecryptResponse, DecryptionError> {
        let mut values = HashMap::new();
        for handle in &req.handles {
            if !handle.is_zero() && !self.granted(&Grant::public(*handle))? {
                debug!("{} is not publicly decryptable, omitted", handle);
                continue;
            }
            if let Some(value) = self.cleartext(handle) {
                values.insert(*handle, value);
            }
        }
        info!("public decrypt: {}/{} handles", values.len(), req.handles.len());
        Ok(PublicDecryptResponse { values })
    }

    fn granted(&self, grant: &Grant) -> Result<bool, DecryptionError> {
        self.store.is_granted(grant).map_err(|e| {
            warn!("ACL lookup failed: {:#}", e);
            DecryptionError::OracleUnavailable
        })
    }

    fn cleartext(&self, handle: &Handle) -> Option<u64> {
        match self.decryptor.decrypt(handle) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("cannot decrypt {}: {}", handle, e);
                None
            }
        }
    }
}

/// Cheap-to-clone handle for submitting requests and collecting answers.
#[derive(Clone)]
pub struct OracleClient {
    command_tx: mpsc::Sender<OracleCommand>,
    statuses: Arc<DashMap<RequestId, DecryptionStatus>>,
    next_id: Arc<AtomicU64>,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl OracleClient {
    async fn submit(
        &self,
        command: impl FnOnce(RequestId) -> OracleCommand,
    ) -> Result<RequestId, DecryptionError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.statuses.insert(id, DecryptionStatus::Pending);

        if self.command_tx.send(command(id)).await.is_err() {
            self.statuses.remove(&id);
            return Err(DecryptionError::OracleUnavailable);
        }
        Ok(id)
    }

    pub async fn request_user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<RequestId, DecryptionError> {
        self.submit(|id| OracleCommand::User(id, request)).await
    }

    pub async fn request_public_decrypt(
        &self,
        handles: Vec<Handle>,
    ) -> Result<RequestId, DecryptionError> {
        self.submit(|id| OracleCommand::Public(id, PublicDecryptRequest { handles }))
            .await
    }

    pub fn status(&self, id: RequestId) -> DecryptionStatus {
        self.statuses
            .get(&id)
            .map(|s| s.value().clone())
            .unwrap_or(DecryptionStatus::Unknown)
    }

    /// Waits up to the configured request timeout.
    pub async fn wait(&self, id: RequestId) -> Result<DecryptionResult, DecryptionError> {
        self.wait_for(id, self.request_timeout).await
    }

    /// Polls until the request settles. `NotYetAvailable` once `timeout`
    /// elapses; the request stays queued and can be waited on again.
    ///
    /// A settled result is handed out once: collecting it drops the entry,
    /// after which the id reports `Unknown`.
    pub async fn wait_for(
        &self,
        id: RequestId,
        timeout: Duration,
    ) -> Result<DecryptionResult, DecryptionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let settled = self
                .statuses
                .remove_if(&id, |_, s| !matches!(s, DecryptionStatus::Pending));
            match settled {
                Some((_, DecryptionStatus::Ready(result))) => return Ok(result),
                Some((_, DecryptionStatus::Failed(e))) => return Err(e),
                Some(_) => return Err(DecryptionError::OracleUnavailable),
                // Never submitted, or already collected by another waiter
                None if !self.statuses.contains_key(&id) => {
                    return Err(DecryptionError::OracleUnavailable);
                }
                None => {}
            }
            if Instant::now() >= deadline {
                return Err(DecryptionError::NotYetAvailable);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submit and wait.
    pub async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<UserDecryptResponse, DecryptionError> {
        let id = self.request_user_decrypt(request).await?;
        match self.wait(id).await? {
            DecryptionResult::User(response) => Ok(response),
            DecryptionResult::Public(_) => Err(DecryptionError::OracleUnavailable),
        }
    }

    /// Submit and wait.
    pub async fn public_decrypt(
        &self,
        handles: Vec<Handle>,
    ) -> Result<PublicDecryptResponse, DecryptionError> {
        let id = self.request_public_decrypt(handles).await?;
        match self.wait(id).await? {
            DecryptionResult::Public(response) => Ok(response),
            DecryptionResult::User(_) => Err(DecryptionError::OracleUnavailable),
        }
    }

    pub async fn shutdown(&self) -> Result<(), DecryptionError> {
        self.command_tx
            .send(OracleCommand::Shutdown)
            .await
            .map_err(|_| DecryptionError::OracleUnavailable)
    }
}
