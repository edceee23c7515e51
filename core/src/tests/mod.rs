mod storage;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::task::JoinHandle;
use zalift_account::Address;
use zalift_config::ZaliftConfig;
use zalift_fhe::{Decryptor, EncryptedInput, Grant, Grantee, Handle, MockFhe};
use zalift_keypair::{DecryptionKeypair, Keypair, SignedAuthorization, UserDecryptAuthorization};

use crate::chain::Chain;
use crate::clock::{Clock, ManualClock};
use crate::decryption::{DecryptionOracle, OracleClient, OracleConfig, UserDecryptRequest};
use crate::error::{DecryptionError, ExecutionError};
use crate::execution::TxReceipt;
use crate::storage::{MemStore, StateStore};

pub(crate) const DAY: u64 = 24 * 60 * 60;
pub(crate) const GENESIS_TIME: u64 = 1_750_000_000;
pub(crate) const AUTH_DAYS: u64 = 10;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Signs an authorization for `contracts` with a fresh ephemeral keypair.
pub(crate) fn authorize(
    user: &Keypair,
    contracts: Vec<Address>,
    start: u64,
    days: u64,
    chain_id: u64,
) -> (DecryptionKeypair, SignedAuthorization) {
    let keypair = DecryptionKeypair::generate();
    let message =
        UserDecryptAuthorization::new(keypair.public_key(), contracts, start, days, chain_id);
    let signed = user.sign_authorization(message);
    (keypair, signed)
}

/// A deployed chain on a memory store, with three well-known accounts.
pub(crate) struct Harness {
    pub chain: Chain<MemStore, MockFhe>,
    pub fhe: Arc<MockFhe>,
    pub clock: ManualClock,
    pub config: ZaliftConfig,
    pub deployer: Keypair,
    pub creator: Keypair,
    pub contributor: Keypair,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ZaliftConfig::default())
    }

    pub fn with_config(config: ZaliftConfig) -> Self {
        init_logger();
        let fhe = Arc::new(MockFhe::with_key(config.chain.chain_id, [42u8; 32]));
        let clock = ManualClock::new(GENESIS_TIME);
        let deployer = Keypair::from_seed(&[1u8; 32]);
        let creator = Keypair::from_seed(&[2u8; 32]);
        let contributor = Keypair::from_seed(&[3u8; 32]);

        let chain = Chain::genesis(
            Arc::new(MemStore::new()),
            fhe.clone(),
            Arc::new(clock.clone()),
            deployer.address(),
            &config,
        )
        .unwrap();

        Self {
            chain,
            fhe,
            clock,
            config,
            deployer,
            creator,
            contributor,
        }
    }

    pub fn ledger(&self) -> Address {
        self.chain.ledger().address
    }

    /// Encrypted amount bound to (ledger, user).
    pub fn encrypt(&self, user: Address, value: u64) -> EncryptedInput {
        self.fhe
            .create_encrypted_input(self.ledger(), user)
            .add64(value)
            .encrypt()
            .unwrap()
    }

    pub fn mint(&mut self, to: Address, amount: u64) {
        let owner = self.deployer.address();
        self.chain.mint(owner, to, amount).unwrap();
    }

    /// Campaign by `creator` ending a week from now.
    pub fn create_campaign(&mut self, target: u64) -> Address {
        let creator = self.creator.address();
        let end_time = self.clock.now() + 7 * DAY;
        let (address, _) = self
            .chain
            .create_campaign(creator, "Demo", target, end_time)
            .unwrap();
        address
    }

    pub fn contribute(
        &mut self,
        from: Address,
        campaign: Address,
        amount: u64,
    ) -> Result<TxReceipt, ExecutionError> {
        let input = self.encrypt(from, amount);
        self.chain
            .confidential_transfer_and_call(from, campaign, &input.handles[0], &input.proof, b"")
    }

    /// Reads a cleartext straight from the mock backend.
    pub fn clear(&self, handle: &Handle) -> u64 {
        self.fhe.decrypt(handle).unwrap()
    }

    pub fn balance(&self, account: &Address) -> u64 {
        self.clear(&self.chain.confidential_balance_of(account).unwrap())
    }

    pub fn granted(&self, handle: Handle, grantee: Grantee) -> bool {
        self.chain
            .store()
            .is_granted(&Grant { handle, grantee })
            .unwrap()
    }

    pub fn spawn_oracle(&self) -> (OracleClient, JoinHandle<()>) {
        self.spawn_oracle_with(OracleConfig::from_config(&self.config))
    }

    pub fn spawn_oracle_with(&self, config: OracleConfig) -> (OracleClient, JoinHandle<()>) {
        DecryptionOracle::spawn(
            self.chain.store().clone(),
            self.fhe.clone(),
            Arc::new(self.clock.clone()),
            config,
        )
    }

    /// Full user-decrypt round trip: authorize, submit, wait, open.
    pub async fn decrypt_as(
        &self,
        client: &OracleClient,
        user: &Keypair,
        pairs: Vec<(Handle, Address)>,
    ) -> Result<HashMap<Handle, u64>, DecryptionError> {
        let contracts: BTreeSet<Address> = pairs.iter().map(|(_, c)| *c).collect();
        let (keypair, authorization) = authorize(
            user,
            contracts.into_iter().collect(),
            self.clock.now(),
            AUTH_DAYS,
            self.chain.chain_id(),
        );
        let request = UserDecryptRequest::new(pairs, &keypair, authorization, user.address());
        client.user_decrypt(request).await?.open(&keypair)
    }

    /// Decrypted ledger balance of `user`, as `user` sees it.
    pub async fn decrypted_balance(&self, client: &OracleClient, user: &Keypair) -> u64 {
        let handle = self.chain.confidential_balance_of(&user.address()).unwrap();
        let values = self
            .decrypt_as(client, user, vec![(handle, self.ledger())])
            .await
            .unwrap();
        values[&handle]
    }
}
