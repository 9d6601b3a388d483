//! In-memory chain, endpoint provider, and signing bridge for engine tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hipo_core::constants::NANO_PER_TON;
use hipo_core::{Address, AppConfig, BlockHeight, Nano, Network, NodeError};
use ton_client::{
    BridgeError, ChainRpc, EndpointProvider, Message, SignRequest, SigningBridge, StackValue,
    Transaction, TxCursor, ViewResult,
};

pub const ACCOUNT: &str = "0:1111111111111111111111111111111111111111111111111111111111111111";
pub const WALLET: &str = "EQhtonwallet";

pub fn ton(amount: u64) -> Nano {
    amount as Nano * NANO_PER_TON
}

pub fn treasury_stack(total_coins: Nano, total_tokens: Nano) -> Vec<StackValue> {
    vec![
        StackValue::Int(total_coins as i128),
        StackValue::Int(total_tokens as i128),
        StackValue::Int(0),
        StackValue::Int(0),
        StackValue::Int(0),
        StackValue::Null,
        StackValue::Null,
        StackValue::Int(0),
        StackValue::Int(0),
        StackValue::Int(0),
        StackValue::Cell(vec![]),
        StackValue::Int(0),
        StackValue::Int(0),
        StackValue::Address(Address::new("EQhalter")),
        StackValue::Address(Address::new("EQgovernor")),
        StackValue::Null,
        StackValue::Int(4_096),
    ]
}

pub fn wallet_stack(tokens: Nano) -> Vec<StackValue> {
    vec![
        StackValue::Int(tokens as i128),
        StackValue::Null,
        StackValue::Int(0),
    ]
}

pub fn times_stack() -> Vec<StackValue> {
    [1_000, 1_100, 1_900, 66_536, 132_072, 65_536]
        .into_iter()
        .map(StackValue::Int)
        .collect()
}

pub fn fees_stack(deposit: Nano, unstake: Nano) -> Vec<StackValue> {
    vec![
        StackValue::Int(deposit as i128),
        StackValue::Int(unstake as i128),
    ]
}

type ViewKey = (String, String);

/// A scripted chain: get-method answers keyed by contract and method,
/// independent of the requested height
#[derive(Default)]
pub struct MockChain {
    pub height: Mutex<BlockHeight>,
    views: Mutex<HashMap<ViewKey, Result<Vec<StackValue>, NodeError>>>,
    balances: Mutex<HashMap<String, Nano>>,
    transactions: Mutex<Vec<Transaction>>,
    /// Every call fails with an API error while set
    pub offline: AtomicBool,
    /// Only transaction history reads fail while set
    pub history_offline: AtomicBool,
    pub height_calls: AtomicUsize,
    pub view_calls: Mutex<Vec<ViewKey>>,
}

impl MockChain {
    /// A testnet chain with a 1000/900 treasury and default fees
    pub fn new(treasury: &str, height: BlockHeight) -> Arc<Self> {
        let chain = Arc::new(Self::default());
        *chain.height.lock().unwrap() = height;
        chain.view(treasury, "get_treasury_state", Ok(treasury_stack(ton(1_000), ton(900))));
        chain.view(treasury, "get_times", Ok(times_stack()));
        chain.view(treasury, "get_fees", Ok(fees_stack(ton(1) / 10, ton(1) / 5)));
        chain.view(
            treasury,
            "get_wallet_address",
            Ok(vec![StackValue::Address(Address::new(WALLET))]),
        );
        chain.undeploy(WALLET);
        chain
    }

    pub fn view(&self, contract: &str, method: &str, result: Result<Vec<StackValue>, NodeError>) {
        self.views
            .lock()
            .unwrap()
            .insert((contract.to_string(), method.to_string()), result);
    }

    pub fn undeploy(&self, wallet: &str) {
        for method in ["get_wallet_state", "get_wallet_fees"] {
            self.view(
                wallet,
                method,
                Err(NodeError::AccountNotDeployed {
                    address: wallet.to_string(),
                }),
            );
        }
    }

    pub fn set_wallet_tokens(&self, wallet: &str, tokens: Nano) {
        self.view(wallet, "get_wallet_state", Ok(wallet_stack(tokens)));
        self.view(
            wallet,
            "get_wallet_fees",
            Ok(vec![
                StackValue::Int(100_000_000),
                StackValue::Int(10_000_000),
                StackValue::Int(50_000_000),
            ]),
        );
    }

    pub fn set_balance(&self, account: &str, balance: Nano) {
        self.balances
            .lock()
            .unwrap()
            .insert(account.to_string(), balance);
    }

    pub fn set_height(&self, height: BlockHeight) {
        *self.height.lock().unwrap() = height;
    }

    pub fn push_transaction(&self, in_message: Option<Message>, out_messages: Vec<Message>) {
        let mut txs = self.transactions.lock().unwrap();
        let lt = txs.len() as u64 + 1;
        txs.insert(
            0,
            Transaction {
                lt,
                hash: format!("{:064x}", lt),
                now: 0,
                in_message,
                out_messages,
            },
        );
    }

    fn check_online(&self) -> Result<(), NodeError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NodeError::ApiError {
                message: "endpoint offline".to_string(),
            });
        }
        Ok(())
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.view_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m == method)
            .count()
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn latest_height(&self) -> Result<BlockHeight, NodeError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(*self.height.lock().unwrap())
    }

    async fn call_view(
        &self,
        contract: &Address,
        _height: Option<BlockHeight>,
        method: &str,
        _args: &[StackValue],
    ) -> Result<ViewResult, NodeError> {
        let key = (contract.as_str().to_string(), method.to_string());
        self.view_calls.lock().unwrap().push(key.clone());
        self.check_online()?;
        match self.views.lock().unwrap().get(&key) {
            Some(Ok(stack)) => Ok(ViewResult::ok(stack.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(ViewResult {
                exit_code: 11,
                stack: vec![],
            }),
        }
    }

    async fn account_balance(
        &self,
        address: &Address,
        _height: BlockHeight,
    ) -> Result<Nano, NodeError> {
        self.check_online()?;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address.as_str())
            .copied()
            .unwrap_or(0))
    }

    async fn account_transactions(
        &self,
        _address: &Address,
        _after: Option<TxCursor>,
    ) -> Result<Vec<Transaction>, NodeError> {
        self.check_online()?;
        if self.history_offline.load(Ordering::SeqCst) {
            return Err(NodeError::ApiError {
                message: "history unavailable".to_string(),
            });
        }
        Ok(self.transactions.lock().unwrap().clone())
    }
}

/// Hands out one chain per network
pub struct MockProvider {
    pub chains: HashMap<Network, Arc<MockChain>>,
    pub refuse: AtomicBool,
    pub connects: AtomicUsize,
}

impl MockProvider {
    pub fn new(chains: Vec<(Network, Arc<MockChain>)>) -> Arc<Self> {
        Arc::new(Self {
            chains: chains.into_iter().collect(),
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EndpointProvider for MockProvider {
    async fn connect(&self, network: Network) -> Result<Arc<dyn ChainRpc>, NodeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable {
                network: network.to_string(),
            });
        }
        match self.chains.get(&network) {
            Some(chain) => Ok(chain.clone() as Arc<dyn ChainRpc>),
            None => Err(NodeError::Unreachable {
                network: network.to_string(),
            }),
        }
    }
}

/// What the chain shows after a signature
#[derive(Debug, Clone, Copy)]
pub enum Echo {
    /// Nothing ever appears
    Silent,
    /// The outgoing message appears, the answer never does
    SentOnly,
    /// Outgoing message, then the treasury's answer; the wallet ends up with `tokens`
    Confirm { tokens: Nano },
}

pub struct MockBridge {
    chain: Arc<MockChain>,
    pub outcome: Mutex<Result<(), BridgeError>>,
    pub echo: Mutex<Echo>,
    /// Time the wallet takes to answer
    pub delay: Mutex<Option<Duration>>,
    pub requests: Mutex<Vec<SignRequest>>,
}

impl MockBridge {
    pub fn new(chain: Arc<MockChain>) -> Arc<Self> {
        Arc::new(Self {
            chain,
            outcome: Mutex::new(Ok(())),
            echo: Mutex::new(Echo::Silent),
            delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }
}

fn message(body: Vec<u8>) -> Message {
    Message {
        source: None,
        destination: None,
        value: 0,
        body,
    }
}

#[async_trait]
impl SigningBridge for MockBridge {
    async fn request_signature(&self, request: SignRequest) -> Result<(), BridgeError> {
        let payload = request.payload.clone();
        self.requests.lock().unwrap().push(request);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.lock().unwrap().clone()?;

        match *self.echo.lock().unwrap() {
            Echo::Silent => {}
            Echo::SentOnly => self.chain.push_transaction(None, vec![message(payload)]),
            Echo::Confirm { tokens } => {
                self.chain.push_transaction(None, vec![message(payload.clone())]);
                self.chain.set_wallet_tokens(WALLET, tokens);
                self.chain.push_transaction(Some(message(payload[..12].to_vec())), vec![]);
            }
        }
        Ok(())
    }
}

/// Testnet config with the given legacy treasury
pub fn config(legacy_treasury: Option<&str>) -> AppConfig {
    let mut config = AppConfig {
        network: Network::Testnet,
        ..AppConfig::default()
    };
    config.testnet.legacy_treasury = legacy_treasury.map(Address::new);
    config
}
