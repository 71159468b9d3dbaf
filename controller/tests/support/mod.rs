#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alloy::primitives::{Address, U256, address};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use controller::chain::{ChainClient, ChainConnector, TransactionReceipt};
use controller::channel::{ChannelClient, ChannelConnector, ChannelOptions};
use controller::gas::{GasOracle, GasOracleError};
use controller::minimum_balance::minimum_balance_wei;
use controller::types::{
    ChannelDepositRequest, ChannelState, CurrencyKind, ExchangeRates, RuntimeState, StateSnapshot,
};

pub const WALLET: Address = address!("00000000000000000000000000000000000000aa");
pub const TOKEN: Address = address!("00000000000000000000000000000000000000bb");
pub const FUNDER: Address = address!("00000000000000000000000000000000000000cc");

/// 1 gwei, which makes the minimum balance 1.4e15 wei.
pub const GAS_PRICE_WEI: u64 = 1_000_000_000;

pub fn min_wei() -> U256 {
    minimum_balance_wei(U256::from(GAS_PRICE_WEI))
}

pub fn rates(usd_per_eth: &str) -> ExchangeRates {
    ExchangeRates {
        usd_per_eth: Decimal::from_str(usd_per_eth).unwrap(),
    }
}

/// Open channel with nothing in it, exchange allowed, 100 USD/ETH.
pub fn ready_snapshot() -> StateSnapshot {
    StateSnapshot {
        channel: Some(ChannelState::default()),
        runtime: RuntimeState {
            can_exchange: true,
            exchange_rate: Some(rates("100")),
            ..Default::default()
        },
    }
}

// -----------------------
// Gas oracle
// -----------------------

pub struct FixedGasOracle {
    pub price: U256,
    pub calls: AtomicUsize,
}

impl FixedGasOracle {
    pub fn new(price: u64) -> Arc<Self> {
        Arc::new(Self {
            price: U256::from(price),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GasOracle for FixedGasOracle {
    async fn safe_low_gas_price(&self) -> Result<U256, GasOracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }
}

// -----------------------
// Channel client
// -----------------------

pub struct MockChannel {
    pub initial: Mutex<Option<StateSnapshot>>,
    events_tx: Mutex<Option<mpsc::Sender<StateSnapshot>>>,
    events_rx: Mutex<Option<mpsc::Receiver<StateSnapshot>>>,
    pub deposits: Mutex<Vec<ChannelDepositRequest>>,
    pub exchanges: Mutex<Vec<(U256, CurrencyKind)>>,
    pub started: AtomicBool,
    pub fail_deposit: AtomicBool,
}

impl MockChannel {
    pub fn new(initial: Option<StateSnapshot>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(32);
        Arc::new(Self {
            initial: Mutex::new(initial),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Mutex::new(Some(events_rx)),
            deposits: Mutex::new(Vec::new()),
            exchanges: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            fail_deposit: AtomicBool::new(false),
        })
    }

    pub async fn push(&self, snapshot: StateSnapshot) {
        let tx = self.events_tx.lock().clone().unwrap();
        tx.send(snapshot).await.unwrap();
    }

    /// Drops the sender so the state stream ends.
    pub fn close_events(&self) {
        self.events_tx.lock().take();
    }
}

#[async_trait]
impl ChannelClient for MockChannel {
    async fn start(&self) -> anyhow::Result<()> {
        self.started.store(true, Ordering::SeqCst);
        let initial = self.initial.lock().take();
        let tx = self.events_tx.lock().clone();
        if let (Some(tx), Some(snapshot)) = (tx, initial) {
            tx.send(snapshot).await?;
        }
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<StateSnapshot>> {
        self.events_rx
            .lock()
            .take()
            .ok_or_else(|| anyhow::anyhow!("already subscribed"))
    }

    async fn deposit(&self, request: ChannelDepositRequest) -> anyhow::Result<()> {
        if self.fail_deposit.load(Ordering::SeqCst) {
            anyhow::bail!("hub rejected deposit");
        }
        self.deposits.lock().push(request);
        Ok(())
    }

    async fn exchange(&self, amount: U256, currency: CurrencyKind) -> anyhow::Result<()> {
        self.exchanges.lock().push((amount, currency));
        Ok(())
    }

    fn wallet_address(&self) -> Address {
        WALLET
    }

    fn token_address(&self) -> Address {
        TOKEN
    }

    fn rpc_url(&self) -> String {
        "http://channel-rpc.local".to_string()
    }
}

pub struct MockChannelConnector {
    pub client: Arc<MockChannel>,
    pub fail: bool,
    pub seen: Mutex<Option<ChannelOptions>>,
}

impl MockChannelConnector {
    pub fn new(client: Arc<MockChannel>) -> Arc<Self> {
        Arc::new(Self {
            client,
            fail: false,
            seen: Mutex::new(None),
        })
    }

    pub fn failing(client: Arc<MockChannel>) -> Arc<Self> {
        Arc::new(Self {
            client,
            fail: true,
            seen: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChannelConnector for MockChannelConnector {
    async fn connect(&self, options: ChannelOptions) -> anyhow::Result<Arc<dyn ChannelClient>> {
        *self.seen.lock() = Some(options);
        if self.fail {
            anyhow::bail!("hub unreachable");
        }
        Ok(self.client.clone())
    }
}

// -----------------------
// Chain client
// -----------------------

pub struct MockChain {
    pub balance: Mutex<U256>,
    /// `None` makes `get_token_balance` fail.
    pub token_balance: Mutex<Option<U256>>,
    pub latest_sender: Mutex<Option<Address>>,
    pub fail_send: AtomicBool,
    pub sent: Mutex<Vec<(Address, U256)>>,
    pub balance_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(balance: U256, token_balance: U256) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            token_balance: Mutex::new(Some(token_balance)),
            latest_sender: Mutex::new(Some(FUNDER)),
            fail_send: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            balance_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock() = balance;
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_balance(&self, _address: Address) -> anyhow::Result<U256> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock())
    }

    async fn get_token_balance(&self, _token: Address, _address: Address) -> anyhow::Result<U256> {
        let balance = *self.token_balance.lock();
        balance.ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    async fn latest_sender_to(
        &self,
        _address: Address,
        _lookback_blocks: u64,
    ) -> anyhow::Result<Option<Address>> {
        Ok(*self.latest_sender.lock())
    }

    async fn send_value(&self, to: Address, amount: U256) -> anyhow::Result<TransactionReceipt> {
        if self.fail_send.load(Ordering::SeqCst) {
            anyhow::bail!("insufficient funds for gas");
        }
        self.sent.lock().push((to, amount));
        Ok(TransactionReceipt {
            transaction_hash: "0xfeed".to_string(),
            block_number: Some(1),
            success: true,
        })
    }
}

pub struct MockChainConnector {
    pub client: Arc<MockChain>,
    pub seen_rpc: Mutex<Option<String>>,
}

impl MockChainConnector {
    pub fn new(client: Arc<MockChain>) -> Arc<Self> {
        Arc::new(Self {
            client,
            seen_rpc: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChainConnector for MockChainConnector {
    async fn connect(&self, rpc_url: &str, _mnemonic: &str) -> anyhow::Result<Arc<dyn ChainClient>> {
        *self.seen_rpc.lock() = Some(rpc_url.to_string());
        Ok(self.client.clone())
    }
}
