//! Single-writer exchange task and its client handle.

use async_trait::async_trait;
use replay_core::error::ExchangeError;
use replay_core::traits::{EventHandler, OrderGateway};
use replay_core::types::{
    Bar, BracketAmendment, BracketId, BracketLeg, BracketOrder, BracketRequest, Fill, Order,
    OrderAmendment, OrderEvent, OrderId, OrderRequest,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::matching::MatchingEngine;

const COMMAND_QUEUE_DEPTH: usize = 1024;

type Reply<T> = oneshot::Sender<T>;

/// Commands processed by the exchange task, one at a time.
#[derive(Debug)]
enum Command {
    MatchBar { bar: Bar, reply: Reply<Vec<Fill>> },
    Submit { request: OrderRequest, reply: Reply<Result<Order, ExchangeError>> },
    Modify { id: OrderId, amendment: OrderAmendment, reply: Reply<Result<Order, ExchangeError>> },
    Cancel { id: OrderId, reply: Reply<Result<Order, ExchangeError>> },
    GetOrder { id: OrderId, reply: Reply<Option<Order>> },
    OpenOrders { symbol: Option<String>, reply: Reply<Vec<Order>> },
    Fills { id: OrderId, reply: Reply<Vec<Fill>> },
    CreateBracket { request: BracketRequest, reply: Reply<Result<BracketOrder, ExchangeError>> },
    ModifyBracket {
        id: BracketId,
        amendment: BracketAmendment,
        reply: Reply<Result<BracketOrder, ExchangeError>>,
    },
    CancelBracketLeg { id: BracketId, leg: BracketLeg, reply: Reply<Result<BracketOrder, ExchangeError>> },
    GetBracket { id: BracketId, reply: Reply<Option<BracketOrder>> },
    Snapshot { reply: Reply<ExchangeSnapshot> },
}

/// Point-in-time copy of the exchange state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    /// Every order, by id
    pub orders: Vec<Order>,
    /// Every fill, by order then fill id
    pub fills: Vec<Fill>,
    /// Every bracket, by id
    pub brackets: Vec<BracketOrder>,
}

impl ExchangeSnapshot {
    fn capture(engine: &MatchingEngine) -> Self {
        Self {
            orders: engine.ledger().orders().cloned().collect(),
            fills: engine.ledger().fills().cloned().collect(),
            brackets: engine.brackets().brackets().cloned().collect(),
        }
    }
}

/// Simulated exchange.
///
/// Wraps a [`MatchingEngine`] in a task that owns it exclusively. Strategy
/// commands and bar matching are serialized through one queue, so order
/// submissions never interleave with fill processing.
#[derive(Debug, Default)]
pub struct SimulatedExchange {
    engine: MatchingEngine,
}

impl SimulatedExchange {
    /// Create an exchange with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an order event handler. Handlers run inside the exchange
    /// task, in registration order.
    pub fn with_handler(mut self, handler: impl EventHandler<OrderEvent> + 'static) -> Self {
        self.engine.subscribe(handler);
        self
    }

    /// Start the exchange task.
    ///
    /// The task ends when every [`ExchangeClient`] is dropped and returns
    /// the engine with its final state.
    pub fn spawn(self) -> (ExchangeClient, JoinHandle<MatchingEngine>) {
        let (sender, mut receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let mut engine = self.engine;

        let handle = tokio::spawn(async move {
            info!("Simulated exchange started");
            let mut processed = 0u64;
            while let Some(command) = receiver.recv().await {
                handle_command(&mut engine, command);
                processed += 1;
            }
            info!(commands = processed, orders = engine.ledger().len(), "Simulated exchange stopped");
            engine
        });

        (ExchangeClient { sender }, handle)
    }
}

fn handle_command(engine: &mut MatchingEngine, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        Command::MatchBar { bar, reply } => {
            let _ = reply.send(engine.on_bar(&bar));
        }
        Command::Submit { request, reply } => {
            let _ = reply.send(engine.submit(request));
        }
        Command::Modify { id, amendment, reply } => {
            let _ = reply.send(engine.modify(id, &amendment));
        }
        Command::Cancel { id, reply } => {
            let _ = reply.send(engine.cancel(id));
        }
        Command::GetOrder { id, reply } => {
            let _ = reply.send(engine.ledger().get(id).cloned());
        }
        Command::OpenOrders { symbol, reply } => {
            let orders = match symbol {
                Some(symbol) => engine.ledger().open_orders_for(&symbol).cloned().collect(),
                None => engine.ledger().open_orders().cloned().collect(),
            };
            let _ = reply.send(orders);
        }
        Command::Fills { id, reply } => {
            let _ = reply.send(engine.ledger().fills_for(id).cloned().collect());
        }
        Command::CreateBracket { request, reply } => {
            let _ = reply.send(engine.create_bracket(request));
        }
        Command::ModifyBracket { id, amendment, reply } => {
            let _ = reply.send(engine.modify_bracket(id, &amendment));
        }
        Command::CancelBracketLeg { id, leg, reply } => {
            let _ = reply.send(engine.cancel_bracket_leg(id, leg));
        }
        Command::GetBracket { id, reply } => {
            let _ = reply.send(engine.brackets().get(id).cloned());
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(ExchangeSnapshot::capture(engine));
        }
    }
}

/// Cloneable handle to a running [`SimulatedExchange`].
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    sender: mpsc::Sender<Command>,
}

impl ExchangeClient {
    /// Match a completed bar and wait for the resulting fills.
    pub async fn match_bar(&self, bar: Bar) -> Result<Vec<Fill>, ExchangeError> {
        let fills = self.request(|reply| Command::MatchBar { bar, reply }).await?;
        if !fills.is_empty() {
            debug!(fills = fills.len(), "Bar produced fills");
        }
        Ok(fills)
    }

    /// Copy the exchange state.
    pub async fn snapshot(&self) -> Result<ExchangeSnapshot, ExchangeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ExchangeError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| ExchangeError::Closed)?;
        response.await.map_err(|_| ExchangeError::Closed)
    }
}

#[async_trait]
impl OrderGateway for ExchangeClient {
    async fn submit(&self, request: OrderRequest) -> Result<Order, ExchangeError> {
        self.request(|reply| Command::Submit { request, reply }).await?
    }

    async fn modify(&self, order_id: OrderId, amendment: OrderAmendment) -> Result<Order, ExchangeError> {
        self.request(|reply| Command::Modify {
            id: order_id,
            amendment,
            reply,
        })
        .await?
    }

    async fn cancel(&self, order_id: OrderId) -> Result<Order, ExchangeError> {
        self.request(|reply| Command::Cancel { id: order_id, reply }).await?
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>, ExchangeError> {
        self.request(|reply| Command::GetOrder { id: order_id, reply }).await
    }

    async fn open_orders(&self, symbol: Option<String>) -> Result<Vec<Order>, ExchangeError> {
        self.request(|reply| Command::OpenOrders { symbol, reply }).await
    }

    async fn fills(&self, order_id: OrderId) -> Result<Vec<Fill>, ExchangeError> {
        self.request(|reply| Command::Fills { id: order_id, reply }).await
    }

    async fn create_bracket(&self, request: BracketRequest) -> Result<BracketOrder, ExchangeError> {
        self.request(|reply| Command::CreateBracket { request, reply }).await?
    }

    async fn modify_bracket(
        &self,
        bracket_id: BracketId,
        amendment: BracketAmendment,
    ) -> Result<BracketOrder, ExchangeError> {
        self.request(|reply| Command::ModifyBracket {
            id: bracket_id,
            amendment,
            reply,
        })
        .await?
    }

    async fn cancel_bracket_leg(
        &self,
        bracket_id: BracketId,
        leg: BracketLeg,
    ) -> Result<BracketOrder, ExchangeError> {
        self.request(|reply| Command::CancelBracketLeg {
            id: bracket_id,
            leg,
            reply,
        })
        .await?
    }

    async fn bracket(&self, bracket_id: BracketId) -> Result<Option<BracketOrder>, ExchangeError> {
        self.request(|reply| Command::GetBracket { id: bracket_id, reply }).await
    }

    fn name(&self) -> &str {
        "Simulated Exchange"
    }
}
