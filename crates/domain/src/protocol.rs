//! Commands and replies exchanged with the domain services over the broker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::order::Order;
use crate::payment::WalletView;
use crate::stock::ItemView;

pub const ORDER_QUEUE: &str = "order_queue";
pub const STOCK_QUEUE: &str = "stock_queue";
pub const PAYMENT_QUEUE: &str = "payment_queue";

/// All service queues, declared by every client on connect.
pub const SERVICE_QUEUES: [&str; 3] = [ORDER_QUEUE, STOCK_QUEUE, PAYMENT_QUEUE];

/// Message returned in place of internal error details.
pub const SERVER_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder { user_id: String },
    FindOrder { order_id: String },
    AddItem { order_id: String, order_entry: Order },
    ConfirmOrder { order_id: String, order_entry: Order },
}

impl OrderCommand {
    pub fn action(&self) -> &'static str {
        match self {
            OrderCommand::CreateOrder { .. } => "create_order",
            OrderCommand::FindOrder { .. } => "find_order",
            OrderCommand::AddItem { .. } => "add_item",
            OrderCommand::ConfirmOrder { .. } => "confirm_order",
        }
    }
}

/// Stock commands. Single-item mutations without a `key` are keyed by the
/// request's correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    CreateItem {
        price: i64,
    },
    FindItem {
        item_id: String,
    },
    AddStock {
        item_id: String,
        amount: i64,
        key: Option<String>,
    },
    RemoveStock {
        item_id: String,
        amount: i64,
        key: Option<String>,
    },
    AddStockBulk {
        data: BTreeMap<String, i64>,
        key: String,
        compensation: bool,
    },
    RemoveStockBulk {
        data: BTreeMap<String, i64>,
        key: String,
    },
}

impl StockCommand {
    pub fn action(&self) -> &'static str {
        match self {
            StockCommand::CreateItem { .. } => "create_item",
            StockCommand::FindItem { .. } => "find_item",
            StockCommand::AddStock { .. } => "add_stock",
            StockCommand::RemoveStock { .. } => "remove_stock",
            StockCommand::AddStockBulk { .. } => "add_stock_bulk",
            StockCommand::RemoveStockBulk { .. } => "remove_stock_bulk",
        }
    }
}

/// Payment commands. Mutations without a `key` are keyed by the request's
/// correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    CreateUser,
    FindUser {
        user_id: String,
    },
    AddFunds {
        user_id: String,
        amount: i64,
        key: Option<String>,
        compensation: bool,
    },
    RemoveCredit {
        user_id: String,
        amount: i64,
        key: Option<String>,
    },
}

impl PaymentCommand {
    pub fn action(&self) -> &'static str {
        match self {
            PaymentCommand::CreateUser => "create_user",
            PaymentCommand::FindUser { .. } => "find_user",
            PaymentCommand::AddFunds { .. } => "add_funds",
            PaymentCommand::RemoveCredit { .. } => "remove_credit",
        }
    }
}

/// Outcome class of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    /// Bad input or a domain rule violation. Retrying will not help.
    ClientError,
    /// Storage or transport failure.
    ServerError,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::ClientError => "client_error",
            Status::ServerError => "server_error",
        }
    }
}

/// Payload of a [`Reply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyData {
    Empty,
    Message(String),
    /// Id of a newly created entity.
    Id(String),
    Order(Order),
    Item(ItemView),
    Wallet(WalletView),
    /// Stock level or credit after a mutation.
    Quantity(i64),
}

/// Response to any command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub status: Status,
    pub data: ReplyData,
}

impl Reply {
    pub fn success(data: ReplyData) -> Self {
        Self {
            status: Status::Success,
            data,
        }
    }

    pub fn client_error(message: impl Into<String>) -> Self {
        Self {
            status: Status::ClientError,
            data: ReplyData::Message(message.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status: Status::ServerError,
            data: ReplyData::Message(SERVER_ERROR_MESSAGE.to_string()),
        }
    }

    /// Converts a domain error, hiding details of server-side failures.
    pub fn from_error(err: &DomainError) -> Self {
        match err.status() {
            Status::ServerError => Self::server_error(),
            _ => Self::client_error(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Returns the message carried by an error reply.
    pub fn message(&self) -> Option<&str> {
        match &self.data {
            ReplyData::Message(message) => Some(message),
            _ => None,
        }
    }
}
