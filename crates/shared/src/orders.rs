use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Fulfilment state of an order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state as tracked from the payment provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Map a payment-intent status string from the provider
    pub fn from_intent_status(status: &str) -> Self {
        match status {
            "succeeded" => PaymentStatus::Paid,
            "canceled" | "requires_payment_method" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(ParseStatusError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchased service for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub service_id: Uuid,
    pub service_title: String,
    pub service_slug: String,
    pub company_number: String,
    pub company_name: String,
    pub price: i64,
}

/// Free-form order metadata; `items` holds the line items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub service_type: String,
    pub metadata: OrderMetadata,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub company_number: String,
    pub company_name: String,
    pub service_ids: Vec<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order: OrderInfo,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

/// Sum of minor-unit prices, `None` on overflow
pub fn checked_total(prices: impl IntoIterator<Item = i64>) -> Option<i64> {
    prices
        .into_iter()
        .try_fold(0i64, |total, price| total.checked_add(price))
}

/// Aggregates over a listing of orders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: usize,
    pub completed_orders: usize,
    pub pending_orders: usize,
    /// Sum of `amount` over paid orders, minor units. Saturates at `i64::MAX`.
    pub revenue: i64,
}

impl OrderStats {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a OrderInfo>) -> Self {
        orders
            .into_iter()
            .fold(OrderStats::default(), |mut stats, order| {
                stats.total_orders += 1;
                match order.status {
                    OrderStatus::Completed => stats.completed_orders += 1,
                    OrderStatus::Pending => stats.pending_orders += 1,
                    _ => {}
                }
                if order.payment_status == PaymentStatus::Paid {
                    stats.revenue = stats.revenue.saturating_add(order.amount);
                }
                stats
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminOrdersResponse {
    pub orders: Vec<OrderInfo>,
    pub stats: OrderStats,
}

/// Render minor units as a currency string, e.g. `£49.99`
pub fn format_amount(minor: i64, currency: &str) -> String {
    let symbol = match currency.to_ascii_lowercase().as_str() {
        "gbp" => "£",
        "usd" => "$",
        "eur" => "€",
        _ => "",
    };
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    if symbol.is_empty() {
        format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency.to_uppercase())
    } else {
        format!("{}{}{}.{:02}", sign, symbol, abs / 100, abs % 100)
    }
}
