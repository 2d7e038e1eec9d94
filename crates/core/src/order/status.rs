//! Order status and the transition table that drives it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for the shop to accept it.
    Pending,
    /// Accepted by the shop and being printed.
    Printing,
    /// Printed, waiting for pickup.
    Ready,
    /// Handed over to the customer.
    Completed,
    /// Could not be fulfilled.
    Failed,
    /// Declined by the shop before printing started.
    Rejected,
}

/// Party requesting a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Shop,
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Actor::Customer => "customer",
            Actor::Shop => "shop",
            Actor::System => "system",
        };
        f.write_str(name)
    }
}

/// A status string outside the enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order status: {0}")]
pub struct InvalidStatus(pub String);

/// Rejected transition request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The pair is not in the transition table.
    #[error("Illegal status transition: {from} -> {to}")]
    Illegal { from: OrderStatus, to: OrderStatus },

    /// The pair exists but this actor may not drive it.
    #[error("{actor} may not move an order from {from} to {to}")]
    ActorNotPermitted {
        actor: Actor,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Printing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Failed,
        OrderStatus::Rejected,
    ];

    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Printing => "printing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Terminal statuses schedule the order for cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Rejected
        )
    }

    /// Statuses that count towards a shop's queue.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Actors allowed to drive `self -> to`, or `None` if the pair is not in the table.
    fn permitted_actors(self, to: OrderStatus) -> Option<&'static [Actor]> {
        use OrderStatus::*;

        match (self, to) {
            (Pending, Printing) | (Pending, Rejected) | (Printing, Ready) | (Ready, Completed) => {
                Some(&[Actor::Shop])
            }
            (Pending | Printing | Ready, Failed) => Some(&[Actor::Shop, Actor::System]),
            _ => None,
        }
    }

    /// Validates and applies a transition.
    pub fn transition(self, to: OrderStatus, actor: Actor) -> Result<OrderStatus, TransitionError> {
        let actors = self
            .permitted_actors(to)
            .ok_or(TransitionError::Illegal { from: self, to })?;

        if actors.contains(&actor) {
            Ok(to)
        } else {
            Err(TransitionError::ActorNotPermitted {
                actor,
                from: self,
                to,
            })
        }
    }

    /// Destinations `actor` may move this status to.
    pub fn allowed_targets(&self, actor: Actor) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|to| {
                self.permitted_actors(*to)
                    .is_some_and(|actors| actors.contains(&actor))
            })
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}
