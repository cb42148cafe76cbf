//! In-memory [`OrderRegistry`] + [`LedgerStore`].
//!
//! One mutex guards all state, so every trait call is atomic the same way a
//! single PostgreSQL transaction is. Fault switches let scenarios break the
//! snapshot read or the credit half of a transition.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use gm_core::{
    AppliedTransition, Balance, CreateOutcome, LedgerStore, Micros, Order, OrderNumber,
    OrderRegistry, OrderStatus, WithdrawOutcome, Withdrawal,
};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    next_order_id: i64,
    logins: HashMap<Uuid, String>,
    orders: BTreeMap<i64, Order>,
    by_number: HashMap<String, i64>,
    balances: HashMap<Uuid, Balance>,
    withdrawals: Vec<Withdrawal>,
    fail_snapshot: bool,
    fail_credit: bool,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `non_terminal_orders` fail until switched off.
    pub fn set_snapshot_failure(&self, on: bool) {
        self.lock().fail_snapshot = on;
    }

    /// Make the balance-credit half of a PROCESSED transition fail.
    pub fn set_credit_failure(&self, on: bool) {
        self.lock().fail_credit = on;
    }

    pub fn order(&self, order_id: i64) -> Option<Order> {
        self.lock().orders.get(&order_id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }
}

#[async_trait]
impl OrderRegistry for MemStore {
    async fn create_order(&self, owner: Uuid, number: &OrderNumber) -> Result<CreateOutcome> {
        let mut g = self.lock();

        if let Some(id) = g.by_number.get(number.as_str()).copied() {
            let existing = g
                .orders
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow!("index points at missing order {id}"))?;
            return Ok(if existing.owner == owner {
                CreateOutcome::AlreadyOwnedByCaller(existing)
            } else {
                CreateOutcome::OwnedByOther
            });
        }
        if !g.logins.contains_key(&owner) {
            bail!("unknown user {owner}");
        }

        g.next_order_id += 1;
        let order = Order {
            id: g.next_order_id,
            number: number.as_str().to_string(),
            owner,
            status: OrderStatus::New,
            accrual: Micros::ZERO,
            uploaded_at: Utc::now(),
        };
        g.by_number.insert(order.number.clone(), order.id);
        g.orders.insert(order.id, order.clone());
        Ok(CreateOutcome::Created(order))
    }

    async fn order_by_number(&self, number: &str) -> Result<Option<Order>> {
        let g = self.lock();
        Ok(g.by_number.get(number).and_then(|id| g.orders.get(id)).cloned())
    }

    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>> {
        let g = self.lock();
        let mut out: Vec<Order> = g.orders.values().filter(|o| o.owner == owner).cloned().collect();
        out.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn non_terminal_orders(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        let g = self.lock();
        if g.fail_snapshot {
            bail!("injected snapshot failure");
        }
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(g.orders
            .range(after_id.saturating_add(1)..)
            .map(|(_, o)| o)
            .filter(|o| !o.status.is_terminal())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn apply_transition(
        &self,
        order_id: i64,
        to: OrderStatus,
        accrual: Micros,
    ) -> Result<AppliedTransition> {
        if accrual.is_negative() {
            bail!("negative accrual {accrual} for order id {order_id}");
        }

        let mut g = self.lock();
        let (owner, from) = {
            let o = g
                .orders
                .get(&order_id)
                .ok_or_else(|| anyhow!("order id {order_id} not found"))?;
            (o.owner, o.status)
        };
        from.check_transition(to)?;

        let credited = if to == OrderStatus::Processed {
            accrual
        } else {
            Micros::ZERO
        };

        // Credit first: a failure here must leave the order untouched.
        if to == OrderStatus::Processed {
            if g.fail_credit {
                bail!("injected credit failure for user {owner}");
            }
            let bal = g
                .balances
                .get_mut(&owner)
                .ok_or_else(|| anyhow!("no balance row for user {owner}"))?;
            bal.current = bal
                .current
                .checked_add(credited)
                .ok_or_else(|| anyhow!("balance overflow for user {owner}"))?;
        }

        if let Some(o) = g.orders.get_mut(&order_id) {
            o.status = to;
            o.accrual = credited;
        }

        Ok(AppliedTransition {
            order_id,
            owner,
            from,
            to,
            credited,
        })
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn register_user(&self, user_id: Uuid, login: &str) -> Result<bool> {
        let mut g = self.lock();
        if g.logins.contains_key(&user_id) || g.logins.values().any(|l| l == login) {
            return Ok(false);
        }
        g.logins.insert(user_id, login.to_string());
        g.balances.insert(user_id, Balance::zero(user_id));
        Ok(true)
    }

    async fn balance(&self, owner: Uuid) -> Result<Option<Balance>> {
        Ok(self.lock().balances.get(&owner).copied())
    }

    async fn create_withdrawal(
        &self,
        owner: Uuid,
        order_number: &OrderNumber,
        amount: Micros,
    ) -> Result<WithdrawOutcome> {
        if !amount.is_positive() {
            bail!("withdrawal amount must be positive, got {amount}");
        }

        let mut g = self.lock();
        let owned = g
            .by_number
            .get(order_number.as_str())
            .and_then(|id| g.orders.get(id))
            .is_some_and(|o| o.owner == owner);
        if !owned {
            return Ok(WithdrawOutcome::OrderUnknown);
        }

        let bal = g
            .balances
            .get_mut(&owner)
            .ok_or_else(|| anyhow!("no balance row for user {owner}"))?;
        if bal.current < amount {
            return Ok(WithdrawOutcome::InsufficientFunds {
                available: bal.current,
            });
        }
        bal.current -= amount;
        bal.withdrawn += amount;

        let w = Withdrawal {
            owner,
            order_number: order_number.as_str().to_string(),
            amount,
            processed_at: Utc::now(),
        };
        g.withdrawals.push(w.clone());
        Ok(WithdrawOutcome::Accepted(w))
    }

    async fn withdrawals(&self, owner: Uuid) -> Result<Vec<Withdrawal>> {
        Ok(self
            .lock()
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect())
    }
}
