//! Inventory adjuster.
//!
//! Reserves, releases and commits stock for the product line items of one
//! order or booking. Each operation writes every touched product together
//! with the purchase's idempotency flag in a single atomic batch, so a
//! repeated call is a no-op and a failed call leaves nothing half-applied.

use common::EntityId;
use document_store::{DocumentStore, StoreError, Version, WriteOp};
use domain::{
    InventoryError, InventoryFlags, LineItem, MAX_CONFLICT_RETRIES, Product, ProductId, Purchase,
    Repository, Status,
};

use crate::error::{ReconcileError, Result};

/// What an inventory operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOutcome {
    /// Stock was adjusted on this many products.
    Applied { products: usize },

    /// The purchase's flag shows the operation already ran.
    AlreadyApplied,

    /// The flag was set but no tracked product needed a change.
    NothingToDo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Reserve,
    Release,
    Commit,
}

impl Adjustment {
    fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Reserve => "reserve",
            Adjustment::Release => "release",
            Adjustment::Commit => "commit",
        }
    }

    fn mark(&self, flags: &mut InventoryFlags) {
        match self {
            Adjustment::Reserve => flags.inventory_reserved = true,
            Adjustment::Release => flags.inventory_released = true,
            Adjustment::Commit => flags.inventory_updated = true,
        }
    }
}

/// Stock adjustments keyed by order or booking id.
#[derive(Clone)]
pub struct InventoryAdjuster<S> {
    store: S,
}

impl<S> InventoryAdjuster<S>
where
    S: DocumentStore + Clone,
{
    /// Creates a new adjuster over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Holds stock for every tracked product line of an existing purchase.
    ///
    /// All or nothing: if any product lacks stock no product is touched.
    #[tracing::instrument(skip(self), fields(kind = P::KIND.as_str()))]
    pub async fn reserve<P: Purchase>(&self, id: EntityId) -> Result<InventoryOutcome> {
        self.adjust::<P>(id, Adjustment::Reserve).await
    }

    /// Returns a purchase's reservation to available stock.
    ///
    /// Products are only touched if stock was reserved and never committed;
    /// the released flag is set either way.
    #[tracing::instrument(skip(self), fields(kind = P::KIND.as_str()))]
    pub async fn release<P: Purchase>(&self, id: EntityId) -> Result<InventoryOutcome> {
        self.adjust::<P>(id, Adjustment::Release).await
    }

    /// Removes paid-for units from on-hand stock.
    ///
    /// Fails with `NotPaid` unless the purchase has reached its paid status.
    #[tracing::instrument(skip(self), fields(kind = P::KIND.as_str()))]
    pub async fn commit<P: Purchase>(&self, id: EntityId) -> Result<InventoryOutcome> {
        let outcome = self.adjust::<P>(id, Adjustment::Commit).await?;
        if let InventoryOutcome::Applied { products } = outcome {
            metrics::counter!("inventory_commits_total").increment(1);
            tracing::info!(products, "inventory committed");
        }
        Ok(outcome)
    }

    /// Inserts a new purchase with its stock reserved, in one batch.
    ///
    /// `companions` are written in the same batch (e.g. the payment session),
    /// so insufficient stock leaves neither the purchase nor its companions
    /// behind.
    #[tracing::instrument(skip(self, purchase, companions), fields(kind = P::KIND.as_str(), id = %purchase.id()))]
    pub async fn insert_reserved<P: Purchase>(
        &self,
        purchase: &mut P,
        companions: Vec<WriteOp>,
    ) -> Result<InventoryOutcome> {
        let mut attempt = 0;
        loop {
            let lines = self.load_lines(purchase.items(), true).await?;
            let mut ops = Vec::with_capacity(lines.len() + companions.len() + 1);
            for (mut product, quantity) in lines {
                product.reserve(quantity)?;
                ops.push(Repository::<S, Product>::update_op(&product)?);
            }
            let touched = ops.len();
            purchase.inventory_mut().inventory_reserved = touched > 0;
            ops.push(Repository::<S, P>::insert_op(purchase)?);
            ops.extend(companions.iter().cloned());

            match self.store.write_batch(ops).await {
                Ok(_) => {
                    purchase.set_version(Version::first());
                    return Ok(if touched == 0 {
                        InventoryOutcome::NothingToDo
                    } else {
                        InventoryOutcome::Applied { products: touched }
                    });
                }
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(attempt, "product changed during reservation, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn adjust<P: Purchase>(
        &self,
        id: EntityId,
        adjustment: Adjustment,
    ) -> Result<InventoryOutcome> {
        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        let mut attempt = 0;

        loop {
            let mut purchase = purchases.require(&id.to_string()).await?;
            let flags = *purchase.inventory();

            match adjustment {
                Adjustment::Reserve => {
                    if flags.inventory_reserved || flags.inventory_updated {
                        return Ok(InventoryOutcome::AlreadyApplied);
                    }
                    if flags.inventory_released {
                        return Err(ReconcileError::Validation(format!(
                            "{} {id} already released its stock",
                            P::KIND
                        )));
                    }
                }
                Adjustment::Release => {
                    if flags.inventory_released {
                        return Ok(InventoryOutcome::AlreadyApplied);
                    }
                }
                Adjustment::Commit => {
                    if flags.inventory_updated {
                        return Ok(InventoryOutcome::AlreadyApplied);
                    }
                    if !purchase.status().is_paid_or_later() {
                        return Err(ReconcileError::NotPaid {
                            kind: P::KIND.as_str(),
                            id: id.to_string(),
                        });
                    }
                }
            }

            let holds_reservation = flags.inventory_reserved
                && !flags.inventory_released
                && !flags.inventory_updated;

            let lines = match adjustment {
                Adjustment::Release if !holds_reservation => Vec::new(),
                Adjustment::Reserve => self.load_lines(purchase.items(), true).await?,
                _ => self.load_lines(purchase.items(), false).await?,
            };

            let mut ops = Vec::with_capacity(lines.len() + 1);
            for (mut product, quantity) in lines {
                match adjustment {
                    Adjustment::Reserve => product.reserve(quantity)?,
                    Adjustment::Release => product.release(quantity),
                    Adjustment::Commit => {
                        // Unreserved units must still come out of available stock.
                        if !holds_reservation {
                            product.reserve(quantity)?;
                        }
                        product.commit(quantity)?;
                    }
                }
                ops.push(Repository::<S, Product>::update_op(&product)?);
            }
            let touched = ops.len();

            adjustment.mark(purchase.inventory_mut());
            ops.push(Repository::<S, P>::update_op(&purchase)?);

            match self.store.write_batch(ops).await {
                Ok(_) => {
                    tracing::debug!(
                        operation = adjustment.as_str(),
                        products = touched,
                        "inventory adjusted"
                    );
                    return Ok(if touched == 0 {
                        InventoryOutcome::NothingToDo
                    } else {
                        InventoryOutcome::Applied { products: touched }
                    });
                }
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        operation = adjustment.as_str(),
                        attempt,
                        "concurrent inventory write detected, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Loads the tracked products referenced by `items` with summed quantities.
    ///
    /// Service lines and untracked products are skipped. A missing product is
    /// an error when `require_known` is set and skipped otherwise.
    async fn load_lines(
        &self,
        items: &[LineItem],
        require_known: bool,
    ) -> Result<Vec<(Product, u32)>> {
        let mut wanted: Vec<(ProductId, u32)> = Vec::new();
        for item in items.iter().filter(|item| item.is_product()) {
            match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity),
                None => wanted.push((item.product_id.clone(), item.quantity)),
            }
        }

        let products: Repository<S, Product> = Repository::new(self.store.clone());
        let mut lines = Vec::with_capacity(wanted.len());
        for (product_id, quantity) in wanted {
            match products.get(product_id.as_str()).await? {
                Some(product) if product.track_inventory => lines.push((product, quantity)),
                Some(_) => {}
                None if require_known => {
                    return Err(InventoryError::UnknownProduct(product_id).into());
                }
                None => {
                    tracing::warn!(product_id = %product_id, "product no longer exists, skipping");
                }
            }
        }
        Ok(lines)
    }
}
