use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    AddressId, CartLine, Contact, Money, OrderStatus, PaymentId, Product, ProductId,
    ProductWeight, ProductWeightId, Purchase, PurchaseDraft, PurchaseId, PurchaseItem, Result,
    StoreError, UserId,
    store::{
        CartStore, CatalogLookup, ContactLookup, OrderStatusStore, PurchaseStore, line_total,
        order_total, validate_draft,
    },
};

const PURCHASE_COLUMNS: &str = r#"
    SELECT p.id, p.user_id, p.address_id, p.payment_id, p.total_cents,
           p.created_at, p.updated_at, s.status
    FROM purchases p
    LEFT JOIN order_status s ON s.purchase_id = p.id
"#;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    fn row_to_weight(row: &PgRow) -> Result<ProductWeight> {
        Ok(ProductWeight {
            id: ProductWeightId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            weight: row.try_get("weight")?,
            measurement: row.try_get("measurement")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32(row.try_get("stock")?, "product_weights", "stock")?,
        })
    }

    fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
        Ok(CartLine {
            product_weight_id: ProductWeightId::new(row.try_get("product_weight_id")?),
            quantity: to_u32(row.try_get("quantity")?, "cart_items", "quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_purchase(row: &PgRow) -> Result<Purchase> {
        let status: Option<String> = row.try_get("status")?;
        let status = status
            .map(|s| {
                s.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
                    table: "order_status",
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Purchase {
            id: PurchaseId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            address_id: AddressId::new(row.try_get("address_id")?),
            payment_id: PaymentId::new(row.try_get("payment_id")?),
            total_price: Money::from_cents(row.try_get("total_cents")?),
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_item(row: &PgRow) -> Result<(PurchaseId, PurchaseItem)> {
        let purchase_id = PurchaseId::new(row.try_get("purchase_id")?);
        let item = PurchaseItem {
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            product_weight_id: ProductWeightId::new(row.try_get("product_weight_id")?),
            weight: row.try_get("weight")?,
            measurement: row.try_get("measurement")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: to_u32(row.try_get("quantity")?, "purchase_items", "quantity")?,
            total_price: Money::from_cents(row.try_get("total_cents")?),
        };
        Ok((purchase_id, item))
    }

    /// Loads the item snapshots for `purchases` in one query and attaches them.
    async fn attach_items(&self, mut purchases: Vec<Purchase>) -> Result<Vec<Purchase>> {
        if purchases.is_empty() {
            return Ok(purchases);
        }

        let ids: Vec<i64> = purchases.iter().map(|p| p.id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT purchase_id, product_id, product_name, product_weight_id, weight,
                   measurement, unit_price_cents, quantity, total_cents
            FROM purchase_items
            WHERE purchase_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_purchase: HashMap<PurchaseId, Vec<PurchaseItem>> = HashMap::new();
        for row in rows {
            let (purchase_id, item) = Self::row_to_item(&row)?;
            by_purchase.entry(purchase_id).or_default().push(item);
        }

        for purchase in &mut purchases {
            purchase.items = by_purchase.remove(&purchase.id).unwrap_or_default();
        }
        Ok(purchases)
    }
}

fn to_u32(value: i64, table: &'static str, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        table,
        message: format!("{column} out of range: {value}"),
    })
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[async_trait]
impl CatalogLookup for PostgresStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(name) = name else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, weight, measurement, price_cents, stock
            FROM product_weights
            WHERE product_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let weights = rows
            .iter()
            .map(Self::row_to_weight)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Product {
            id: product_id,
            name,
            weights,
        }))
    }

    async fn get_product_weight(&self, id: ProductWeightId) -> Result<Option<ProductWeight>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, weight, measurement, price_cents, stock
            FROM product_weights
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_weight).transpose()
    }

    async fn get_product_weights(&self, ids: &[ProductWeightId]) -> Result<Vec<ProductWeight>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, weight, measurement, price_cents, stock
            FROM product_weights
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(raw)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_weight).collect()
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_weight_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_at ASC, product_weight_id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cart_line).collect()
    }

    async fn add_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<CartLine> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_weight_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id, product_weight_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            WHERE cart_items.quantity + EXCLUDED.quantity <= $5
            RETURNING product_weight_id, quantity, created_at, updated_at
            "#,
        )
        .bind(user_id.as_i64())
        .bind(product_weight_id.as_i64())
        .bind(i64::from(quantity))
        .bind(Utc::now())
        .bind(i64::from(u32::MAX))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return StoreError::UnknownProductWeight(product_weight_id);
            }
            StoreError::Database(e)
        })?
        // The conflict branch skips the update when the merged quantity would
        // not fit, and nothing is returned.
        .ok_or(StoreError::CartQuantityOverflow(product_weight_id))?;

        Self::row_to_cart_line(&row)
    }

    async fn set_cart_line_quantity(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cart_items
            SET quantity = $1, updated_at = $2
            WHERE user_id = $3 AND product_weight_id = $4
            "#,
        )
        .bind(i64::from(quantity))
        .bind(Utc::now())
        .bind(user_id.as_i64())
        .bind(product_weight_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_weight_id = $2")
                .bind(user_id.as_i64())
                .bind(product_weight_id.as_i64())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PurchaseStore for PostgresStore {
    #[tracing::instrument(skip(self, draft), fields(user_id = %draft.user_id, lines = draft.lines.len()))]
    async fn place_purchase(&self, draft: PurchaseDraft) -> Result<Purchase> {
        validate_draft(&draft)?;
        let started = std::time::Instant::now();

        // Dropping `tx` on any early return rolls the transaction back.
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Lock every requested variant in id order so overlapping placements
        // queue behind each other instead of deadlocking.
        let mut weight_ids: Vec<i64> = draft
            .lines
            .iter()
            .map(|l| l.product_weight_id.as_i64())
            .collect();
        weight_ids.sort_unstable();
        weight_ids.dedup();
        sqlx::query("SELECT id FROM product_weights WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&weight_ids)
            .fetch_all(&mut *tx)
            .await?;

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product_name: Option<String> =
                sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
                    .bind(line.product_id.as_i64())
                    .fetch_optional(&mut *tx)
                    .await?;
            let product_name = product_name.ok_or(StoreError::ProductNotFound(line.product_id))?;

            let row = sqlx::query(
                r#"
                SELECT id, product_id, weight, measurement, price_cents, stock
                FROM product_weights
                WHERE id = $1 AND product_id = $2
                FOR UPDATE
                "#,
            )
            .bind(line.product_weight_id.as_i64())
            .bind(line.product_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::VariantNotFound {
                product_id: line.product_id,
                product_weight_id: line.product_weight_id,
            })?;
            let weight = Self::row_to_weight(&row)?;

            if line.quantity > weight.stock {
                return Err(StoreError::InsufficientStock {
                    product_weight_id: weight.id,
                    requested: line.quantity,
                    available: weight.stock,
                });
            }
            let total_price = line_total(&weight, line.quantity)?;

            sqlx::query(
                "UPDATE product_weights SET stock = stock - $1, updated_at = $2 WHERE id = $3",
            )
            .bind(i64::from(line.quantity))
            .bind(now)
            .bind(weight.id.as_i64())
            .execute(&mut *tx)
            .await?;

            items.push(PurchaseItem {
                product_id: line.product_id,
                product_name,
                product_weight_id: weight.id,
                weight: weight.weight,
                measurement: weight.measurement,
                unit_price: weight.price,
                quantity: line.quantity,
                total_price,
            });
        }

        let total_price = order_total(items.iter().map(|i| i.total_price))?;
        let purchase_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchases (user_id, address_id, payment_id, total_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(draft.user_id.as_i64())
        .bind(draft.address_id.as_i64())
        .bind(draft.payment_id.as_i64())
        .bind(total_price.cents())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, product_id, product_name, product_weight_id,
                                            weight, measurement, unit_price_cents, quantity, total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(purchase_id)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(item.product_weight_id.as_i64())
            .bind(&item.weight)
            .bind(&item.measurement)
            .bind(item.unit_price.cents())
            .bind(i64::from(item.quantity))
            .bind(item.total_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(draft.user_id.as_i64())
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO order_status (purchase_id, status, updated_at) VALUES ($1, $2, $3)")
            .bind(purchase_id)
            .bind(OrderStatus::Accepted.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        metrics::histogram!("store_place_purchase_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(purchase_id, "Purchase committed");

        Ok(Purchase {
            id: PurchaseId::new(purchase_id),
            user_id: draft.user_id,
            address_id: draft.address_id,
            payment_id: draft.payment_id,
            total_price,
            status: Some(OrderStatus::Accepted),
            created_at: now,
            updated_at: now,
            items,
        })
    }

    async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Option<Purchase>> {
        let row = sqlx::query(&format!("{PURCHASE_COLUMNS} WHERE p.id = $1"))
            .bind(purchase_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let purchase = Self::row_to_purchase(&row)?;
        let mut attached = self.attach_items(vec![purchase]).await?;
        Ok(attached.pop())
    }

    async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            "{PURCHASE_COLUMNS} WHERE p.user_id = $1 ORDER BY p.id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let purchases = rows
            .iter()
            .map(Self::row_to_purchase)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(purchases).await
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!("{PURCHASE_COLUMNS} ORDER BY p.id DESC"))
            .fetch_all(&self.pool)
            .await?;

        let purchases = rows
            .iter()
            .map(Self::row_to_purchase)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(purchases).await
    }
}

#[async_trait]
impl OrderStatusStore for PostgresStore {
    async fn get_order_status(&self, purchase_id: PurchaseId) -> Result<Option<OrderStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM order_status WHERE purchase_id = $1")
                .bind(purchase_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        status
            .map(|s| {
                s.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
                    table: "order_status",
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    async fn set_order_status(&self, purchase_id: PurchaseId, status: OrderStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_status (purchase_id, status, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (purchase_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(purchase_id.as_i64())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return StoreError::PurchaseNotFound(purchase_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }
}

#[async_trait]
impl ContactLookup for PostgresStore {
    async fn get_contact(&self, user_id: UserId) -> Result<Option<Contact>> {
        let row = sqlx::query("SELECT first_name, contact_number FROM users WHERE id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Contact {
                user_id,
                first_name: row.try_get("first_name")?,
                contact_number: row.try_get("contact_number")?,
            })),
            None => Ok(None),
        }
    }
}
