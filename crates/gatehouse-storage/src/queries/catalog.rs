// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product catalog, order placement, and pending demand.

use gatehouse_core::GatehouseError;
use gatehouse_core::types::{
    Order, OrderItemRequest, OrderLine, OrderPlacement, PendingDemand, Product, Shortfall,
    now_timestamp,
};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const PRODUCT_COLUMNS: &str = "SELECT id, tenant_id, name, price, stock, active FROM products";

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        stock: row.get(4)?,
        active: row.get(5)?,
    })
}

/// Active products of a tenant ordered by name.
pub async fn list_products(db: &Database, tenant_id: &str) -> Result<Vec<Product>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "{PRODUCT_COLUMNS} WHERE tenant_id = ?1 AND active = 1 ORDER BY name COLLATE NOCASE, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![tenant_id], row_to_product)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_product(
    db: &Database,
    tenant_id: &str,
    name: &str,
    price: i64,
    stock: i64,
) -> Result<Product, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO products (tenant_id, name, price, stock) VALUES (?1, ?2, ?3, ?4)",
                params![tenant_id, name, price, stock],
            )?;
            Ok(Product {
                id: conn.last_insert_rowid(),
                tenant_id,
                name,
                price,
                stock,
                active: true,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve an active product by numeric id, then by case-insensitive name.
pub async fn find_product(
    db: &Database,
    tenant_id: &str,
    reference: &str,
) -> Result<Option<Product>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let reference = reference.trim().to_string();
    db.connection()
        .call(move |conn| {
            if let Ok(id) = reference.parse::<i64>() {
                let sql = format!("{PRODUCT_COLUMNS} WHERE id = ?1 AND tenant_id = ?2 AND active = 1");
                let by_id = conn
                    .query_row(&sql, params![id, tenant_id], row_to_product)
                    .optional()?;
                if by_id.is_some() {
                    return Ok(by_id);
                }
            }
            let sql = format!(
                "{PRODUCT_COLUMNS} WHERE tenant_id = ?1 AND active = 1 AND lower(name) = lower(?2)
                 ORDER BY id LIMIT 1"
            );
            conn.query_row(&sql, params![tenant_id, reference], row_to_product)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Reserve stock and create an order in a single transaction.
///
/// Each requested line reserves `min(quantity, stock)`. Lines reserving
/// nothing are left out of the order; every unreserved quantity becomes a
/// pending demand row. No order is created when nothing was reserved.
pub async fn place_order(
    db: &Database,
    tenant_id: &str,
    contact_id: i64,
    items: &[OrderItemRequest],
) -> Result<OrderPlacement, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let items = items.to_vec();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut lines = Vec::new();
            let mut shortfalls = Vec::new();

            for item in items.iter().filter(|i| i.quantity > 0) {
                let product = tx
                    .query_row(
                        "SELECT name, price, stock FROM products
                         WHERE id = ?1 AND tenant_id = ?2 AND active = 1",
                        params![item.product_id, tenant_id],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
                    )
                    .optional()?;
                let Some((name, price, stock)) = product else {
                    continue;
                };

                let reserved = item.quantity.min(stock.max(0));
                if reserved > 0 {
                    tx.execute(
                        "UPDATE products SET stock = stock - ?1 WHERE id = ?2",
                        params![reserved, item.product_id],
                    )?;
                    lines.push(OrderLine {
                        product_id: item.product_id,
                        product_name: name.clone(),
                        quantity: reserved,
                        unit_price: price,
                        line_total: price * reserved,
                    });
                }
                if reserved < item.quantity {
                    tx.execute(
                        "INSERT INTO pending_demand (tenant_id, product_id, quantity, requester_id, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![tenant_id, item.product_id, item.quantity - reserved, contact_id, now],
                    )?;
                    shortfalls.push(Shortfall {
                        product_id: item.product_id,
                        product_name: name,
                        requested: item.quantity,
                        reserved,
                    });
                }
            }

            let order = if lines.is_empty() {
                None
            } else {
                let total: i64 = lines.iter().map(|l| l.line_total).sum();
                tx.execute(
                    "INSERT INTO orders (tenant_id, contact_id, status, total, created_at)
                     VALUES (?1, ?2, 'pending', ?3, ?4)",
                    params![tenant_id, contact_id, total, now],
                )?;
                let order_id = tx.last_insert_rowid();
                for line in &lines {
                    tx.execute(
                        "INSERT INTO order_lines
                             (order_id, product_id, product_name, quantity, unit_price, line_total)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            order_id,
                            line.product_id,
                            line.product_name,
                            line.quantity,
                            line.unit_price,
                            line.line_total,
                        ],
                    )?;
                }
                Some(Order {
                    id: order_id,
                    tenant_id: tenant_id.clone(),
                    contact_id,
                    status: "pending".to_string(),
                    total,
                    created_at: now.clone(),
                    lines,
                })
            };

            tx.commit()?;
            Ok(OrderPlacement { order, shortfalls })
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent orders of a contact, newest first, with their lines.
pub async fn recent_orders(
    db: &Database,
    tenant_id: &str,
    contact_id: i64,
    limit: i64,
) -> Result<Vec<Order>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, contact_id, status, total, created_at FROM orders
                 WHERE tenant_id = ?1 AND contact_id = ?2
                 ORDER BY created_at DESC, id DESC LIMIT ?3",
            )?;
            let mut orders = stmt
                .query_map(params![tenant_id, contact_id, limit], |row| {
                    Ok(Order {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        contact_id: row.get(2)?,
                        status: row.get(3)?,
                        total: row.get(4)?,
                        created_at: row.get(5)?,
                        lines: Vec::new(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut line_stmt = conn.prepare(
                "SELECT product_id, product_name, quantity, unit_price, line_total
                 FROM order_lines WHERE order_id = ?1 ORDER BY id",
            )?;
            for order in &mut orders {
                order.lines = line_stmt
                    .query_map(params![order.id], |row| {
                        Ok(OrderLine {
                            product_id: row.get(0)?,
                            product_name: row.get(1)?,
                            quantity: row.get(2)?,
                            unit_price: row.get(3)?,
                            line_total: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
            }
            Ok(orders)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn pending_demand(db: &Database, tenant_id: &str) -> Result<Vec<PendingDemand>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, product_id, quantity, requester_id, created_at
                 FROM pending_demand WHERE tenant_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(PendingDemand {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    product_id: row.get(2)?,
                    quantity: row.get(3)?,
                    requester_id: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::contacts;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn find_by_id_or_name() {
        let (db, _dir) = setup_db().await;
        let laptop = insert_product(&db, "t1", "Gaming Laptop", 15_000_000, 3).await.unwrap();

        let by_name = find_product(&db, "t1", "gaming laptop").await.unwrap().unwrap();
        assert_eq!(by_name.id, laptop.id);
        let by_id = find_product(&db, "t1", &laptop.id.to_string()).await.unwrap().unwrap();
        assert_eq!(by_id.name, "Gaming Laptop");
        assert!(find_product(&db, "t2", "gaming laptop").await.unwrap().is_none());
        assert!(find_product(&db, "t1", "MouseXYZ").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn order_reserves_stock_and_records_shortfall() {
        let (db, _dir) = setup_db().await;
        let buyer = contacts::upsert_contact(&db, "t1", "Ana", "628123").await.unwrap();
        let laptop = insert_product(&db, "t1", "Gaming Laptop", 1_000, 2).await.unwrap();
        let mouse = insert_product(&db, "t1", "Mouse", 50, 0).await.unwrap();

        let placement = place_order(
            &db,
            "t1",
            buyer.id,
            &[
                OrderItemRequest { product_id: laptop.id, quantity: 3 },
                OrderItemRequest { product_id: mouse.id, quantity: 1 },
            ],
        )
        .await
        .unwrap();

        let order = placement.order.unwrap();
        assert_eq!(order.lines.len(), 1, "zero-stock item must be excluded");
        assert_eq!(order.lines[0].quantity, 2);
        assert_eq!(order.total, 2_000);
        assert_eq!(placement.shortfalls.len(), 2);

        let remaining = find_product(&db, "t1", "Gaming Laptop").await.unwrap().unwrap();
        assert_eq!(remaining.stock, 0);

        let demand = pending_demand(&db, "t1").await.unwrap();
        assert_eq!(demand.len(), 2);
        assert_eq!(demand[0].quantity, 1);
        assert_eq!(demand[0].requester_id, buyer.id);

        let history = recent_orders(&db, "t1", buyer.id, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lines, order.lines);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn nothing_reservable_creates_no_order() {
        let (db, _dir) = setup_db().await;
        let buyer = contacts::upsert_contact(&db, "t1", "Ana", "628123").await.unwrap();
        let sold_out = insert_product(&db, "t1", "Sold Out", 10, 0).await.unwrap();

        let placement = place_order(
            &db,
            "t1",
            buyer.id,
            &[OrderItemRequest { product_id: sold_out.id, quantity: 4 }],
        )
        .await
        .unwrap();
        assert!(placement.order.is_none());
        assert_eq!(placement.shortfalls[0].reserved, 0);
        assert!(recent_orders(&db, "t1", buyer.id, 5).await.unwrap().is_empty());
        assert_eq!(pending_demand(&db, "t1").await.unwrap()[0].quantity, 4);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_products_sorted_by_name() {
        let (db, _dir) = setup_db().await;
        insert_product(&db, "t1", "zebra", 1, 1).await.unwrap();
        insert_product(&db, "t1", "Apple", 1, 1).await.unwrap();
        let names: Vec<_> = list_products(&db, "t1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Apple", "zebra"]);
        db.close().await.unwrap();
    }
}
