// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply text rendering.

use std::fmt::Write;

use gatehouse_core::types::{Order, OrderPlacement, Product};

pub const NO_VALID_PRODUCTS: &str =
    "No valid products found in your order. Use: order <product or id>:<quantity>, ...";

/// Formats an amount in minor units, e.g. `IDR 1,250.00`.
pub fn format_price(minor_units: i64, currency: &str) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    let (major, minor) = (abs / 100, abs % 100);
    let digits = major.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{currency} {sign}{grouped}.{minor:02}")
}

pub fn catalog(products: &[Product], currency: &str) -> String {
    if products.is_empty() {
        return "No products are available right now.".to_string();
    }
    let mut out = String::from("Our catalog:");
    for p in products {
        let availability = if p.stock > 0 {
            format!("{} in stock", p.stock)
        } else {
            "out of stock".to_string()
        };
        let _ = write!(
            out,
            "\n#{} {} - {} ({availability})",
            p.id,
            p.name,
            format_price(p.price, currency)
        );
    }
    out.push_str("\n\nTo order, reply: order <product or id>:<quantity>");
    out
}

pub fn order_placement(placement: &OrderPlacement, currency: &str) -> String {
    let mut out = match &placement.order {
        Some(order) => {
            let mut text = format!("Order #{} received:", order.id);
            for line in &order.lines {
                let _ = write!(
                    text,
                    "\n- {} x{} = {}",
                    line.product_name,
                    line.quantity,
                    format_price(line.line_total, currency)
                );
            }
            let _ = write!(text, "\nTotal: {}", format_price(order.total, currency));
            text
        }
        None => "Sorry, none of the requested products are in stock right now.".to_string(),
    };
    for s in &placement.shortfalls {
        let _ = write!(
            out,
            "\nNote: only {} of {} {} available; we noted the rest and will follow up.",
            s.reserved, s.requested, s.product_name
        );
    }
    out
}

pub fn order_status(orders: &[Order], currency: &str) -> String {
    if orders.is_empty() {
        return "You have no orders yet. Type 'catalog' to browse products.".to_string();
    }
    let mut out = String::from("Your recent orders:");
    for o in orders {
        let items: usize = o.lines.len();
        let _ = write!(
            out,
            "\n#{} {} - {} ({items} item{})",
            o.id,
            o.status,
            format_price(o.total, currency),
            if items == 1 { "" } else { "s" }
        );
    }
    out
}
