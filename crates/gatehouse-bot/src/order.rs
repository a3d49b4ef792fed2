// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of `order` command arguments.
//!
//! Arguments are a comma-separated list of `name-or-id:quantity` tokens.
//! A token is split at its last `:` so product names may contain colons.
//! Bad tokens are skipped one by one; they never fail the whole command.

/// One well-formed order token, not yet resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderToken {
    pub reference: String,
    pub quantity: i64,
}

pub fn parse_order_items(args: &str) -> Vec<OrderToken> {
    args.split(',').filter_map(parse_token).collect()
}

fn parse_token(token: &str) -> Option<OrderToken> {
    let (reference, quantity) = token.trim().rsplit_once(':')?;
    let reference = reference.trim();
    let quantity: i64 = quantity.trim().parse().ok()?;
    if reference.is_empty() || quantity <= 0 {
        return None;
    }
    Some(OrderToken {
        reference: reference.to_string(),
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn skips_invalid_tokens_individually() {
        let items = parse_order_items("gaming laptop:1, bogus:-2, mousexyz:3, broken, :4, cable:x");
        assert_eq!(
            items,
            vec![
                OrderToken {
                    reference: "gaming laptop".into(),
                    quantity: 1
                },
                OrderToken {
                    reference: "mousexyz".into(),
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn splits_at_last_colon() {
        let items = parse_order_items("usb-c: 2m cable:2");
        assert_eq!(items[0].reference, "usb-c: 2m cable");
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn zero_quantity_is_skipped() {
        assert!(parse_order_items("laptop:0").is_empty());
        assert!(parse_order_items("").is_empty());
    }

    proptest! {
        #[test]
        fn parsed_items_always_have_positive_quantity(input in any::<String>()) {
            for item in parse_order_items(&input) {
                prop_assert!(item.quantity > 0);
                prop_assert!(!item.reference.is_empty());
            }
        }

        #[test]
        fn well_formed_tokens_round_trip(name in "[a-z][a-z ]{0,12}[a-z]", qty in 1i64..10_000) {
            let items = parse_order_items(&format!("{name}:{qty}"));
            prop_assert_eq!(items.len(), 1);
            prop_assert_eq!(&items[0].reference, &name);
            prop_assert_eq!(items[0].quantity, qty);
        }
    }
}
