//! Item-composition fingerprinting.
//!
//! The downstream packaging decision engine keys off a shipment's product
//! composition. Before the nested item collection is replaced from a fresh
//! snapshot, the old and new compositions are fingerprinted; a difference
//! marks a split/merge event that invalidates derived packaging decisions.

use std::collections::BTreeMap;

use crate::types::ShipmentItem;

/// Computes the canonical fingerprint of an item set: quantities summed per
/// SKU, sorted, rendered as `SKU:quantity` pairs joined with `|`.
///
/// The fingerprint is order-independent and merges duplicate SKU lines, so
/// two snapshots of the same physical composition always agree.
pub fn item_fingerprint(items: &[ShipmentItem]) -> String {
    let mut by_sku: BTreeMap<&str, u64> = BTreeMap::new();
    for item in items {
        *by_sku.entry(item.sku.as_str()).or_insert(0) += u64::from(item.quantity);
    }
    by_sku
        .into_iter()
        .map(|(sku, quantity)| format!("{sku}:{quantity}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Returns true if the two item sets represent different compositions.
pub fn composition_changed(old: &[ShipmentItem], new: &[ShipmentItem]) -> bool {
    item_fingerprint(old) != item_fingerprint(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(sku: &str, quantity: u32) -> ShipmentItem {
        ShipmentItem {
            sku: sku.to_string(),
            name: None,
            quantity,
            unit_price: None,
        }
    }

    #[test]
    fn fingerprint_is_sorted_and_joined() {
        let items = vec![item("ZULU", 1), item("ALPHA", 3)];
        assert_eq!(item_fingerprint(&items), "ALPHA:3|ZULU:1");
    }

    #[test]
    fn fingerprint_merges_duplicate_skus() {
        let items = vec![item("A", 1), item("A", 2)];
        assert_eq!(item_fingerprint(&items), "A:3");
    }

    #[test]
    fn empty_set_has_empty_fingerprint() {
        assert_eq!(item_fingerprint(&[]), "");
    }

    #[test]
    fn quantity_change_is_a_composition_change() {
        let old = vec![item("A", 1)];
        let new = vec![item("A", 2)];
        assert!(composition_changed(&old, &new));
    }

    #[test]
    fn name_and_price_changes_are_not_composition_changes() {
        let old = vec![ShipmentItem {
            sku: "A".to_string(),
            name: Some("Widget".to_string()),
            quantity: 1,
            unit_price: Some(9.99),
        }];
        let new = vec![ShipmentItem {
            sku: "A".to_string(),
            name: Some("Widget (renamed)".to_string()),
            quantity: 1,
            unit_price: Some(12.99),
        }];
        assert!(!composition_changed(&old, &new));
    }

    proptest! {
        /// Fingerprints are invariant under item reordering.
        #[test]
        fn prop_fingerprint_order_independent(
            mut skus in prop::collection::vec(("[A-Z]{1,5}", 1u32..10), 0..8)
        ) {
            let items: Vec<_> = skus.iter().map(|(s, q)| item(s, *q)).collect();
            let forward = item_fingerprint(&items);
            skus.reverse();
            let reversed: Vec<_> = skus.iter().map(|(s, q)| item(s, *q)).collect();
            prop_assert_eq!(forward, item_fingerprint(&reversed));
        }
    }
}
