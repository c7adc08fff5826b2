//! Balance arithmetic for stock movements, free of any I/O.

use crate::constants::{entities, MovementType};
use crate::error::{FleetError, Result};
use uuid::Uuid;

/// Result of applying one movement to a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Stored quantity: positive amount for `in`/`out`, signed delta for `adjustment`
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
}

/// Compute the outcome of a movement against `current`.
///
/// `in` and `out` take a positive `quantity`. `adjustment` takes the target
/// balance in `quantity_after` and records the signed difference.
pub fn apply_movement(
    item_id: Uuid,
    current: i64,
    movement_type: MovementType,
    quantity: Option<i64>,
    quantity_after: Option<i64>,
) -> Result<MovementOutcome> {
    match movement_type {
        MovementType::In => {
            let quantity = positive(quantity)?;
            let after = current.checked_add(quantity).ok_or_else(|| {
                FleetError::InvalidQuantity(format!("balance overflow adding {quantity}"))
            })?;
            Ok(MovementOutcome {
                quantity,
                quantity_before: current,
                quantity_after: after,
            })
        }
        MovementType::Out => {
            let quantity = positive(quantity)?;
            if quantity > current {
                return Err(FleetError::InsufficientStock {
                    entity: entities::INVENTORY_ITEM,
                    id: item_id,
                    available: current,
                    requested: quantity,
                });
            }
            Ok(MovementOutcome {
                quantity,
                quantity_before: current,
                quantity_after: current - quantity,
            })
        }
        MovementType::Adjustment => {
            let target = quantity_after.ok_or_else(|| {
                FleetError::validation("quantityAfter is required for adjustments")
            })?;
            if target < 0 {
                return Err(FleetError::InvalidQuantity(format!(
                    "adjusted balance must not be negative, got {target}"
                )));
            }
            let delta = target - current;
            if delta == 0 {
                return Err(FleetError::InvalidQuantity(format!(
                    "adjustment to {target} does not change the balance"
                )));
            }
            Ok(MovementOutcome {
                quantity: delta,
                quantity_before: current,
                quantity_after: target,
            })
        }
    }
}

/// Signed effect of a stored movement on the balance.
pub fn signed_delta(movement_type: MovementType, quantity: i64) -> i64 {
    match movement_type {
        MovementType::In => quantity,
        MovementType::Out => -quantity,
        MovementType::Adjustment => quantity,
    }
}

fn positive(quantity: Option<i64>) -> Result<i64> {
    match quantity {
        Some(q) if q > 0 => Ok(q),
        Some(q) => Err(FleetError::InvalidQuantity(format!(
            "quantity must be positive, got {q}"
        ))),
        None => Err(FleetError::InvalidQuantity("quantity is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_out_within_balance() {
        let outcome = apply_movement(Uuid::nil(), 100, MovementType::Out, Some(30), None).unwrap();
        assert_eq!(outcome.quantity_before, 100);
        assert_eq!(outcome.quantity_after, 70);
        assert_eq!(outcome.quantity, 30);
    }

    #[test]
    fn test_out_beyond_balance_is_rejected() {
        let err = apply_movement(Uuid::nil(), 70, MovementType::Out, Some(80), None).unwrap_err();
        assert!(matches!(
            err,
            FleetError::InsufficientStock { available: 70, requested: 80, .. }
        ));
    }

    #[test]
    fn test_non_positive_quantities_are_rejected() {
        for q in [Some(0), Some(-5), None] {
            let err = apply_movement(Uuid::nil(), 10, MovementType::In, q, None).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_QUANTITY");
        }
    }

    #[test]
    fn test_adjustment_records_signed_delta() {
        let down = apply_movement(Uuid::nil(), 50, MovementType::Adjustment, None, Some(42)).unwrap();
        assert_eq!(down.quantity, -8);
        assert_eq!(down.quantity_after, 42);

        let up = apply_movement(Uuid::nil(), 50, MovementType::Adjustment, Some(999), Some(60)).unwrap();
        assert_eq!(up.quantity, 10);

        assert!(apply_movement(Uuid::nil(), 50, MovementType::Adjustment, None, Some(50)).is_err());
        assert!(apply_movement(Uuid::nil(), 50, MovementType::Adjustment, None, Some(-1)).is_err());
        assert_eq!(
            apply_movement(Uuid::nil(), 50, MovementType::Adjustment, Some(5), None)
                .unwrap_err()
                .error_code(),
            "VALIDATION_ERROR"
        );
    }

    fn movement_strategy() -> impl Strategy<Value = (MovementType, i64)> {
        prop_oneof![
            (1i64..500).prop_map(|q| (MovementType::In, q)),
            (1i64..500).prop_map(|q| (MovementType::Out, q)),
            (0i64..1000).prop_map(|target| (MovementType::Adjustment, target)),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_equals_sum_of_accepted_movements(
            movements in proptest::collection::vec(movement_strategy(), 0..60)
        ) {
            let mut balance = 0i64;
            let mut signed_sum = 0i64;

            for (movement_type, value) in movements {
                let (quantity, quantity_after) = match movement_type {
                    MovementType::Adjustment => (None, Some(value)),
                    _ => (Some(value), None),
                };
                match apply_movement(Uuid::nil(), balance, movement_type, quantity, quantity_after) {
                    Ok(outcome) => {
                        prop_assert_eq!(outcome.quantity_before, balance);
                        prop_assert_eq!(
                            outcome.quantity_after,
                            outcome.quantity_before + signed_delta(movement_type, outcome.quantity)
                        );
                        signed_sum += signed_delta(movement_type, outcome.quantity);
                        balance = outcome.quantity_after;
                    }
                    Err(FleetError::InsufficientStock { available, requested, .. }) => {
                        prop_assert_eq!(available, balance);
                        prop_assert!(requested > balance);
                    }
                    Err(_) => {}
                }
                prop_assert!(balance >= 0);
            }

            prop_assert_eq!(balance, signed_sum);
        }
    }
}
