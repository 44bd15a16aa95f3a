//! This module contains the logic for running a full day of the barbershop:
//! it creates the shared `Shop`, spawns one thread per barber and one per
//! customer, waits for every customer to be served or turned away, closes
//! the shop and collects the barbers.

use std::{sync::Arc, thread};

use tracing::info;

use super::{barber, customer, shop::Shop};
use crate::BarbershopError;

/// Outcome of one simulated day.
#[derive(Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub served: u32,
    pub dropped: u32,
    pub attended: u32,
}

pub fn start(barbers: usize, chairs: usize, customers: usize) -> Result<RunSummary, BarbershopError> {
    let shop = Arc::new(Shop::new(barbers, chairs));
    info!(
        "[Barbershop] Opening with {} barbers and {} waiting chairs",
        shop.total_barbers(),
        shop.total_chairs()
    );

    let barber_handles: Vec<_> = (0..shop.total_barbers())
        .map(|barber_id| {
            let shop = shop.clone();
            thread::spawn(move || barber::work(shop, barber_id))
        })
        .collect();

    let customer_handles: Vec<_> = (1..=customers as u32)
        .map(|customer_id| {
            let shop = shop.clone();
            thread::spawn(move || customer::visit(shop, customer_id))
        })
        .collect();

    let mut served = 0;
    for handle in customer_handles {
        let got_haircut = handle
            .join()
            .map_err(|_| BarbershopError::SystemError("Error joining customer thread.".to_string()))?
            .map_err(|err| BarbershopError::ShopError(err.to_string()))?;
        if got_haircut {
            served += 1;
        }
    }

    shop.close()
        .map_err(|err| BarbershopError::ShopError(err.to_string()))?;

    let mut attended = 0;
    for handle in barber_handles {
        attended += handle
            .join()
            .map_err(|_| BarbershopError::SystemError("Error joining barber thread.".to_string()))?
            .map_err(|err| BarbershopError::ShopError(err.to_string()))?;
    }

    let dropped = shop
        .drop_offs()
        .map_err(|err| BarbershopError::ShopError(err.to_string()))?;

    Ok(RunSummary {
        served,
        dropped,
        attended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_customer_is_accounted_for() {
        let summary = start(2, 2, 12).unwrap();

        assert_eq!(summary.served + summary.dropped, 12);
        assert_eq!(summary.attended, summary.served);
    }

    #[test]
    fn test_single_barber_no_chairs_day_completes() {
        let summary = start(1, 0, 5).unwrap();

        assert_eq!(summary.served + summary.dropped, 5);
        assert_eq!(summary.attended, summary.served);
    }

    #[test]
    fn test_day_with_no_customers_closes_cleanly() {
        let summary = start(3, 2, 0).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                served: 0,
                dropped: 0,
                attended: 0
            }
        );
    }
}
