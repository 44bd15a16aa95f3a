//! Customer thread body: show up after a random delay, visit the shop and,
//! if matched with a barber, stay until the hair-cut is done.

use std::{sync::Arc, thread, time::Duration};

use rand::{thread_rng, Rng};
use tracing::info;

use super::{
    constants::ARRIVAL_MAX_MILLIS,
    shop::{Shop, ShopError},
};

/// Returns whether the customer was served or turned away.
pub fn visit(shop: Arc<Shop>, customer_id: u32) -> Result<bool, ShopError> {
    thread::sleep(Duration::from_millis(
        thread_rng().gen_range(0..=ARRIVAL_MAX_MILLIS),
    ));

    info!("[Customer {}] Arrives at the barbershop", customer_id);
    match shop.visit_shop(customer_id)? {
        Some(barber_id) => {
            shop.leave_shop(customer_id, barber_id)?;
            info!("[Customer {}] Got a hair-cut from barber {}", customer_id, barber_id);
            Ok(true)
        }
        None => {
            info!("[Customer {}] Left without a hair-cut", customer_id);
            Ok(false)
        }
    }
}
