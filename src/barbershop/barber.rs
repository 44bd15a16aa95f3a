//! Barber thread body: greet a customer (or sleep until one shows up), cut
//! hair for a random while, then see the customer off. The loop ends when
//! `hello_customer` reports that the shop closed.

use std::{sync::Arc, thread, time::Duration};

use rand::{thread_rng, Rng};
use tracing::info;

use super::{
    constants::{HAIRCUT_MAX_MILLIS, HAIRCUT_MIN_MILLIS},
    shop::{Shop, ShopError},
};

/// Serves customers until the shop closes. Returns how many hair-cuts this
/// barber performed.
pub fn work(shop: Arc<Shop>, barber_id: usize) -> Result<u32, ShopError> {
    let mut attended = 0;
    while let Some(customer_id) = shop.hello_customer(barber_id)? {
        let haircut = thread_rng().gen_range(HAIRCUT_MIN_MILLIS..=HAIRCUT_MAX_MILLIS);
        thread::sleep(Duration::from_millis(haircut));
        shop.bye_customer(barber_id)?;
        attended += 1;
        info!(
            "[Barber {}] Done with customer {}, {} hair-cuts so far",
            barber_id, customer_id, attended
        );
    }
    info!("[Barber {}] Going home after {} hair-cuts", barber_id, attended);
    Ok(attended)
}
