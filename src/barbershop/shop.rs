//! This module contains the `Shop` monitor, the synchronization core of the
//! barbershop.
//!
//! Every piece of shared state lives in a single `ShopState` guarded by one
//! mutex, and every suspension happens on a targeted condition variable:
//! one per waiting chair (so a barber can call one specific seated customer)
//! and three per barber (customer ready, service done, customer leave). All
//! signals are one-to-one; nothing is ever broadcast except `close`, which
//! has to release every parked barber at once.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::{error::Error, fmt};

use tracing::{debug, error, info};

#[derive(Debug, PartialEq, Eq)]
pub enum ShopError {
    /// A caller broke the visit/serve protocol; the shop state was left
    /// untouched by the offending call.
    ProtocolViolation(String),
    /// A thread panicked while holding the shop lock.
    PoisonedLock(String),
}

impl fmt::Display for ShopError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for ShopError {}

/// What a barber's service chair currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceChair {
    Sleeping,
    Taken(u32),
}

/// All mutable shop state. Only ever touched while holding `Shop::state`.
#[derive(Debug)]
struct ShopState {
    waiting_chairs: Vec<Option<u32>>,
    service_chairs: Vec<ServiceChair>,
    at_service: Vec<bool>,
    in_shop: Vec<bool>,
    turn: usize,
    is_open: bool,
    drop_offs: u32,
}

impl ShopState {
    fn new(barbers: usize, chairs: usize) -> Self {
        Self {
            waiting_chairs: vec![None; chairs],
            service_chairs: vec![ServiceChair::Sleeping; barbers],
            at_service: vec![false; barbers],
            in_shop: vec![false; barbers],
            turn: 0,
            is_open: true,
            drop_offs: 0,
        }
    }

    fn available_waiting_chairs(&self) -> usize {
        self.waiting_chairs.iter().filter(|c| c.is_none()).count()
    }

    fn available_barbers(&self) -> usize {
        self.service_chairs
            .iter()
            .filter(|c| **c == ServiceChair::Sleeping)
            .count()
    }

    /// Seats `customer_id` in the first empty chair scanning circularly from
    /// `turn`, so occupancy stays contiguous with the rotation instead of
    /// piling up at index zero.
    fn take_waiting_chair(&mut self, customer_id: u32) -> Result<usize, ShopError> {
        let total_chairs = self.waiting_chairs.len();
        for i in 0..total_chairs {
            let seat = (i + self.turn) % total_chairs;
            if self.waiting_chairs[seat].is_none() {
                self.waiting_chairs[seat] = Some(customer_id);
                return Ok(seat);
            }
        }
        error!(
            "[Shop] No waiting chair available for customer {} after a positive availability check",
            customer_id
        );
        Err(ShopError::ProtocolViolation(format!(
            "no waiting chair available for customer {}",
            customer_id
        )))
    }

    fn leave_waiting_chair(&mut self, customer_id: u32, seat: usize) -> Result<(), ShopError> {
        if self.waiting_chairs[seat] != Some(customer_id) {
            error!(
                "[Shop] Customer {} is not sitting on waiting chair {}",
                customer_id, seat
            );
            return Err(ShopError::ProtocolViolation(format!(
                "customer {} is not sitting on waiting chair {}",
                customer_id, seat
            )));
        }
        self.waiting_chairs[seat] = None;
        Ok(())
    }

    /// Scans the service chairs for the barber that called `customer_id`.
    fn find_my_barber(&self, customer_id: u32) -> Option<usize> {
        self.service_chairs
            .iter()
            .position(|chair| *chair == ServiceChair::Taken(customer_id))
    }

    /// Claims the first sleeping barber for `customer_id`.
    fn pick_my_barber(&mut self, customer_id: u32) -> Result<usize, ShopError> {
        for (barber_id, chair) in self.service_chairs.iter_mut().enumerate() {
            if *chair == ServiceChair::Sleeping {
                *chair = ServiceChair::Taken(customer_id);
                return Ok(barber_id);
            }
        }
        error!(
            "[Shop] No barber available for customer {} after a positive availability check",
            customer_id
        );
        Err(ShopError::ProtocolViolation(format!(
            "no barber available for customer {}",
            customer_id
        )))
    }

    /// Picks the earliest-seated waiting customer: the one at `turn`. Seats
    /// are always filled starting from `turn`, so if anyone is waiting this
    /// slot is occupied. Advances `turn` by one on success.
    fn pick_my_customer(&mut self, barber_id: usize) -> Result<(usize, u32), ShopError> {
        match self.waiting_chairs.get(self.turn).copied().flatten() {
            Some(customer_id) => {
                let seat = self.turn;
                self.turn = (self.turn + 1) % self.waiting_chairs.len();
                Ok((seat, customer_id))
            }
            None => {
                error!(
                    "[Shop] Barber {} was told to pick a customer but nobody is waiting",
                    barber_id
                );
                Err(ShopError::ProtocolViolation(format!(
                    "barber {} has no waiting customer to pick",
                    barber_id
                )))
            }
        }
    }
}

/// The barbershop monitor shared by every customer and barber thread.
///
/// The four entry points (`visit_shop`, `leave_shop`, `hello_customer`,
/// `bye_customer`) each run entirely inside the critical section; the only
/// way a caller suspends is through a predicate-guarded condition wait that
/// atomically releases and reacquires the lock.
pub struct Shop {
    total_barbers: usize,
    total_chairs: usize,
    state: Mutex<ShopState>,
    waiting_called: Vec<Condvar>,
    customer_ready: Vec<Condvar>,
    service_done: Vec<Condvar>,
    customer_leave: Vec<Condvar>,
}

impl Default for Shop {
    fn default() -> Self {
        Self::new(
            super::constants::DEFAULT_BARBERS,
            super::constants::DEFAULT_CHAIRS,
        )
    }
}

impl Shop {
    /// Creates a shop with fixed capacity. `barbers` is coerced to at least
    /// one; a shop with zero waiting chairs is valid (walk-in only).
    pub fn new(barbers: usize, chairs: usize) -> Self {
        let barbers = barbers.max(1);
        Self {
            total_barbers: barbers,
            total_chairs: chairs,
            state: Mutex::new(ShopState::new(barbers, chairs)),
            waiting_called: (0..chairs).map(|_| Condvar::new()).collect(),
            customer_ready: (0..barbers).map(|_| Condvar::new()).collect(),
            service_done: (0..barbers).map(|_| Condvar::new()).collect(),
            customer_leave: (0..barbers).map(|_| Condvar::new()).collect(),
        }
    }

    pub fn total_barbers(&self) -> usize {
        self.total_barbers
    }

    pub fn total_chairs(&self) -> usize {
        self.total_chairs
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ShopState>, ShopError> {
        self.state
            .lock()
            .map_err(|err| ShopError::PoisonedLock(err.to_string()))
    }

    fn wait_while_on<'a, F>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, ShopState>,
        condition: F,
    ) -> Result<MutexGuard<'a, ShopState>, ShopError>
    where
        F: FnMut(&mut ShopState) -> bool,
    {
        condvar
            .wait_while(guard, condition)
            .map_err(|err| ShopError::PoisonedLock(err.to_string()))
    }

    /// Both assignment paths of `visit_shop` converge here: the side that
    /// completes the match sets the flag and wakes the barber, exactly once.
    fn commit_match(&self, state: &mut ShopState, barber_id: usize) {
        state.at_service[barber_id] = true;
        self.customer_ready[barber_id].notify_one();
    }

    /// Customer arrival. Returns `Ok(Some(barber_id))` once the customer has
    /// been matched with a barber, or `Ok(None)` if the customer was turned
    /// away because no waiting chair and no barber were available.
    ///
    /// The turned-away path is the only one that never blocks; a customer
    /// that takes a waiting chair suspends until a barber calls them.
    pub fn visit_shop(&self, customer_id: u32) -> Result<Option<usize>, ShopError> {
        let mut state = self.lock_state()?;

        if state.available_waiting_chairs() == 0 && state.available_barbers() == 0 {
            state.drop_offs += 1;
            info!(
                "[Shop] Customer {} leaves the shop, no waiting chair nor barber available",
                customer_id
            );
            return Ok(None);
        }

        let my_barber = if state.available_barbers() == 0 {
            // No barber free: take a waiting chair and wait to be called.
            let my_seat = state.take_waiting_chair(customer_id)?;
            info!(
                "[Shop] Customer {} takes waiting chair {}, chairs still available: {}",
                customer_id,
                my_seat,
                state.available_waiting_chairs()
            );
            state = self.wait_while_on(&self.waiting_called[my_seat], state, |state| {
                state.find_my_barber(customer_id).is_none()
            })?;
            let my_barber = state.find_my_barber(customer_id).ok_or_else(|| {
                ShopError::ProtocolViolation(format!(
                    "customer {} was woken without an assigned barber",
                    customer_id
                ))
            })?;
            state.leave_waiting_chair(customer_id, my_seat)?;
            info!(
                "[Shop] Customer {} moves to the service chair of barber {}, chairs available: {}",
                customer_id,
                my_barber,
                state.available_waiting_chairs()
            );
            my_barber
        } else {
            let my_barber = state.pick_my_barber(customer_id)?;
            info!(
                "[Shop] Customer {} wakes up barber {}",
                customer_id, my_barber
            );
            my_barber
        };

        self.commit_match(&mut state, my_barber);
        Ok(Some(my_barber))
    }

    /// Customer departure: waits until `barber_id` announces the haircut is
    /// done, then acknowledges leaving so the barber can take the next one.
    pub fn leave_shop(&self, customer_id: u32, barber_id: usize) -> Result<(), ShopError> {
        let mut state = self.lock_state()?;
        debug!(
            "[Shop] Customer {} waits for barber {} to finish the hair-cut",
            customer_id, barber_id
        );
        state = self.wait_while_on(&self.service_done[barber_id], state, |state| {
            state.at_service[barber_id]
        })?;
        info!(
            "[Shop] Customer {} pays barber {} and leaves the shop",
            customer_id, barber_id
        );
        state.in_shop[barber_id] = false;
        self.customer_leave[barber_id].notify_one();
        Ok(())
    }

    /// Barber looks for a customer to serve. If somebody is waiting, the
    /// barber calls the customer whose chair the rotation points at; if not,
    /// the barber goes to sleep until a walk-in claims them. Returns the
    /// matched customer, or `Ok(None)` if the shop closed while the barber
    /// slept, so the caller's serve loop can exit.
    pub fn hello_customer(&self, barber_id: usize) -> Result<Option<u32>, ShopError> {
        let mut state = self.lock_state()?;

        // A walk-in may have claimed this barber before the barber got back
        // to look for customers; in that case the match is already committed
        // and the service chair must not be touched.
        let mut picked = false;
        if !state.at_service[barber_id] {
            if state.available_waiting_chairs() == self.total_chairs {
                info!("[Shop] Barber {} goes to sleep, no customer waiting", barber_id);
                state.service_chairs[barber_id] = ServiceChair::Sleeping;
            } else {
                let (seat, my_customer) = state.pick_my_customer(barber_id)?;
                state.service_chairs[barber_id] = ServiceChair::Taken(my_customer);
                info!(
                    "[Shop] Barber {} calls for customer {} on waiting chair {}",
                    barber_id, my_customer, seat
                );
                self.waiting_called[seat].notify_one();
                picked = true;
            }
        }

        // A called customer is guaranteed to commit the match, so a barber
        // that picked someone keeps waiting even if the shop closed in the
        // meantime; abandoning the pick here would strand that customer in
        // `leave_shop` with nobody to finish the service.
        state = self.wait_while_on(&self.customer_ready[barber_id], state, |state| {
            !state.at_service[barber_id] && (state.is_open || picked)
        })?;

        if !state.at_service[barber_id] {
            info!("[Shop] Barber {} goes home, the shop closed", barber_id);
            return Ok(None);
        }

        let my_customer = match state.service_chairs[barber_id] {
            ServiceChair::Taken(customer_id) => customer_id,
            ServiceChair::Sleeping => {
                error!(
                    "[Shop] Barber {} is at service but has no customer on the service chair",
                    barber_id
                );
                return Err(ShopError::ProtocolViolation(format!(
                    "barber {} is at service without a customer",
                    barber_id
                )));
            }
        };
        if state.is_open {
            state.in_shop[barber_id] = true;
            info!(
                "[Shop] Barber {} starts hair-cut for customer {}",
                barber_id, my_customer
            );
        }
        Ok(Some(my_customer))
    }

    /// Barber finished a haircut: releases the customer and waits for them to
    /// formally leave before becoming available again. This handshake keeps a
    /// barber from starting a new `hello_customer` cycle while the previous
    /// customer is still in the service chair.
    pub fn bye_customer(&self, barber_id: usize) -> Result<(), ShopError> {
        let mut state = self.lock_state()?;
        if let ServiceChair::Taken(customer_id) = state.service_chairs[barber_id] {
            info!(
                "[Shop] Barber {} finished the hair-cut for customer {}",
                barber_id, customer_id
            );
        }
        state.at_service[barber_id] = false;
        self.service_done[barber_id].notify_one();
        let _state = self.wait_while_on(&self.customer_leave[barber_id], state, |state| {
            state.is_open && state.in_shop[barber_id]
        })?;
        Ok(())
    }

    /// Cooperatively closes the shop: no new matches will start and every
    /// barber parked asleep or waiting for a departing customer is released.
    /// Customers already mid-service are not interrupted. Idempotent.
    pub fn close(&self) -> Result<(), ShopError> {
        let mut state = self.lock_state()?;
        if state.is_open {
            state.is_open = false;
            info!("[Shop] The shop is closing, no more customers will be taken");
        }
        drop(state);
        for condvar in self.customer_ready.iter().chain(self.customer_leave.iter()) {
            condvar.notify_all();
        }
        Ok(())
    }

    pub fn is_open(&self) -> Result<bool, ShopError> {
        Ok(self.lock_state()?.is_open)
    }

    /// Number of customers turned away so far.
    pub fn drop_offs(&self) -> Result<u32, ShopError> {
        Ok(self.lock_state()?.drop_offs)
    }

    pub fn available_waiting_chairs(&self) -> Result<usize, ShopError> {
        Ok(self.lock_state()?.available_waiting_chairs())
    }

    pub fn available_barbers(&self) -> Result<usize, ShopError> {
        Ok(self.lock_state()?.available_barbers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{mpsc::channel, Arc},
        thread,
        time::Duration,
    };

    #[test]
    fn test_take_waiting_chair_scans_from_turn_and_wraps() {
        let mut state = ShopState::new(1, 3);
        state.turn = 2;

        assert_eq!(state.take_waiting_chair(7), Ok(2));
        assert_eq!(state.take_waiting_chair(8), Ok(0));
        assert_eq!(state.take_waiting_chair(9), Ok(1));
        assert!(matches!(
            state.take_waiting_chair(10),
            Err(ShopError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_pick_my_customer_advances_turn_by_one() {
        let mut state = ShopState::new(1, 3);
        state.take_waiting_chair(7).unwrap();
        state.take_waiting_chair(8).unwrap();

        assert_eq!(state.pick_my_customer(0), Ok((0, 7)));
        assert_eq!(state.turn, 1);
        assert_eq!(state.pick_my_customer(0), Ok((1, 8)));
        assert_eq!(state.turn, 2);
        assert!(matches!(
            state.pick_my_customer(0),
            Err(ShopError::ProtocolViolation(_))
        ));
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn test_leave_waiting_chair_detects_wrong_occupant() {
        let mut state = ShopState::new(1, 2);
        let seat = state.take_waiting_chair(7).unwrap();

        assert!(matches!(
            state.leave_waiting_chair(99, seat),
            Err(ShopError::ProtocolViolation(_))
        ));
        assert_eq!(state.waiting_chairs[seat], Some(7));

        assert_eq!(state.leave_waiting_chair(7, seat), Ok(()));
        assert_eq!(state.waiting_chairs[seat], None);
    }

    #[test]
    fn test_find_my_barber_matches_only_own_id() {
        let mut state = ShopState::new(3, 0);
        state.service_chairs[1] = ServiceChair::Taken(42);

        assert_eq!(state.find_my_barber(42), Some(1));
        assert_eq!(state.find_my_barber(7), None);
    }

    #[test]
    fn test_walk_ins_get_distinct_barbers_and_third_is_dropped() {
        // Two barbers, zero waiting chairs: walk-in only.
        let shop = Shop::new(2, 0);

        let first = shop.visit_shop(1).unwrap();
        let second = shop.visit_shop(2).unwrap();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first, second);

        assert_eq!(shop.visit_shop(3).unwrap(), None);
        assert_eq!(shop.drop_offs().unwrap(), 1);
    }

    #[test]
    fn test_barbers_coerced_to_at_least_one() {
        let shop = Shop::new(0, 0);
        assert_eq!(shop.total_barbers(), 1);
        assert_eq!(shop.available_barbers().unwrap(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let shop = Shop::new(1, 1);
        assert!(shop.is_open().unwrap());
        shop.close().unwrap();
        assert!(!shop.is_open().unwrap());
        shop.close().unwrap();
        assert!(!shop.is_open().unwrap());
    }

    #[test]
    fn test_close_releases_a_sleeping_barber() {
        let shop = Arc::new(Shop::new(1, 2));

        let shop_barber = shop.clone();
        let barber = thread::spawn(move || shop_barber.hello_customer(0));

        // Let the barber park itself before closing.
        while shop.available_barbers().unwrap() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        shop.close().unwrap();

        assert_eq!(barber.join().unwrap().unwrap(), None);
    }

    #[test]
    fn test_close_releases_a_barber_waiting_for_departure() {
        let shop = Arc::new(Shop::new(1, 0));
        assert_eq!(shop.visit_shop(1).unwrap(), Some(0));

        let (tx, rx) = channel();
        let shop_barber = shop.clone();
        let barber = thread::spawn(move || {
            let customer = shop_barber.hello_customer(0).unwrap();
            tx.send(customer).unwrap();
            // The customer never calls leave_shop; only close() unblocks us.
            shop_barber.bye_customer(0).unwrap();
        });

        assert_eq!(rx.recv().unwrap(), Some(1));
        thread::sleep(Duration::from_millis(20));
        shop.close().unwrap();
        barber.join().unwrap();
    }

    #[test]
    fn test_sleeping_barber_is_woken_by_one_walk_in() {
        let shop = Arc::new(Shop::new(1, 3));

        let (tx, rx) = channel();
        let shop_barber = shop.clone();
        let barber = thread::spawn(move || {
            let customer = shop_barber.hello_customer(0).unwrap();
            tx.send(customer).unwrap();
            shop_barber.bye_customer(0).unwrap();
        });

        let assigned = shop.visit_shop(7).unwrap();
        assert_eq!(assigned, Some(0));
        assert_eq!(rx.recv().unwrap(), Some(7));

        shop.leave_shop(7, 0).unwrap();
        barber.join().unwrap();
        assert_eq!(shop.drop_offs().unwrap(), 0);
    }

    #[test]
    fn test_single_chair_scenario_drops_third_customer() {
        let shop = Arc::new(Shop::new(1, 1));

        // Customer 1 walks straight to the only barber.
        assert_eq!(shop.visit_shop(1).unwrap(), Some(0));

        let shop_barber = shop.clone();
        let barber = thread::spawn(move || {
            let mut served = Vec::new();
            while let Some(customer) = shop_barber.hello_customer(0).unwrap() {
                served.push(customer);
                shop_barber.bye_customer(0).unwrap();
            }
            served
        });

        // Customer 2 arrives while 1 is in service and takes the only chair.
        let shop_waiting = shop.clone();
        let customer_2 = thread::spawn(move || {
            let barber_id = shop_waiting.visit_shop(2).unwrap();
            if let Some(barber_id) = barber_id {
                shop_waiting.leave_shop(2, barber_id).unwrap();
            }
            barber_id
        });
        while shop.available_waiting_chairs().unwrap() > 0 {
            thread::sleep(Duration::from_millis(5));
        }

        // Customer 3 finds no chair and no barber free.
        assert_eq!(shop.visit_shop(3).unwrap(), None);
        assert_eq!(shop.drop_offs().unwrap(), 1);

        shop.leave_shop(1, 0).unwrap();
        assert_eq!(customer_2.join().unwrap(), Some(0));

        shop.close().unwrap();
        assert_eq!(barber.join().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_barber_finishes_called_customer_after_close() {
        let shop = Arc::new(Shop::new(1, 1));

        // Customer 1 claims the only barber, customer 2 takes the chair.
        assert_eq!(shop.visit_shop(1).unwrap(), Some(0));
        let shop_waiting = shop.clone();
        let customer_2 = thread::spawn(move || {
            let barber_id = shop_waiting.visit_shop(2).unwrap();
            if let Some(barber_id) = barber_id {
                shop_waiting.leave_shop(2, barber_id).unwrap();
            }
            barber_id
        });
        while shop.available_waiting_chairs().unwrap() > 0 {
            thread::sleep(Duration::from_millis(5));
        }

        // The shop closes before the barber starts the day: both the customer
        // in service and the one already seated must still get their hair-cut.
        shop.close().unwrap();

        assert_eq!(shop.hello_customer(0).unwrap(), Some(1));
        shop.bye_customer(0).unwrap();
        shop.leave_shop(1, 0).unwrap();

        // The barber must call and finish the seated customer, not go home.
        assert_eq!(shop.hello_customer(0).unwrap(), Some(2));
        shop.bye_customer(0).unwrap();
        assert_eq!(customer_2.join().unwrap(), Some(0));

        // Only now, with nobody waiting, does the barber go home.
        assert_eq!(shop.hello_customer(0).unwrap(), None);
    }

    #[test]
    fn test_every_arrival_is_served_or_dropped() {
        const CUSTOMERS: u32 = 12;
        let shop = Arc::new(Shop::new(2, 2));

        let barbers: Vec<_> = (0..shop.total_barbers())
            .map(|barber_id| {
                let shop = shop.clone();
                thread::spawn(move || {
                    let mut attended = 0u32;
                    while let Some(_customer) = shop.hello_customer(barber_id).unwrap() {
                        shop.bye_customer(barber_id).unwrap();
                        attended += 1;
                    }
                    attended
                })
            })
            .collect();

        let customers: Vec<_> = (1..=CUSTOMERS)
            .map(|customer_id| {
                let shop = shop.clone();
                thread::spawn(move || match shop.visit_shop(customer_id).unwrap() {
                    Some(barber_id) => {
                        shop.leave_shop(customer_id, barber_id).unwrap();
                        1u32
                    }
                    None => 0u32,
                })
            })
            .collect();

        let served: u32 = customers.into_iter().map(|c| c.join().unwrap()).sum();
        shop.close().unwrap();
        let attended: u32 = barbers.into_iter().map(|b| b.join().unwrap()).sum();

        assert_eq!(served + shop.drop_offs().unwrap(), CUSTOMERS);
        assert_eq!(attended, served);
        assert_eq!(shop.available_waiting_chairs().unwrap(), 2);
    }
}
