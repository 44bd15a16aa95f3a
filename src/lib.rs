//! Ferris Barbershop is a simulation of a barbershop with a fixed number of
//! barbers and waiting chairs, where customer and barber threads coordinate
//! through a single shared `Shop` monitor.
//!
//! Customers that cannot be served right away either take a waiting chair or
//! leave the shop; every served customer is matched with exactly one barber,
//! and neither side moves past a rendezvous point before its counterpart is
//! ready. All of the coordination happens inside one mutex-protected critical
//! section, with targeted condition variables (one per waiting chair and one
//! per barber) as the only suspension mechanism.

pub mod barbershop;

use std::{error::Error, fmt};

use barbershop::constants::{DEFAULT_BARBERS, DEFAULT_CHAIRS, DEFAULT_CUSTOMERS};
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum BarbershopError {
    ArgsParsingError(String),
    ShopError(String),
    SystemError(String),
}

impl fmt::Display for BarbershopError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for BarbershopError {}

fn init_logger() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn parse_args() -> Result<(usize, usize, usize), BarbershopError> {
    let mut args: Vec<String> = std::env::args().collect();
    args.remove(0);

    let mut barbers = DEFAULT_BARBERS;
    let mut chairs = DEFAULT_CHAIRS;
    let mut customers = DEFAULT_CUSTOMERS;

    if args.is_empty() {
        info!(
            "[Barbershop] No arguments provided, using defaults: \n[BARBERS: {}]  [CHAIRS: {}]  [CUSTOMERS: {}]",
            DEFAULT_BARBERS, DEFAULT_CHAIRS, DEFAULT_CUSTOMERS
        );
        return Ok((barbers, chairs, customers));
    }

    if args.len() % 2 != 0 {
        error!("[Barbershop] Invalid arguments");
        warn!("Usage: cargo run -- -b <num_barbers> -c <num_chairs> -n <num_customers>");
        return Err(BarbershopError::ArgsParsingError(String::from(
            "Invalid argument.",
        )));
    }

    for arg in args.chunks_exact(2) {
        if arg[0] == "-b" {
            info!("[Barbershop] Number of barbers given: {}", arg[1]);
            barbers = arg[1].parse::<usize>().map_err(|err| {
                error!("[Barbershop] Invalid number of barbers: {}", err);
                BarbershopError::ArgsParsingError(String::from("Invalid number of barbers"))
            })?;
        } else if arg[0] == "-c" {
            info!("[Barbershop] Number of waiting chairs given: {}", arg[1]);
            chairs = arg[1].parse::<usize>().map_err(|err| {
                error!("[Barbershop] Invalid number of chairs: {}", err);
                BarbershopError::ArgsParsingError(String::from("Invalid number of chairs"))
            })?;
        } else if arg[0] == "-n" {
            info!("[Barbershop] Number of customers given: {}", arg[1]);
            customers = arg[1].parse::<usize>().map_err(|err| {
                error!("[Barbershop] Invalid number of customers: {}", err);
                BarbershopError::ArgsParsingError(String::from("Invalid number of customers"))
            })?;
        } else {
            error!("[Barbershop] Invalid argument: {}", arg[0]);
            warn!("Usage: cargo run -- -b <num_barbers> -c <num_chairs> -n <num_customers>");
            return Err(BarbershopError::ArgsParsingError(String::from(
                "Invalid argument.",
            )));
        }
    }

    Ok((barbers, chairs, customers))
}

pub fn run() -> Result<(), BarbershopError> {
    init_logger();
    let (barbers, chairs, customers) = parse_args()?;
    let summary = barbershop::handler::start(barbers, chairs, customers)?;
    info!(
        "[Barbershop] Day is over: {} customers served, {} turned away out of {} arrivals",
        summary.served, summary.dropped, customers
    );
    Ok(())
}
