use std::{sync::Arc, thread, time::Duration};

use tracing::debug;

use crate::coffee::{discount, Coffee, NOT_FOUND};

/// The slow collaborator every price goes through.
///
/// Both calls block the calling thread for the backend's latency.
pub trait PriceLookup: Send + Sync {
    fn price_by_name(&self, name: &str) -> i64;

    fn discounted(&self, price: i64) -> i64;
}

/// In-memory menu with a fixed artificial latency per call.
///
/// The menu is never modified after construction, so any number of workers
/// may read it at once.
#[derive(Debug, Clone)]
pub struct CoffeeRepository {
    coffees: Arc<[Coffee]>,
    delay: Duration,
}

impl CoffeeRepository {
    pub fn new(coffees: Vec<Coffee>, delay: Duration) -> CoffeeRepository {
        CoffeeRepository {
            coffees: Arc::from(coffees),
            delay,
        }
    }

    pub fn with_default_menu(delay: Duration) -> CoffeeRepository {
        Self::new(Coffee::default_menu(), delay)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn simulate_latency(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl PriceLookup for CoffeeRepository {
    fn price_by_name(&self, name: &str) -> i64 {
        self.simulate_latency();

        let price = self
            .coffees
            .iter()
            .find(|coffee| coffee.name == name)
            .map_or(NOT_FOUND, |coffee| coffee.price);

        debug!("Looked up {} -> {}", name, price);
        price
    }

    fn discounted(&self, price: i64) -> i64 {
        self.simulate_latency();
        discount(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_price_by_name() {
        let repository = CoffeeRepository::with_default_menu(Duration::ZERO);
        assert_eq!(repository.price_by_name("latte"), 1100);
        assert_eq!(repository.price_by_name("mocha"), 1300);
        assert_eq!(repository.price_by_name("americano"), 900);
    }

    #[test]
    fn test_unknown_name_returns_not_found() {
        let repository = CoffeeRepository::with_default_menu(Duration::ZERO);
        assert_eq!(repository.price_by_name("espresso"), NOT_FOUND);
        assert_eq!(repository.price_by_name("Latte"), NOT_FOUND);
    }

    #[test]
    fn test_lookups_take_the_configured_delay() {
        let delay = Duration::from_millis(50);
        let repository = CoffeeRepository::with_default_menu(delay);

        let started = Instant::now();
        assert_eq!(repository.discounted(repository.price_by_name("latte")), 990);
        assert!(started.elapsed() >= delay * 2);
    }

    #[test]
    fn test_custom_menu() {
        let repository =
            CoffeeRepository::new(vec![Coffee::new("flat white", 1200)], Duration::ZERO);
        assert_eq!(repository.price_by_name("flat white"), 1200);
        assert_eq!(repository.price_by_name("latte"), NOT_FOUND);
    }
}
