use std::sync::Arc;

use task_engine::{FixedThreadPool, Task, ThreadPerTask};
use tracing::info;

use crate::repository::PriceLookup;

/// Price queries in blocking and non-blocking flavours.
///
/// Pooled lookups run on the injected [`FixedThreadPool`]; [`price_async`]
/// gives each lookup a dedicated thread instead.
///
/// [`price_async`]: PriceService::price_async
pub struct PriceService<L> {
    lookup: Arc<L>,
    pool: FixedThreadPool,
    unbounded: ThreadPerTask,
}

impl<L> Clone for PriceService<L> {
    fn clone(&self) -> Self {
        Self {
            lookup: self.lookup.clone(),
            pool: self.pool.clone(),
            unbounded: self.unbounded.clone(),
        }
    }
}

impl<L: PriceLookup + 'static> PriceService<L> {
    pub fn new(lookup: L, pool: FixedThreadPool) -> Self {
        Self {
            lookup: Arc::new(lookup),
            pool,
            unbounded: ThreadPerTask::new("price-lookup"),
        }
    }

    pub fn pool(&self) -> &FixedThreadPool {
        &self.pool
    }

    /// Blocks the caller for the whole lookup.
    pub fn price_sync(&self, name: &str) -> i64 {
        info!("Looking up price of {} synchronously", name);
        self.lookup.price_by_name(name)
    }

    /// Looks the price up on a thread of its own.
    pub fn price_async(&self, name: &str) -> Task<i64> {
        info!("Looking up price of {} on a new thread", name);
        let lookup = self.lookup.clone();
        let name = name.to_string();
        Task::submit_on(&self.unbounded, move || {
            info!("Started lookup of {}", name);
            lookup.price_by_name(&name)
        })
    }

    /// Looks the price up on the shared pool.
    pub fn price_async_on_pool(&self, name: &str) -> Task<i64> {
        info!("Looking up price of {} on {}", name, self.pool.name());
        let lookup = self.lookup.clone();
        let name = name.to_string();
        Task::submit_on(&self.pool, move || {
            info!("Started pooled lookup of {}", name);
            lookup.price_by_name(&name)
        })
    }

    pub fn discount_price_async(&self, price: i64) -> Task<i64> {
        info!("Requesting discount for {}", price);
        let lookup = self.lookup.clone();
        Task::submit_on(&self.pool, move || {
            info!("Started discount of {}", price);
            lookup.discounted(price)
        })
    }

    /// Price lookup followed by the discount, one after the other.
    pub fn discounted_price_async(&self, name: &str) -> Task<i64> {
        let service = self.clone();
        self.price_async_on_pool(name)
            .and_then(move |price| service.discount_price_async(price))
    }

    /// Sum of all prices; the lookups are submitted together and combined as they finish.
    pub fn total_price_async(&self, names: &[&str]) -> Task<i64> {
        names
            .iter()
            .map(|name| self.price_async_on_pool(name))
            .fold(Task::completed(0), |total, price| {
                total.combine(&price, |total, price| total + price)
            })
    }

    /// Stops the pool once queued lookups have run.
    pub fn shutdown(&self) {
        self.pool.shutdown_and_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coffee::NOT_FOUND, repository::CoffeeRepository};
    use std::{
        thread,
        time::{Duration, Instant},
    };
    use task_engine::TaskError;

    const DELAY: Duration = Duration::from_millis(200);

    fn service_with(delay: Duration, pool_size: usize) -> PriceService<CoffeeRepository> {
        let pool = FixedThreadPool::new("test-pool", pool_size).unwrap();
        PriceService::new(CoffeeRepository::with_default_menu(delay), pool)
    }

    #[test]
    fn test_price_sync() {
        let service = service_with(Duration::ZERO, 1);
        assert_eq!(service.price_sync("latte"), 1100);
        assert_eq!(service.price_sync("decaf"), NOT_FOUND);
    }

    #[test]
    fn test_every_menu_item_through_a_task() {
        let service = service_with(Duration::ZERO, 2);
        for (name, price) in [("latte", 1100), ("mocha", 1300), ("americano", 900)] {
            assert_eq!(service.price_async(name).join().unwrap(), price);
            assert_eq!(service.price_async_on_pool(name).join().unwrap(), price);
        }
    }

    #[test]
    fn test_pooled_lookup_runs_on_named_pool() {
        let service = service_with(DELAY, 2);
        assert_eq!(service.pool().name(), "test-pool");

        let worker = service
            .price_async_on_pool("americano")
            .map(|price| (price, thread::current().name().map(str::to_string)));
        let (price, worker) = worker.join().unwrap();
        assert_eq!(price, 900);
        assert!(worker.unwrap().starts_with("test-pool-"));
    }

    #[test]
    fn test_missing_coffee_is_a_value_not_an_error() {
        let service = service_with(Duration::ZERO, 1);
        assert_eq!(service.price_async("cortado").join().unwrap(), NOT_FOUND);
        assert_eq!(service.discounted_price_async("cortado").join().unwrap(), NOT_FOUND);
    }

    #[test]
    fn test_caller_keeps_working_while_lookup_runs() {
        let service = service_with(DELAY, 1);
        let started = Instant::now();

        let price = service.price_async("latte");
        assert!(!price.is_done());

        thread::sleep(DELAY / 2);
        assert_eq!(price.join().unwrap(), 1100);
        // the caller's own work overlapped the lookup
        assert!(started.elapsed() < DELAY + DELAY / 2);
    }

    #[test]
    fn test_on_complete_callback_sees_price() {
        let service = service_with(DELAY, 1);
        let done = service
            .price_async("latte")
            .on_complete(|price| assert_eq!(price, 1100));
        assert!(done.join().is_ok());
    }

    #[test]
    fn test_map_then_on_complete_on_other_pool() {
        let service = service_with(DELAY, 1);
        let other = FixedThreadPool::new("other", 3).unwrap();

        let adjusted = service
            .price_async_on_pool("latte")
            .map_on(&other, |price| price + 100);
        let done = adjusted.on_complete(|price| assert_eq!(price, 1200));

        done.join().unwrap();
        assert_eq!(adjusted.join().unwrap(), 1200);
    }

    #[test]
    fn test_discounted_price_takes_two_lookups() {
        let service = service_with(DELAY, 10);
        let started = Instant::now();

        assert_eq!(service.discounted_price_async("latte").join().unwrap(), 990);
        assert!(started.elapsed() >= DELAY * 2);
    }

    #[test]
    fn test_two_discounted_prices_summed() {
        let service = service_with(Duration::ZERO, 10);
        let latte = service.discounted_price_async("latte");
        let mocha = service.discounted_price_async("mocha");

        let total = latte.combine(&mocha, |a, b| a + b).join().unwrap();
        assert_eq!(total, 990 + 1170);
    }

    #[test]
    fn test_total_on_wide_pool_is_parallel() {
        let service = service_with(DELAY, 10);
        let started = Instant::now();

        assert_eq!(service.total_price_async(&["latte", "mocha"]).join().unwrap(), 2400);
        assert!(started.elapsed() < DELAY * 2, "took {:?}", started.elapsed());
    }

    #[test]
    fn test_total_on_single_worker_pool_is_serialized() {
        let service = service_with(DELAY, 1);
        let started = Instant::now();

        assert_eq!(service.total_price_async(&["latte", "mocha"]).join().unwrap(), 2400);
        assert!(started.elapsed() >= DELAY * 2, "took {:?}", started.elapsed());
    }

    #[test]
    fn test_total_of_nothing_is_zero() {
        let service = service_with(Duration::ZERO, 1);
        assert_eq!(service.total_price_async(&[]).join().unwrap(), 0);
    }

    #[test]
    fn test_shutdown_abandons_later_lookups() {
        let service = service_with(Duration::ZERO, 1);
        assert_eq!(service.price_async_on_pool("mocha").join().unwrap(), 1300);

        service.shutdown();
        assert!(matches!(
            service.price_async_on_pool("mocha").join(),
            Err(TaskError::Abandoned)
        ));
    }
}
