use std::{error::Error, time::Instant};

use task_engine::{BlockingRuntime, FixedThreadPool, Task};
use tracing::info;

use crate::{coffee::discount, price_service::PriceService, repository::PriceLookup};

/// Walks through every way of asking for a price and logs how long each took.
pub async fn run<L>(service: &PriceService<L>) -> Result<(), Box<dyn Error>>
where
    L: PriceLookup + 'static,
{
    let started = Instant::now();
    let blocking = service.clone();
    let price = tokio::task::spawn_blocking(move || blocking.price_sync("latte")).await?;
    info!("[sync] latte = {} in {:?}", price, started.elapsed());

    let started = Instant::now();
    let pending = service.price_async("latte");
    info!("[async] lookup submitted, free to do other work");
    let price = pending.await?;
    info!("[async] latte = {} in {:?}", price, started.elapsed());

    let started = Instant::now();
    service
        .price_async_on_pool("latte")
        .map(|price| price + 100)
        .on_complete(|price| info!("[map] adjusted latte = {}", price))
        .await?;
    info!("[map] done in {:?}", started.elapsed());

    let started = Instant::now();
    let side_pool = FixedThreadPool::new("side-pool", 3)?;
    service
        .price_async_on_pool("latte")
        .map_on(&side_pool, |price| price + 100)
        .on_complete_on(&BlockingRuntime::current()?, |price| {
            info!("[map_on] adjusted latte = {}", price)
        })
        .await?;
    side_pool.shutdown();
    info!("[map_on] done in {:?}", started.elapsed());

    let started = Instant::now();
    let latte = service.price_async_on_pool("latte");
    let mocha = service.price_async_on_pool("mocha");
    let total = latte.combine(&mocha, |a, b| a + b).await?;
    info!(
        "[combine] latte + mocha = {} on {} workers in {:?}",
        total,
        service.pool().size(),
        started.elapsed()
    );

    let started = Instant::now();
    let single = FixedThreadPool::new("single", 1)?;
    let lookup = service.clone();
    let latte = Task::submit_on(&single, move || lookup.price_sync("latte"));
    let lookup = service.clone();
    let mocha = Task::submit_on(&single, move || lookup.price_sync("mocha"));
    let total = latte.combine(&mocha, |a, b| a + b).await?;
    single.shutdown();
    info!(
        "[combine] latte + mocha = {} on 1 worker in {:?}",
        total,
        started.elapsed()
    );

    let started = Instant::now();
    let price = service.discounted_price_async("latte").await?;
    info!(
        "[and_then] discounted latte = {} (expected {}) in {:?}",
        price,
        discount(1100),
        started.elapsed()
    );

    let started = Instant::now();
    let (latte, mocha) = futures_util::future::join(
        service.discounted_price_async("latte"),
        service.discounted_price_async("mocha"),
    )
    .await;
    info!(
        "[and_then] discounted latte + mocha = {} in {:?}",
        latte? + mocha?,
        started.elapsed()
    );

    let price = service.price_async("flat white").await?;
    info!("[miss] flat white = {}", price);

    Ok(())
}
