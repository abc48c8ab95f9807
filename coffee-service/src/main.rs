use price_service::PriceService;
use repository::CoffeeRepository;
use service_config::ServiceConfig;
use task_engine::FixedThreadPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod coffee;
mod demo;
mod price_service;
mod repository;
mod service_config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig::from_env()?;

    info!("Starting coffee service with config: {:?}", config);

    let pool = FixedThreadPool::new(&config.pool_name, config.pool_size)?;
    let repository = CoffeeRepository::with_default_menu(config.lookup_delay);
    info!("Every price lookup takes {:?}", repository.delay());
    let service = PriceService::new(repository, pool);

    demo::run(&service).await?;

    service.shutdown();

    info!("Coffee service finished");

    Ok(())
}
