use burn_googlenet::backend::MainAutoBackend;
use burn_googlenet::cli::AppArgs;
use burn_googlenet::driver;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("burn_googlenet=info".parse()?),
        )
        .init();

    let args = AppArgs::parse()?;
    driver::run::<MainAutoBackend>(&args)?;
    Ok(())
}
