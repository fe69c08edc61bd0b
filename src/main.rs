use stress_test::{stress_test_presence, stress_test_scaling};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracker_state::StateConfig;


fn load_config() -> tracker_state::Result<StateConfig> {
    match std::env::var("TRACKER_CONFIG") {
        Ok(path) => {
            info!(%path, "loading config");
            StateConfig::from_json_file(path)
        }
        Err(_) => Ok(StateConfig::default()),
    }
}

#[tokio::main]
async fn main() -> tracker_state::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = load_config()?;
    info!(
        parallel_union_threshold = config.parallel_union_threshold,
        trace_diffs = config.trace_diffs,
        "starting presence stress run"
    );

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            PRESENCE STRESS TESTS                           ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let stats = stress_test_presence(4, 100, 200, config.clone()).await?;
    stats.print();

    let stats = stress_test_presence(10, 500, 1000, config.clone()).await?;
    stats.print();

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS                                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(20, 4, config).await?;

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
