#[tokio::main]
async fn main() -> anyhow::Result<()> {
    txduel_observability::init();

    let report = match txduel_harness::load_config() {
        Ok(config) => txduel_harness::run(&config).await,
        Err(err) => Err(err),
    };

    let report = match report {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "run aborted");
            return Err(err.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
