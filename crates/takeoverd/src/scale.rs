//! One-shot `grow` and `nodes` commands.

use tracing::info;

use takeover_core::TakeoverConfig;
use takeover_core::config::EcloudConfig;
use takeover_ecloud::{CapacityScaler, EcloudClient};

/// Scaler for the configured VM template.
pub fn scaler(config: &EcloudConfig) -> anyhow::Result<CapacityScaler<EcloudClient>> {
    let client = EcloudClient::from_config(config)?;
    Ok(CapacityScaler::new(
        client,
        config.auto_scale.vm_template.clone(),
        config.auto_scale.increase_num(),
    ))
}

pub async fn grow(config: &TakeoverConfig) -> anyhow::Result<()> {
    let scaler = scaler(config.ecloud()?)?;
    let report = scaler.grow().await?;
    info!(
        cluster = %scaler.cluster_id(),
        before = report.before,
        after = report.target,
        "grow finished"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "cluster_id": scaler.cluster_id(),
            "before": report.before,
            "target": report.target,
            "added": report.added,
        }))?
    );
    Ok(())
}

pub async fn nodes(
    config: &TakeoverConfig,
    page: Option<u32>,
    page_size: Option<u32>,
) -> anyhow::Result<()> {
    let scaler = scaler(config.ecloud()?)?;
    let list = scaler.nodes(page, page_size).await?;
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
