use std::time::Duration;

use seedcast_config::{ConfigError, ConfigWatcher, load_config};
use tokio::time::timeout;

#[tokio::test]
async fn load_config_reports_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_config(&dir.path().join("absent.json"))
        .await
        .expect_err("missing file");
    assert!(matches!(
        err,
        ConfigError::Io {
            operation: "config.read",
            ..
        }
    ));
}

#[tokio::test]
async fn watcher_yields_updated_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("seedcast.json");
    tokio::fs::write(&path, r#"{"upload_ratio_target":1.0}"#).await?;

    let (initial, mut watcher) = ConfigWatcher::watch(&path, Duration::from_millis(20)).await?;
    assert!((initial.upload_ratio_target - 1.0).abs() < f64::EPSILON);

    tokio::fs::write(
        &path,
        r#"{"upload_ratio_target":2.0,"rates":{"min_upload_rate":10,"max_upload_rate":20}}"#,
    )
    .await?;

    let updated = timeout(Duration::from_secs(5), watcher.next()).await??;
    assert!((updated.upload_ratio_target - 2.0).abs() < f64::EPSILON);
    assert_eq!(updated.rates.max_upload_rate, 20);
    Ok(())
}

#[tokio::test]
async fn watcher_surfaces_invalid_update_and_recovers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("seedcast.json");
    tokio::fs::write(&path, "{}").await?;
    let (_, mut watcher) = ConfigWatcher::watch(&path, Duration::from_millis(20)).await?;

    tokio::fs::write(&path, r#"{"upload_ratio_target":-3.0}"#).await?;
    let result = timeout(Duration::from_secs(5), watcher.next()).await?;
    assert!(matches!(result, Err(ConfigError::InvalidField { .. })));

    tokio::fs::write(&path, r#"{"upload_ratio_target":4.0,"client":{"port":6881}}"#).await?;
    let fixed = timeout(Duration::from_secs(5), watcher.next()).await??;
    assert_eq!(fixed.client.port, 6881);
    Ok(())
}
