//! Download trigger and dates client against the in-process backend mock.

use std::time::Duration;

use ehcpa_common::{LatLng, LayerGroup, LayerKey};
use ehcpa_viewer::dates::UNAVAILABLE;
use ehcpa_viewer::download::ARCHIVE_NAME;
use ehcpa_viewer::{
    DatesClient, DownloadError, DownloadStatus, DownloadTrigger, HeadlessMap, Viewer, ViewerConfig,
};
use test_utils::{dates_json, unused_local_url, MockDownload, MockServices};
use tokio_test::{assert_err, assert_ok};

fn viewer_with(download_url: String, dates_url: String) -> Viewer<HeadlessMap> {
    let config = ViewerConfig::from_lookup(move |name| match name {
        "BACKEND_DOWNLOAD_URL" => Some(download_url.clone()),
        "BACKEND_GET_DATES_URL" => Some(dates_url.clone()),
        "HTTP_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap();
    Viewer::from_config(&config, HeadlessMap::default()).unwrap()
}

fn viewer_for(mock: &MockServices) -> Viewer<HeadlessMap> {
    viewer_with(mock.download_url(), mock.dates_url())
}

// ============================================================================
// Archive download
// ============================================================================

#[tokio::test]
async fn test_download_writes_archive_with_progress() {
    let mock = MockServices::start().await;
    let archive: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    mock.set_download(MockDownload::Archive(archive.clone()));
    let mut trigger = DownloadTrigger::new(mock.download_url(), Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let mut reported = Vec::new();
    let keys = vec![LayerKey::new("PTM"), LayerKey::new("SPI_3")];
    let path = assert_ok!(
        trigger
            .download_with_progress(&keys, dir.path(), |p| reported.push(p))
            .await
    );

    assert_eq!(path, dir.path().join(ARCHIVE_NAME));
    assert_eq!(std::fs::read(&path).unwrap(), archive);
    assert_eq!(reported.last(), Some(&100));
    assert!(reported.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(trigger.status(), DownloadStatus::default());

    let downloads = mock.requests_to("/download");
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].path, "/download/PTM,SPI_3");
}

#[tokio::test]
async fn test_download_without_length_has_no_percent() {
    let mock = MockServices::start().await;
    let archive = vec![7u8; 3000];
    mock.set_download(MockDownload::Chunked(archive.clone()));
    let mut trigger = DownloadTrigger::new(mock.download_url(), Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let mut reported = Vec::new();
    let path = assert_ok!(
        trigger
            .download_with_progress(&[LayerKey::new("PTM")], dir.path(), |p| reported.push(p))
            .await
    );

    assert!(reported.is_empty());
    assert_eq!(std::fs::read(path).unwrap().len(), 3000);
}

#[tokio::test]
async fn test_truncated_body_keeps_previous_archive() {
    let mock = MockServices::start().await;
    let dir = tempfile::tempdir().unwrap();
    let previous = b"previous complete archive".to_vec();
    std::fs::write(dir.path().join(ARCHIVE_NAME), &previous).unwrap();

    mock.set_download(MockDownload::Truncated {
        declared: 8192,
        data: vec![1u8; 2048],
    });
    let mut trigger = DownloadTrigger::new(mock.download_url(), Duration::from_secs(5)).unwrap();

    assert_err!(trigger.download(&[LayerKey::new("PTM")], dir.path()).await);
    assert_eq!(std::fs::read(dir.path().join(ARCHIVE_NAME)).unwrap(), previous);
    assert!(!dir
        .path()
        .join(format!("{}.partial", ARCHIVE_NAME))
        .exists());
    assert_eq!(trigger.status(), DownloadStatus::default());
}

#[tokio::test]
async fn test_slow_transfer_outlasts_idle_timeout() {
    let mock = MockServices::start().await;
    let archive: Vec<u8> = (0..2000u32).map(|i| (i % 199) as u8).collect();
    mock.set_download(MockDownload::Throttled {
        data: archive.clone(),
        chunk: 400,
        interval: Duration::from_millis(300),
    });
    let mut trigger = DownloadTrigger::new(mock.download_url(), Duration::from_secs(1)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let started = std::time::Instant::now();
    let path = assert_ok!(trigger.download(&[LayerKey::new("PTM")], dir.path()).await);
    assert!(started.elapsed() > Duration::from_secs(1));
    assert_eq!(std::fs::read(path).unwrap(), archive);
}

#[tokio::test]
async fn test_stalled_transfer_is_network_error() {
    let mock = MockServices::start().await;
    mock.set_download(MockDownload::Throttled {
        data: vec![3u8; 600],
        chunk: 300,
        interval: Duration::from_millis(1500),
    });
    let mut trigger =
        DownloadTrigger::new(mock.download_url(), Duration::from_millis(500)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = assert_err!(trigger.download(&[LayerKey::new("PTM")], dir.path()).await);
    assert!(matches!(err, DownloadError::Network(_)));
    assert!(!dir.path().join(ARCHIVE_NAME).exists());
    assert!(!dir
        .path()
        .join(format!("{}.partial", ARCHIVE_NAME))
        .exists());
}

#[tokio::test]
async fn test_viewer_downloads_enabled_value_layers() {
    let mock = MockServices::start().await;
    let mut viewer = viewer_for(&mock);
    viewer.set_layer_enabled(&LayerKey::new("SPI_12"), true).unwrap();
    viewer.set_layer_enabled(&LayerKey::new("SPI_1"), true).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let path = viewer.download(dir.path()).await.unwrap();
    assert!(path.exists());
    assert!(viewer.alert().is_none());

    // Catalog order, reference layers excluded.
    let downloads = mock.requests_to("/download");
    assert_eq!(downloads[0].path, "/download/PTM,SPI_1,SPI_12");
}

// ============================================================================
// Download alerts
// ============================================================================

#[tokio::test]
async fn test_server_error_shows_message_and_blocks_clicks() {
    let mock = MockServices::start().await;
    mock.set_download(MockDownload::Error {
        status: 404,
        message: "No hay datos disponibles para las capas seleccionadas".to_string(),
    });
    let mut viewer = viewer_for(&mock);
    let dir = tempfile::tempdir().unwrap();

    let alert = assert_err!(viewer.download(dir.path()).await);
    assert_eq!(alert.title, "Oops!");
    assert_eq!(
        alert.text,
        "No hay datos disponibles para las capas seleccionadas"
    );
    assert_eq!(viewer.alert(), Some(&alert));
    assert!(!dir.path().join(ARCHIVE_NAME).exists());

    let click = viewer.map().click_at(LatLng::new(-31.4, -64.2));
    assert!(viewer.click(click).is_none());

    viewer.dismiss_alert();
    assert!(viewer.alert().is_none());
    assert!(viewer.click(click).is_some());
}

#[tokio::test]
async fn test_closing_panel_keeps_alert_blocking_clicks() {
    let mock = MockServices::start().await;
    mock.set_download(MockDownload::Error {
        status: 500,
        message: "Error interno".to_string(),
    });
    let mut viewer = viewer_for(&mock);
    let dir = tempfile::tempdir().unwrap();

    assert_err!(viewer.download(dir.path()).await);
    viewer.close_panel();
    assert!(viewer.alert().is_some());

    let click = viewer.map().click_at(LatLng::new(-31.4, -64.2));
    assert!(viewer.click(click).is_none());

    viewer.dismiss_alert();
    assert!(viewer.click(click).is_some());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let base = unused_local_url().await;
    let mut trigger =
        DownloadTrigger::new(format!("{}/download", base), Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = assert_err!(trigger.download(&[LayerKey::new("PTM")], dir.path()).await);
    assert!(matches!(err, DownloadError::Network(_)));
    let alert = err.alert();
    assert_eq!(alert.title, "Network Error");
    assert!(alert.text.starts_with("Error de conexión con el servidor"));
    assert_eq!(trigger.status(), DownloadStatus::default());
}

#[tokio::test]
async fn test_no_value_layers_warns_without_request() {
    let mock = MockServices::start().await;
    let mut viewer = viewer_for(&mock);
    viewer
        .set_group_enabled(LayerGroup::Precipitation, false)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let alert = assert_err!(viewer.download(dir.path()).await);
    assert_eq!(alert.title, "Atención");
    assert_eq!(
        alert.text,
        "Debe seleccionar al menos una capa para descargar."
    );
    assert!(mock.requests_to("/download").is_empty());

    // The alert dialog sits over the map until dismissed.
    assert!(viewer.pointer_mut().is_over_ui());
    viewer.dismiss_alert();
    assert!(!viewer.pointer_mut().is_over_ui());
}

// ============================================================================
// Dates
// ============================================================================

#[tokio::test]
async fn test_dates_from_backend() {
    let mock = MockServices::start().await;
    mock.set_dates(Some(dates_json()));
    let viewer = viewer_for(&mock);

    let dates = viewer.dates().await;
    assert_eq!(dates.today_month, "Octubre");
    assert_eq!(dates.last_band_day, "30");
    assert_eq!(dates.calibration_date, "Septiembre 2024");
}

#[tokio::test]
async fn test_dates_fall_back_on_server_error() {
    let mock = MockServices::start().await;
    mock.set_dates(None);
    let viewer = viewer_for(&mock);

    let dates = viewer.dates().await;
    assert_eq!(dates.today_day, UNAVAILABLE);
    assert_eq!(dates.last_band_year, UNAVAILABLE);
    assert_eq!(dates.calibration_date, UNAVAILABLE);
}

#[tokio::test]
async fn test_dates_fall_back_when_unreachable() {
    let base = unused_local_url().await;
    let client = DatesClient::new(format!("{}/get_dates", base), Duration::from_secs(5)).unwrap();

    assert!(client.try_fetch().await.unwrap_err().is_transport());
    assert_eq!(client.fetch().await.today_year, UNAVAILABLE);
}
