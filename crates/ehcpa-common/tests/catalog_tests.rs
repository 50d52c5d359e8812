//! Tests for loading layer catalogs from YAML.

use ehcpa_common::{LayerCatalog, LayerGroup, LayerKey, LayerKind, ViewerError};

const CATALOG_YAML: &str = r#"
layers:
  - key: PTM
    server_layer_name: "EHCPA:PTM_Raster"
    label: "PTM [mm]"
    kind: continuous_value
    group: precipitation
    z_index: 800
    default_enabled: true
    no_data: -9999.900390625
  - key: SPI_3
    server_layer_name: "EHCPA:SPI_scale_3_Raster"
    label: "SPI Escala 3"
    kind: continuous_value
    group: spi
    z_index: 1000
    default_opacity: 0.6
  - key: provincias
    server_layer_name: "EHCPA:Provincias"
    label: "Provincias"
    kind: reference
    group: reference
    z_index: 2000
    default_enabled: true
    min_zoom: 5
"#;

#[test]
fn test_yaml_catalog_parses_with_defaults() {
    let catalog = LayerCatalog::from_yaml_str(CATALOG_YAML).unwrap();
    assert_eq!(catalog.len(), 3);

    let ptm = catalog.require(&LayerKey::new("PTM")).unwrap();
    assert_eq!(ptm.no_data, Some(-9999.900390625));
    assert_eq!(ptm.default_opacity, 1.0);

    let spi = catalog.require(&LayerKey::new("SPI_3")).unwrap();
    assert!(!spi.default_enabled);
    assert_eq!(spi.default_opacity, 0.6);
    assert_eq!(spi.no_data, None);

    let provinces = catalog.require(&LayerKey::new("provincias")).unwrap();
    assert_eq!(provinces.kind, LayerKind::Reference);
    assert_eq!(provinces.min_zoom, Some(5));
}

#[test]
fn test_yaml_catalog_preserves_order() {
    let catalog = LayerCatalog::from_yaml_str(CATALOG_YAML).unwrap();
    let keys: Vec<_> = catalog.iter().map(|l| l.key.as_str().to_string()).collect();
    assert_eq!(keys, vec!["PTM", "SPI_3", "provincias"]);
    assert_eq!(catalog.group(LayerGroup::Spi).count(), 1);
}

#[test]
fn test_yaml_catalog_rejects_bad_kind() {
    let yaml = CATALOG_YAML.replace("kind: reference", "kind: vector");
    let err = LayerCatalog::from_yaml_str(&yaml).unwrap_err();
    assert!(matches!(err, ViewerError::Config(_)));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layers.yaml");
    std::fs::write(&path, CATALOG_YAML).unwrap();

    let catalog = LayerCatalog::load(&path).unwrap();
    assert_eq!(catalog.len(), 3);
}

#[test]
fn test_load_missing_file_is_config_error() {
    let err = LayerCatalog::load("/nonexistent/layers.yaml").unwrap_err();
    assert!(matches!(err, ViewerError::Config(_)));
}

#[test]
fn test_require_unknown_layer() {
    let catalog = LayerCatalog::ehcpa("EHCPA");
    let err = catalog.require(&LayerKey::new("SPI_5")).unwrap_err();
    assert!(matches!(err, ViewerError::UnknownLayer(k) if k == "SPI_5"));
}
