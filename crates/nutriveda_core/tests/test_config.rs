use nutriveda_core::*;

#[test]
fn test_partial_config_fills_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, r#"{ "clinic_name": "Ayur Wellness", "retention_secs": 90 }"#).unwrap();

    let config = NutrivedaConfig::load_from_path(&path).unwrap();
    assert_eq!(config.clinic_name, "Ayur Wellness");
    assert_eq!(config.retention_secs, 90);
    assert_eq!(config.history_limit, NutrivedaConfig::default().history_limit);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, r#"{ "retention_secs": 0 }"#).unwrap();

    let err = NutrivedaConfig::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("retention_secs"));
}

#[test]
fn test_malformed_config_reports_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    let err = NutrivedaConfig::load_from_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("config.json"));
}

#[test]
fn test_export_dir_override() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NutrivedaConfig {
        export_dir: Some(tmp.path().to_path_buf()),
        ..Default::default()
    };
    assert_eq!(config.resolved_export_dir().unwrap(), tmp.path());
}

#[test]
fn test_error_routes_to_notification() {
    let mut store = NotificationStore::new();
    for err in [
        NutrivedaError::InvalidData("plan-1 has no meals".into()),
        NutrivedaError::Render("workbook".into()),
    ] {
        store.push(AppNotification::new(err.notification_type(), err.user_message()));
    }
    assert_eq!(store.of_type(NotificationType::Warning).len(), 1);
    assert_eq!(store.of_type(NotificationType::Error).len(), 1);
    // Newest first.
    assert_eq!(store.all()[0].notification_type, NotificationType::Error);
    assert_eq!(store.unread_count(), 2);
}
