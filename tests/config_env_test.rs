//! Environment overrides on top of a TOML file.
//!
//! Environment variables are process-wide, so this file holds a single test.

use actuator_console::config::{AppConfig, PanelVariant};
use actuator_console::error::PanelError;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_env_overrides_file_and_preset() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        r#"
[panel]
max_channels = 4
default_period = "50ms"
"#
    )
    .unwrap();

    std::env::set_var("ACTUATOR_CONSOLE_PANEL__MAX_CHANNELS", "6");
    std::env::set_var("ACTUATOR_CONSOLE_APPLICATION__LOG_LEVEL", "debug");
    let config = AppConfig::load_from(file.path(), PanelVariant::Volz).unwrap();

    assert_eq!(config.panel.max_channels, 6);
    assert_eq!(config.panel.default_period, Duration::from_millis(50));
    assert_eq!(config.panel.id_offset, 49);
    assert_eq!(config.application.log_level, "debug");
    assert!(config.validate().is_ok());

    // An override that breaks an invariant loads but fails validation
    std::env::set_var("ACTUATOR_CONSOLE_PANEL__MIN_CHANNELS", "7");
    std::env::set_var("ACTUATOR_CONSOLE_PANEL__MAX_CHANNELS", "2");
    let config = AppConfig::load_from(file.path(), PanelVariant::Volz).unwrap();
    assert!(matches!(
        config.validate(),
        Err(PanelError::Configuration(_))
    ));

    // One that does not deserialize fails to load
    std::env::set_var("ACTUATOR_CONSOLE_PANEL__MAX_CHANNELS", "many");
    assert!(matches!(
        AppConfig::load_from(file.path(), PanelVariant::Volz),
        Err(PanelError::ConfigLoad(_))
    ));

    for key in [
        "ACTUATOR_CONSOLE_PANEL__MAX_CHANNELS",
        "ACTUATOR_CONSOLE_PANEL__MIN_CHANNELS",
        "ACTUATOR_CONSOLE_APPLICATION__LOG_LEVEL",
    ] {
        std::env::remove_var(key);
    }
}
