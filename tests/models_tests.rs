// Wire protocol decoding and model parsing

use chrono::{Local, TimeZone, Utc};
use pulseboard::error::ProtocolError;
use pulseboard::models::*;

#[test]
fn test_outbound_get_metrics_serialization() {
    let json = OutboundMessage::GetMetrics.to_json().unwrap();
    assert_eq!(json, r#"{"type":"get_metrics"}"#);
}

#[test]
fn test_decode_full_metrics_update() {
    let raw = r#"{
        "type": "metrics_update",
        "data": {
            "system": {"cpu_percent": 12.5, "memory_percent": 40.0, "disk_usage": 71.2,
                       "memory_used": 123, "timestamp": "2024-05-01T10:00:00"},
            "services": {
                "api": {"name": "api", "status": "UP", "response_time": 0.123,
                        "success_rate": 99.5, "last_check": "2024-05-01T10:00:00Z"}
            }
        }
    }"#;
    let InboundMessage::MetricsUpdate(update) = decode(raw).unwrap() else {
        panic!("expected metrics_update");
    };
    let system = update.system.unwrap();
    assert_eq!(system.cpu_percent, Some(12.5));
    assert_eq!(system.memory_percent, Some(40.0));
    assert_eq!(system.disk_usage, Some(71.2));
    let services = update.services.unwrap();
    let api = &services["api"];
    assert_eq!(api.status, ServiceState::Up);
    assert_eq!(api.response_time, Some(0.123));
    assert_eq!(api.success_rate, Some(99.5));
    assert_eq!(
        api.last_check,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
    );
}

#[test]
fn test_decode_partial_system_keeps_missing_fields_absent() {
    let raw = r#"{"type":"metrics_update","data":{"system":{"cpu_percent":55.5}}}"#;
    let InboundMessage::MetricsUpdate(update) = decode(raw).unwrap() else {
        panic!("expected metrics_update");
    };
    let system = update.system.unwrap();
    assert_eq!(system.field(MetricKind::Cpu), Some(55.5));
    assert_eq!(system.field(MetricKind::Memory), None);
    assert_eq!(system.display_value(MetricKind::Disk), 0.0);
    assert!(update.services.is_none());
}

#[test]
fn test_decode_unknown_type_is_not_an_error() {
    assert_eq!(
        decode(r#"{"type":"bogus"}"#).unwrap(),
        InboundMessage::Unknown("bogus".into())
    );
    assert_eq!(
        decode(r#"{"type":"alert","data":{"anything":[1,2,3]}}"#).unwrap(),
        InboundMessage::Unknown("alert".into())
    );
}

#[test]
fn test_decode_rejects_malformed_input() {
    assert!(matches!(decode("not json"), Err(ProtocolError::Json(_))));
    assert!(matches!(decode("[1,2]"), Err(ProtocolError::Json(_))));
    assert!(matches!(
        decode(r#"{"data":{}}"#),
        Err(ProtocolError::MissingType)
    ));
    assert!(matches!(
        decode(r#"{"type":"metrics_update","data":{"system":{"cpu_percent":"high"}}}"#),
        Err(ProtocolError::Payload { .. })
    ));
}

#[test]
fn test_decode_metrics_update_without_data_is_empty() {
    assert_eq!(
        decode(r#"{"type":"metrics_update"}"#).unwrap(),
        InboundMessage::MetricsUpdate(MetricsUpdate::default())
    );
}

#[test]
fn test_service_name_filled_from_key_and_nulls_accepted() {
    let raw = r#"{"type":"metrics_update","data":{"services":{"auth":{"status":"DOWN",
        "response_time":null,"success_rate":null,"last_check":null}}}}"#;
    let InboundMessage::MetricsUpdate(update) = decode(raw).unwrap() else {
        panic!("expected metrics_update");
    };
    let auth = &update.services.unwrap()["auth"];
    assert_eq!(auth.name, "auth");
    assert_eq!(auth.status, ServiceState::Down);
    assert_eq!(auth.response_time, None);
    assert_eq!(auth.success_rate, None);
    assert_eq!(auth.last_check, None);
}

#[test]
fn test_service_state_other_strings_read_as_down() {
    assert_eq!(ServiceState::from_backend("UP"), ServiceState::Up);
    assert_eq!(ServiceState::from_backend("up"), ServiceState::Down);
    assert_eq!(ServiceState::from_backend("Up"), ServiceState::Down);
    assert_eq!(ServiceState::from_backend("ERROR"), ServiceState::Down);
    for raw in [
        r#"{"status":"ERROR"}"#,
        r#"{"status":"up"}"#,
        r#"{"status":null}"#,
        r#"{"status":1}"#,
        r#"{"status":{"state":"UP"}}"#,
    ] {
        let s: ServiceStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(s.status, ServiceState::Down, "{raw}");
    }
    let s: ServiceStatus = serde_json::from_str(r#"{"status":"UP"}"#).unwrap();
    assert!(s.is_up());
    assert_eq!(serde_json::to_string(&ServiceState::Up).unwrap(), r#""UP""#);
}

#[test]
fn test_last_check_formats() {
    let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(parse_last_check("2024-01-02T03:04:05Z"), Some(expected));
    assert_eq!(parse_last_check("2024-01-02T05:04:05+02:00"), Some(expected));
    assert_eq!(parse_last_check("1704164645"), Some(expected));
    assert_eq!(parse_last_check("1704164645000"), Some(expected));

    let naive_local = Local
        .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
        .earliest()
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(
        parse_last_check("2024-01-02T03:04:05.000000"),
        Some(naive_local)
    );
    assert_eq!(parse_last_check("yesterday"), None);
    assert_eq!(parse_last_check(""), None);
}

#[test]
fn test_last_check_numeric_epoch_and_garbage() {
    let s: ServiceStatus =
        serde_json::from_str(r#"{"status":"UP","last_check":1704164645000}"#).unwrap();
    assert_eq!(
        s.last_check,
        Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    );
    let s: ServiceStatus = serde_json::from_str(r#"{"status":"UP","last_check":true}"#).unwrap();
    assert_eq!(s.last_check, None);
}

#[test]
fn test_metric_kind_names() {
    for kind in MetricKind::ALL {
        assert_eq!(MetricKind::from_series_name(kind.series_name()), Some(kind));
    }
    assert_eq!(MetricKind::from_series_name("gpu"), None);
    assert_eq!(MetricKind::Cpu.to_string(), "cpu");
}
