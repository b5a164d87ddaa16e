#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use kanjiquiz_client::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
connection:
  address: "ws://127.0.0.1:8080"
  request_timout_ms: 100 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.connection.connect_timeout_ms, 5000);
    assert_eq!(cfg.connection.request_timeout_ms, 5000);
    assert_eq!(cfg.session.tick_ms, 10);
    assert_eq!(cfg.session.question_attempts, 3);
    assert_eq!(
        (cfg.supply.first_batch, cfg.supply.low_mark, cfg.supply.high_mark),
        (1, 5, 10)
    );
}

#[test]
fn watermarks_must_be_ordered() {
    let bad = r#"
version: 1
supply:
  low_mark: 10
  high_mark: 10
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("low_mark"));
}

#[test]
fn address_must_be_websocket() {
    let bad = r#"
version: 1
connection:
  address: "http://127.0.0.1:8080"
"#;
    assert!(config::load_from_str(bad).is_err());
}
