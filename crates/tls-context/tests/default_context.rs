//! 进程级默认上下文测试
//!
//! 这些测试读写全局槽位，必须串行执行。

mod common;

use std::sync::Arc;

use serial_test::serial;

use common::{PASSWORD, TestCa, write_identity_store};
use twoway_tls::{
    StoreLocation, TlsContextBuilder, TlsContextConfig, TlsContextError, TrustPolicy,
    default_context, global_slot,
};

#[test]
#[serial]
fn published_context_becomes_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("default ca");
    let server = ca.issue("server");
    let identity = write_identity_store(dir.path(), "identity.p12", PASSWORD, &[("server", &server)]);
    let config = TlsContextConfig::new(
        StoreLocation::filesystem(&identity),
        PASSWORD,
        TrustPolicy::TrustAll,
    );

    let before = default_context();
    let context = TlsContextBuilder::new().build(&config).unwrap();

    if let Some(before) = before {
        assert!(!Arc::ptr_eq(&before, &context));
    }
    let current = default_context().unwrap();
    assert!(Arc::ptr_eq(&current, &context));
    assert!(global_slot().is_published());
}

#[test]
#[serial]
fn unpublished_build_leaves_the_default_alone() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("quiet ca");
    let server = ca.issue("server");
    let identity = write_identity_store(dir.path(), "identity.p12", PASSWORD, &[("server", &server)]);
    let config = TlsContextConfig::new(
        StoreLocation::filesystem(&identity),
        PASSWORD,
        TrustPolicy::TrustAll,
    )
    .publish_as_default(false);

    let before = default_context();
    let context = TlsContextBuilder::new().build(&config).unwrap();
    let after = default_context();

    assert_eq!(before.is_some(), after.is_some());
    if let (Some(before), Some(after)) = (before, after) {
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!Arc::ptr_eq(&after, &context));
    }
}

#[test]
#[serial]
fn failed_build_leaves_the_default_alone() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("failing ca");
    let server = ca.issue("server");
    let identity = write_identity_store(dir.path(), "identity.p12", PASSWORD, &[("server", &server)]);
    let config = TlsContextConfig::new(
        StoreLocation::filesystem(&identity),
        PASSWORD,
        TrustPolicy::validate_against(
            StoreLocation::filesystem(dir.path().join("missing-trust.p12")),
            PASSWORD,
        ),
    );

    let before = default_context();
    let err = TlsContextBuilder::new().build(&config).unwrap_err();
    let after = default_context();

    assert!(matches!(err, TlsContextError::NotFound { .. }));
    match (before, after) {
        (Some(before), Some(after)) => assert!(Arc::ptr_eq(&before, &after)),
        (None, None) => {}
        _ => panic!("default context changed by a failed build"),
    }
}
