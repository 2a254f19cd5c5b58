//! Service wiring tests
//!
//! Go version resolution, directory builds, artifact export, and the
//! dispatcher assembled from configuration.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use gobuild::{Service, ServiceConfig, ServiceError};
use gobuild_worker::BuilderError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fixtures::*;

fn test_config(temp_dir: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.storage.root = temp_dir.path().join("work");
    config.build.allowed_env = vec!["HOME".to_string()];
    config
}

fn write_project(dir: &std::path::Path, entries: &[(&str, &str)]) {
    for (name, content) in entries {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

#[tokio::test]
async fn test_go_version_detected_when_unset() {
    let temp_dir = TempDir::new().unwrap();
    let toolchain = Arc::new(MockToolchain::with_version("go1.21.5\n"));

    let service = Service::with_toolchain(
        test_config(&temp_dir),
        toolchain.clone(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(service.builder().config().go_version, "1.21.5");
    assert_eq!(toolchain.last("env").unwrap().args, ["env", "GOVERSION"]);
}

#[tokio::test]
async fn test_configured_go_version_skips_detection() {
    let temp_dir = TempDir::new().unwrap();
    let toolchain = Arc::new(MockToolchain::with_version("go1.21.5\n"));
    let mut config = test_config(&temp_dir);
    config.build.go_version = Some("1.22.1".to_string());

    let service = Service::with_toolchain(config, toolchain.clone(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(service.builder().config().go_version, "1.22.1");
    assert_eq!(toolchain.count("env"), 0);
}

#[tokio::test]
async fn test_undetectable_version_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let toolchain = Arc::new(MockToolchain::new());

    let service = Service::with_toolchain(
        test_config(&temp_dir),
        toolchain,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        service.builder().config().go_version,
        gobuild::service::FALLBACK_GO_VERSION
    );
}

#[tokio::test]
async fn test_build_dir_and_export() {
    let temp_dir = TempDir::new().unwrap();
    let project = temp_dir.path().join("project");
    write_project(
        &project,
        &[("main.go", MAIN_GO), ("main_test.go", BENCH_TEST_GO), ("README.md", "# demo")],
    );
    let mut config = test_config(&temp_dir);
    config.build.go_version = Some("1.22".to_string());

    let service = Service::with_toolchain(
        config,
        Arc::new(MockToolchain::new()),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let result = service
        .build_dir(&project, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.is_test);
    assert!(result.has_benchmark);

    let out = temp_dir.path().join("out.wasm");
    let size = service.export_artifact(&result.artifact_id, &out).await.unwrap();
    assert_eq!(size, FAKE_WASM.len() as u64);
    assert_eq!(std::fs::read(&out).unwrap(), FAKE_WASM);
}

#[tokio::test]
async fn test_build_dir_user_error() {
    let temp_dir = TempDir::new().unwrap();
    let project = temp_dir.path().join("empty-project");
    std::fs::create_dir_all(&project).unwrap();
    let mut config = test_config(&temp_dir);
    config.build.go_version = Some("1.22".to_string());

    let service = Service::with_toolchain(
        config,
        Arc::new(MockToolchain::new()),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let err = service
        .build_dir(&project, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ServiceError::Build(BuilderError::Build(e)) => {
            assert_eq!(e.message(), "no buildable source files");
        }
        other => panic!("expected a build error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dispatcher_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.build.go_version = Some("1.22".to_string());
    config.cleanup.interval_seconds = 42;
    let toolchain = Arc::new(MockToolchain::new());

    let service = Service::with_toolchain(config, toolchain.clone(), &CancellationToken::new())
        .await
        .unwrap();
    service
        .builder()
        .build(&main_program(), &CancellationToken::new())
        .await
        .unwrap();

    let dispatcher = service.dispatcher();
    assert_eq!(dispatcher.interval(), Duration::from_secs(42));

    let report = dispatcher.run_cycle(&CancellationToken::new()).await;
    assert!(report.failures.is_empty());
    assert!(!service.store().is_dirty().await);
    assert_eq!(toolchain.count("clean"), 1);
}
