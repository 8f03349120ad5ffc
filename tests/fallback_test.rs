use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "cache-redis"))]
#[test]
fn test_redis_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("entity-registry"));
    cmd.arg("--snapshot")
        .arg(dir.path().join("registry.json"))
        .arg("--redis-url")
        .arg("redis://127.0.0.1:6379")
        .args(["register", "--id", "usd", "--name", "US Dollar"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "Remote cache requested via --redis-url, but the 'cache-redis' feature is not enabled. Falling back to the in-memory cache.",
        ));
}

#[test]
fn test_no_fallback_warning_without_redis_url() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("entity-registry"));
    cmd.env_remove("REGISTRY_REDIS_URL")
        .env_remove("RUST_LOG")
        .arg("--snapshot")
        .arg(dir.path().join("registry.json"))
        .arg("count");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("total=0 active=0"))
        .stderr(predicate::str::contains("Falling back").not());
}
