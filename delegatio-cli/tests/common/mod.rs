#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub home: TempDir,
}

impl TestContext {
    /// Command with an isolated home directory.
    pub fn new_cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--home").arg(self.home.path());
        cmd
    }

    /// Command without `--home` or `DELEGATIO_HOME`.
    pub fn bare_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_delegatio");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("DELEGATIO_HOME");
        cmd
    }

    /// Write a JSON options file into the home directory.
    pub fn write_config(&self, contents: &str) -> std::path::PathBuf {
        let path = self.home.path().join("config.json");
        std::fs::write(&path, contents).expect("write config");
        path
    }
}

pub fn delegatio() -> TestContext {
    TestContext {
        home: TempDir::new().expect("create temp home"),
    }
}
