//! Stage definitions and configuration.

use serde::{Deserialize, Serialize};

/// Builtin stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// cargo check --workspace
    CargoCheck,

    /// cargo test --workspace -- --skip integration
    CargoTest,

    /// cargo llvm-cov --json --workspace -- --skip integration
    LlvmCov,
}

impl BuiltinStage {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::CargoCheck => "cargo_check",
            BuiltinStage::CargoTest => "cargo_test",
            BuiltinStage::LlvmCov => "cargo_llvm_cov",
        }
    }

    pub fn command(&self) -> Vec<String> {
        let args: &[&str] = match self {
            BuiltinStage::CargoCheck => &["cargo", "check", "--workspace"],
            BuiltinStage::CargoTest => &["cargo", "test", "--workspace", "--", "--skip", "integration"],
            BuiltinStage::LlvmCov => &[
                "cargo",
                "llvm-cov",
                "--json",
                "--workspace",
                "--",
                "--skip",
                "integration",
            ],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Timeout used when none is configured.
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            BuiltinStage::CargoCheck => 300,
            BuiltinStage::CargoTest => 600,
            BuiltinStage::LlvmCov => 1200,
        }
    }
}

/// Configuration for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Timeout in seconds; 0 disables it.
    pub timeout_secs: u64,

    pub enabled: bool,
}

impl StageConfig {
    pub fn from_builtin(stage: BuiltinStage) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(),
            timeout_secs: stage.default_timeout_secs(),
            enabled: true,
        }
    }

    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            timeout_secs,
            enabled: true,
        }
    }

    /// Build a stage from a whitespace-separated command line such as
    /// `cargo test -p storage`. Named after its first two words.
    pub fn parse(command_line: &str, timeout_secs: u64) -> Option<Self> {
        let command: Vec<String> = command_line.split_whitespace().map(String::from).collect();
        if command.is_empty() {
            return None;
        }
        let name = command
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("_");
        Some(Self::custom(name, command, timeout_secs))
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
