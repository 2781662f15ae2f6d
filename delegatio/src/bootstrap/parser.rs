//! Extraction of the admin kubeconfig and join credentials from the
//! initializer's output.

use delegatio_shared::constants::kubeadm::ADMIN_CONF;
use delegatio_shared::{DelegatioError, DelegatioResult};

/// Line printed right before the admin kubeconfig.
pub const ADMIN_CONFIG_BEGIN: &str = "-----BEGIN DELEGATIO ADMIN KUBECONFIG-----";
/// Line printed right after the admin kubeconfig.
pub const ADMIN_CONFIG_END: &str = "-----END DELEGATIO ADMIN KUBECONFIG-----";

const JOIN_PREFIX: &str = "kubeadm join ";
const TOKEN_FLAG: &str = "--token";
const CA_HASH_FLAG: &str = "--discovery-token-ca-cert-hash";
const CONTROL_PLANE_FLAG: &str = "--control-plane";

/// What a joining node needs to reach and trust the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCredentials {
    api_endpoint: String,
    token: String,
    discovery_hash: String,
}

impl JoinCredentials {
    pub fn new(
        api_endpoint: impl Into<String>,
        token: impl Into<String>,
        discovery_hash: impl Into<String>,
    ) -> DelegatioResult<Self> {
        let creds = Self {
            api_endpoint: api_endpoint.into(),
            token: token.into(),
            discovery_hash: discovery_hash.into(),
        };
        for (field, value) in [
            ("api endpoint", &creds.api_endpoint),
            ("token", &creds.token),
            ("discovery hash", &creds.discovery_hash),
        ] {
            if value.trim().is_empty() {
                return Err(DelegatioError::ProtocolParse(format!(
                    "join credentials have an empty {}",
                    field
                )));
            }
        }
        Ok(creds)
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn discovery_hash(&self) -> &str {
        &self.discovery_hash
    }

    /// Arguments for `kubeadm` on a joining node.
    pub fn join_args(&self) -> Vec<String> {
        vec![
            "join".to_string(),
            self.api_endpoint.clone(),
            TOKEN_FLAG.to_string(),
            self.token.clone(),
            CA_HASH_FLAG.to_string(),
            self.discovery_hash.clone(),
        ]
    }
}

/// Turns the initializer's raw output into credentials.
pub trait InitOutputParser: Send + Sync {
    /// The admin kubeconfig blob.
    fn admin_config(&self, raw: &str) -> DelegatioResult<Vec<u8>>;

    /// Credentials for the worker join command.
    fn join_credentials(&self, raw: &str) -> DelegatioResult<JoinCredentials>;
}

/// Command run on the initializer node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Parser for `kubeadm init` output wrapped in admin-config markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct KubeadmOutputParser;

impl KubeadmOutputParser {
    /// Shell command that runs `kubeadm init` and prints the admin config
    /// between the markers this parser looks for.
    pub fn init_command(config_file: Option<&str>) -> InitCommand {
        let init = match config_file {
            Some(path) => format!("kubeadm init --config {}", path),
            None => "kubeadm init".to_string(),
        };
        let script = format!(
            "{} && echo '{}' && cat {} && echo '{}'",
            init, ADMIN_CONFIG_BEGIN, ADMIN_CONF, ADMIN_CONFIG_END
        );
        InitCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script],
        }
    }
}

/// Lines with backslash-newline continuations folded into one.
fn logical_lines(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for line in raw.lines() {
        let line = line.trim_end();
        match line.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(line);
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn flag_value<'a>(tokens: &[&'a str], flag: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| *t == flag)
        .and_then(|i| tokens.get(i + 1))
        .copied()
        .filter(|v| !v.starts_with("--"))
}

impl InitOutputParser for KubeadmOutputParser {
    fn admin_config(&self, raw: &str) -> DelegatioResult<Vec<u8>> {
        let mut lines = raw.lines();
        if !lines.by_ref().any(|l| l.trim() == ADMIN_CONFIG_BEGIN) {
            return Err(DelegatioError::ProtocolParse(
                "admin kubeconfig start marker not found in init output".to_string(),
            ));
        }

        let mut blob = String::new();
        let mut closed = false;
        for line in lines {
            if line.trim() == ADMIN_CONFIG_END {
                closed = true;
                break;
            }
            blob.push_str(line);
            blob.push('\n');
        }

        if !closed {
            return Err(DelegatioError::ProtocolParse(
                "admin kubeconfig end marker not found in init output".to_string(),
            ));
        }
        if blob.trim().is_empty() {
            return Err(DelegatioError::ProtocolParse(
                "admin kubeconfig in init output is empty".to_string(),
            ));
        }
        Ok(blob.into_bytes())
    }

    fn join_credentials(&self, raw: &str) -> DelegatioResult<JoinCredentials> {
        let fragment = logical_lines(raw)
            .into_iter()
            .filter_map(|line| {
                line.find(JOIN_PREFIX)
                    .map(|at| line[at + JOIN_PREFIX.len()..].to_string())
            })
            .filter(|rest| !rest.split_whitespace().any(|t| t == CONTROL_PLANE_FLAG))
            .last()
            .ok_or_else(|| {
                DelegatioError::ProtocolParse("no worker join command in init output".to_string())
            })?;

        let tokens: Vec<&str> = fragment.split_whitespace().collect();
        let endpoint = tokens
            .first()
            .copied()
            .filter(|t| !t.starts_with("--") && t.contains(':'))
            .ok_or_else(|| {
                DelegatioError::ProtocolParse(format!(
                    "join command has no API endpoint: {}",
                    fragment
                ))
            })?;
        let token = flag_value(&tokens, TOKEN_FLAG).ok_or_else(|| {
            DelegatioError::ProtocolParse(format!("join command has no {}", TOKEN_FLAG))
        })?;
        let hash = flag_value(&tokens, CA_HASH_FLAG).ok_or_else(|| {
            DelegatioError::ProtocolParse(format!("join command has no {}", CA_HASH_FLAG))
        })?;

        JoinCredentials::new(endpoint, token, hash)
    }
}
