use crate::log::CallLog;
use delegatio::bootstrap::{InitOutputParser, JoinCredentials, KubeadmOutputParser};
use delegatio_shared::DelegatioResult;

/// Kubeadm output parser that records each completed parse.
///
/// Records "parsed admin-config" and "parsed join-credentials" after the
/// wrapped parser has consumed the full init output.
pub struct RecordingParser {
    log: CallLog,
    inner: KubeadmOutputParser,
}

impl RecordingParser {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: KubeadmOutputParser,
        }
    }
}

impl InitOutputParser for RecordingParser {
    fn admin_config(&self, raw: &str) -> DelegatioResult<Vec<u8>> {
        let blob = self.inner.admin_config(raw)?;
        self.log.record("parsed admin-config");
        Ok(blob)
    }

    fn join_credentials(&self, raw: &str) -> DelegatioResult<JoinCredentials> {
        let creds = self.inner.join_credentials(raw)?;
        self.log.record("parsed join-credentials");
        Ok(creds)
    }
}
