//! Classification of `cf` diagnostics into the error taxonomy

use liftoff_types::LiftoffError;
use regex::Regex;
use std::sync::LazyLock;

static CF_ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(CF-[A-Za-z]+)\b").expect("error code pattern is valid"));

static HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:status(?: code)?:?|HTTP/\d(?:\.\d)?)\s*(\d{3})").expect("status pattern is valid")
});

const TLS_MARKERS: &[&str] = &[
    "x509",
    "certificate",
    "ssl validation",
    "skip-ssl-validation",
    "tls: ",
];

const UNREACHABLE_MARKERS: &[&str] = &[
    "no such host",
    "connection refused",
    "network is unreachable",
    "i/o timeout",
    "dial tcp",
    "request error",
    "unable to connect",
];

const AUTH_MARKERS: &[&str] = &[
    "credentials were rejected",
    "invalid_grant",
    "bad credentials",
    "unauthorized",
    "not logged in",
    "authentication has expired",
];

/// What a failed `cf` invocation was doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    /// `api`, `auth`, `target` and `curl`: output is cf's own diagnostics
    Session,
    /// `push`, service and log commands: output interleaves staging and
    /// application logs with cf's diagnostics
    Operation,
}

/// Prefixes cf puts on its own auth failures
const AUTH_LINE_PREFIXES: &[&str] = &[
    "not logged in",
    "authentication has expired",
    "credentials were rejected",
    "invalid_grant",
];

/// Map a failed `cf` invocation onto a [`LiftoffError`].
///
/// Connectivity markers win over platform error codes since a transport
/// failure may echo an unrelated code from a cached response. In
/// [`CommandScope::Operation`] only cf's `Request error` lines and its auth
/// failure lines are inspected for markers.
pub fn classify(scope: CommandScope, exit_code: Option<i32>, output: &str) -> LiftoffError {
    let detail = summarize(output);
    let (transport, auth) = match scope {
        CommandScope::Session => {
            let lowered = output.to_ascii_lowercase();
            (lowered.clone(), lowered)
        }
        CommandScope::Operation => {
            let lines: Vec<String> = output
                .lines()
                .map(|l| l.trim().to_ascii_lowercase())
                .collect();
            let transport = lines
                .iter()
                .filter(|l| l.starts_with("request error"))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            let auth = lines
                .iter()
                .filter(|l| AUTH_LINE_PREFIXES.iter().any(|p| l.starts_with(p)))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            (transport, auth)
        }
    };

    if TLS_MARKERS.iter().any(|m| transport.contains(m)) {
        return LiftoffError::TlsUntrusted(format!(
            "{} (if the target uses a self-signed certificate, enable the self-signed option)",
            detail
        ));
    }
    if UNREACHABLE_MARKERS.iter().any(|m| transport.contains(m)) {
        return LiftoffError::ConnectionUnreachable(detail);
    }
    if AUTH_MARKERS.iter().any(|m| auth.contains(m)) {
        return LiftoffError::AuthRejected(detail);
    }

    let status = HTTP_STATUS
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    let code = CF_ERROR_CODE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| exit_code.map(|c| format!("exit-{}", c)));

    LiftoffError::PlatformApi {
        status,
        code,
        description: detail,
    }
}

fn summarize(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "FAILED")
        .collect();
    if lines.is_empty() {
        "cf exited without diagnostics".to_string()
    } else {
        lines.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftoff_types::ErrorKind;

    #[test]
    fn test_tls_failure() {
        let err = classify(
            CommandScope::Session,
            Some(1),
            "Request error: Get \"https://api.local/\": x509: certificate signed by unknown authority\nTIP: Use 'cf api --skip-ssl-validation' to continue with an insecure API endpoint\nFAILED",
        );
        assert_eq!(err.kind(), ErrorKind::TlsUntrusted);
        assert!(err.to_string().contains("self-signed"));
    }

    #[test]
    fn test_unknown_host() {
        let err = classify(CommandScope::Session, Some(1), "Request error: dial tcp: lookup api.nowhere: no such host\nFAILED");
        assert_eq!(err.kind(), ErrorKind::ConnectionUnreachable);
    }

    #[test]
    fn test_auth_rejected() {
        let err = classify(CommandScope::Session, Some(1), "Credentials were rejected, please try again.\nFAILED");
        assert_eq!(err.kind(), ErrorKind::AuthRejected);
    }

    #[test]
    fn test_platform_error_keeps_code_and_status() {
        let err = classify(
            CommandScope::Session,
            Some(1),
            "Server error, status code: 400, error code: 60002, message: The service instance name is taken: db CF-ServiceInstanceNameTaken\nFAILED",
        );
        match err {
            LiftoffError::PlatformApi {
                status,
                code,
                description,
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(code.as_deref(), Some("CF-ServiceInstanceNameTaken"));
                assert!(description.contains("name is taken"));
                assert!(!description.contains("FAILED"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_push_logs_do_not_look_like_connectivity() {
        let transcript = "Pushing app orders to org acme / space prod as deployer...\n\
   Downloading open_jdk_jre 17.0.9\n\
   Adding certificates to truststore\n\
   [APP/PROC/WEB/0] ERR GET /admin 401 Unauthorized\n\
   [APP/PROC/WEB/0] ERR request error while calling inventory\n\
Error staging application: App staging failed in the buildpack compile phase\n\
FAILED";
        let err = classify(CommandScope::Operation, Some(1), transcript);
        match err {
            LiftoffError::PlatformApi { code, description, .. } => {
                assert_eq!(code.as_deref(), Some("exit-1"));
                assert!(description.contains("App staging failed"));
            }
            other => panic!("unexpected {:?}", other),
        }

        // the same transcript from a session command is read as a whole
        assert_eq!(
            classify(CommandScope::Session, Some(1), transcript).kind(),
            ErrorKind::TlsUntrusted
        );
    }

    #[test]
    fn test_operation_keeps_cf_transport_and_auth_lines() {
        let tls = "Pushing app orders...\nRequest error: Put \"https://api.local/v3/apps\": x509: certificate has expired\nFAILED";
        assert_eq!(
            classify(CommandScope::Operation, Some(1), tls).kind(),
            ErrorKind::TlsUntrusted
        );

        let expired = "Creating service instance db...\nAuthentication has expired.  Please log back in to re-authenticate.\nFAILED";
        assert_eq!(
            classify(CommandScope::Operation, Some(1), expired).kind(),
            ErrorKind::AuthRejected
        );
    }

    #[test]
    fn test_silent_failure_uses_exit_code() {
        match classify(CommandScope::Session, Some(2), "\n") {
            LiftoffError::PlatformApi { status, code, .. } => {
                assert_eq!(status, None);
                assert_eq!(code.as_deref(), Some("exit-2"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
