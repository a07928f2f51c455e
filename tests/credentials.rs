// ABOUTME: Integration tests for credential resolution.
// ABOUTME: Uses the Ed25519 key fixture and temporary directories for missing sources.

mod support;

use commandcast::host::HostResolver;
use commandcast::ssh::{AuthMethod, CredentialSources};
use std::time::Duration;

/// Test: a readable key plus a password.
/// Expected: key first, password last.
#[tokio::test]
async fn key_file_then_password() {
    support::init_tracing();
    let sources = CredentialSources {
        agent_socket: None,
        key_files: vec![support::fixture_key()],
        password: Some("pw".to_string()),
    };

    let methods = sources.resolve().await.expect("credentials resolve");
    assert_eq!(methods.kinds(), vec!["publickey", "password"]);

    let first = methods.iter().next().unwrap();
    assert!(matches!(first, AuthMethod::KeyFile { path, .. } if *path == support::fixture_key()));
}

/// Test: the agent variable points at something that is not a socket.
/// Expected: the agent is left out, the key remains.
#[tokio::test]
async fn non_socket_agent_path_is_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_socket = dir.path().join("agent.sock");
    std::fs::write(&not_a_socket, "").unwrap();

    let sources = CredentialSources {
        agent_socket: Some(not_a_socket),
        key_files: vec![support::fixture_key()],
        password: None,
    };

    let methods = sources.resolve().await.expect("key remains");
    assert_eq!(methods.kinds(), vec!["publickey"]);
}

/// Test: no agent, no readable keys, no password.
/// Expected: nothing to authenticate with.
#[tokio::test]
async fn nothing_usable_resolves_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let sources = CredentialSources {
        agent_socket: Some(dir.path().join("missing.sock")),
        key_files: vec![dir.path().join("id_rsa"), dir.path().join("id_ed25519")],
        password: None,
    };

    assert!(sources.resolve().await.is_none());
}

/// Test: an unreadable key before a readable one.
/// Expected: only the readable key is kept, in its listed position.
#[tokio::test]
async fn skips_missing_keys_and_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let sources = CredentialSources {
        agent_socket: None,
        key_files: vec![dir.path().join("id_rsa"), support::fixture_key()],
        password: Some("pw".to_string()),
    };

    let methods = sources.resolve().await.unwrap();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods.kinds(), vec!["publickey", "password"]);
}

/// Test: a host token carrying its own password.
/// Expected: the password is tried after the global methods for that host only.
#[tokio::test]
async fn embedded_password_follows_global_methods() {
    let sources = CredentialSources {
        agent_socket: None,
        key_files: vec![support::fixture_key()],
        password: None,
    };
    let auth = sources.resolve().await.unwrap();
    let resolver = HostResolver::new("alice", Duration::from_secs(5), auth);

    let with_password = resolver.resolve("bob:s3cret@db.example.com").unwrap();
    assert_eq!(with_password.auth_methods().kinds(), vec!["publickey", "password"]);
    match with_password.auth_methods().iter().last() {
        Some(AuthMethod::Password(password)) => assert_eq!(password, "s3cret"),
        other => panic!("expected a password method, got {other:?}"),
    }

    let plain = resolver.resolve("db.example.com").unwrap();
    assert_eq!(plain.auth_methods().kinds(), vec!["publickey"]);
}

/// Test: the agent socket comes from SSH_AUTH_SOCK.
#[test]
fn from_env_reads_agent_socket() {
    temp_env::with_var("SSH_AUTH_SOCK", Some("/run/user/1000/agent.sock"), || {
        let sources = CredentialSources::from_env(Vec::new(), None);
        assert_eq!(
            sources.agent_socket.as_deref(),
            Some(std::path::Path::new("/run/user/1000/agent.sock"))
        );
    });
    temp_env::with_var_unset("SSH_AUTH_SOCK", || {
        assert!(CredentialSources::from_env(Vec::new(), None).agent_socket.is_none());
    });
}
