use super::*;
use agentkernel_core::PermissionLevel;

fn permissions_allowing(domains: &[&str]) -> Arc<Permissions> {
    let mut p = Permissions::preset(PermissionLevel::Sandboxed);
    p.domains.allowed = domains.iter().map(|d| d.to_string()).collect();
    Arc::new(p)
}

#[test]
fn host_of_extracts_the_hostname() {
    assert_eq!(host_of("https://example.com/a/b").unwrap(), "example.com");
}

#[test]
fn host_of_rejects_an_unparsable_url() {
    assert!(host_of("not a url").is_err());
}

#[tokio::test]
async fn request_to_a_disallowed_domain_is_rejected_before_any_network_io() {
    let permissions = permissions_allowing(&["allowed.example"]);
    let err = request(
        permissions,
        "https://blocked.example/",
        Method::Get,
        None,
        None,
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, KernelError::PermissionDenied(_)));
}

#[test]
fn redact_headers_masks_sensitive_keys_case_insensitively() {
    let headers = serde_json::json!({"Authorization": "secret", "X-Trace": "abc", "Cookie": "x"});
    let redacted = redact_headers(&headers);
    assert_eq!(redacted["Authorization"], "***");
    assert_eq!(redacted["Cookie"], "***");
    assert_eq!(redacted["X-Trace"], "abc");
}
