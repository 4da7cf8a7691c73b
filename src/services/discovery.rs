use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::rewrite::{Rewrite, UrlRewriter};
use crate::error::ProxyError;

const WEBSOCKET_URL_FIELD: &str = "webSocketDebuggerUrl";
const FRONTEND_URL_FIELD: &str = "devtoolsFrontendUrl";

/// `/json/version` payload. Key order is kept as received.
pub(crate) type VersionDocument = Map<String, Value>;

/// `/json` and `/json/list` payload, one object per debuggable target.
pub(crate) type TargetList = Vec<Map<String, Value>>;

pub(crate) fn decode_version(path: &str, body: &[u8]) -> Result<VersionDocument, ProxyError> {
    decode(path, body)
}

pub(crate) fn decode_target_list(path: &str, body: &[u8]) -> Result<TargetList, ProxyError> {
    decode(path, body)
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|source| ProxyError::MalformedUpstreamResponse {
        path: path.to_string(),
        size: body.len(),
        source,
    })
}

pub(crate) fn encode<T: serde::Serialize>(document: &T) -> Result<Vec<u8>, ProxyError> {
    serde_json::to_vec(document).map_err(ProxyError::Encode)
}

pub(crate) fn rewrite_version(
    document: &mut VersionDocument,
    rewriter: &UrlRewriter,
    public_authority: &str,
) {
    let Some(Value::String(original)) = document.get_mut(WEBSOCKET_URL_FIELD) else {
        return;
    };

    if let Some(rewritten) = rewrite_websocket(original, rewriter, public_authority) {
        *original = rewritten;
    }
}

pub(crate) fn rewrite_target_list(
    targets: &mut TargetList,
    rewriter: &UrlRewriter,
    public_authority: &str,
) {
    for (index, target) in targets.iter_mut().enumerate() {
        if let Some(Value::String(original)) = target.get_mut(FRONTEND_URL_FIELD) {
            if let Rewrite::Replaced { url, spelling } =
                rewriter.frontend_url(original, public_authority)
            {
                debug!(
                    index,
                    ?spelling,
                    original = %original,
                    rewritten = %url,
                    "rewrote devtoolsFrontendUrl"
                );
                *original = url;
            }
        }

        if let Some(Value::String(original)) = target.get_mut(WEBSOCKET_URL_FIELD) {
            if let Some(rewritten) = rewrite_websocket(original, rewriter, public_authority) {
                *original = rewritten;
            }
        }
    }
}

fn rewrite_websocket(
    original: &str,
    rewriter: &UrlRewriter,
    public_authority: &str,
) -> Option<String> {
    match rewriter.websocket_url(original, public_authority) {
        Rewrite::Replaced { url, spelling } => {
            debug!(?spelling, original, rewritten = %url, "rewrote webSocketDebuggerUrl");
            Some(url)
        }
        Rewrite::Unrecognized => {
            warn!(url = %original, "unable to rewrite websocket url, no matching internal address");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::UpstreamTarget;

    const PUBLIC: &str = "9223-host.example";

    fn rewriter() -> UrlRewriter {
        UrlRewriter::new(&UpstreamTarget::new("localhost", 9222))
    }

    #[test]
    fn version_document_rewrites_only_websocket_url() {
        let body = br#"{"Browser":"Chrome/138.0.7204.168","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/abc123"}"#;
        let mut document = decode_version("/json/version", body).expect("decode version");
        rewrite_version(&mut document, &rewriter(), PUBLIC);

        let encoded = encode(&document).expect("encode version");
        assert_eq!(
            String::from_utf8(encoded).expect("utf8"),
            r#"{"Browser":"Chrome/138.0.7204.168","webSocketDebuggerUrl":"wss://9223-host.example/devtools/browser/abc123"}"#
        );
    }

    #[test]
    fn version_document_keeps_unknown_fields_in_order() {
        let body = br#"{"Protocol-Version":"1.3","webSocketDebuggerUrl":"ws://localhost:9222/devtools/browser/x","V8-Version":"13.8.258.29","Extra":{"nested":[1,2,3]},"Browser":"Chrome"}"#;
        let mut document = decode_version("/json/version", body).expect("decode version");
        rewrite_version(&mut document, &rewriter(), PUBLIC);

        let keys = document.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(
            keys,
            ["Protocol-Version", "webSocketDebuggerUrl", "V8-Version", "Extra", "Browser"]
        );
        assert_eq!(document["Extra"], json!({"nested": [1, 2, 3]}));
        assert_eq!(document["Browser"], json!("Chrome"));
    }

    #[test]
    fn version_document_with_non_string_url_is_untouched() {
        let mut document = decode_version("/json/version", br#"{"webSocketDebuggerUrl":42}"#)
            .expect("decode version");
        rewrite_version(&mut document, &rewriter(), PUBLIC);
        assert_eq!(document["webSocketDebuggerUrl"], json!(42));
    }

    #[test]
    fn version_document_without_url_passes_through() {
        let mut document =
            decode_version("/json/version", br#"{"Browser":"Chrome"}"#).expect("decode version");
        rewrite_version(&mut document, &rewriter(), PUBLIC);
        assert_eq!(Value::Object(document), json!({"Browser": "Chrome"}));
    }

    #[test]
    fn target_list_preserves_order_and_fields() {
        let upstream = json!([
            {
                "description": "",
                "devtoolsFrontendUrl": "/devtools/inspector.html?ws=localhost:9222/devtools/page/A",
                "id": "A",
                "title": "first",
                "type": "page",
                "url": "http://127.0.0.1:9223/json/list",
                "webSocketDebuggerUrl": "ws://localhost:9222/devtools/page/A"
            },
            {
                "id": "B",
                "type": "service_worker",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/B",
                "faviconUrl": "https://example.com/favicon.ico"
            },
            {
                "id": "C",
                "type": "other"
            }
        ]);
        let body = serde_json::to_vec(&upstream).expect("encode fixture");

        let mut targets = decode_target_list("/json/list", &body).expect("decode list");
        rewrite_target_list(&mut targets, &rewriter(), PUBLIC);

        assert_eq!(targets.len(), 3);
        let ids = targets
            .iter()
            .map(|target| target["id"].as_str().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["A", "B", "C"]);

        assert_eq!(
            targets[0]["devtoolsFrontendUrl"],
            json!("/devtools/inspector.html?ws=9223-host.example/devtools/page/A")
        );
        assert_eq!(
            targets[0]["webSocketDebuggerUrl"],
            json!("wss://9223-host.example/devtools/page/A")
        );
        assert_eq!(targets[0]["url"], json!("http://127.0.0.1:9223/json/list"));
        assert_eq!(
            targets[1]["webSocketDebuggerUrl"],
            json!("wss://9223-host.example/devtools/page/B")
        );
        assert_eq!(
            targets[1]["faviconUrl"],
            json!("https://example.com/favicon.ico")
        );
        assert_eq!(Value::Object(targets[2].clone()), upstream[2]);
    }

    #[test]
    fn empty_target_list_round_trips() {
        let mut targets = decode_target_list("/json", b"[]").expect("decode list");
        rewrite_target_list(&mut targets, &rewriter(), PUBLIC);
        assert_eq!(encode(&targets).expect("encode list"), b"[]");
    }

    #[test]
    fn malformed_body_reports_size() {
        let error = decode_target_list("/json", b"<html>oops</html>").expect_err("reject html");
        match error {
            ProxyError::MalformedUpstreamResponse { path, size, .. } => {
                assert_eq!(path, "/json");
                assert_eq!(size, 17);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn list_entries_must_be_objects() {
        assert!(decode_target_list("/json", b"[1, 2]").is_err());
        assert!(decode_version("/json/version", b"[]").is_err());
    }
}
