use crate::config::UpstreamTarget;

/// One way the debugged browser may spell its own address in a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Spelling {
    Configured,
    Loopback,
    Localhost,
}

#[derive(Debug, Clone)]
struct AuthorityRule {
    spelling: Spelling,
    authority: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rewrite {
    Replaced { url: String, spelling: Spelling },
    Unrecognized,
}

/// Maps internal debugger URLs onto the external `wss://` ingress.
///
/// Rules are tried in order and the first matching spelling wins. Adding a
/// new spelling means adding a row to the table built in [`UrlRewriter::new`].
#[derive(Debug, Clone)]
pub(crate) struct UrlRewriter {
    rules: Vec<AuthorityRule>,
}

impl UrlRewriter {
    pub(crate) fn new(target: &UpstreamTarget) -> Self {
        let rules = [
            (Spelling::Configured, target.authority()),
            (Spelling::Loopback, format!("127.0.0.1:{}", target.port)),
            (Spelling::Localhost, format!("localhost:{}", target.port)),
        ]
        .into_iter()
        .map(|(spelling, authority)| AuthorityRule {
            spelling,
            authority,
        })
        .collect();

        Self { rules }
    }

    /// Rewrites a `ws://<internal>` prefix to `wss://<public>`, keeping the rest byte-for-byte.
    pub(crate) fn websocket_url(&self, url: &str, public_authority: &str) -> Rewrite {
        for rule in &self.rules {
            let prefix = format!("ws://{}", rule.authority);
            let Some(rest) = url.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if ends_authority(rest) {
                return Rewrite::Replaced {
                    url: format!("wss://{public_authority}{rest}"),
                    spelling: rule.spelling,
                };
            }
        }

        Rewrite::Unrecognized
    }

    /// Rewrites the `ws=<internal>` query parameter embedded in a DevTools frontend URL.
    pub(crate) fn frontend_url(&self, url: &str, public_authority: &str) -> Rewrite {
        for rule in &self.rules {
            let needle = format!("ws={}", rule.authority);
            if url.contains(needle.as_str()) {
                return Rewrite::Replaced {
                    url: url.replacen(needle.as_str(), &format!("ws={public_authority}"), 1),
                    spelling: rule.spelling,
                };
            }
        }

        Rewrite::Unrecognized
    }
}

/// True when `rest` starts right after a complete `host:port`, so port 9222 never matches 92221.
fn ends_authority(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with(['/', '?', '#'])
}
