use axum::http::{header, HeaderMap, Method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Health,
    Metrics,
    Version,
    TargetList,
    WebSocket,
    Passthrough,
}

impl Route {
    /// First match wins. Only GET is special-cased; every other method falls through.
    pub(crate) fn classify(method: &Method, path: &str, headers: &HeaderMap) -> Self {
        if *method == Method::GET {
            match path {
                "/health" => return Self::Health,
                "/metrics" => return Self::Metrics,
                "/json/version" | "/json/version/" => return Self::Version,
                "/json" | "/json/" | "/json/list" => return Self::TargetList,
                _ => {}
            }
        }

        if is_websocket_upgrade(headers) {
            Self::WebSocket
        } else {
            Self::Passthrough
        }
    }
}

pub(crate) fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let upgrade = header_value(headers, header::UPGRADE);
    let connection = header_value(headers, header::CONNECTION);

    upgrade.eq_ignore_ascii_case("websocket") && connection.to_ascii_lowercase().contains("upgrade")
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
