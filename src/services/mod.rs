pub(crate) mod discovery;
mod forwarder;
mod rewrite;
pub(crate) mod upstream;

pub(crate) use forwarder::Forwarder;
pub(crate) use rewrite::UrlRewriter;
pub(crate) use upstream::UpstreamClient;
