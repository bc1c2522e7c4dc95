#[derive(clap::Parser)]
pub(crate) struct Cli {
    /// TCP port the WebSocket and health endpoints listen on.
    #[clap(long, env = "PORT", default_value_t = 8080)]
    pub(crate) port: u16,

    /// HMAC secret for decoding signed session tokens. Guest sessions are
    /// used for every connection when this is unset.
    #[clap(long, env = "AUTH_SECRET")]
    pub(crate) auth_secret: Option<String>,

    /// Base URL of the track-source HTTP catalog. Falls back to the
    /// built-in mock catalog when unset.
    #[clap(long, env = "TRACK_SOURCE_URL")]
    pub(crate) track_source_url: Option<String>,
}
