pub const DEFAULT_METADATA_URL: &str = "https://api.cfwidget.com";

pub fn get_metadata_base_url() -> String {
    std::env::var("WOWSYNC_METADATA_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string())
}

pub fn user_agent() -> String {
    format!("wowsync/{}", env!("CARGO_PKG_VERSION"))
}
