pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const MAX_REDIRECTS: usize = 10;
}

pub mod retry {
    /// Retries after the initial attempt; total invocations = MAX_ATTEMPTS + 1.
    pub const MAX_ATTEMPTS: usize = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const JITTER: f64 = 0.0;
}

pub mod defaults {
    pub const ACCEPT: &str = "*/*";
    pub const API_KEY_HEADER: &str = "X-API-Key";
    pub const MULTIPART_FIELD: &str = "file";
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http", "https"];
}
