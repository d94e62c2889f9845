//! Shared HTTP constants (headers, routes, problem URIs).

pub(crate) const HEADER_WEBHOOK_SECRET: &str = "x-webhook-secret";
pub(crate) const HEADER_WEBHOOK_SIGNATURE: &str = "x-webhook-signature";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub(crate) const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
pub(crate) const SIGNATURE_PREFIX: &str = "sha256=";

pub(crate) const WEBHOOK_PATH: &str = "/webhook/sonarr";
pub(crate) const SERVICE_NAME: &str = "scoreguard";
pub(crate) const SUPPORTED_EVENTS: &[&str] = &[
    "Test",
    "Grab",
    "Download",
    "ManualInteractionRequired",
    "HealthIssue",
];

pub(crate) const PROBLEM_INTERNAL: &str = "https://scoreguard.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://scoreguard.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://scoreguard.dev/problems/bad-request";
pub(crate) const PROBLEM_RATE_LIMITED: &str = "https://scoreguard.dev/problems/rate-limited";
