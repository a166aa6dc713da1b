//! Client metadata extraction from request headers.

use serde::{Deserialize, Serialize};

use tokenward_entity::session::DeviceInfo;

const UNKNOWN_IP: &str = "unknown";

/// Request metadata relevant to a login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// `X-Forwarded-For` header (comma-separated proxy chain).
    pub forwarded_for: Option<String>,
    /// `X-Real-IP` header.
    pub real_ip: Option<String>,
}

impl RequestMeta {
    /// Metadata carrying only a user agent.
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..Self::default()
        }
    }
}

/// Derive device info from request metadata.
///
/// The IP is the first `X-Forwarded-For` entry, else `X-Real-IP`, else
/// `"unknown"`.
pub fn extract_device_info(meta: &RequestMeta) -> DeviceInfo {
    let ua = meta.user_agent.as_deref().unwrap_or_default();
    let lower = ua.to_lowercase();

    let browser = detect_browser(&lower);
    let os = detect_os(&lower);
    let (vendor, model) = detect_device(ua, &lower);
    let platform = detect_platform(&lower, os);

    let device_name = match (vendor, model.as_deref()) {
        (Some(vendor), Some(model)) => Some(format!("{vendor} {model}")),
        (Some(vendor), None) => Some(vendor.to_string()),
        _ => browser.map(str::to_string),
    };

    DeviceInfo {
        device_name,
        device_model: model,
        platform: Some(platform.to_string()),
        browser: browser.map(str::to_string),
        os: os.map(str::to_string),
        ip: Some(client_ip(meta)),
    }
}

fn client_ip(meta: &RequestMeta) -> String {
    let forwarded = meta
        .forwarded_for
        .as_deref()
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let real = meta
        .real_ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded.or(real).unwrap_or(UNKNOWN_IP).to_string()
}

fn detect_browser(ua: &str) -> Option<&'static str> {
    // Order matters: Edge and Opera also announce Chrome, Chrome announces Safari.
    if ua.contains("edg/") || ua.contains("edge/") {
        Some("Edge")
    } else if ua.contains("opr/") || ua.contains("opera") {
        Some("Opera")
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        Some("Firefox")
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        Some("Chrome")
    } else if ua.contains("safari/") {
        Some("Safari")
    } else {
        None
    }
}

fn detect_os(ua: &str) -> Option<&'static str> {
    if ua.contains("windows") {
        Some("Windows")
    } else if ua.contains("android") {
        Some("Android")
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        Some("iOS")
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        Some("Mac OS")
    } else if ua.contains("cros ") {
        Some("Chrome OS")
    } else if ua.contains("linux") {
        Some("Linux")
    } else {
        None
    }
}

fn detect_device(ua: &str, lower: &str) -> (Option<&'static str>, Option<String>) {
    if lower.contains("iphone") {
        return (Some("Apple"), Some("iPhone".to_string()));
    }
    if lower.contains("ipad") {
        return (Some("Apple"), Some("iPad".to_string()));
    }
    if lower.contains("android") {
        // "Linux; Android 14; SM-S918B) AppleWebKit/..." -> "SM-S918B"
        let model = ua
            .split(';')
            .skip_while(|part| !part.to_lowercase().contains("android"))
            .nth(1)
            .and_then(|part| part.split(')').next())
            .map(|part| part.split(" Build/").next().unwrap_or(part).trim())
            .filter(|m| !m.is_empty() && *m != "K" && !m.eq_ignore_ascii_case("wv"))
            .map(str::to_string);
        let vendor = model.as_deref().and_then(android_vendor);
        return (vendor, model);
    }
    (None, None)
}

fn android_vendor(model: &str) -> Option<&'static str> {
    let m = model.to_lowercase();
    if m.starts_with("sm-") || m.starts_with("gt-") || m.contains("samsung") {
        Some("Samsung")
    } else if m.starts_with("pixel") {
        Some("Google")
    } else if m.starts_with("redmi") || m.starts_with("mi ") || m.contains("xiaomi") {
        Some("Xiaomi")
    } else if m.contains("oneplus") {
        Some("OnePlus")
    } else if m.contains("huawei") {
        Some("Huawei")
    } else {
        None
    }
}

fn detect_platform(ua: &str, os: Option<&str>) -> &'static str {
    let android_tablet = ua.contains("android") && !ua.contains("mobile");
    if ua.contains("ipad") || ua.contains("tablet") || android_tablet {
        "tablet"
    } else if ua.contains("mobile") || matches!(os, Some("Android" | "iOS")) {
        "mobile"
    } else {
        "desktop"
    }
}
