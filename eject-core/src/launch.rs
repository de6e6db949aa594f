use url::form_urlencoded;

use crate::classifier::Platform;
use crate::location::CurrentLocation;

pub const DEFAULT_ANDROID_PACKAGE: &str = "com.android.chrome";

/// Platform-specific URL whose activation hands control to the device's
/// native browser. Pure over its arguments.
pub fn build_external_url(location: &CurrentLocation, platform: Platform) -> String {
    match platform {
        Platform::Ios => safari_url(location),
        Platform::Android => android_intent_url(location, DEFAULT_ANDROID_PACKAGE),
        // Caller opens this in a new browsing context instead of rewriting.
        Platform::Other => location.href(),
    }
}

/// Scheme rewrite recognized by Safari; secure stays secure.
pub fn safari_url(location: &CurrentLocation) -> String {
    let scheme = if location.is_secure() {
        "x-safari-https"
    } else {
        "x-safari-http"
    };
    format!("{scheme}://{}", location.suffix())
}

/// Android intent URI naming a browser package, with the original URL as
/// fallback so intent resolution still lands somewhere if the package is
/// absent.
pub fn android_intent_url(location: &CurrentLocation, package: &str) -> String {
    format!(
        "intent://{}#Intent;scheme={};package={};S.browser_fallback_url={};end",
        location.suffix(),
        location.scheme(),
        package,
        encode(&location.href()),
    )
}

/// Second-chance iOS target: Chrome's navigate scheme, when installed.
pub fn chrome_navigate_url(location: &CurrentLocation) -> String {
    format!("googlechrome://navigate?url={}", encode(&location.href()))
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(href: &str) -> CurrentLocation {
        CurrentLocation::parse(href).unwrap()
    }

    fn decode(value: &str) -> String {
        form_urlencoded::parse(format!("v={value}").as_bytes())
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn ios_rewrite_preserves_scheme_class() {
        let secure = location("https://app.example.com/sign-in");
        let plain = location("http://app.example.com/sign-in");
        assert_eq!(
            build_external_url(&secure, Platform::Ios),
            "x-safari-https://app.example.com/sign-in"
        );
        assert_eq!(
            build_external_url(&plain, Platform::Ios),
            "x-safari-http://app.example.com/sign-in"
        );
    }

    #[test]
    fn android_intent_embeds_parts_and_fallback() {
        let loc = location("https://app.example.com/sign-in?ref=x#top");
        let intent = build_external_url(&loc, Platform::Android);
        assert!(intent.starts_with("intent://app.example.com/sign-in?ref=x#top#Intent;"));
        assert!(intent.contains("scheme=https;"));
        assert!(intent.contains("package=com.android.chrome;"));
        assert!(intent.ends_with(";end"));

        let fallback = intent
            .split("S.browser_fallback_url=")
            .nth(1)
            .and_then(|rest| rest.split(";end").next())
            .unwrap();
        assert_eq!(decode(fallback), loc.href());
    }

    #[test]
    fn android_intent_respects_named_package() {
        let loc = location("https://app.example.com/");
        let intent = android_intent_url(&loc, "org.mozilla.firefox");
        assert!(intent.contains("package=org.mozilla.firefox;"));
    }

    #[test]
    fn other_platform_returns_href_unchanged() {
        let loc = location("https://app.example.com/sign-in?ref=x#top");
        assert_eq!(
            build_external_url(&loc, Platform::Other),
            "https://app.example.com/sign-in?ref=x#top"
        );
    }

    #[test]
    fn chrome_navigate_round_trips_the_href() {
        let loc = location("https://app.example.com/sign-in?ref=x");
        let url = chrome_navigate_url(&loc);
        let encoded = url.strip_prefix("googlechrome://navigate?url=").unwrap();
        assert_eq!(decode(encoded), loc.href());
    }
}
