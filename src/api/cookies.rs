use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use time::Duration;

use crate::config::Config;

pub const STATE_COOKIE: &str = "oauth_state";
pub const SESSION_COOKIE: &str = "vibeify_session";

/// Single-use OAuth state cookie, set right before the authorize redirect.
pub fn state_cookie(config: &Config, state: String) -> Cookie<'static> {
    // Strict would withhold the cookie on the redirect back from Spotify.
    let same_site = match config.same_site {
        SameSite::None => SameSite::None,
        _ => SameSite::Lax,
    };

    Cookie::build((STATE_COOKIE, state))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(same_site)
        .path("/")
        .max_age(Duration::seconds(config.state_ttl_secs))
        .build()
}

pub fn session_cookie(config: &Config, session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(config.same_site)
        .path("/")
        .max_age(Duration::days(config.session_ttl_days))
        .build()
}

/// Removal cookie for `name`; the path must match the one it was set with.
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Verified value of a signed cookie. Tampered cookies read as absent.
pub fn value(jar: &SignedCookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_string())
}
