//! Parsing helpers for Moodle's login and dashboard pages

use crate::config::SESSION_COOKIE;
use crate::error::Result;
use crate::extract::html::{select_first, selector};
use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE};
use scraper::Html;

/// Text that appears only when a user is logged in (the user menu's logout link)
pub const LOGGED_IN_MARKER: &str = "login/logout.php";

/// Selectors for the error box shown on a rejected login
const LOGIN_ERROR_SELECTORS: &[&str] = &["#loginerrormessage", ".loginerrors", ".alert-danger"];

/// Value of the hidden `logintoken` input on the login form
pub fn extract_login_token(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let token = select_first(document.root_element(), r#"input[name="logintoken"]"#)?
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .filter(|value| !value.is_empty());
    Ok(token)
}

/// Whether a login response body reports a failed login
pub fn has_login_error(html: &str) -> Result<bool> {
    if html.contains("Invalid login") {
        return Ok(true);
    }

    let document = Html::parse_document(html);
    for css in LOGIN_ERROR_SELECTORS {
        if document.select(&selector(css)?).next().is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether a dashboard body shows the logged-in user menu
pub fn is_logged_in(html: &str) -> bool {
    html.contains(LOGGED_IN_MARKER)
}

/// `MoodleSession` value from the `Set-Cookie` headers, if any
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .map(|rest| rest.split(';').next().unwrap_or_default().trim().to_string())
        .filter(|value| !value.is_empty() && value != "deleted")
        .last()
}

/// Whether a redirect sends the browser back to the login form
///
/// Moodle's successful login redirects to `login/index.php?testsession=<uid>`,
/// which is not a failure.
pub fn redirects_to_login(headers: &HeaderMap) -> bool {
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|location| {
            location.contains("login/index.php") && !location.contains("testsession=")
        })
}
