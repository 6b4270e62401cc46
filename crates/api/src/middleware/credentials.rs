//! Pulling credentials and the tenant subdomain out of request parts.

use axum::http::{HeaderMap, Uri, header};

use warden_identity::SessionCredential;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const LEGACY_TOKEN_HEADER: &str = "token";
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// Service key, if one was presented.
pub fn api_key(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, API_KEY_HEADER)
}

/// Session credential, first match wins: bearer, legacy header, session
/// cookie, `?token=` query parameter.
pub fn session_credential(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<SessionCredential> {
    if let Some(token) = bearer(headers) {
        return Some(SessionCredential::Bearer(token.to_string()));
    }
    if let Some(token) = header_value(headers, LEGACY_TOKEN_HEADER) {
        return Some(SessionCredential::Legacy(token.to_string()));
    }
    if let Some(value) = cookie(headers, cookie_name) {
        return Some(SessionCredential::Cookie {
            name: cookie_name.to_string(),
            value: value.to_string(),
        });
    }
    query_param(uri, "token").map(SessionCredential::Query)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = header_value(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Request host without port: `X-Forwarded-Host` (first hop), then `Host`,
/// then the URI authority.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let raw = header_value(headers, FORWARDED_HOST_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_value(headers, header::HOST.as_str()))
        .or_else(|| uri.host())?;
    let host = strip_port(raw).trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map_or(host, |(h, _)| h.trim_start_matches('['));
    }
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

/// The label immediately left of `base_domain`.
///
/// `bo.acme.example.com` under `example.com` is `acme`. Hosts outside the base
/// domain, and the base domain itself, carry no subdomain.
pub fn subdomain_of(host: &str, base_domain: &str) -> Option<String> {
    let base = base_domain.trim_matches('.');
    if base.is_empty() {
        return None;
    }
    let head = host.strip_suffix(base)?.strip_suffix('.')?;
    head.rsplit('.').next().filter(|label| !label.is_empty()).map(str::to_string)
}
