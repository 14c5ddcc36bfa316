//! Manual redirect following.
//!
//! 301/302/307/308 keep the method and body, 303 switches to GET and drops
//! the body. Relative `Location` values resolve against the hop that
//! produced them. A redirect without `Location` is returned as is.
//! Credentials never follow a redirect to another origin.

use axum::http::{header, HeaderValue, Method, StatusCode};

use crate::proxy::allow_list::AllowList;
use crate::proxy::error::ForwardError;
use crate::proxy::upstream::{UpstreamClient, UpstreamRequest, UpstreamResponse};

pub const MAX_REDIRECTS: usize = 10;

/// Response header reporting how many redirects were followed.
pub const REDIRECT_COUNT_HEADER: &str = "x-relay-redirects";

/// Dropped from the request when a redirect changes origin.
const CREDENTIAL_HEADERS: [header::HeaderName; 3] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

pub fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

pub struct RedirectRelay<'a> {
    client: &'a dyn UpstreamClient,
    allow_list: Option<&'a AllowList>,
    max_redirects: usize,
}

impl<'a> RedirectRelay<'a> {
    pub fn new(client: &'a dyn UpstreamClient) -> Self {
        Self {
            client,
            allow_list: None,
            max_redirects: MAX_REDIRECTS,
        }
    }

    /// Refuse redirects to origins outside `allow_list`.
    pub fn with_allow_list(mut self, allow_list: &'a AllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        let mut request = request;
        let mut hops = 0;

        loop {
            let response = self.client.send(request.clone()).await?;
            if !is_redirect(response.status) {
                return Ok(finish(response, hops));
            }

            let Some(location) = response
                .headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                tracing::debug!(status = %response.status, "Redirect without Location, stopping");
                return Ok(finish(response, hops));
            };

            if hops >= self.max_redirects {
                tracing::warn!(url = %request.url, limit = self.max_redirects, "Redirect limit reached");
                return Err(ForwardError::TooManyRedirects(self.max_redirects));
            }

            let next = request.url.join(location).map_err(|e| {
                ForwardError::ProxyError(format!("invalid redirect location '{location}': {e}"))
            })?;
            if let Some(allow_list) = self.allow_list {
                if !allow_list.allows(&next) {
                    return Err(ForwardError::NotAllowed(next.origin().ascii_serialization()));
                }
            }

            hops += 1;
            tracing::debug!(hop = hops, status = %response.status, location = %next, "Following redirect");

            if response.status == StatusCode::SEE_OTHER {
                request.method = Method::GET;
                request.body = None;
                request.headers.remove(header::CONTENT_TYPE);
            }
            if next.origin() != request.url.origin() {
                for name in &CREDENTIAL_HEADERS {
                    request.headers.remove(name);
                }
            }
            request.url = next;
        }
    }
}

fn finish(mut response: UpstreamResponse, hops: usize) -> UpstreamResponse {
    response
        .headers
        .insert(REDIRECT_COUNT_HEADER, HeaderValue::from(hops));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::upstream::testing::ScriptedUpstream;
    use axum::http::HeaderMap;
    use bytes::Bytes;
    use url::Url;

    fn post(url: &str) -> UpstreamRequest {
        UpstreamRequest {
            method: Method::POST,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: Some(Bytes::from_static(b"payload")),
        }
    }

    #[tokio::test]
    async fn test_no_redirect_reports_zero() {
        let client = ScriptedUpstream::new().reply(200, &[], "ok");
        let response = RedirectRelay::new(&client).send(post("https://a.test/x")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[REDIRECT_COUNT_HEADER], "0");
    }

    #[tokio::test]
    async fn test_see_other_downgrades_to_get() {
        let client = ScriptedUpstream::new()
            .reply(303, &[("location", "/done")], "")
            .reply(200, &[], "ok");
        let response = RedirectRelay::new(&client).send(post("https://a.test/submit")).await.unwrap();

        assert_eq!(response.headers[REDIRECT_COUNT_HEADER], "1");
        let seen = client.requests();
        assert_eq!(seen[1].method, Method::GET);
        assert!(seen[1].body.is_none());
        assert_eq!(seen[1].url.as_str(), "https://a.test/done");
    }

    #[tokio::test]
    async fn test_temporary_redirect_keeps_method_and_body() {
        let client = ScriptedUpstream::new()
            .reply(307, &[("location", "https://b.test/again")], "")
            .reply(200, &[], "ok");
        RedirectRelay::new(&client).send(post("https://a.test/submit")).await.unwrap();

        let seen = client.requests();
        assert_eq!(seen[1].method, Method::POST);
        assert_eq!(seen[1].body.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_cross_origin_redirect_drops_credentials() {
        let client = ScriptedUpstream::new()
            .reply(302, &[("location", "/same")], "")
            .reply(302, &[("location", "https://b.test/other")], "")
            .reply(200, &[], "ok");
        let mut request = post("https://a.test/start");
        request.headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        request.headers.insert(header::COOKIE, HeaderValue::from_static("session=1"));
        request.headers.insert(header::PROXY_AUTHORIZATION, HeaderValue::from_static("Basic x"));
        request.headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain"));
        RedirectRelay::new(&client).send(request).await.unwrap();

        let seen = client.requests();
        assert_eq!(seen[1].headers[header::AUTHORIZATION], "Bearer secret");
        assert_eq!(seen[1].headers[header::COOKIE], "session=1");

        let cross = &seen[2].headers;
        assert!(cross.get(header::AUTHORIZATION).is_none());
        assert!(cross.get(header::COOKIE).is_none());
        assert!(cross.get(header::PROXY_AUTHORIZATION).is_none());
        assert_eq!(cross[header::ACCEPT], "text/plain");
    }

    #[tokio::test]
    async fn test_relative_location_resolves_against_previous_hop() {
        let client = ScriptedUpstream::new()
            .reply(302, &[("location", "https://b.test/dir/start")], "")
            .reply(301, &[("location", "next")], "")
            .reply(200, &[], "ok");
        let response = RedirectRelay::new(&client).send(post("https://a.test/")).await.unwrap();

        assert_eq!(response.headers[REDIRECT_COUNT_HEADER], "2");
        assert_eq!(client.requests()[2].url.as_str(), "https://b.test/dir/next");
    }

    #[tokio::test]
    async fn test_redirect_without_location_ends_chain() {
        let client = ScriptedUpstream::new().reply(302, &[], "moved somewhere");
        let response = RedirectRelay::new(&client).send(post("https://a.test/")).await.unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.headers[REDIRECT_COUNT_HEADER], "0");
    }

    #[tokio::test]
    async fn test_ten_hops_then_success() {
        let mut client = ScriptedUpstream::new();
        for i in 0..MAX_REDIRECTS {
            let location = format!("/hop{i}");
            client = client.reply(302, &[("location", location.as_str())], "");
        }
        let client = client.reply(200, &[], "ok");

        let response = RedirectRelay::new(&client).send(post("https://a.test/")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[REDIRECT_COUNT_HEADER], "10");
    }

    #[tokio::test]
    async fn test_eleventh_redirect_is_too_many() {
        let mut client = ScriptedUpstream::new();
        for i in 0..=MAX_REDIRECTS {
            let location = format!("/hop{i}");
            client = client.reply(302, &[("location", location.as_str())], "");
        }
        let err = RedirectRelay::new(&client).send(post("https://a.test/")).await.unwrap_err();
        assert!(matches!(err, ForwardError::TooManyRedirects(10)));
        assert_eq!(client.requests().len(), MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn test_redirect_outside_allow_list_is_refused() {
        let allow = AllowList::from_patterns(&["a.test"]).unwrap();
        let client = ScriptedUpstream::new().reply(302, &[("location", "https://evil.test/")], "");
        let err = RedirectRelay::new(&client)
            .with_allow_list(&allow)
            .send(post("https://a.test/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::NotAllowed(_)));
    }
}
