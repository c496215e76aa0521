//! Cookie model shared by every adapter.
//!
//! Rendering and parsing go through the `cookie` crate so `Set-Cookie`
//! output is identical whichever engine serves the call.

use http::{HeaderMap, HeaderValue};
use time::OffsetDateTime;

/// `SameSite` policy; `Default` emits no attribute at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Default,
    Lax,
    Strict,
    None,
}

/// A cookie to be set on the response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<OffsetDateTime>,
    /// Seconds; zero or negative asks the client to drop the cookie.
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub partitioned: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// `Set-Cookie` header value; `None` if the name or value holds bytes a header cannot carry.
    pub fn to_header_value(&self) -> Option<HeaderValue> {
        let mut builder = cookie::Cookie::build((self.name.clone(), self.value.clone()))
            .secure(self.secure)
            .http_only(self.http_only)
            .partitioned(self.partitioned);

        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(expires) = self.expires {
            builder = builder.expires(expires);
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(time::Duration::seconds(max_age.max(0)));
        }
        builder = match self.same_site {
            SameSite::Default => builder,
            SameSite::Lax => builder.same_site(cookie::SameSite::Lax),
            SameSite::Strict => builder.same_site(cookie::SameSite::Strict),
            SameSite::None => builder.same_site(cookie::SameSite::None),
        };

        HeaderValue::from_str(&builder.build().to_string()).ok()
    }
}

/// Value of the first request cookie called `name`.
pub(crate) fn lookup(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| cookie::Cookie::split_parse(raw.to_owned()))
        .flatten()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_owned())
}
