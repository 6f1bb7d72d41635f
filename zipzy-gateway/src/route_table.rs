//! Route families and path rewriting.
//!
//! Every inbound `/api/...` path is matched against a static table of
//! [`RouteRule`]s. A rule carries its upstream target, its rewrite and its
//! policy flags, so the proxy handler itself has no per-family branches.

use std::fmt;

/// Mount point of the gateway's proxied surface.
pub const API_MOUNT: &str = "/api";

/// A group of inbound paths sharing one upstream and one policy set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteFamily {
    Api,
    Auth,
    CartAdd,
    Categories,
    FavoritesToggle,
    Geolocation,
    Legacy,
    Location,
    Notifications,
    Parcel,
    Partners,
    Restaurants,
    ExternalAi,
}

impl RouteFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Auth => "auth",
            Self::CartAdd => "cart-add",
            Self::Categories => "categories",
            Self::FavoritesToggle => "favorites-toggle",
            Self::Geolocation => "geolocation",
            Self::Legacy => "legacy-server",
            Self::Location => "location",
            Self::Notifications => "notifications",
            Self::Parcel => "parcel",
            Self::Partners => "partners",
            Self::Restaurants => "restaurants",
            Self::ExternalAi => "external-ai",
        }
    }
}

impl fmt::Display for RouteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which configured origin a family forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTarget {
    Primary,
    Legacy,
}

/// How the matched prefix maps onto the upstream path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRewrite {
    /// `/api/<prefix>/<rest>` upstream.
    Identity,
    /// `/api/<to>/<rest>` upstream.
    Alias { to: &'static str },
    /// `/<rest>` upstream; the prefix is dropped entirely.
    StripPrefix,
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub family: RouteFamily,
    /// Path prefix below [`API_MOUNT`], without surrounding slashes.
    /// Empty for the catch-all family.
    pub prefix: &'static str,
    pub upstream: UpstreamTarget,
    pub rewrite: PathRewrite,
    pub requires_token: bool,
    pub rate_limited: bool,
    pub reject_websocket: bool,
}

impl RouteRule {
    /// A plain pass-through rule to the primary backend.
    pub const fn passthrough(family: RouteFamily, prefix: &'static str) -> Self {
        Self {
            family,
            prefix,
            upstream: UpstreamTarget::Primary,
            rewrite: PathRewrite::Identity,
            requires_token: false,
            rate_limited: false,
            reject_websocket: false,
        }
    }

    /// Apply the rewrite to the remainder left after prefix matching.
    pub fn upstream_path(&self, remainder: &str) -> String {
        let remainder = remainder.trim_matches('/');
        let base = match &self.rewrite {
            PathRewrite::Identity if self.prefix.is_empty() => API_MOUNT.to_string(),
            PathRewrite::Identity => format!("{API_MOUNT}/{}", self.prefix),
            PathRewrite::Alias { to } => format!("{API_MOUNT}/{to}"),
            PathRewrite::StripPrefix => String::new(),
        };

        if remainder.is_empty() {
            if base.is_empty() {
                "/".to_string()
            } else {
                base
            }
        } else {
            format!("{base}/{remainder}")
        }
    }

    /// Full upstream URL for this rule against `base_url`.
    pub fn upstream_url(&self, base_url: &str, remainder: &str, query: Option<&str>) -> String {
        let mut url = format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            self.upstream_path(remainder)
        );
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Match `path` (already stripped of [`API_MOUNT`]) on whole segments.
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(path);
        }

        let rest = path.strip_prefix(self.prefix)?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }
}

/// Result of matching an inbound path.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    pub remainder: &'a str,
}

/// Ordered set of route rules. First match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The Zipzy route families, most specific first.
    pub fn default_families() -> Self {
        use RouteFamily::*;

        Self::new(vec![
            RouteRule {
                family: Legacy,
                prefix: "legacy/server",
                upstream: UpstreamTarget::Legacy,
                rewrite: PathRewrite::StripPrefix,
                requires_token: true,
                rate_limited: true,
                reject_websocket: false,
            },
            RouteRule::passthrough(CartAdd, "cart/add"),
            RouteRule::passthrough(FavoritesToggle, "favorites/toggle"),
            RouteRule {
                rewrite: PathRewrite::Alias {
                    to: "products/categories",
                },
                ..RouteRule::passthrough(Categories, "categories")
            },
            RouteRule {
                reject_websocket: true,
                ..RouteRule::passthrough(Geolocation, "geolocation")
            },
            RouteRule::passthrough(Auth, "auth"),
            RouteRule::passthrough(Location, "location"),
            RouteRule::passthrough(Notifications, "notifications"),
            RouteRule::passthrough(Parcel, "parcel"),
            RouteRule::passthrough(Partners, "partners"),
            RouteRule::passthrough(Restaurants, "restaurants"),
            RouteRule::passthrough(ExternalAi, "external-ai"),
            RouteRule::passthrough(Api, ""),
        ])
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Find the rule for an inbound request path such as `/api/restaurants/42`.
    ///
    /// Returns `None` for paths outside [`API_MOUNT`].
    pub fn match_path<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        let below = path.strip_prefix(API_MOUNT)?;
        if !below.is_empty() && !below.starts_with('/') {
            return None;
        }
        let below = below.trim_start_matches('/');

        self.rules.iter().find_map(|rule| {
            rule.strip(below).map(|rest| RouteMatch {
                rule,
                remainder: rest.trim_end_matches('/'),
            })
        })
    }
}
