//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the ordered `(prefix, route)` table
//! - Resolve a request path to exactly one route
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan over a handful of rules
//! - `/api/upload` sits above `/api/`; reordering changes observable routing

use std::fmt;

use crate::routing::matcher::{Matcher, PathPrefixMatcher};
use crate::upstream::UpstreamTarget;

/// Where a request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to an upstream.
    Upstream(UpstreamTarget),
    /// Serve from the uploads root.
    StaticAssets,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Upstream(target) => target.as_str(),
            Route::StaticAssets => "static",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Rule {
    matcher: PathPrefixMatcher,
    route: Route,
}

/// Ordered, first-match-wins dispatch table.
#[derive(Debug)]
pub struct RouteTable {
    rules: Vec<Rule>,
    fallback: Route,
}

impl RouteTable {
    /// The gateway's dispatch rules, highest priority first.
    pub fn gateway() -> Self {
        let rule = |prefix, route| Rule {
            matcher: PathPrefixMatcher::new(prefix),
            route,
        };
        Self {
            rules: vec![
                rule("/api/upload", Route::Upstream(UpstreamTarget::Upload)),
                rule("/f/", Route::StaticAssets),
                rule("/api/", Route::Upstream(UpstreamTarget::Api)),
            ],
            fallback: Route::Upstream(UpstreamTarget::Frontend),
        }
    }

    /// Resolve a request path to its route.
    pub fn resolve(&self, path: &str) -> Route {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.route)
            .unwrap_or(self.fallback)
    }

    /// The rule prefixes in evaluation order.
    pub fn prefixes(&self) -> impl Iterator<Item = (&'static str, Route)> + '_ {
        self.rules.iter().map(|rule| (rule.matcher.prefix(), rule.route))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::gateway()
    }
}
