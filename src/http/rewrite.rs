//! Traffic-shape special cases applied before forwarding.
//!
//! - Front-end traffic on `/api/` is sent to the API instead of looping back
//!   through the renderer.
//! - The image optimizer cannot fetch relative upload paths, so a `url=/f/...`
//!   parameter is made absolute against the public base URL.

use url::form_urlencoded;

use crate::config::PublicBase;
use crate::upstream::UpstreamTarget;

/// The front-end's image optimization endpoint.
pub const IMAGE_OPTIMIZER_PATH: &str = "/_next/image";

/// Path prefix of committed uploads.
pub const UPLOADS_PREFIX: &str = "/f/";

const INTERNAL_API_PREFIX: &str = "/api/";

/// Redirect front-end bound `/api/` traffic to the API.
pub fn redirect_internal_api(target: UpstreamTarget, path: &str) -> UpstreamTarget {
    if target == UpstreamTarget::Frontend && path.starts_with(INTERNAL_API_PREFIX) {
        tracing::debug!(path, "Internal API request redirected to API upstream");
        UpstreamTarget::Api
    } else {
        target
    }
}

/// Rewrite the image optimizer's `url` parameter into an absolute upload URL.
///
/// Returns the new query string, or `None` when nothing changes.
pub fn rewrite_image_query(path: &str, query: Option<&str>, base: Option<&PublicBase>) -> Option<String> {
    if path != IMAGE_OPTIMIZER_PATH {
        return None;
    }
    let (query, base) = (query?, base?);

    let mut changed = false;
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .map(|(key, value)| {
            if key == "url" && value.starts_with(UPLOADS_PREFIX) {
                changed = true;
                let absolute = base.absolute(&value);
                (key, absolute)
            } else {
                (key, value)
            }
        })
        .collect();

    changed.then(|| {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    })
}
