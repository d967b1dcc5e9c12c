// ABOUTME: Compiled matchers for the CSS selectors named by source profiles.
// ABOUTME: Registering a profile compiles its selectors; extraction then looks them up by string.

//! Profile selector matchers.
//!
//! A profile is checked when it is registered: every selector in its set is
//! compiled here and the registry refuses the profile if any fails to parse.
//! Extraction of each record then finds the matchers already built. Lookups
//! for strings no profile declared still compile on first use, and a failed
//! parse is stored as `None` so it is not retried.

use std::collections::HashMap;
use std::sync::RwLock;

use dom_query::Matcher;
use once_cell::sync::Lazy;

static PROFILE_MATCHERS: Lazy<RwLock<HashMap<String, Option<Matcher>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Matcher for `css`, or `None` when it does not parse.
pub fn matcher_for(css: &str) -> Option<Matcher> {
    if let Some(known) = PROFILE_MATCHERS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(css)
    {
        return known.clone();
    }

    let mut matchers = PROFILE_MATCHERS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    matchers
        .entry(css.to_string())
        .or_insert_with(|| Matcher::new(css).ok())
        .clone()
}

/// Compiles every selector of a profile and returns those that do not parse.
pub fn compile_profile_selectors<'a>(selectors: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut matchers = PROFILE_MATCHERS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    selectors
        .into_iter()
        .filter(|css| {
            matchers
                .entry(css.to_string())
                .or_insert_with(|| Matcher::new(css).ok())
                .is_none()
        })
        .map(str::to_string)
        .collect()
}
