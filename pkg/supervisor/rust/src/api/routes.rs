// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Declarative route table.
//!
//! Patterns are `/`-separated literal segments and `{param}` captures. A
//! capture never matches an empty segment and a trailing slash is a distinct
//! path. Segments are percent-decoded after splitting, so `my%20app` captures
//! `my app`; a segment that does not decode to UTF-8 matches nothing. Lookup
//! walks [`ROUTES`] in order and the first entry matching both path and method
//! wins.

use std::borrow::Cow;

/// Handler selected by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ListPrograms,
    StartProgram,
    StopProgram,
    ReadStdoutLog,
    StartPrograms,
    StopPrograms,
    CreateProgram,
    RevokeProgram,
    Shutdown,
    Reload,
}

#[derive(Debug)]
pub struct Route {
    pub methods: &'static [&'static str],
    pub pattern: &'static str,
    pub endpoint: Endpoint,
}

const GET: &[&str] = &["GET"];
const MUTATING: &[&str] = &["POST", "PUT"];

pub static ROUTES: &[Route] = &[
    Route {
        methods: GET,
        pattern: "/program/list",
        endpoint: Endpoint::ListPrograms,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/start/{name}",
        endpoint: Endpoint::StartProgram,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/stop/{name}",
        endpoint: Endpoint::StopProgram,
    },
    Route {
        methods: GET,
        pattern: "/program/log/{name}/stdout",
        endpoint: Endpoint::ReadStdoutLog,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/startPrograms",
        endpoint: Endpoint::StartPrograms,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/stopPrograms",
        endpoint: Endpoint::StopPrograms,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/create/{name}",
        endpoint: Endpoint::CreateProgram,
    },
    Route {
        methods: MUTATING,
        pattern: "/program/revoke/{name}",
        endpoint: Endpoint::RevokeProgram,
    },
    Route {
        methods: MUTATING,
        pattern: "/supervisor/shutdown",
        endpoint: Endpoint::Shutdown,
    },
    Route {
        methods: MUTATING,
        pattern: "/supervisor/reload",
        endpoint: Endpoint::Reload,
    },
];

/// Decoded path parameters captured by a match, in pattern order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(&'static str, String)>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Matched {
        endpoint: Endpoint,
        params: Params,
    },
    /// The path exists but not for this method; carries the allowed methods.
    MethodNotAllowed(Vec<&'static str>),
    NotFound,
}

pub fn resolve(method: &str, path: &str) -> Resolution {
    let mut allowed: Vec<&'static str> = Vec::new();
    for route in ROUTES {
        let Some(params) = match_pattern(route.pattern, path) else {
            continue;
        };
        if route.methods.contains(&method) {
            return Resolution::Matched {
                endpoint: route.endpoint,
                params,
            };
        }
        for m in route.methods {
            if !allowed.contains(m) {
                allowed.push(m);
            }
        }
    }
    if allowed.is_empty() {
        Resolution::NotFound
    } else {
        Resolution::MethodNotAllowed(allowed)
    }
}

fn match_pattern(pattern: &'static str, path: &str) -> Option<Params> {
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');
    let mut params = Vec::new();
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return Some(Params(params)),
            (Some(expected), Some(raw)) => {
                let actual = decode_segment(raw)?;
                if let Some(key) = expected
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    if actual.is_empty() {
                        return None;
                    }
                    params.push((key, actual.into_owned()));
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

fn decode_segment(raw: &str) -> Option<Cow<'_, str>> {
    if !raw.contains('%') {
        return Some(Cow::Borrowed(raw));
    }
    urlencoding::decode(raw).ok()
}
