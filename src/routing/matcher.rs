//! Inbound path matching.
//!
//! # Responsibilities
//! - Compile path templates such as `/appointments/{patientId}`
//! - Match request paths segment by segment and capture parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Literal segments must match exactly; `{name}` captures one segment
//! - No regex to guarantee O(n) matching
//! - Captured values stay percent-encoded as received
//! - Dot segments (`.`, `..`) never bind to a parameter

use std::collections::HashMap;

use thiserror::Error;

/// Path parameters captured from an inbound request.
pub type PathParams = HashMap<String, String>;

/// Error raised when compiling a path or target template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("template '{template}' has a malformed segment '{segment}'")]
    MalformedSegment { template: String, segment: String },

    #[error("template '{template}' is not a valid http URL: {reason}")]
    InvalidUrl { template: String, reason: String },

    #[error("missing value for parameter '{0}'")]
    MissingParam(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled inbound path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile a template. `/` alone matches the root path.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(TemplateError::NotAbsolute(template.to_string()));
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                segments.push(parse_segment(template, part)?);
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// The template text as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the captured parameters, in path order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning the captured parameters.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() || part == "." || part == ".." {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn parse_segment(template: &str, part: &str) -> Result<Segment, TemplateError> {
    let malformed = || TemplateError::MalformedSegment {
        template: template.to_string(),
        segment: part.to_string(),
    };

    if part.is_empty() {
        return Err(malformed());
    }
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        if is_param_name(inner) {
            return Ok(Segment::Param(inner.to_string()));
        }
        return Err(malformed());
    }
    if part.contains('{') || part.contains('}') {
        return Err(malformed());
    }
    Ok(Segment::Literal(part.to_string()))
}

pub(crate) fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_with_param() {
        let template = PathTemplate::parse("/appointments/{patientId}").unwrap();

        let params = template.match_path("/appointments/42").unwrap();
        assert_eq!(params.get("patientId").map(String::as_str), Some("42"));

        assert!(template.match_path("/appointments").is_none());
        assert!(template.match_path("/appointments/42/extra").is_none());
        assert!(template.match_path("/results/42").is_none());
    }

    #[test]
    fn test_literal_only() {
        let template = PathTemplate::parse("/availability").unwrap();
        assert!(template.match_path("/availability").unwrap().is_empty());
        assert!(template.match_path("/Availability").is_none());

        let root = PathTemplate::parse("/").unwrap();
        assert!(root.match_path("/").is_some());
        assert!(root.match_path("/x").is_none());
    }

    #[test]
    fn test_dot_segments_do_not_bind() {
        let template = PathTemplate::parse("/results/{patientId}").unwrap();
        assert!(template.match_path("/results/..").is_none());
        assert!(template.match_path("/results/.").is_none());
        assert!(template.match_path("/results/").is_none());
    }

    #[test]
    fn test_malformed_templates() {
        assert!(matches!(
            PathTemplate::parse("appointments"),
            Err(TemplateError::NotAbsolute(_))
        ));
        assert!(PathTemplate::parse("/a//b").is_err());
        assert!(PathTemplate::parse("/a/{}").is_err());
        assert!(PathTemplate::parse("/a/x{id}").is_err());
    }

    #[test]
    fn test_params_in_order() {
        let template = PathTemplate::parse("/p/{a}/q/{b}").unwrap();
        assert_eq!(template.params().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
