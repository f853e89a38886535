//! Downstream target templates.
//!
//! A target is an absolute `http://` URL in which `{name}` stands for a
//! parameter captured from the inbound path. Service placeholders
//! (`{{service}}`) are resolved earlier, when configuration is loaded.

use url::Url;

use crate::routing::matcher::{is_param_name, PathParams, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

/// A compiled downstream URL template.
#[derive(Debug, Clone)]
pub struct TargetTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl TargetTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                return Err(invalid(template, "unterminated '{'"));
            };
            let name = &rest[open + 1..open + close];
            if !is_param_name(name) {
                return Err(invalid(template, &format!("bad parameter name '{}'", name)));
            }
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            parts.push(Part::Param(name.to_string()));
            rest = &rest[open + close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid(template, "unmatched '}'"));
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        let target = Self {
            raw: template.to_string(),
            parts,
        };

        // Every parameter is a single path-safe token, so a sample expansion
        // tells us whether the template can ever produce a valid URL.
        let sample = target.render(|_| Some("x"));
        let url = Url::parse(&sample).map_err(|e| invalid(template, &e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid(template, "only http targets are supported"));
        }
        if url.host_str().is_none() {
            return Err(invalid(template, "missing host"));
        }

        Ok(target)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the parameters referenced by the template.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param(name) => Some(name.as_str()),
            Part::Literal(_) => None,
        })
    }

    /// Substitute captured path parameters.
    pub fn expand(&self, params: &PathParams) -> Result<String, TemplateError> {
        if let Some(missing) = self.params().find(|name| !params.contains_key(*name)) {
            return Err(TemplateError::MissingParam(missing.to_string()));
        }
        Ok(self.render(|name| params.get(name).map(String::as_str)))
    }

    fn render<'a>(&'a self, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Param(name) => out.push_str(lookup(name).unwrap_or_default()),
            }
        }
        out
    }
}

fn invalid(template: &str, reason: &str) -> TemplateError {
    TemplateError::InvalidUrl {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}
