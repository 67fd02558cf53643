//! Path template helpers.
//!
//! Templates may spell parameters as `:id` or `{id}`, and a trailing catch-all as `*rest` or
//! `{*rest}`. Engines and the specification builder each want one canonical spelling.

/// One segment of a path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

/// Splits a template into its `/`-separated segments.
pub fn segments(template: &str) -> impl Iterator<Item = Segment<'_>> {
    template.split('/').filter(|s| !s.is_empty()).map(|segment| {
        if let Some(name) = segment.strip_prefix(':') {
            Segment::Param(name)
        } else if let Some(name) = segment.strip_prefix('*') {
            Segment::CatchAll(name)
        } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            match inner.strip_prefix('*') {
                Some(name) => Segment::CatchAll(name),
                None => Segment::Param(inner),
            }
        } else {
            Segment::Static(segment)
        }
    })
}

/// Names of the parameters in `template`, in order of appearance.
pub fn param_names(template: &str) -> Vec<&str> {
    segments(template)
        .filter_map(|segment| match segment {
            Segment::Param(name) | Segment::CatchAll(name) => Some(name),
            Segment::Static(_) => None,
        })
        .collect()
}

/// `/items/:id/*rest` → `/items/{id}/{*rest}`, the syntax of `matchit` and `axum`.
pub fn to_router_syntax(template: &str) -> String {
    render(template, |segment, out| match segment {
        Segment::Static(s) => out.push_str(s),
        Segment::Param(name) => {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        Segment::CatchAll(name) => {
            out.push_str("{*");
            out.push_str(name);
            out.push('}');
        }
    })
}

/// `/items/:id/*rest` → `/items/{id}/{rest}`, the syntax of OpenAPI path keys.
pub fn to_openapi_syntax(template: &str) -> String {
    render(template, |segment, out| match segment {
        Segment::Static(s) => out.push_str(s),
        Segment::Param(name) | Segment::CatchAll(name) => {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
    })
}

/// `/items/:id` and `/items/{name}` → `/items/{}`.
///
/// Templates with the same shape match the same requests and share one OpenAPI path key.
pub fn shape(template: &str) -> String {
    render(template, |segment, out| match segment {
        Segment::Static(s) => out.push_str(s),
        Segment::Param(_) | Segment::CatchAll(_) => out.push_str("{}"),
    })
}

fn render(template: &str, mut write: impl FnMut(Segment<'_>, &mut String)) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    for segment in segments(template) {
        out.push('/');
        write(segment, &mut out);
    }
    if out.is_empty() || (template.len() > 1 && template.ends_with('/')) {
        out.push('/');
    }
    out
}

/// Resolves a route path against a router prefix by plain concatenation.
pub fn join(prefix: Option<&str>, path: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{path}"),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_param_spellings() {
        let parsed: Vec<_> = segments("/items/:id/{sub}/*rest").collect();
        assert_eq!(
            parsed,
            [Segment::Static("items"), Segment::Param("id"), Segment::Param("sub"), Segment::CatchAll("rest")]
        );
        assert_eq!(param_names("/a/{x}/b/:y"), ["x", "y"]);
    }

    #[test]
    fn converts_between_syntaxes() {
        assert_eq!(to_router_syntax("/items/:id/*rest"), "/items/{id}/{*rest}");
        assert_eq!(to_openapi_syntax("/items/:id/{*rest}"), "/items/{id}/{rest}");
        assert_eq!(to_router_syntax("/"), "/");
        assert_eq!(to_router_syntax("/api/"), "/api/");
    }

    #[test]
    fn aliases_share_a_shape() {
        assert_eq!(shape("/items/:id"), "/items/{}");
        assert_eq!(shape("/items/{id}"), shape("/items/:name"));
        assert_eq!(shape("/files/*rest"), shape("/files/{path}"));
        assert_ne!(shape("/items/:id"), shape("/items/:id/parts"));
    }

    #[test]
    fn join_is_plain_concatenation() {
        assert_eq!(join(Some("/api"), "/items/:id"), "/api/items/:id");
        assert_eq!(join(Some(""), "/items"), "/items");
        assert_eq!(join(None, "/items"), "/items");
    }
}
