use gantry_core::path;
use gantry_core::{EngineError, HandlerChain};
use http::Method;
use std::collections::HashMap;

/// Registered routes, one entry per path template, validated as they come in.
///
/// Engines consult the table at registration time so a conflicting or malformed path surfaces
/// as a configuration error instead of a panic (axum) or a silently shadowed route (matchit).
#[derive(Default)]
pub(crate) struct RouteTable {
    router: matchit::Router<usize>,
    index: HashMap<String, usize>,
    entries: Vec<PathEntry>,
}

pub(crate) struct PathEntry {
    /// Template in `{param}` syntax.
    pub(crate) template: String,
    pub(crate) has_params: bool,
    pub(crate) methods: Vec<(Method, HandlerChain)>,
}

pub(crate) enum Lookup<'a> {
    Found { chain: &'a HandlerChain, params: Vec<(String, String)> },
    MethodNotAllowed { allow: Vec<Method> },
    NotFound,
}

impl RouteTable {
    pub(crate) fn insert(
        &mut self,
        engine: &'static str,
        method: Method,
        template: &str,
        chain: HandlerChain,
    ) -> Result<(), EngineError> {
        if !template.starts_with('/') {
            return Err(EngineError::configuration(engine, format!("path '{template}' must start with '/'")));
        }

        let template = path::to_router_syntax(template);
        let slot = match self.index.get(&template) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.router
                    .insert(template.clone(), slot)
                    .map_err(|e| EngineError::configuration(engine, format!("cannot route '{template}': {e}")))?;
                self.index.insert(template.clone(), slot);
                self.entries.push(PathEntry {
                    has_params: !path::param_names(&template).is_empty(),
                    template,
                    methods: Vec::new(),
                });
                slot
            }
        };

        let entry = &mut self.entries[slot];
        if entry.methods.iter().any(|(m, _)| *m == method) {
            return Err(EngineError::configuration(engine, format!("{method} {} is already registered", entry.template)));
        }
        entry.methods.push((method, chain));
        Ok(())
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let Ok(matched) = self.router.at(path) else { return Lookup::NotFound };
        let entry = &self.entries[*matched.value];

        match entry.methods.iter().find(|(m, _)| m == method) {
            Some((_, chain)) => Lookup::Found {
                chain,
                params: matched.params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            },
            None => Lookup::MethodNotAllowed { allow: entry.methods.iter().map(|(m, _)| m.clone()).collect() },
        }
    }

    pub(crate) fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().map(|e| e.methods.len()).sum()
    }
}
