use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::error::Error as CoreError;
use crate::core::ports::PromptRenderer;

/// Renders prompt templates. Output goes to a model, not a browser, so
/// nothing is HTML-escaped.
///
/// Each distinct template text is compiled once and rendered by name after
/// that; a report renders the same evaluation template once per model.
#[derive(Clone, Default)]
pub struct HandlebarsRenderer {
    compiled: Arc<RwLock<Compiled>>,
}

struct Compiled {
    engine: Handlebars<'static>,
    names: HashMap<String, String>,
}

impl Default for Compiled {
    fn default() -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(false);
        engine.register_escape_fn(handlebars::no_escape);
        Self {
            engine,
            names: HashMap::new(),
        }
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn compiled_count(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names
            .len()
    }
}

impl PromptRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, data: &Value) -> crate::core::Result<String> {
        {
            let compiled = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(name) = compiled.names.get(template) {
                return compiled
                    .engine
                    .render(name, data)
                    .map_err(|e| CoreError::TemplateRendering(e.to_string()));
            }
        }

        let mut compiled = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        let name = match compiled.names.get(template) {
            Some(name) => name.clone(),
            None => {
                let name = format!("prompt_{}", compiled.names.len());
                compiled
                    .engine
                    .register_template_string(&name, template)
                    .map_err(|e| CoreError::TemplateRendering(e.to_string()))?;
                compiled.names.insert(template.to_string(), name.clone());
                name
            }
        };
        compiled
            .engine
            .render(&name, data)
            .map_err(|e| CoreError::TemplateRendering(e.to_string()))
    }
}
