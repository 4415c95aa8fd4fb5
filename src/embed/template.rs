//! Placeholder templates with typed variable sets.

use std::marker::PhantomData;

/// Values for a template's `__NAME__` placeholders.
pub trait TemplateVars {
    /// `(placeholder, value)` pairs, substituted in order.
    fn placeholders(&self) -> Vec<(&'static str, String)>;
}

/// Embedded text whose placeholders are filled from `V`.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _vars: PhantomData<fn(&V)>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _vars: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.placeholders()
            .into_iter()
            .fold(self.content.to_string(), |out, (placeholder, value)| {
                out.replace(placeholder, &value)
            })
    }
}
