//! In-memory concept resolver and subset definitions

use crate::criteria::ConceptSelector;
use crate::patient::ConceptId;
use crate::provider::{ConceptResolver, ConceptSet, ResolutionError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named, stored concept expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub expression: String,
}

impl Subset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            expression: expression.into(),
        }
    }
}

/// Resolver backed by a fixed expression table.
///
/// Expressions must be registered up front, anything else is rejected rather
/// than silently expanding to nothing. Subsets resolve through their stored
/// expression.
#[derive(Debug, Default)]
pub struct StaticConceptResolver {
    expressions: RwLock<HashMap<String, ConceptSet>>,
    subsets: RwLock<HashMap<String, Subset>>,
}

impl StaticConceptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the concepts an expression expands to
    pub fn with_expression<I>(self, expression: impl Into<String>, concepts: I) -> Self
    where
        I: IntoIterator<Item = ConceptId>,
    {
        self.add_expression(expression, concepts);
        self
    }

    pub fn with_subset(self, subset: Subset) -> Self {
        self.add_subset(subset);
        self
    }

    pub fn add_expression<I>(&self, expression: impl Into<String>, concepts: I)
    where
        I: IntoIterator<Item = ConceptId>,
    {
        self.expressions
            .write()
            .insert(expression.into().trim().to_string(), concepts.into_iter().collect());
    }

    pub fn add_subset(&self, subset: Subset) {
        self.subsets.write().insert(subset.id.clone(), subset);
    }

    pub fn subset(&self, id: &str) -> Option<Subset> {
        self.subsets.read().get(id).cloned()
    }

    pub fn subsets(&self) -> Vec<Subset> {
        let mut subsets: Vec<_> = self.subsets.read().values().cloned().collect();
        subsets.sort_by(|a, b| a.id.cmp(&b.id));
        subsets
    }

    fn expand(&self, expression: &str) -> Result<ConceptSet, ResolutionError> {
        self.expressions
            .read()
            .get(expression.trim())
            .cloned()
            .ok_or_else(|| ResolutionError::rejected(expression, "expression is not registered"))
    }
}

#[async_trait]
impl ConceptResolver for StaticConceptResolver {
    async fn resolve(&self, selector: &ConceptSelector) -> Result<ConceptSet, ResolutionError> {
        match selector {
            ConceptSelector::Expression(expression) => self.expand(expression),
            ConceptSelector::Subset(id) => {
                let subset = self
                    .subset(id)
                    .ok_or_else(|| ResolutionError::UnknownSubset(id.clone()))?;
                self.expand(&subset.expression)
            }
        }
    }
}
