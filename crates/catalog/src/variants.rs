//! Variant expansion: attribute rows → cartesian product of attribute values.
//!
//! A product stores its variant attributes as flat `(name, value)` rows. Rows
//! sharing a name form that attribute's value domain; every combination across
//! the domains is one variant (one SKU on the storefront).

use serde::{Deserialize, Serialize};

/// Attribute value domains, ordered by first occurrence of each attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDomains {
    names: Vec<String>,
    values: Vec<Vec<String>>,
}

impl AttributeDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group raw `(name, value)` rows into domains.
    ///
    /// Attribute order is the order in which each name first appears; value order
    /// within an attribute is insertion order. Repeated values are ignored.
    pub fn from_rows<I, N, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut domains = Self::new();
        for (name, value) in rows {
            domains.push_value(name, value);
        }
        domains
    }

    /// Add one value to an attribute, creating the attribute on first sight.
    pub fn push_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let idx = self.index_or_insert(name);
        let domain = &mut self.values[idx];
        if !domain.contains(&value) {
            domain.push(value);
        }
    }

    /// Declare an attribute with an explicit (possibly empty) value list.
    pub fn with_attribute<V>(mut self, name: impl Into<String>, values: V) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let idx = self.index_or_insert(name.into());
        for value in values {
            let value = value.into();
            if !self.values[idx].contains(&value) {
                self.values[idx].push(value);
            }
        }
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx].as_slice())
    }

    /// Iterate `(name, values)` in attribute order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.names
            .iter()
            .zip(self.values.iter())
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn index_or_insert(&mut self, name: String) -> usize {
        match self.names.iter().position(|n| *n == name) {
            Some(idx) => idx,
            None => {
                self.names.push(name);
                self.values.push(Vec::new());
                self.names.len() - 1
            }
        }
    }
}

/// Result of a cartesian expansion.
///
/// Every entry of `combinations` has exactly `attribute_names.len()` values,
/// aligned position by position with `attribute_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantMatrix {
    pub attribute_names: Vec<String>,
    pub combinations: Vec<Vec<String>>,
}

impl VariantMatrix {
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Iterate combinations as `(attribute name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.combinations.iter().map(move |combo| {
            self.attribute_names
                .iter()
                .map(String::as_str)
                .zip(combo.iter().map(String::as_str))
                .collect()
        })
    }
}

/// Expand attribute domains into every value combination.
///
/// Empty when there are no attributes or when any attribute has zero values;
/// partial combinations are never produced.
pub fn expand(domains: &AttributeDomains) -> VariantMatrix {
    let attribute_names = domains.names.clone();

    if domains.is_empty() || domains.values.iter().any(Vec::is_empty) {
        return VariantMatrix {
            attribute_names,
            combinations: Vec::new(),
        };
    }

    let total: usize = domains.values.iter().map(Vec::len).product();
    let mut combinations: Vec<Vec<String>> = vec![Vec::with_capacity(domains.len())];

    for domain in &domains.values {
        let mut next = Vec::with_capacity(combinations.len() * domain.len());
        for prefix in &combinations {
            for value in domain {
                let mut combo = prefix.clone();
                combo.push(value.clone());
                next.push(combo);
            }
        }
        combinations = next;
    }

    debug_assert_eq!(combinations.len(), total);

    VariantMatrix {
        attribute_names,
        combinations,
    }
}
