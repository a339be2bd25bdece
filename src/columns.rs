//! Column aliasing.
//!
//! Exports of the production sheet do not agree on column names (`Ano` vs
//! `CDU_Ano`, ...). A small declarative table maps each semantic field to
//! the names it may appear under; it is resolved once against the actual
//! header set into a [`ColumnPlan`] that the rest of the run uses.

use crate::types::Record;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Year,
    Month,
    NetWeight,
    Waste,
    UnitPrice,
    Product,
    Client,
    BusinessUnit,
    Line,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Year,
        Field::Month,
        Field::NetWeight,
        Field::Waste,
        Field::UnitPrice,
        Field::Product,
        Field::Client,
        Field::BusinessUnit,
        Field::Line,
    ];
}

const DEFAULT_TABLE: &[(Field, &[&str])] = &[
    (Field::Year, &["Ano", "CDU_Ano"]),
    (Field::Month, &["Mes", "CDU_Mes"]),
    (Field::NetWeight, &["CDU_PesoLiquido", "Peso"]),
    (Field::Waste, &["CDU_DesperdicioReal"]),
    (Field::UnitPrice, &["CDU_PrecoVenda"]),
    (Field::Product, &["CDU_Artigo"]),
    (Field::Client, &["CDU_NomeCliente"]),
    (Field::BusinessUnit, &["CDU_UnidadeNegocioDescricao"]),
    (Field::Line, &["CDU_LinhaProducao"]),
];

static DEFAULT_ALIASES: Lazy<ColumnAliases> = Lazy::new(|| {
    let entries = DEFAULT_TABLE
        .iter()
        .map(|(field, names)| (*field, names.iter().map(|n| n.to_string()).collect()))
        .collect();
    ColumnAliases { entries }
});

/// Accepted column names per field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAliases {
    entries: HashMap<Field, Vec<String>>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        DEFAULT_ALIASES.clone()
    }
}

impl ColumnAliases {
    /// Defaults with the given fields' alias lists replaced. Empty override
    /// lists are ignored.
    pub fn with_overrides(overrides: &HashMap<Field, Vec<String>>) -> Self {
        let mut aliases = Self::default();
        for (field, names) in overrides {
            if !names.is_empty() {
                aliases.entries.insert(*field, names.clone());
            }
        }
        aliases
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.entries.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve every field against `headers`. For each field the first
    /// header, in header order, whose trimmed text equals one of the aliases
    /// wins. Fields without a match fall back to their first alias and are
    /// marked absent.
    pub fn resolve<'a, I>(&self, headers: I) -> ColumnPlan
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&str> = headers.into_iter().collect();
        let mut columns = HashMap::new();
        for field in Field::ALL {
            let names = self.aliases(field);
            let found = headers
                .iter()
                .find(|h| names.iter().any(|n| n == h.trim()))
                .map(|h| h.to_string());
            let column = match found {
                Some(name) => ResolvedColumn {
                    name,
                    present: true,
                },
                None => ResolvedColumn {
                    name: names.first().cloned().unwrap_or_default(),
                    present: false,
                },
            };
            columns.insert(field, column);
        }
        ColumnPlan { columns }
    }

    /// Resolve against the keys of a sample record.
    pub fn resolve_record(&self, record: &Record) -> ColumnPlan {
        self.resolve(record.keys().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub name: String,
    pub present: bool,
}

/// Fixed field-to-column mapping for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    columns: HashMap<Field, ResolvedColumn>,
}

impl ColumnPlan {
    pub fn column(&self, field: Field) -> &str {
        self.columns
            .get(&field)
            .map(|c| c.name.as_str())
            .unwrap_or_default()
    }

    pub fn is_present(&self, field: Field) -> bool {
        self.columns.get(&field).map_or(false, |c| c.present)
    }

    pub fn value<'r>(&self, record: &'r Record, field: Field) -> Option<&'r Value> {
        record.get(self.column(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_first_matching_header_in_source_order() {
        let plan = ColumnAliases::default().resolve(["Cliente", " CDU_Mes ", "CDU_Ano", "Ano"]);
        assert_eq!(plan.column(Field::Year), "CDU_Ano");
        assert_eq!(plan.column(Field::Month), " CDU_Mes ");
        assert!(plan.is_present(Field::Year));
    }

    #[test]
    fn unmatched_field_falls_back_to_first_alias() {
        let plan = ColumnAliases::default().resolve(["Foo"]);
        assert_eq!(plan.column(Field::Year), "Ano");
        assert!(!plan.is_present(Field::Year));
        assert_eq!(plan.column(Field::NetWeight), "CDU_PesoLiquido");
    }

    #[test]
    fn net_weight_accepts_legacy_peso_column() {
        let record = json!({"Peso": 12}).as_object().cloned().unwrap_or_default();
        let plan = ColumnAliases::default().resolve_record(&record);
        assert_eq!(plan.column(Field::NetWeight), "Peso");
        assert_eq!(plan.value(&record, Field::NetWeight), Some(&json!(12)));
    }

    #[test]
    fn overrides_replace_alias_lists() {
        let mut overrides = HashMap::new();
        overrides.insert(Field::Year, vec!["Year".to_string()]);
        overrides.insert(Field::Month, Vec::new());
        let aliases = ColumnAliases::with_overrides(&overrides);
        assert_eq!(aliases.aliases(Field::Year), ["Year".to_string()]);
        assert_eq!(aliases.aliases(Field::Month), ["Mes".to_string(), "CDU_Mes".to_string()]);
    }
}
