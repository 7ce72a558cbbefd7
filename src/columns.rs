// 🏷️ Column Resolver - Rules as Data
// Maps heterogeneous source headers to the semantic roles the pipeline needs

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// COLUMN ROLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnRole {
    AccountCode,
    Description,
    RegistryCode,
    TaxId,
    Name,
    Amount,
    Region,
    Modality,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::AccountCode => "account_code",
            ColumnRole::Description => "description",
            ColumnRole::RegistryCode => "registry_code",
            ColumnRole::TaxId => "tax_id",
            ColumnRole::Name => "name",
            ColumnRole::Amount => "amount",
            ColumnRole::Region => "region",
            ColumnRole::Modality => "modality",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatch {
    /// Header contains the keyword
    Contains(&'static str),
    /// Header is exactly the keyword
    Exact(&'static str),
}

impl KeywordMatch {
    fn matches(&self, header: &str) -> bool {
        match self {
            KeywordMatch::Contains(keyword) => header.contains(keyword),
            KeywordMatch::Exact(keyword) => header == *keyword,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub role: ColumnRole,

    /// Keyword variants, highest priority first
    pub keywords: Vec<KeywordMatch>,

    /// Headers containing any of these never match this rule
    pub excludes: Vec<&'static str>,
}

impl ColumnRule {
    pub fn new(role: ColumnRole, keywords: &[&'static str]) -> Self {
        ColumnRule {
            role,
            keywords: keywords.iter().map(|k| KeywordMatch::Contains(k)).collect(),
            excludes: Vec::new(),
        }
    }

    pub fn with_exact(mut self, keyword: &'static str) -> Self {
        self.keywords.push(KeywordMatch::Exact(keyword));
        self
    }

    pub fn with_contains(mut self, keyword: &'static str) -> Self {
        self.keywords.push(KeywordMatch::Contains(keyword));
        self
    }

    pub fn excluding(mut self, token: &'static str) -> Self {
        self.excludes.push(token);
        self
    }

    fn is_excluded(&self, header: &str) -> bool {
        self.excludes.iter().any(|token| header.contains(token))
    }
}

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    resolved: Vec<(ColumnRole, ResolvedColumn)>,
}

impl ColumnMapping {
    pub fn get(&self, role: ColumnRole) -> Option<&ResolvedColumn> {
        self.resolved
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, column)| column)
    }

    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        self.get(role).map(|c| c.index)
    }

    pub fn contains(&self, role: ColumnRole) -> bool {
        self.get(role).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn roles(&self) -> Vec<ColumnRole> {
        self.resolved.iter().map(|(r, _)| *r).collect()
    }

    /// Fail when any of the roles did not resolve
    pub fn require(&self, roles: &[ColumnRole], context: &str) -> Result<(), PipelineError> {
        let missing: Vec<ColumnRole> = roles
            .iter()
            .copied()
            .filter(|role| !self.contains(*role))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::UnresolvedColumns {
                context: context.to_string(),
                roles: missing,
            })
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Prioritized list of (role, keyword-set) rules.
///
/// Rules are evaluated in order; within a rule, keywords are tried in order and
/// the first header containing the keyword wins. A header claimed by an earlier
/// role is not handed to a later one.
pub struct ColumnResolver {
    rules: Vec<ColumnRule>,
}

impl ColumnResolver {
    pub fn new(rules: Vec<ColumnRule>) -> Self {
        ColumnResolver { rules }
    }

    /// Account code + description, used to select expense line items
    pub fn for_filter() -> Self {
        ColumnResolver::new(vec![
            ColumnRule::new(
                ColumnRole::AccountCode,
                &["CONTA", "CD_CONTA", "CODIGO_CONTA", "CÓDIGO_CONTA"],
            ),
            ColumnRule::new(
                ColumnRole::Description,
                &["DESCRI", "DESC_CONTA", "DESCRIÇÃO", "DESCRICAO"],
            ),
        ])
    }

    /// Identifier, name and amount of an accounting statement row
    pub fn for_expenses() -> Self {
        ColumnResolver::new(vec![
            ColumnRule::new(
                ColumnRole::RegistryCode,
                &["REG_ANS", "REGISTRO_ANS", "REG ANS"],
            ),
            ColumnRule::new(ColumnRole::TaxId, &["CNPJ", "CGC"]),
            ColumnRule::new(ColumnRole::Name, &["RAZAO", "RAZÃO", "NOME", "OPERADORA"]),
            ColumnRule::new(ColumnRole::Amount, &["VL_SALDO_FINAL", "VALOR", "SALDO"]),
        ])
    }

    /// Operator registry: code, tax id, name, modality and state
    pub fn for_registry() -> Self {
        ColumnResolver::new(vec![
            ColumnRule::new(ColumnRole::RegistryCode, &["REGISTRO_OPERADORA"])
                .with_contains("REGISTRO_ANS")
                .with_contains("REG_ANS")
                .excluding("DATA"),
            ColumnRule::new(ColumnRole::TaxId, &["CNPJ", "CGC"]),
            ColumnRule::new(ColumnRole::Name, &["RAZAO", "RAZÃO", "NOME_FANTASIA"]),
            ColumnRule::new(ColumnRole::Modality, &["MODALIDADE", "MODALIDAD"]),
            ColumnRule::new(ColumnRole::Region, &[])
                .with_exact("UF")
                .with_contains("SIGLA_UF")
                .with_contains("UF_"),
        ])
    }

    /// Resolve roles against raw headers (normalized to trimmed upper-case here)
    pub fn resolve(&self, headers: &[String]) -> ColumnMapping {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut claimed = vec![false; normalized.len()];
        let mut mapping = ColumnMapping::default();

        for rule in &self.rules {
            if mapping.contains(rule.role) {
                continue;
            }

            let found = rule.keywords.iter().find_map(|keyword| {
                normalized.iter().enumerate().position(|(idx, header)| {
                    !claimed[idx] && !rule.is_excluded(header) && keyword.matches(header)
                })
            });

            if let Some(index) = found {
                claimed[index] = true;
                mapping.resolved.push((
                    rule.role,
                    ResolvedColumn {
                        index,
                        name: headers[index].clone(),
                    },
                ));
            }
        }

        mapping
    }
}

/// Upper-case and trim a header for keyword matching
pub fn normalize_header(header: &str) -> String {
    header.trim().to_uppercase()
}

// ============================================================================
// TESTS
// ============================================================================
