use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDecision {
    InScope,
    OutOfScope,
    Ambiguous,
}

impl ScopeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InScope => "in_scope",
            Self::OutOfScope => "out_of_scope",
            Self::Ambiguous => "ambiguous",
        }
    }
}

/// The evidence that produced a verdict, kept for logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScopeSignal {
    ProductCode(String),
    DomainKeywords(Vec<String>),
    NegativeTopic(String),
    ContextReference(String),
    NoSignal,
}

impl fmt::Display for ScopeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductCode(code) => write!(f, "product_code:{code}"),
            Self::DomainKeywords(keywords) => write!(f, "keywords:{}", keywords.join(",")),
            Self::NegativeTopic(topic) => write!(f, "negative:{topic}"),
            Self::ContextReference(reference) => write!(f, "context_reference:{reference}"),
            Self::NoSignal => f.write_str("none"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeVerdict {
    pub decision: ScopeDecision,
    pub signal: ScopeSignal,
}

impl ScopeVerdict {
    pub fn in_scope(signal: ScopeSignal) -> Self {
        Self { decision: ScopeDecision::InScope, signal }
    }

    pub fn out_of_scope(topic: impl Into<String>) -> Self {
        Self { decision: ScopeDecision::OutOfScope, signal: ScopeSignal::NegativeTopic(topic.into()) }
    }

    pub fn ambiguous(signal: ScopeSignal) -> Self {
        Self { decision: ScopeDecision::Ambiguous, signal }
    }

    pub fn is_out_of_scope(&self) -> bool {
        self.decision == ScopeDecision::OutOfScope
    }

    pub fn is_in_scope(&self) -> bool {
        self.decision == ScopeDecision::InScope
    }

    pub fn product_code(&self) -> Option<&str> {
        match &self.signal {
            ScopeSignal::ProductCode(code) => Some(code),
            _ => None,
        }
    }
}
