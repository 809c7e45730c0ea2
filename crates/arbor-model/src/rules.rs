//! Management rules
//!
//! A unit declares rules per category in its `management` block. Rules flow
//! down the hierarchy unless a descendant redeclares the same rule id or
//! blocks inheritance (`PreventInheritance`, `PreventRulesId`).
//!
//! Category properties (`FinalAction`, `Classification*`) and the global
//! `NeedAuthorization` flag flow the same way, keyed by property name.
//! Only `PreventInheritance` blocks a category property; global properties
//! are never blocked.

use crate::error::ModelError;
use crate::id::{AgencyId, DocumentId, RuleId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    /// Retention in storage
    StorageRule,
    /// Appraisal (keep or destroy)
    AppraisalRule,
    /// Access restriction
    AccessRule,
    /// Dissemination restriction
    DisseminationRule,
    /// Reuse restriction
    ReuseRule,
    /// Classification (secrecy level)
    ClassificationRule,
}

impl RuleCategory {
    /// Every supported category
    pub const ALL: [RuleCategory; 6] = [
        RuleCategory::StorageRule,
        RuleCategory::AppraisalRule,
        RuleCategory::AccessRule,
        RuleCategory::DisseminationRule,
        RuleCategory::ReuseRule,
        RuleCategory::ClassificationRule,
    ];

    /// Category name as used in management blocks
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RuleCategory::StorageRule => "StorageRule",
            RuleCategory::AppraisalRule => "AppraisalRule",
            RuleCategory::AccessRule => "AccessRule",
            RuleCategory::DisseminationRule => "DisseminationRule",
            RuleCategory::ReuseRule => "ReuseRule",
            RuleCategory::ClassificationRule => "ClassificationRule",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleCategory::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownRuleCategory(s.to_string()))
    }
}

/// Action taken when a storage or appraisal rule expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalAction {
    /// Keep the archive
    Keep,
    /// Destroy the archive
    Destroy,
    /// Restrict access to the content
    RestrictAccess,
    /// Transfer to another service
    Transfer,
    /// Copy to another service
    Copy,
}

/// One rule declared by a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleDeclaration {
    /// Rule id in the referential
    pub rule: RuleId,
    /// Start of validity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// End of validity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl RuleDeclaration {
    /// Declare rule without validity window
    #[must_use]
    pub fn new(rule: impl Into<RuleId>) -> Self {
        Self {
            rule: rule.into(),
            start_date: None,
            end_date: None,
        }
    }

    /// With validity window
    #[must_use]
    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }
}

/// Inheritance controls of a category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Inheritance {
    /// Block every rule of the category coming from ancestors
    #[serde(default)]
    pub prevent_inheritance: bool,
    /// Block specific rule ids coming from ancestors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prevent_rules_id: Vec<RuleId>,
}

/// Rules and properties declared for one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CategoryRules {
    /// Declared rules
    #[serde(default)]
    pub rules: Vec<RuleDeclaration>,
    /// Inheritance controls
    #[serde(default)]
    pub inheritance: Inheritance,
    /// Final action (storage and appraisal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_action: Option<FinalAction>,
    /// Classification level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_level: Option<String>,
    /// Classification owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_owner: Option<String>,
    /// Classification reassessment date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_reassessing_date: Option<NaiveDate>,
    /// Reassessment requires authorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_reassessing_authorization: Option<bool>,
}

impl CategoryRules {
    /// Category declaring the given rules
    #[must_use]
    pub fn with_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = RuleDeclaration>,
    {
        Self {
            rules: rules.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Declaration of `rule_id`, if any
    #[must_use]
    pub fn declaration(&self, rule_id: &RuleId) -> Option<&RuleDeclaration> {
        self.rules.iter().find(|r| &r.rule == rule_id)
    }

    /// Whether `rule_id` coming from ancestors is blocked at this unit
    #[must_use]
    pub fn blocks(&self, rule_id: &RuleId) -> bool {
        self.inheritance.prevent_inheritance || self.inheritance.prevent_rules_id.contains(rule_id)
    }

    /// Value of a category property declared here
    #[must_use]
    pub fn property(&self, name: PropertyName) -> Option<PropertyValue> {
        match name {
            PropertyName::FinalAction => self.final_action.map(PropertyValue::FinalAction),
            PropertyName::ClassificationLevel => {
                self.classification_level.clone().map(PropertyValue::Text)
            }
            PropertyName::ClassificationOwner => {
                self.classification_owner.clone().map(PropertyValue::Text)
            }
            PropertyName::ClassificationReassessingDate => {
                self.classification_reassessing_date.map(PropertyValue::Date)
            }
            PropertyName::NeedReassessingAuthorization => {
                self.need_reassessing_authorization.map(PropertyValue::Flag)
            }
            PropertyName::NeedAuthorization => None,
        }
    }
}

/// Name of an inheritable property
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyName {
    /// Final action of a storage or appraisal category
    FinalAction,
    /// Classification level
    ClassificationLevel,
    /// Classification owner
    ClassificationOwner,
    /// Classification reassessment date
    ClassificationReassessingDate,
    /// Reassessment requires authorization
    NeedReassessingAuthorization,
    /// Access to the unit needs authorization (global)
    NeedAuthorization,
}

impl PropertyName {
    /// Properties declared inside a rule category
    pub const CATEGORY: [PropertyName; 5] = [
        PropertyName::FinalAction,
        PropertyName::ClassificationLevel,
        PropertyName::ClassificationOwner,
        PropertyName::ClassificationReassessingDate,
        PropertyName::NeedReassessingAuthorization,
    ];
}

/// Value of an inheritable property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Final action
    FinalAction(FinalAction),
    /// Date
    Date(NaiveDate),
    /// Flag
    Flag(bool),
    /// Free text
    Text(String),
}

/// Management block of a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Management {
    /// Storage rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_rule: Option<CategoryRules>,
    /// Appraisal rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appraisal_rule: Option<CategoryRules>,
    /// Access rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_rule: Option<CategoryRules>,
    /// Dissemination rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissemination_rule: Option<CategoryRules>,
    /// Reuse rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_rule: Option<CategoryRules>,
    /// Classification rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_rule: Option<CategoryRules>,
    /// Access to the unit needs authorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_authorization: Option<bool>,
}

impl Management {
    /// Rules of a category
    #[must_use]
    pub fn category(&self, category: RuleCategory) -> Option<&CategoryRules> {
        match category {
            RuleCategory::StorageRule => self.storage_rule.as_ref(),
            RuleCategory::AppraisalRule => self.appraisal_rule.as_ref(),
            RuleCategory::AccessRule => self.access_rule.as_ref(),
            RuleCategory::DisseminationRule => self.dissemination_rule.as_ref(),
            RuleCategory::ReuseRule => self.reuse_rule.as_ref(),
            RuleCategory::ClassificationRule => self.classification_rule.as_ref(),
        }
    }

    /// Value of a global property declared here
    #[must_use]
    pub fn global_property(&self, name: PropertyName) -> Option<PropertyValue> {
        match name {
            PropertyName::NeedAuthorization => self.need_authorization.map(PropertyValue::Flag),
            _ => None,
        }
    }

    /// Replace the rules of a category
    #[must_use]
    pub fn with_category(mut self, category: RuleCategory, rules: CategoryRules) -> Self {
        let slot = match category {
            RuleCategory::StorageRule => &mut self.storage_rule,
            RuleCategory::AppraisalRule => &mut self.appraisal_rule,
            RuleCategory::AccessRule => &mut self.access_rule,
            RuleCategory::DisseminationRule => &mut self.dissemination_rule,
            RuleCategory::ReuseRule => &mut self.reuse_rule,
            RuleCategory::ClassificationRule => &mut self.classification_rule,
        };
        *slot = Some(rules);
        self
    }
}

/// A rule in force on a unit, with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritedRuleModel {
    /// Rule id
    pub rule_id: RuleId,
    /// Rule category
    pub category: RuleCategory,
    /// Start of validity
    pub start_date: Option<NaiveDate>,
    /// End of validity
    pub end_date: Option<NaiveDate>,
    /// Unit declaring the rule
    pub origin_unit: DocumentId,
    /// Agency of the declaring unit
    pub originating_agency: Option<AgencyId>,
    /// Hops from the resolved unit to the declaring unit
    pub depth: u32,
    /// Unit ids from the resolved unit to the declaring unit, both included
    pub path: Vec<DocumentId>,
    /// Final action in force for the category on the resolved unit
    pub final_action: Option<FinalAction>,
    /// Classification level in force
    pub classification_level: Option<String>,
    /// Classification owner in force
    pub classification_owner: Option<String>,
    /// Classification reassessment date in force
    pub classification_reassessing_date: Option<NaiveDate>,
    /// Reassessment authorization flag in force
    pub need_reassessing_authorization: Option<bool>,
    /// Units whose declaration of the same rule supersedes this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub override_by: Vec<DocumentId>,
}

/// A property in force on a unit, with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritedPropertyModel {
    /// Category holding the property, `None` for global properties
    pub category: Option<RuleCategory>,
    /// Property name
    pub name: PropertyName,
    /// Property value
    pub value: PropertyValue,
    /// Unit declaring the property
    pub origin_unit: DocumentId,
    /// Agency of the declaring unit
    pub originating_agency: Option<AgencyId>,
    /// Hops from the resolved unit to the declaring unit
    pub depth: u32,
    /// Unit ids from the resolved unit to the declaring unit, both included
    pub path: Vec<DocumentId>,
    /// Default assumed by the resolved unit rather than declared
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub implicit: bool,
}

/// Equal-depth declarations of one rule id by distinct units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConflict {
    /// Rule category
    pub category: RuleCategory,
    /// Rule id
    pub rule_id: RuleId,
    /// Depth shared by every candidate
    pub depth: u32,
    /// Competing declarations
    pub candidates: Vec<InheritedRuleModel>,
}

/// Result of inherited rule resolution for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRules {
    /// Resolved unit
    pub unit_id: DocumentId,
    /// Rules in force, one per category and rule id
    pub rules: Vec<InheritedRuleModel>,
    /// Declarations superseded by a closer one
    pub overridden: Vec<InheritedRuleModel>,
    /// Unresolved equal-depth ties
    pub conflicts: Vec<RuleConflict>,
    /// Properties in force; equal-depth declarations by distinct units are all listed
    #[serde(default)]
    pub properties: Vec<InheritedPropertyModel>,
}

impl ResolvedRules {
    /// Rule in force for a category and id
    #[must_use]
    pub fn rule(&self, category: RuleCategory, rule_id: &RuleId) -> Option<&InheritedRuleModel> {
        self.rules
            .iter()
            .find(|r| r.category == category && &r.rule_id == rule_id)
    }

    /// Rules in force for one category
    pub fn in_category(&self, category: RuleCategory) -> impl Iterator<Item = &InheritedRuleModel> {
        self.rules.iter().filter(move |r| r.category == category)
    }

    /// Value of a property when every declaration in force agrees
    ///
    /// `category` is `None` for global properties.
    #[must_use]
    pub fn property(
        &self,
        category: Option<RuleCategory>,
        name: PropertyName,
    ) -> Option<&PropertyValue> {
        let mut values = self
            .properties
            .iter()
            .filter(|p| p.category == category && p.name == name)
            .map(|p| &p.value);
        let first = values.next()?;
        values.all(|v| v == first).then_some(first)
    }

    /// No tie was left unresolved
    #[inline]
    #[must_use]
    pub fn is_unambiguous(&self) -> bool {
        self.conflicts.is_empty()
    }
}
