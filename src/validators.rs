//! Pre-policy validators: cheap structural checks run before a request
//! reaches policy evaluation. A validator rejects a request outright;
//! it never grants one.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::GovernanceError;
use crate::types::GovernanceRequest;

#[async_trait]
pub trait Validator: Send + Sync {
    /// Return `Ok(())` if the request may proceed, `Err` with a reason
    /// otherwise. Validators run in order and the pipeline stops at the
    /// first failure.
    async fn validate(&self, request: &GovernanceRequest) -> Result<(), ValidationFailure>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Requires a non-empty `justification` in the request context. If
/// `required_keywords` has an entry for the request's tool, at least
/// one of its keywords must appear in the justification text as a
/// case-insensitive substring.
pub struct JustificationValidator {
    pub min_length: usize,
    pub required_keywords: HashMap<String, Vec<String>>,
}

impl Default for JustificationValidator {
    fn default() -> Self {
        Self { min_length: 1, required_keywords: HashMap::new() }
    }
}

impl JustificationValidator {
    pub fn new(min_length: usize, required_keywords: HashMap<String, Vec<String>>) -> Self {
        Self { min_length, required_keywords }
    }
}

#[async_trait]
impl Validator for JustificationValidator {
    async fn validate(&self, request: &GovernanceRequest) -> Result<(), ValidationFailure> {
        let text = match request.justification() {
            Some(text) if text.trim().len() >= self.min_length => text,
            _ => return Err(ValidationFailure::new("missing or insufficient justification")),
        };

        if let Some(keywords) = self.required_keywords.get(&request.tool_name) {
            let lower = text.to_lowercase();
            if !keywords.iter().any(|keyword| lower.contains(&keyword.to_lowercase())) {
                return Err(ValidationFailure::new(format!(
                    "justification must mention one of: {}",
                    keywords.join(", ")
                )));
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "justification"
    }
}

/// Checks, for each tool with a declared schema, that every name it
/// marks required is present in `request.arguments`. Tools with no
/// declared schema are not checked. Does not validate argument types,
/// just presence.
pub struct SchemaValidator {
    pub required_arguments: HashMap<String, Vec<String>>,
}

impl SchemaValidator {
    pub fn new(required_arguments: HashMap<String, Vec<String>>) -> Self {
        Self { required_arguments }
    }
}

#[async_trait]
impl Validator for SchemaValidator {
    async fn validate(&self, request: &GovernanceRequest) -> Result<(), ValidationFailure> {
        let Some(required) = self.required_arguments.get(&request.tool_name) else {
            return Ok(());
        };
        for name in required {
            if !request.arguments.contains_key(name) {
                return Err(ValidationFailure::new(format!("missing required argument: {name}")));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "schema"
    }
}

type CustomCheck = dyn Fn(&GovernanceRequest) -> Result<(), String> + Send + Sync;

/// Wraps an arbitrary synchronous predicate supplied by the embedding
/// application.
pub struct CustomValidator {
    name: &'static str,
    check: Box<CustomCheck>,
}

impl CustomValidator {
    pub fn new(name: &'static str, check: impl Fn(&GovernanceRequest) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self { name, check: Box::new(check) }
    }
}

#[async_trait]
impl Validator for CustomValidator {
    async fn validate(&self, request: &GovernanceRequest) -> Result<(), ValidationFailure> {
        (self.check)(request).map_err(ValidationFailure::new)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Runs validators in order, short-circuiting at the first failure.
/// A validator that panics is not caught here; the engine wraps the
/// whole pipeline call and turns any unwind into an `internal` denial.
pub async fn run_validators(
    validators: &[Box<dyn Validator>],
    request: &GovernanceRequest,
) -> Result<(), GovernanceError> {
    for validator in validators {
        if let Err(failure) = validator.validate(request).await {
            return Err(GovernanceError::ValidationFailed {
                validator: validator.name(),
                reason: failure.reason,
            });
        }
    }
    Ok(())
}
