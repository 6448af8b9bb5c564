//! First-class validators for data crossing the trust boundary.
//!
//! A [`Schema`] turns an untyped JSON value into a typed value or a
//! [`ValidationError`] listing every problem found. Structural checks are
//! delegated to serde; value-level rules are layered on with
//! [`SchemaExt::refine`].

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path used for issues that concern the whole document.
pub const ROOT_PATH: &str = "$";

/// One problem found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location of the offending value (`$` for the document root).
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

/// Aggregate validation failure.
///
/// ## Invariants
/// - Contains at least one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Failure with a single issue at `path`.
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// Failure with a single issue at the document root.
    pub fn root(message: impl Into<String>) -> Self {
        Self::at(ROOT_PATH, message)
    }

    /// Append another issue.
    #[must_use]
    pub fn with_issue(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    /// Issues in the order they were found.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", issue.path, issue.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl From<serde_json::Error> for ValidationError {
    fn from(error: serde_json::Error) -> Self {
        Self::root(error.to_string())
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ValidationError {
    fn from(error: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let mut path = json_path(error.path());
        let inner = error.into_inner();
        let message = inner.to_string();
        // serde reports a missing field at its parent.
        if let Some(field) = missing_field(&message) {
            path.push('.');
            path.push_str(field);
        }
        Self::at(path, message)
    }
}

/// Render a serde path as `$`, `$.user.id` or `$.items[2]`.
fn json_path(path: &serde_path_to_error::Path) -> String {
    use serde_path_to_error::Segment;

    let mut rendered = ROOT_PATH.to_owned();
    for segment in path.iter() {
        match segment {
            Segment::Seq { index } => rendered.push_str(&format!("[{index}]")),
            Segment::Map { key } => {
                rendered.push('.');
                rendered.push_str(key);
            }
            Segment::Enum { variant } => {
                rendered.push('.');
                rendered.push_str(variant);
            }
            Segment::Unknown => rendered.push_str(".?"),
        }
    }
    rendered
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

/// Decode raw JSON bytes into `T`, reporting where decoding failed.
///
/// # Errors
///
/// Returns a [`ValidationError`] for malformed JSON or a shape mismatch.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ValidationError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

/// Validator producing `T` from untyped JSON.
pub trait Schema<T>: Send + Sync {
    /// Check `input` and return the typed value.
    fn validate(&self, input: &Value) -> Result<T, ValidationError>;
}

/// Structural schema backed by `T`'s `Deserialize` implementation.
///
/// # Examples
/// ```
/// use gateway::domain::schema::{JsonSchema, Schema};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct Project {
///     id: String,
///     name: String,
/// }
///
/// let schema = JsonSchema::<Project>::new();
/// let project = schema
///     .validate(&json!({ "id": "p1", "name": "Roadmap" }))
///     .expect("valid project");
/// assert_eq!(project.name, "Roadmap");
/// assert!(schema.validate(&json!({ "id": "p1" })).is_err());
/// ```
pub struct JsonSchema<T>(PhantomData<fn() -> T>);

impl<T> JsonSchema<T> {
    /// Create the schema.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Schema<T> for JsonSchema<T> {
    fn validate(&self, input: &Value) -> Result<T, ValidationError> {
        Ok(serde_path_to_error::deserialize(input)?)
    }
}

/// Accepts any JSON value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyJson;

impl Schema<Value> for AnyJson {
    fn validate(&self, input: &Value) -> Result<Value, ValidationError> {
        Ok(input.clone())
    }
}

/// Accepts only an absent body (`null`), for requests that send nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBody;

impl Schema<()> for NoBody {
    fn validate(&self, input: &Value) -> Result<(), ValidationError> {
        if input.is_null() {
            Ok(())
        } else {
            Err(ValidationError::root("request body must be empty"))
        }
    }
}

/// Schema wrapper adding a value-level rule after the inner schema passes.
pub struct Refined<S, F> {
    inner: S,
    path: String,
    message: String,
    predicate: F,
}

impl<T, S, F> Schema<T> for Refined<S, F>
where
    S: Schema<T>,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn validate(&self, input: &Value) -> Result<T, ValidationError> {
        let value = self.inner.validate(input)?;
        if (self.predicate)(&value) {
            Ok(value)
        } else {
            Err(ValidationError::at(self.path.as_str(), self.message.as_str()))
        }
    }
}

/// Combinators available on every schema.
pub trait SchemaExt<T>: Schema<T> + Sized {
    /// Require `predicate` to hold; report `message` at `path` otherwise.
    ///
    /// # Examples
    /// ```
    /// use gateway::domain::schema::{JsonSchema, Schema, SchemaExt};
    /// use serde_json::json;
    ///
    /// let title = JsonSchema::<String>::new()
    ///     .refine("$", "title must not be blank", |title: &String| !title.trim().is_empty());
    /// assert!(title.validate(&json!("Sprint 4")).is_ok());
    /// assert!(title.validate(&json!("  ")).is_err());
    /// ```
    fn refine<F>(
        self,
        path: impl Into<String>,
        message: impl Into<String>,
        predicate: F,
    ) -> Refined<Self, F>
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        Refined {
            inner: self,
            path: path.into(),
            message: message.into(),
            predicate,
        }
    }
}

impl<T, S: Schema<T>> SchemaExt<T> for S {}
