//! Intermediate representation of the GraphQL operations sent to the backend.
//!
//! Documents are built as a tree of variable definitions, fields and arguments, then
//! rendered to text at the very end. [`Document::validate`] checks the tree before it
//! leaves the crate:
//! - every variable used by an argument is declared,
//! - every declared variable is used,
//! - no variable is declared twice,
//! - literal sub-selections have balanced braces.

pub mod synthesize;

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write;

use displaydoc::Display;
use thiserror::Error;

/// Document validation errors.
#[derive(Clone, Debug, Error, Display, PartialEq, Eq)]
pub enum DocumentError {
    /// variable `${0}` is used but never declared
    UndeclaredVariable(String),

    /// variable `${0}` is declared but never used
    UnusedVariable(String),

    /// variable `${0}` is declared more than once
    DuplicateVariable(String),

    /// the sub-selection of `{0}` has unbalanced braces
    UnbalancedSelection(String),

    /// operation `{0}` selects no field
    EmptyOperation(String),
}

/// Whether a document reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Query => f.write_str("query"),
            OperationType::Mutation => f.write_str("mutation"),
        }
    }
}

/// `$name: Type`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: String,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// `name: $variable`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub variable: String,
}

/// An entry of a selection set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Field(Field),
    /// A literal sub-selection supplied by the caller, e.g. `id name`.
    Raw(String),
}

impl Selection {
    /// A field without arguments nor sub-selection.
    pub fn leaf(name: impl Into<String>) -> Self {
        Selection::Field(Field::new(name))
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

/// A selected field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub selection_set: Vec<Selection>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Pass `$variable` as argument `name`.
    pub fn argument(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            variable: variable.into(),
        });
        self
    }

    /// Pass `$name` as argument `name`.
    pub fn pass(self, name: &str) -> Self {
        self.argument(name, name)
    }

    pub fn select(mut self, selection: impl Into<Selection>) -> Self {
        self.selection_set.push(selection.into());
        self
    }

    pub fn select_all<I, S>(mut self, selections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selection>,
    {
        self.selection_set
            .extend(selections.into_iter().map(Into::into));
        self
    }

    /// Name under which the field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A single named operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub operation_type: OperationType,
    pub name: String,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: Vec<Selection>,
}

impl Document {
    pub fn new(operation_type: OperationType, name: impl Into<String>) -> Self {
        Self {
            operation_type,
            name: name.into(),
            variables: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    pub fn variable(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.variables.push(VariableDefinition::new(name, ty));
        self
    }

    pub fn select(mut self, field: Field) -> Self {
        self.selection_set.push(Selection::Field(field));
        self
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.selection_set.is_empty() {
            return Err(DocumentError::EmptyOperation(self.name.clone()));
        }

        let mut declared = HashSet::new();
        for variable in &self.variables {
            if !declared.insert(variable.name.as_str()) {
                return Err(DocumentError::DuplicateVariable(variable.name.clone()));
            }
        }

        let mut used = HashSet::new();
        for selection in &self.selection_set {
            collect_usages(selection, &mut used)?;
        }

        if let Some(undeclared) = used.iter().find(|name| !declared.contains(*name)) {
            return Err(DocumentError::UndeclaredVariable(undeclared.to_string()));
        }
        if let Some(unused) = self
            .variables
            .iter()
            .find(|variable| !used.contains(variable.name.as_str()))
        {
            return Err(DocumentError::UnusedVariable(unused.name.clone()));
        }
        Ok(())
    }
}

fn collect_usages<'a>(
    selection: &'a Selection,
    used: &mut HashSet<&'a str>,
) -> Result<(), DocumentError> {
    let Selection::Field(field) = selection else {
        return Ok(());
    };
    used.extend(field.arguments.iter().map(|argument| argument.variable.as_str()));
    for nested in &field.selection_set {
        if let Selection::Raw(raw) = nested {
            if !balanced(raw) {
                return Err(DocumentError::UnbalancedSelection(
                    field.response_key().to_string(),
                ));
            }
        }
        collect_usages(nested, used)?;
    }
    Ok(())
}

fn balanced(raw: &str) -> bool {
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

const INDENT: &str = "  ";

fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_selection_set(
    f: &mut fmt::Formatter<'_>,
    selections: &[Selection],
    depth: usize,
) -> fmt::Result {
    for selection in selections {
        match selection {
            Selection::Field(field) => write_field(f, field, depth)?,
            Selection::Raw(raw) => {
                for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
                    write_indent(f, depth)?;
                    f.write_str(line)?;
                    f.write_char('\n')?;
                }
            }
        }
    }
    Ok(())
}

fn write_field(f: &mut fmt::Formatter<'_>, field: &Field, depth: usize) -> fmt::Result {
    write_indent(f, depth)?;
    if let Some(alias) = &field.alias {
        write!(f, "{alias}: ")?;
    }
    f.write_str(&field.name)?;
    if !field.arguments.is_empty() {
        f.write_char('(')?;
        for (index, argument) in field.arguments.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: ${}", argument.name, argument.variable)?;
        }
        f.write_char(')')?;
    }
    if field.selection_set.is_empty() {
        return f.write_char('\n');
    }
    f.write_str(" {\n")?;
    write_selection_set(f, &field.selection_set, depth + 1)?;
    write_indent(f, depth)?;
    f.write_str("}\n")
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation_type, self.name)?;
        if !self.variables.is_empty() {
            f.write_char('(')?;
            for (index, variable) in self.variables.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "${}: {}", variable.name, variable.ty)?;
            }
            f.write_char(')')?;
        }
        f.write_str(" {\n")?;
        write_selection_set(f, &self.selection_set, 1)?;
        f.write_str("}\n")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn product_query() -> Document {
        Document::new(OperationType::Query, "GetProduct")
            .variable("id", "ID!")
            .select(
                Field::new("product")
                    .pass("id")
                    .select(Selection::leaf("id"))
                    .select(
                        Field::new("data")
                            .select(Selection::leaf("name"))
                            .select(
                                Field::new("category")
                                    .alias("mainCategory")
                                    .select(Selection::Raw("id\n  title".to_string())),
                            ),
                    ),
            )
    }

    #[test]
    fn renders_nested_fields() {
        assert_eq!(
            product_query().to_string(),
            "query GetProduct($id: ID!) {\n  product(id: $id) {\n    id\n    data {\n      name\n      mainCategory: category {\n        id\n        title\n      }\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn valid_document() {
        assert_eq!(product_query().validate(), Ok(()));
    }

    #[test]
    fn undeclared_variable() {
        let document = Document::new(OperationType::Query, "GetProducts")
            .select(Field::new("productList").pass("where").select(Selection::leaf("id")));
        assert_eq!(
            document.validate(),
            Err(DocumentError::UndeclaredVariable("where".to_string()))
        );
    }

    #[test]
    fn unused_variable() {
        let document = product_query().variable("key", "PRODUCT_KEY_INPUT");
        assert_eq!(
            document.validate(),
            Err(DocumentError::UnusedVariable("key".to_string()))
        );
    }

    #[test]
    fn duplicate_variable() {
        let document = product_query().variable("id", "ID!");
        assert_eq!(
            document.validate(),
            Err(DocumentError::DuplicateVariable("id".to_string()))
        );
    }

    #[test]
    fn unbalanced_raw_selection() {
        let document = Document::new(OperationType::Query, "GetProduct")
            .variable("id", "ID!")
            .select(
                Field::new("product")
                    .pass("id")
                    .select(Field::new("author").select(Selection::Raw("id profile {".into()))),
            );
        assert_eq!(
            document.validate(),
            Err(DocumentError::UnbalancedSelection("author".to_string()))
        );
    }

    #[test]
    fn empty_operation() {
        let document = Document::new(OperationType::Mutation, "DeleteProducts");
        assert_eq!(
            document.validate(),
            Err(DocumentError::EmptyOperation("DeleteProducts".to_string()))
        );
    }
}
