//! Naming policy: how resource names map onto GraphQL operation, field and type names.

use std::sync::Arc;

use heck::ToLowerCamelCase;
use heck::ToPascalCase;
use heck::ToShoutySnakeCase;
use heck::ToSnakeCase;

/// Irregular nouns the rule based inflector only handles in one direction.
const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

/// Singular/plural forms of a single word.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait Inflect: Send + Sync {
    /// The singular form of `word`. Already singular words are returned as is.
    fn singular(&self, word: &str) -> String;

    /// The plural form of `word`. Already plural words are returned as is.
    fn plural(&self, word: &str) -> String;
}

/// English inflection backed by the `Inflector` rule set.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnglishInflector;

impl Inflect for EnglishInflector {
    fn singular(&self, word: &str) -> String {
        if let Some((singular, _)) = IRREGULARS
            .iter()
            .find(|(singular, plural)| *singular == word || *plural == word)
        {
            return (*singular).to_string();
        }
        inflector::string::singularize::to_singular(word)
    }

    fn plural(&self, word: &str) -> String {
        let singular = self.singular(word);
        if let Some((_, plural)) = IRREGULARS.iter().find(|(s, _)| *s == singular) {
            return (*plural).to_string();
        }
        inflector::string::pluralize::to_plural(&singular)
    }
}

/// Suffixes appended to the shouty resource name to form GraphQL input type names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeSuffix {
    /// `<RESOURCE>_WHERE_INPUT`
    Where,
    /// `<RESOURCE>_SORT_INPUT`
    Sort,
    /// `<RESOURCE>_KEY_INPUT`
    Key,
    /// `<RESOURCE>_RELATION_INPUT`
    Relation,
    /// `<RESOURCE>_INPUT`
    Payload,
    /// `<RESOURCE>_CONNECT_INPUT`
    Connect,
    /// `<RESOURCE>_DISCONNECT_INPUT`
    Disconnect,
}

impl TypeSuffix {
    fn as_str(self) -> &'static str {
        match self {
            TypeSuffix::Where => "_WHERE_INPUT",
            TypeSuffix::Sort => "_SORT_INPUT",
            TypeSuffix::Key => "_KEY_INPUT",
            TypeSuffix::Relation => "_RELATION_INPUT",
            TypeSuffix::Payload => "_INPUT",
            TypeSuffix::Connect => "_CONNECT_INPUT",
            TypeSuffix::Disconnect => "_DISCONNECT_INPUT",
        }
    }
}

/// The derived forms of a resource name.
///
/// Nothing is cached: every form is computed from the raw resource string when asked for.
#[derive(Clone)]
pub struct ResourceNames {
    resource: String,
    inflector: Arc<dyn Inflect>,
}

impl std::fmt::Debug for ResourceNames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceNames")
            .field("resource", &self.resource)
            .finish()
    }
}

impl ResourceNames {
    /// Names for `resource` using English inflection.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::with_inflector(resource, Arc::new(EnglishInflector))
    }

    /// Names for `resource` using a custom inflection policy.
    pub fn with_inflector(resource: impl Into<String>, inflector: Arc<dyn Inflect>) -> Self {
        Self {
            resource: resource.into(),
            inflector,
        }
    }

    /// The resource string as supplied by the caller.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    // Only the last word of a compound name is inflected:
    // `product-variants` -> `product_variant`.
    fn inflect_last_word(&self, plural: bool) -> String {
        let snake = self.resource.to_snake_case();
        let (head, last) = match snake.rsplit_once('_') {
            Some((head, last)) => (Some(head), last),
            None => (None, snake.as_str()),
        };
        let last = if plural {
            self.inflector.plural(last)
        } else {
            self.inflector.singular(last)
        };
        match head {
            Some(head) => format!("{head}_{last}"),
            None => last,
        }
    }

    /// `product-variant` -> `productVariant`
    pub fn singular(&self) -> String {
        self.inflect_last_word(false).to_lower_camel_case()
    }

    /// `product-variant` -> `productVariants`
    pub fn plural(&self) -> String {
        self.inflect_last_word(true).to_lower_camel_case()
    }

    /// `product-variant` -> `ProductVariant`
    pub fn singular_pascal(&self) -> String {
        self.inflect_last_word(false).to_pascal_case()
    }

    /// `product-variant` -> `ProductVariants`
    pub fn plural_pascal(&self) -> String {
        self.inflect_last_word(true).to_pascal_case()
    }

    /// `product-variant` -> `PRODUCT_VARIANT`
    pub fn type_prefix(&self) -> String {
        self.inflect_last_word(false).to_shouty_snake_case()
    }

    /// A GraphQL input type name, e.g. `PRODUCT_WHERE_INPUT`.
    pub fn type_name(&self, suffix: TypeSuffix) -> String {
        format!("{}{}", self.type_prefix(), suffix.as_str())
    }

    /// Root field of the paged list query: `productList`.
    pub fn list_field(&self) -> String {
        format!("{}List", self.singular())
    }

    /// Root field of the count query: `productListCount`.
    pub fn count_field(&self) -> String {
        format!("{}ListCount", self.singular())
    }
}
