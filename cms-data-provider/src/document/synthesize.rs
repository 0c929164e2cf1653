//! Synthesis of the documents backing each provider operation.

use indexmap::IndexMap;

use super::Document;
use super::DocumentError;
use super::Field;
use super::OperationType;
use super::Selection;
use crate::naming::ResourceNames;
use crate::naming::TypeSuffix;

/// Metadata selected on every entity, next to its `data` envelope.
const ENTITY_METADATA: [&str; 4] = ["id", "createdAt", "status", "updatedAt"];

/// What to select under an entity's `data` envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    /// Leaf fields, `["id"]` unless specified.
    pub fields: Vec<String>,
    /// Output key to literal sub-selection of a related entity.
    pub connection_fields: IndexMap<String, String>,
    /// Output key to the backend field actually holding the relation.
    pub alias_fields: IndexMap<String, String>,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fields: vec!["id".to_string()],
            connection_fields: IndexMap::new(),
            alias_fields: IndexMap::new(),
        }
    }
}

impl Projection {
    fn entity(&self) -> Vec<Selection> {
        let data = Field::new("data")
            .select_all(self.fields.iter().map(Selection::leaf))
            .select_all(self.connection_fields.iter().map(|(key, sub_selection)| {
                let field = match self.alias_fields.get(key) {
                    Some(actual) => Field::new(actual).alias(key),
                    None => Field::new(key),
                };
                field.select(Selection::Raw(sub_selection.clone()))
            }));

        ENTITY_METADATA
            .iter()
            .map(|name| Selection::leaf(*name))
            .chain(std::iter::once(Selection::Field(data)))
            .collect()
    }

    fn enveloped(&self) -> Selection {
        Selection::Field(Field::new("data").select_all(self.entity()))
    }
}

/// Where the record sits under the root field of the response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Envelope {
    /// `data[key]` is the record.
    Direct,
    /// `data[key].data` is the record.
    Data,
}

/// How the result of an operation is read back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    /// Root field holding the result.
    pub key: String,
    /// Root field holding the `{ total }` of a list, independent of the page.
    pub count_key: Option<String>,
    pub envelope: Envelope,
}

impl Extraction {
    pub fn list(key: impl Into<String>, count_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            count_key: Some(count_key.into()),
            envelope: Envelope::Direct,
        }
    }

    pub fn one(key: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            key: key.into(),
            count_key: None,
            envelope,
        }
    }
}

/// A rendered-ready document and the way to read its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedOperation {
    pub document: Document,
    pub extraction: Extraction,
}

impl SynthesizedOperation {
    fn validated(document: Document, extraction: Extraction) -> Result<Self, DocumentError> {
        document.validate()?;
        Ok(Self {
            document,
            extraction,
        })
    }

    pub fn operation_type(&self) -> OperationType {
        self.document.operation_type
    }
}

/// Builds the documents for one resource.
#[derive(Clone, Debug)]
pub struct Synthesizer {
    names: ResourceNames,
}

impl Synthesizer {
    pub fn new(names: ResourceNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// `query GetProducts` selecting `productList` and `productListCount`.
    ///
    /// The key and relation variables are declared only when the caller has such a condition,
    /// since the backend does not define their input types for every resource.
    pub fn list(
        &self,
        projection: &Projection,
        has_key: bool,
        has_relation: bool,
    ) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let mut document = Document::new(
            OperationType::Query,
            format!("Get{}", names.plural_pascal()),
        )
        .variable("where", names.type_name(TypeSuffix::Where))
        .variable("sort", names.type_name(TypeSuffix::Sort))
        .variable("page", "Int")
        .variable("size", "Int");

        let mut list = Field::new(names.list_field())
            .pass("where")
            .pass("sort")
            .pass("page")
            .pass("size");
        let mut count = Field::new(names.count_field()).pass("where");

        if has_key {
            document = document.variable("key", names.type_name(TypeSuffix::Key));
            list = list.pass("key");
            count = count.pass("key");
        }
        if has_relation {
            document = document.variable("relation", names.type_name(TypeSuffix::Relation));
            list = list.pass("relation");
            count = count.pass("relation");
        }

        let extraction = Extraction::list(list.response_key(), count.response_key());
        let document = document
            .select(list.select_all(projection.entity()))
            .select(count.select(Selection::leaf("total")));
        SynthesizedOperation::validated(document, extraction)
    }

    /// `query GetProduct($id: ID!)`
    pub fn get_one(&self, projection: &Projection) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let field = Field::new(names.singular())
            .pass("id")
            .select_all(projection.entity());
        let extraction = one(&field, Envelope::Direct);
        let document = Document::new(
            OperationType::Query,
            format!("Get{}", names.singular_pascal()),
        )
        .variable("id", "ID!")
        .select(field);
        SynthesizedOperation::validated(document, extraction)
    }

    /// `mutation CreateProduct($payload: PRODUCT_INPUT!)`
    pub fn create(
        &self,
        projection: &Projection,
        has_connect: bool,
    ) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let mut document = Document::new(
            OperationType::Mutation,
            format!("Create{}", names.singular_pascal()),
        )
        .variable("payload", format!("{}!", names.type_name(TypeSuffix::Payload)));
        let mut field = Field::new(format!("create{}", names.singular_pascal())).pass("payload");

        if has_connect {
            document = document.variable("connect", names.type_name(TypeSuffix::Connect));
            field = field.pass("connect");
        }

        let field = field.select(projection.enveloped());
        let extraction = one(&field, Envelope::Data);
        SynthesizedOperation::validated(document.select(field), extraction)
    }

    /// `mutation UpsertManyProducts($payloads: [PRODUCT_INPUT!]!)`
    pub fn create_many(
        &self,
        projection: &Projection,
    ) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let field = Field::new(format!("upsertMany{}", names.plural_pascal()))
            .pass("payloads")
            .select(projection.enveloped());
        let extraction = one(&field, Envelope::Data);
        let document = Document::new(
            OperationType::Mutation,
            format!("UpsertMany{}", names.plural_pascal()),
        )
        .variable(
            "payloads",
            format!("[{}!]!", names.type_name(TypeSuffix::Payload)),
        )
        .select(field);
        SynthesizedOperation::validated(document, extraction)
    }

    /// `mutation UpdateProduct($id: ID!, $payload: PRODUCT_INPUT!, $deltaUpdate: Boolean)`
    pub fn update(
        &self,
        projection: &Projection,
        has_connect: bool,
        has_disconnect: bool,
    ) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let mut document = Document::new(
            OperationType::Mutation,
            format!("Update{}", names.singular_pascal()),
        )
        .variable("id", "ID!")
        .variable("payload", format!("{}!", names.type_name(TypeSuffix::Payload)));
        let mut field = Field::new(format!("update{}", names.singular_pascal()))
            .pass("id")
            .pass("payload");

        if has_connect {
            document = document.variable("connect", names.type_name(TypeSuffix::Connect));
            field = field.pass("connect");
        }
        if has_disconnect {
            document = document.variable("disconnect", names.type_name(TypeSuffix::Disconnect));
            field = field.pass("disconnect");
        }

        let document = document.variable("deltaUpdate", "Boolean");
        let field = field.pass("deltaUpdate").select(projection.enveloped());
        let extraction = one(&field, Envelope::Data);
        SynthesizedOperation::validated(document.select(field), extraction)
    }

    /// `mutation DeleteProducts($ids: [ID!]!)`, also used for a single record.
    pub fn delete(&self) -> Result<SynthesizedOperation, DocumentError> {
        let names = &self.names;
        let field = Field::new(format!("delete{}", names.plural_pascal()))
            .pass("ids")
            .select(Selection::leaf("result"));
        let extraction = one(&field, Envelope::Direct);
        let document = Document::new(
            OperationType::Mutation,
            format!("Delete{}", names.plural_pascal()),
        )
        .variable("ids", "[ID!]!")
        .select(field);
        SynthesizedOperation::validated(document, extraction)
    }
}

fn one(field: &Field, envelope: Envelope) -> Extraction {
    Extraction::one(field.response_key(), envelope)
}
