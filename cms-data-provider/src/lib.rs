//! A GraphQL data provider for a headless CMS.
//!
//! Translates generic CRUD calls (list, get, create, update, delete, custom) into
//! GraphQL documents and variables, and normalizes whatever comes back (data,
//! protocol errors, payload-embedded errors, transport failures) into one stable
//! result and error contract.

#![warn(unreachable_pub)]

pub mod json_ext;

pub mod classify;
pub mod configuration;
pub mod document;
pub mod error;
pub mod graphql;
pub mod meta;
pub mod naming;
pub mod normalize;
mod provider;
pub mod query;
pub mod services;
pub mod token;

pub use configuration::Configuration;
pub use error::HttpError;
pub use error::ProviderError;
pub use meta::MetaQuery;
pub use provider::DataProvider;
pub use provider::GetListParams;
pub use provider::ListResult;
pub use provider::OperationResult;
pub use query::filter::CrudFilter;
pub use query::pagination::Pagination;
pub use query::sort::SortOrder;
pub use query::sort::Sorter;
