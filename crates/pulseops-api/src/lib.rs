//! Session client and typed models for the Pulse REST API
//!
//! This crate owns everything that talks to the remote service directly:
//! authentication (password or personal-access-token), site-scoped resource
//! paths, the typed entity models, and the pagination walker that drains
//! cursor- and page-number-based collections.
//!
//! Callers above this crate never see a bearer token or a continuation
//! cursor; they see `Session` methods and `Vec<Entity>` results.

pub mod endpoints;
pub mod error;
pub mod models;
pub mod pagination;
pub mod session;

pub use error::{ApiError, Result};
pub use models::{
    BasicSpecification, Certification, ChannelPreference, Datasource, DatasourceRef, Definition,
    FilterClause, Follower, Group, Metadata, Metric, MetricGroupingPreferences,
    MetricSpecification, PreferenceUpdate, Specification, Subscription, User,
};
pub use pagination::{FetchError, PageScheme, Paginator};
pub use session::{Credentials, Session, SiteConfig, DEFAULT_API_VERSION};
