//! Publishing to a CKAN data catalog.
//!
//! Resources are matched by name inside a package: a missing resource is
//! created, an existing one gets its file replaced.

use serde::Deserialize;
use tracing::info;

use crate::error::CatalogError;

pub mod ckan;

pub use ckan::CkanClient;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A file to publish as a named resource.
#[derive(Debug, Clone)]
pub struct Upload<'a> {
    pub name: &'a str,
    pub format: &'a str,
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

pub trait Catalog {
    fn package_resources(&self, package_id: &str) -> Result<Vec<Resource>, CatalogError>;
    fn create_resource(
        &self,
        package_id: &str,
        upload: &Upload<'_>,
    ) -> Result<Resource, CatalogError>;
    fn update_resource(
        &self,
        resource_id: &str,
        upload: &Upload<'_>,
    ) -> Result<Resource, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created(Resource),
    Updated(Resource),
}

/// Create or update the resource named `upload.name` in `package_id`.
pub fn publish<C: Catalog + ?Sized>(
    catalog: &C,
    package_id: &str,
    upload: &Upload<'_>,
) -> Result<PublishOutcome, CatalogError> {
    let matching: Vec<Resource> = catalog
        .package_resources(package_id)?
        .into_iter()
        .filter(|r| r.name.as_deref() == Some(upload.name))
        .collect();

    match matching.as_slice() {
        [] => {
            info!(name = upload.name, bytes = upload.bytes.len(), "creating resource");
            catalog.create_resource(package_id, upload).map(PublishOutcome::Created)
        }
        [existing] => {
            info!(
                name = upload.name,
                id = %existing.id,
                bytes = upload.bytes.len(),
                "updating resource"
            );
            catalog.update_resource(&existing.id, upload).map(PublishOutcome::Updated)
        }
        many => Err(CatalogError::Ambiguous {
            name: upload.name.to_string(),
            count: many.len(),
        }),
    }
}
