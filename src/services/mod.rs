//! Business logic services

pub mod catalog;
pub mod import;
pub mod loans;
pub mod metadata;
pub mod reviews;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

use metadata::MetadataProvider;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub reviews: reviews::ReviewsService,
    pub import: import::ImportService,
}

impl Services {
    /// Create all services with the given repository and metadata provider
    pub fn new(repository: Repository, metadata: Arc<dyn MetadataProvider>, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), metadata.clone()),
            loans: loans::LoansService::new(repository.clone(), config.loans.clone()),
            reviews: reviews::ReviewsService::new(repository.clone()),
            import: import::ImportService::new(repository.clone(), metadata, config.import.clone()),
            repository,
        }
    }
}
