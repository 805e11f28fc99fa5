//! Business logic services

pub mod catalog;
pub mod fines;
pub mod loans;
pub mod users;

use crate::{
    config::{AuthConfig, LibraryConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub fines: fines::FineAccrualJob,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, library: LibraryConfig, auth: AuthConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), library.clone()),
            loans: loans::LoansService::new(repository.clone(), library.clone()),
            fines: fines::FineAccrualJob::new(repository.clone(), library),
            users: users::UsersService::new(repository, auth),
        }
    }
}
