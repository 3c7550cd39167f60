//! Database migrations for the Correio application

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
