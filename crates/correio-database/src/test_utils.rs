//! Test utilities for database integration tests
//!
//! This module provides reusable test utilities for setting up
//! PostgreSQL for integration testing across all correio crates.

use crate::DbConnection;
use correio_migrations::Migrator;
use sea_orm::*;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage, ImageExt};
use tokio::sync::{Mutex, OnceCell};

/// Shared test database container that lives for the duration of the test run
static TEST_CONTAINER: OnceCell<Arc<Mutex<SharedContainer>>> = OnceCell::const_new();

/// Global migration lock to ensure only one test runs migrations at a time.
/// Concurrent `Migrator::up` calls against the shared container race on
/// index creation.
static MIGRATION_LOCK: OnceCell<Arc<Mutex<()>>> = OnceCell::const_new();

/// Shared container wrapper that holds the database container and connection details
struct SharedContainer {
    #[allow(dead_code)]
    container: ContainerAsync<GenericImage>,
    database_url: String,
    #[allow(dead_code)]
    port: u16,
}

impl SharedContainer {
    async fn new() -> anyhow::Result<Self> {
        let db_name = "test_db";
        let username = "test_user";
        let password = "test_password";

        // Start PostgreSQL container
        let postgres_container = GenericImage::new("postgres", "17-alpine")
            .with_env_var("POSTGRES_DB", db_name)
            .with_env_var("POSTGRES_USER", username)
            .with_env_var("POSTGRES_PASSWORD", password)
            .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
            .start()
            .await?;

        // Get connection details
        let port = postgres_container.get_host_port_ipv4(5432).await?;
        let database_url = format!(
            "postgresql://{}:{}@localhost:{}/{}",
            username, password, port, db_name
        );

        // Wait for the database to be ready
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        Ok(Self {
            container: postgres_container,
            database_url,
            port,
        })
    }
}

/// Test database setup backed by a PostgreSQL container
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
    /// If this instance owns a dedicated container (not shared)
    #[allow(dead_code)]
    dedicated_container: Option<ContainerAsync<GenericImage>>,
}

impl TestDatabase {
    /// Get or create the shared database container
    async fn get_or_create_container() -> anyhow::Result<Arc<Mutex<SharedContainer>>> {
        TEST_CONTAINER
            .get_or_try_init(|| async {
                let container = SharedContainer::new().await?;
                Ok(Arc::new(Mutex::new(container)))
            })
            .await
            .map(|arc| Arc::clone(arc))
    }

    /// Create a new test database (uses shared container)
    ///
    /// This function:
    /// 1. Gets or creates a shared PostgreSQL container (only created once per test run)
    /// 2. Establishes a new connection to the shared database
    /// 3. Cleans up all tables to ensure test isolation
    pub async fn new() -> anyhow::Result<Self> {
        // Get or create shared container
        let container = Self::get_or_create_container().await?;
        let container_lock = container.lock().await;
        let database_url = container_lock.database_url.clone();
        drop(container_lock); // Release lock early

        // Connect with retries - use more retries for shared container
        let db = Self::connect_with_retry(&database_url, 20).await?;

        let test_db = TestDatabase {
            db: Arc::new(db),
            database_url,
            dedicated_container: None,
        };

        // Verify connection works
        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Initial connection test failed: {}", e))?;

        // Clean up all tables for test isolation
        test_db.cleanup_all_tables().await.ok(); // Ignore errors if no tables exist yet

        Ok(test_db)
    }

    /// Create a test database with a dedicated container (not shared)
    ///
    /// This creates a completely isolated database instance for tests that need
    /// full isolation and cannot share a container with other tests.
    /// Use this sparingly as it's slower than using the shared container.
    pub async fn new_isolated() -> anyhow::Result<Self> {
        let db_name = "test_db";
        let username = "test_user";
        let password = "test_password";

        // Start PostgreSQL container
        let postgres_container = GenericImage::new("postgres", "17-alpine")
            .with_env_var("POSTGRES_DB", db_name)
            .with_env_var("POSTGRES_USER", username)
            .with_env_var("POSTGRES_PASSWORD", password)
            .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
            .start()
            .await?;

        // Get connection details
        let port = postgres_container.get_host_port_ipv4(5432).await?;
        let database_url = format!(
            "postgresql://{}:{}@localhost:{}/{}",
            username, password, port, db_name
        );

        // Wait for the database to be ready
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        // Connect with retries
        let db = Self::connect_with_retry(&database_url, 10).await?;

        let test_db = TestDatabase {
            db: Arc::new(db),
            database_url,
            dedicated_container: Some(postgres_container),
        };

        // Verify connection works
        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Initial connection test failed: {}", e))?;

        // Run migrations after creating the isolated test database
        if let Err(e) = Migrator::up(&*test_db.db, None).await {
            return Err(anyhow::anyhow!("Failed to run migrations: {}", e));
        }

        Ok(test_db)
    }

    /// Create a test database and run migrations
    ///
    /// This is a convenience method that uses correio_migrations::Migrator.
    /// The database connection is verified before running migrations.
    /// Note: Migrations are run only once per shared container - subsequent calls
    /// will skip migration if tables already exist.
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let test_db = Self::new().await?;

        // Verify database connection is working before migrations
        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Database connection test failed: {}", e))?;

        // Check if migrations have already been run
        let check_sql = "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = 'seaql_migrations'
        )";

        let result = test_db.query_sql(check_sql).await?;
        let migrations_table_exists = result
            .first()
            .and_then(|row| row.try_get::<bool>("", "exists").ok())
            .unwrap_or(false);

        if !migrations_table_exists {
            // Acquire the global migration lock to prevent concurrent migrations
            let migration_lock = MIGRATION_LOCK
                .get_or_init(|| async { Arc::new(Mutex::new(())) })
                .await;
            let _lock = migration_lock.lock().await;

            // Double-check migrations weren't run by another test while we waited for the lock
            let check_sql = "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = 'seaql_migrations'
            )";
            let result = test_db.query_sql(check_sql).await?;
            let migrations_now_exist = result
                .first()
                .and_then(|row| row.try_get::<bool>("", "exists").ok())
                .unwrap_or(false);

            if !migrations_now_exist {
                // Run migrations for the first time
                Migrator::up(&*test_db.db, None)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

                // Verify migrations were successful by checking a known table
                let check_sql = "SELECT EXISTS (
                    SELECT FROM information_schema.tables
                    WHERE table_schema = 'public'
                    AND table_name = 'users'
                )";

                let result = test_db
                    .query_sql(check_sql)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to verify migrations: {}", e))?;

                let users_table_exists = result
                    .first()
                    .and_then(|row| row.try_get::<bool>("", "exists").ok())
                    .unwrap_or(false);

                if !users_table_exists {
                    return Err(anyhow::anyhow!("Migrations did not create expected tables"));
                }
            }
            // Lock is automatically released when _lock goes out of scope
        }

        // Clean tables but preserve schema
        test_db.cleanup_all_tables().await.ok();

        Ok(test_db)
    }

    /// Connect to database with retry logic
    async fn connect_with_retry(
        database_url: &str,
        max_retries: u32,
    ) -> anyhow::Result<DbConnection> {
        use sea_orm::ConnectOptions;
        use std::time::Duration;

        let mut retries = max_retries;

        // Create connection options with better timeout settings
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(5)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(10))
            .max_lifetime(Duration::from_secs(60))
            .sqlx_logging(false);

        loop {
            match Database::connect(opt.clone()).await {
                Ok(db) => {
                    // Verify connection with a simple query
                    let test = Statement::from_string(
                        DatabaseBackend::Postgres,
                        "SELECT 1".to_owned(),
                    );

                    match db.execute(test).await {
                        Ok(_) => return Ok(db),
                        Err(e) if retries > 0 => {
                            eprintln!(
                                "Database connected but test query failed (retries left: {}): {}",
                                retries, e
                            );
                            // Fall through to retry logic below
                        }
                        Err(e) => {
                            return Err(anyhow::anyhow!(
                                "Database connected but not responsive: {}",
                                e
                            ));
                        }
                    }
                }
                Err(e) if retries > 0 => {
                    eprintln!(
                        "Failed to connect to database (retries left: {}): {}",
                        retries, e
                    );
                    // Fall through to retry logic below
                }
                Err(e) => {
                    return Err(anyhow::anyhow!("Failed to connect to database: {}", e));
                }
            }

            if retries > 0 {
                retries -= 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
            } else {
                return Err(anyhow::anyhow!(
                    "Failed to connect to database after {} retries",
                    max_retries
                ));
            }
        }
    }

    /// Execute raw SQL query for testing
    pub async fn execute_sql(&self, sql: &str) -> anyhow::Result<ExecResult> {
        let statement = Statement::from_string(DatabaseBackend::Postgres, sql.to_owned());
        let result = self
            .db
            .execute(statement)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(result)
    }

    /// Query raw SQL and return results
    pub async fn query_sql(&self, sql: &str) -> anyhow::Result<Vec<QueryResult>> {
        let statement = Statement::from_string(DatabaseBackend::Postgres, sql.to_owned());
        let result = self
            .db
            .query_all(statement)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(result)
    }

    /// Clean up all data in the database (useful for test cleanup)
    ///
    /// This truncates all tables except migration-related tables.
    pub async fn cleanup_all_tables(&self) -> anyhow::Result<()> {
        // Get all table names except migration tables
        let tables = self
            .query_sql(
                "SELECT tablename FROM pg_tables
             WHERE schemaname = 'public'
             AND tablename NOT IN ('seaql_migrations', '_sqlx_migrations')
             ORDER BY tablename DESC",
            )
            .await?;

        // Truncate each table
        for table in tables {
            if let Some(table_name) = table.try_get::<String>("", "tablename").ok() {
                let sql = format!("TRUNCATE TABLE {} CASCADE", table_name);
                self.execute_sql(&sql).await?;
            }
        }

        Ok(())
    }

    /// Test database connectivity
    pub async fn test_connection(&self) -> anyhow::Result<()> {
        let statement = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
        let result = self.db.query_one(statement).await?;

        if result.is_none() {
            return Err(anyhow::anyhow!("Connection test failed"));
        }

        Ok(())
    }

    /// Get the database connection
    pub fn connection(&self) -> &DbConnection {
        &self.db
    }

    /// Get the database connection as Arc
    pub fn connection_arc(&self) -> Arc<DbConnection> {
        Arc::clone(&self.db)
    }
}
