use std::future::IntoFuture;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use correio_auth::AuthPlugin;
use correio_config::{AppConfig, ConfigPlugin};
use correio_core::plugin::PluginManager;
use correio_core::CookieCrypto;
use correio_database::DbConnection;
use correio_email::EmailPlugin;
use correio_entities::users;
use correio_entities::UserRole;
use rand::Rng;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use tokio::net::TcpListener;
use tracing::{debug, info};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:8080", env = "CORREIO_ADDRESS")]
    pub address: String,

    /// Database connection URL
    #[arg(long, env = "CORREIO_DATABASE_URL")]
    pub database_url: String,

    /// Public base URL used to build verification and reset links
    #[arg(long, env = "CORREIO_BASE_URL")]
    pub base_url: Option<String>,

    /// Email for the initial admin account, created when no users exist
    #[arg(long, env = "CORREIO_ADMIN_EMAIL")]
    pub admin_email: Option<String>,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        // Configuration is resolved exactly once; everything downstream
        // receives this immutable snapshot
        let config = Arc::new(AppConfig::new(
            self.address.clone(),
            self.database_url.clone(),
            self.base_url.clone(),
            self.admin_email.clone(),
        )?);
        config.validate()?;

        let cookie_crypto = Arc::new(CookieCrypto::new(&config.auth_secret)?);

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(start_server(config, cookie_crypto))
    }
}

async fn start_server(
    config: Arc<AppConfig>,
    cookie_crypto: Arc<CookieCrypto>,
) -> anyhow::Result<()> {
    debug!("Initializing database connection...");
    let db = correio_database::establish_connection(&config.database_url).await?;

    info!(
        "Starting Correio server on {} ({})",
        config.address, config.environment
    );

    let mut plugin_manager = PluginManager::new();

    // Core services that plugins can access
    let service_context = plugin_manager.service_context();
    service_context.register_service(db.clone());
    service_context.register_service(cookie_crypto.clone());

    // Register plugins in dependency order:
    // 1. ConfigPlugin - provides the resolved configuration
    debug!("Registering ConfigPlugin");
    plugin_manager.register_plugin(Box::new(ConfigPlugin::new(config.clone())));

    // 2. EmailPlugin - provides the transactional mailer AuthPlugin depends on
    debug!("Registering EmailPlugin");
    plugin_manager.register_plugin(Box::new(EmailPlugin::new()));

    // 3. AuthPlugin - provides authentication and session handling
    debug!("Registering AuthPlugin");
    plugin_manager.register_plugin(Box::new(AuthPlugin::new()));

    debug!("Initializing plugins");
    plugin_manager
        .initialize_plugins()
        .await
        .map_err(|e| anyhow::anyhow!("Plugin initialization failed: {}", e))?;
    debug!("All plugins initialized successfully");

    bootstrap_admin_account(db.as_ref(), &config).await?;

    // Build the application with all plugin routes and the merged OpenAPI schema
    debug!("Building application with plugin routes");
    let api_doc = plugin_manager
        .get_unified_openapi()
        .map_err(|e| anyhow::anyhow!("Failed to build unified OpenAPI schema: {}", e))?;
    let app = plugin_manager
        .build_application()
        .map_err(|e| anyhow::anyhow!("Failed to build application: {}", e))?
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc));

    let listener = TcpListener::bind(&config.address).await?;
    info!("Correio API server listening on {}", config.address);

    axum::serve(listener, app).into_future().await?;
    info!("Correio API server exited");
    Ok(())
}

/// Create the first admin account when the user table is empty.
///
/// Only runs when an admin email was configured; the generated password is
/// printed once and stored only as an Argon2 hash.
async fn bootstrap_admin_account(db: &DbConnection, config: &AppConfig) -> anyhow::Result<()> {
    let user_count = users::Entity::find().count(db).await?;
    if user_count > 0 {
        return Ok(());
    }

    match &config.admin_email {
        Some(email) => create_initial_admin_user(db, email).await,
        None => {
            info!(
                "No users exist yet; pass --admin-email or set CORREIO_ADMIN_EMAIL \
                 to bootstrap an admin account"
            );
            Ok(())
        }
    }
}

fn generate_secure_password() -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

async fn create_initial_admin_user(conn: &DbConnection, email: &str) -> anyhow::Result<()> {
    let email_lower = email.trim().to_lowercase();
    if email_lower.is_empty() || !email_lower.contains('@') {
        return Err(anyhow::anyhow!(
            "Admin email '{}' is not a valid email address",
            email
        ));
    }

    // Generate a secure random password
    let password = generate_secure_password();

    // Hash the password using Argon2
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();

    // The bootstrap address came from the operator, so it counts as verified
    let admin = users::ActiveModel {
        name: Set("Admin".to_string()),
        email: Set(email_lower.clone()),
        password_hash: Set(password_hash),
        role: Set(UserRole::Admin),
        email_verified_at: Set(Some(Utc::now())),
        email_verification_token: Set(None),
        email_verification_expires: Set(None),
        password_reset_token: Set(None),
        password_reset_expires: Set(None),
        ..Default::default()
    };
    admin.insert(conn).await?;

    println!();
    println!(
        "{}",
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_green()
    );
    println!(
        "{}",
        "   🎉 Admin account created successfully!"
            .bright_white()
            .bold()
    );
    println!(
        "{}",
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_green()
    );
    println!();
    println!(
        "{} {}",
        "Email:".bright_white().bold(),
        email_lower.bright_cyan()
    );
    println!(
        "{} {}",
        "Password:".bright_white().bold(),
        password.bright_yellow().bold()
    );
    println!();
    println!(
        "{}",
        "⚠️  IMPORTANT: Save this password now!"
            .bright_yellow()
            .bold()
    );
    println!(
        "{}",
        "This is the only time it will be displayed.".bright_white()
    );
    println!(
        "{}",
        "If you lose it, run: correio reset-admin-password".bright_white()
    );
    println!(
        "{}",
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_green()
    );
    println!();

    debug!("Created initial admin user with email: {}", email_lower);

    Ok(())
}
