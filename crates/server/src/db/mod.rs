use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

const ORDER_COLUMNS: &str = "id, user_id, stripe_payment_intent_id, amount, currency, status, payment_status, service_type, metadata, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, order_id, sender_id, is_admin, message_text, attachments, read_by_user, read_by_admin, created_at";
const COMPANY_COLUMNS: &str = "id, user_id, company_number, company_name, status, confirmation_statement_due, accounts_due, is_favorite, created_at";
const SERVICE_COLUMNS: &str = "id, title, slug, base_price, is_active, category";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database; one connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY REFERENCES users(id),
                full_name TEXT,
                company_name TEXT,
                phone_number TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                company_number TEXT NOT NULL,
                company_name TEXT NOT NULL,
                status TEXT,
                confirmation_statement_due TEXT,
                accounts_due TEXT,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, company_number)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS companies_cache (
                company_number TEXT PRIMARY KEY,
                company_name TEXT NOT NULL,
                company_status TEXT,
                confirmation_statement_due TEXT,
                accounts_due TEXT,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                base_price INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                category TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                stripe_payment_intent_id TEXT,
                amount INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'gbp',
                status TEXT NOT NULL DEFAULT 'pending',
                payment_status TEXT NOT NULL DEFAULT 'pending',
                service_type TEXT NOT NULL,
                metadata TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL REFERENCES orders(id),
                sender_id TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                message_text TEXT NOT NULL,
                attachments TEXT,
                read_by_user INTEGER NOT NULL DEFAULT 0,
                read_by_admin INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_messages_order ON messages(order_id)",
            r#"
            CREATE TABLE IF NOT EXISTS admin_users (
                id TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL REFERENCES users(id),
                role TEXT NOT NULL DEFAULT 'admin',
                is_active INTEGER NOT NULL DEFAULT 1,
                permissions TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE email = ?")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Profile operations
    pub async fn create_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, full_name, company_name, phone_number) VALUES (?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.company_name)
        .bind(&profile.phone_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, full_name, company_name, phone_number FROM profiles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn update_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, company_name, phone_number)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                company_name = excluded.company_name,
                phone_number = excluded.phone_number,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.company_name)
        .bind(&profile.phone_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Saved company operations
    pub async fn list_companies(&self, user_id: &str) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE user_id = ? ORDER BY is_favorite DESC, company_name ASC",
            COMPANY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    /// Insert or refresh a saved company; the favorite flag survives refreshes
    pub async fn save_company(&self, company: &Company) -> Result<Company> {
        sqlx::query(
            r#"
            INSERT INTO companies (id, user_id, company_number, company_name, status, confirmation_statement_due, accounts_due, is_favorite)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, company_number) DO UPDATE SET
                company_name = excluded.company_name,
                status = excluded.status,
                confirmation_statement_due = excluded.confirmation_statement_due,
                accounts_due = excluded.accounts_due
            "#,
        )
        .bind(&company.id)
        .bind(&company.user_id)
        .bind(&company.company_number)
        .bind(&company.company_name)
        .bind(&company.status)
        .bind(&company.confirmation_statement_due)
        .bind(&company.accounts_due)
        .bind(company.is_favorite)
        .execute(&self.pool)
        .await?;

        let saved = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE user_id = ? AND company_number = ?",
            COMPANY_COLUMNS
        ))
        .bind(&company.user_id)
        .bind(&company.company_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    pub async fn delete_company(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn toggle_favorite(&self, id: &str, user_id: &str) -> Result<Option<Company>> {
        let result = sqlx::query(
            "UPDATE companies SET is_favorite = NOT is_favorite WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE id = ?",
            COMPANY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    // Registry cache operations
    pub async fn upsert_cached_company(&self, entry: &CompanyCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO companies_cache (company_number, company_name, company_status, confirmation_statement_due, accounts_due)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(company_number) DO UPDATE SET
                company_name = excluded.company_name,
                company_status = excluded.company_status,
                confirmation_statement_due = excluded.confirmation_statement_due,
                accounts_due = excluded.accounts_due,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&entry.company_number)
        .bind(&entry.company_name)
        .bind(&entry.company_status)
        .bind(&entry.confirmation_statement_due)
        .bind(&entry.accounts_due)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_cached_companies(&self, limit: i64) -> Result<Vec<CompanyCacheEntry>> {
        let entries = sqlx::query_as::<_, CompanyCacheEntry>(
            "SELECT company_number, company_name, company_status, confirmation_statement_due, accounts_due, updated_at FROM companies_cache ORDER BY updated_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // Service catalog operations
    pub async fn list_services(&self, active_only: bool) -> Result<Vec<Service>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM services WHERE is_active = 1 ORDER BY category ASC, title ASC",
                SERVICE_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM services ORDER BY category ASC, title ASC",
                SERVICE_COLUMNS
            )
        };
        let services = sqlx::query_as::<_, Service>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(services)
    }

    pub async fn get_service(&self, id: &str) -> Result<Option<Service>> {
        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services WHERE id = ?",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }

    /// Services matching `ids`, in catalog order; unknown ids are skipped
    pub async fn get_services_by_ids(&self, ids: &[String]) -> Result<Vec<Service>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM services WHERE id IN ({}) ORDER BY category ASC, title ASC",
            SERVICE_COLUMNS, placeholders
        );
        let mut query = sqlx::query_as::<_, Service>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let services = query.fetch_all(&self.pool).await?;
        Ok(services)
    }

    pub async fn create_service(&self, service: &Service) -> Result<()> {
        sqlx::query(
            "INSERT INTO services (id, title, slug, base_price, is_active, category) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&service.id)
        .bind(&service.title)
        .bind(&service.slug)
        .bind(service.base_price)
        .bind(service.is_active)
        .bind(&service.category)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_service(&self, service: &Service) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE services SET title = ?, slug = ?, base_price = ?, is_active = ?, category = ? WHERE id = ?",
        )
        .bind(&service.title)
        .bind(&service.slug)
        .bind(service.base_price)
        .bind(service.is_active)
        .bind(&service.category)
        .bind(&service.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_service(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM services WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Order operations
    pub async fn create_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, stripe_payment_intent_id, amount, currency, status, payment_status, service_type, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.stripe_payment_intent_id)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(&order.status)
        .bind(&order.payment_status)
        .bind(&order.service_type)
        .bind(&order.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = ?",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    pub async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Latest `limit` orders, optionally filtered by status
    pub async fn list_recent_orders(&self, limit: i64, status: Option<&str>) -> Result<Vec<Order>> {
        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders WHERE status = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                    ORDER_COLUMNS
                ))
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?",
                    ORDER_COLUMNS
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(orders)
    }

    pub async fn update_order_status(&self, id: &str, status: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_payment_status(&self, id: &str, payment_status: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(payment_status)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Message operations
    pub async fn insert_message(&self, message: &Message) -> Result<Message> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, order_id, sender_id, is_admin, message_text, attachments, read_by_user, read_by_admin)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.order_id)
        .bind(&message.sender_id)
        .bind(message.is_admin)
        .bind(&message.message_text)
        .bind(&message.attachments)
        .bind(message.read_by_user)
        .bind(message.read_by_admin)
        .execute(&self.pool)
        .await?;

        let stored = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(&message.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    /// Thread for an order in insertion order
    pub async fn list_messages(&self, order_id: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE order_id = ? ORDER BY rowid ASC",
            MESSAGE_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Customer read the thread: only admin-sent messages change
    pub async fn mark_read_by_user(&self, order_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read_by_user = 1 WHERE order_id = ? AND is_admin = 1 AND read_by_user = 0",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Admin read the thread: only customer-sent messages change
    pub async fn mark_read_by_admin(&self, order_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read_by_admin = 1 WHERE order_id = ? AND is_admin = 0 AND read_by_admin = 0",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_for_user(&self, user_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages m
            JOIN orders o ON o.id = m.order_id
            WHERE o.user_id = ? AND m.is_admin = 1 AND m.read_by_user = 0
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// One row per order with messages, most recently active first
    pub async fn message_threads(&self) -> Result<Vec<ThreadRow>> {
        let threads = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT
                m.order_id AS order_id,
                o.user_id AS user_id,
                (SELECT m2.message_text FROM messages m2
                    WHERE m2.order_id = m.order_id
                    ORDER BY m2.rowid DESC LIMIT 1) AS last_message,
                MAX(m.created_at) AS last_message_at,
                COUNT(*) AS message_count,
                SUM(CASE WHEN m.is_admin = 0 AND m.read_by_admin = 0 THEN 1 ELSE 0 END) AS unread_by_admin
            FROM messages m
            JOIN orders o ON o.id = m.order_id
            GROUP BY m.order_id, o.user_id
            ORDER BY MAX(m.rowid) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(threads)
    }

    // Admin user operations
    pub async fn get_active_admin(&self, user_id: &str) -> Result<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "SELECT id, user_id, role, is_active, permissions FROM admin_users WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    /// Admin row for the user whether active or not
    pub async fn get_admin_row(&self, user_id: &str) -> Result<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "SELECT id, user_id, role, is_active, permissions FROM admin_users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    pub async fn create_admin_user(&self, admin: &AdminUser) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_users (id, user_id, role, is_active, permissions)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                role = excluded.role,
                is_active = excluded.is_active,
                permissions = excluded.permissions
            "#,
        )
        .bind(&admin.id)
        .bind(&admin.user_id)
        .bind(&admin.role)
        .bind(admin.is_active)
        .bind(&admin.permissions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
